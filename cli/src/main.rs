use clap::{Parser, Subcommand};

mod commands;
mod util;

use commands::decide::DecideArgs;
use commands::feedback::FeedbackCommands;

#[derive(Parser)]
#[command(
    name = "luma",
    version,
    about = "Luma CLI: ask the decision gateway what to say, review what it said"
)]
struct Cli {
    /// API base URL
    #[arg(
        long,
        env = "LUMA_API_URL",
        default_value = "http://localhost:52123",
        global = true
    )]
    api_url: String,

    /// Print compact single-line JSON
    #[arg(long, global = true)]
    raw: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Request a decision for the given context
    Decide(DecideArgs),
    /// Feedback operations
    Feedback {
        #[command(subcommand)]
        command: FeedbackCommands,
    },
    /// List recorded decisions, newest first
    Logs {
        /// Maximum number of entries (server default 50)
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Health => commands::health::run(&cli.api_url, cli.raw).await,
        Commands::Decide(args) => commands::decide::run(&cli.api_url, args, cli.raw).await,
        Commands::Feedback { command } => {
            commands::feedback::run(&cli.api_url, command, cli.raw).await
        }
        Commands::Logs { limit } => commands::logs::run(&cli.api_url, limit, cli.raw).await,
    };

    std::process::exit(code);
}
