use std::collections::HashMap;

use clap::{Args, ValueEnum};

use luma_core::context::{Context, Mode};
use luma_core::decisions::DecisionRequest;

use crate::util::{api_request, usage_error};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModeArg {
    Silent,
    Light,
    Active,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Silent => Mode::Silent,
            ModeArg::Light => Mode::Light,
            ModeArg::Active => Mode::Active,
        }
    }
}

#[derive(Args)]
pub struct DecideArgs {
    /// What the user just said or typed
    #[arg(long)]
    pub text: String,
    /// How interruptible the user currently is
    #[arg(long, value_enum, default_value = "active")]
    pub mode: ModeArg,
    /// Context signal as key=value (repeatable)
    #[arg(long = "signal", value_name = "KEY=VALUE")]
    pub signals: Vec<String>,
    /// Short summary of the conversation so far
    #[arg(long)]
    pub history: Option<String>,
    /// Correlation id (generated server-side if omitted)
    #[arg(long)]
    pub request_id: Option<String>,
}

pub async fn run(api_url: &str, args: DecideArgs, raw: bool) -> i32 {
    let request = match build_request(args) {
        Ok(request) => request,
        Err(message) => {
            return usage_error(&message, Some("Signals use the form --signal key=value"));
        }
    };
    let body = match serde_json::to_value(&request) {
        Ok(body) => body,
        Err(e) => return usage_error(&format!("Failed to encode request: {e}"), None),
    };
    api_request(
        api_url,
        reqwest::Method::POST,
        "/v1/decision",
        Some(body),
        &[],
        raw,
    )
    .await
}

fn build_request(args: DecideArgs) -> Result<DecisionRequest, String> {
    let mut context = Context::new(args.text, args.mode.into());
    context.signals = parse_signals(&args.signals)?;
    if let Some(history) = args.history {
        context.history_summary = history;
    }
    Ok(DecisionRequest {
        context,
        request_id: args.request_id,
    })
}

fn parse_signals(raw: &[String]) -> Result<HashMap<String, String>, String> {
    raw.iter()
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
            _ => Err(format!("Invalid signal '{pair}', expected key=value")),
        })
        .collect()
}
