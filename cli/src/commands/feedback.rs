use clap::Subcommand;

use luma_core::decisions::FeedbackRequest;

use crate::util::{api_request, usage_error};

#[derive(Subcommand)]
pub enum FeedbackCommands {
    /// Attach feedback to a recorded decision
    Send {
        /// request_id returned by `luma decide`
        #[arg(long)]
        request_id: String,
        /// Free-text feedback
        #[arg(long)]
        feedback: String,
    },
    /// Show every feedback event for a decision, oldest first
    History {
        #[arg(long)]
        request_id: String,
    },
}

pub async fn run(api_url: &str, command: FeedbackCommands, raw: bool) -> i32 {
    match command {
        FeedbackCommands::Send {
            request_id,
            feedback,
        } => send(api_url, request_id, feedback, raw).await,
        FeedbackCommands::History { request_id } => history(api_url, &request_id, raw).await,
    }
}

async fn send(api_url: &str, request_id: String, feedback: String, raw: bool) -> i32 {
    let body = match serde_json::to_value(FeedbackRequest {
        request_id,
        feedback,
    }) {
        Ok(body) => body,
        Err(e) => return usage_error(&format!("Failed to encode feedback: {e}"), None),
    };
    api_request(
        api_url,
        reqwest::Method::POST,
        "/v1/feedback",
        Some(body),
        &[],
        raw,
    )
    .await
}

async fn history(api_url: &str, request_id: &str, raw: bool) -> i32 {
    let path = match history_path(request_id) {
        Some(path) => path,
        None => return usage_error("--request-id must not be empty", None),
    };
    api_request(api_url, reqwest::Method::GET, &path, None, &[], raw).await
}

/// Path for the history endpoint, with the id percent-encoded as one segment.
fn history_path(request_id: &str) -> Option<String> {
    let trimmed = request_id.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut url = reqwest::Url::parse("http://luma.invalid/v1/feedback/").ok()?;
    url.path_segments_mut().ok()?.pop_if_empty().push(trimmed);
    Some(url.path().to_string())
}

#[cfg(test)]
mod tests {
    use super::history_path;

    #[test]
    fn history_path_encodes_request_id() {
        assert_eq!(history_path("abc-1").as_deref(), Some("/v1/feedback/abc-1"));
        assert_eq!(
            history_path("a b/c").as_deref(),
            Some("/v1/feedback/a%20b%2Fc")
        );
    }

    #[test]
    fn blank_request_id_is_rejected() {
        assert_eq!(history_path("  "), None);
    }
}
