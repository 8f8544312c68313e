use serde_json::json;

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

fn render(value: &serde_json::Value, raw: bool) -> String {
    let formatted = if raw {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    formatted.unwrap_or_else(|_| value.to_string())
}

/// Print a structured CLI error to stderr and return the usage exit code.
pub fn usage_error(message: &str, docs_hint: Option<&str>) -> i32 {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", render(&err, false));
    4
}

/// Map an HTTP status to the CLI exit code.
pub fn exit_code_for(status: u16) -> i32 {
    match status {
        200..=299 => 0,
        400..=499 => 1,
        _ => 2,
    }
}

/// Execute an API request, print the response, return a structured exit code.
///
/// Exit codes: 0=success (2xx), 1=client error (4xx), 2=server error (5xx),
///             3=connection error, 4=usage error
pub async fn api_request(
    api_url: &str,
    method: reqwest::Method,
    path: &str,
    body: Option<serde_json::Value>,
    query: &[(String, String)],
    raw: bool,
) -> i32 {
    let base = api_url.trim_end_matches('/');
    let url = match reqwest::Url::parse(&format!("{base}{path}")) {
        Ok(mut u) => {
            if !query.is_empty() {
                let mut q = u.query_pairs_mut();
                for (k, v) in query {
                    q.append_pair(k, v);
                }
            }
            u
        }
        Err(e) => return usage_error(&format!("Invalid URL: {base}{path}: {e}"), None),
    };

    let mut req = client().request(method, url);
    if let Some(b) = body {
        req = req.json(&b);
    }

    let resp = match req.send().await {
        Ok(r) => r,
        Err(e) => {
            let err = json!({
                "error": "connection_error",
                "message": format!("{e}"),
                "docs_hint": "Is the API server running? Check LUMA_API_URL."
            });
            eprintln!("{}", render(&err, raw));
            return 3;
        }
    };

    let status = resp.status().as_u16();
    let exit_code = exit_code_for(status);

    let resp_body: serde_json::Value = match resp.json().await {
        Ok(v) => v,
        Err(e) => json!({"raw_error": format!("Failed to parse response as JSON: {e}")}),
    };

    let formatted = render(&resp_body, raw);
    if exit_code == 0 {
        println!("{formatted}");
    } else {
        eprintln!("{formatted}");
    }

    exit_code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes_map_to_exit_codes() {
        assert_eq!(exit_code_for(200), 0);
        assert_eq!(exit_code_for(204), 0);
        assert_eq!(exit_code_for(400), 1);
        assert_eq!(exit_code_for(409), 1);
        assert_eq!(exit_code_for(502), 2);
        assert_eq!(exit_code_for(500), 2);
    }

    #[test]
    fn raw_output_is_single_line() {
        let value = json!({"status": "ok", "nested": {"a": 1}});
        assert!(!render(&value, true).contains('\n'));
        assert!(render(&value, false).contains('\n'));
    }
}
