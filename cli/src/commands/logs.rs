use crate::util::api_request;

pub async fn run(api_url: &str, limit: Option<u32>, raw: bool) -> i32 {
    let query: Vec<(String, String)> = limit
        .map(|l| vec![("limit".to_string(), l.to_string())])
        .unwrap_or_default();
    api_request(api_url, reqwest::Method::GET, "/v1/logs", None, &query, raw).await
}
