use crate::error::RelayError;
use reqwest::Response;

/// Join a provider's base URL with the chat-completions path, tolerating a
/// trailing slash in the configured prefix.
pub fn chat_completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Turn a non-2xx upstream response into an error carrying status and body.
pub async fn status_error(response: Response) -> RelayError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    RelayError::UpstreamStatus { status, body }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_join_handles_trailing_slash() {
        assert_eq!(
            chat_completions_url("https://api.deepseek.com"),
            "https://api.deepseek.com/chat/completions"
        );
        assert_eq!(
            chat_completions_url("https://api.siliconflow.cn/v1/"),
            "https://api.siliconflow.cn/v1/chat/completions"
        );
    }
}
