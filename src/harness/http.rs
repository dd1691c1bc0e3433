//! HTTP utilities for Harness REST and GraphQL calls

use super::error::ApiError;
use anyhow::{Context, Result};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

const USER_AGENT: &str = concat!("terraform-provider-harness/", env!("CARGO_PKG_VERSION"));

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Pull `code` and `message` out of a Harness error envelope.
/// Next-gen answers `{status, code, message}`, feature flags answer
/// `{code, message}` with a numeric-looking code.
fn parse_error_envelope(body: &str) -> (Option<String>, Option<String>) {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return (None, None);
    };

    let code = value.get("code").and_then(|c| match c {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    let message = value
        .get("message")
        .or_else(|| value.get("error").and_then(|e| e.get("message")))
        .and_then(|m| m.as_str())
        .map(|m| m.to_string());

    (code, message)
}

/// HTTP client wrapper for Harness API calls
#[derive(Clone)]
pub struct HarnessHttpClient {
    client: Client,
}

impl HarnessHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Send one request and decode the JSON answer.
    /// `headers` carries the API key and, for v1 endpoints, the account header.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        self.send_with_status(method, url, headers, body)
            .await
            .map(|(_, value)| value)
    }

    /// Same as [`HarnessHttpClient::send`], also returning the success status
    pub async fn send_with_status(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value), ApiError> {
        tracing::debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let response_body = response.text().await?;

        if !status.is_success() {
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&response_body));
            let (code, message) = parse_error_envelope(&response_body);
            let message = message.unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            });
            return Err(ApiError::from_response(status, code, message));
        }

        // Handle empty response
        if response_body.trim().is_empty() {
            return Ok((status, Value::Null));
        }

        let value = serde_json::from_str(&response_body).map_err(|e| {
            tracing::error!("Unparseable response: {}", sanitize_for_log(&response_body));
            ApiError::Decode(e.to_string())
        })?;
        Ok((status, value))
    }
}

/// Format a Harness API error for display
/// Adds a hint for the common credential failures
pub fn format_harness_error(error: &ApiError) -> String {
    match error {
        ApiError::Unauthorized(_) => format!(
            "{}. Check HARNESS_PLATFORM_API_KEY / HARNESS_API_KEY.",
            error
        ),
        ApiError::Forbidden(_) => format!(
            "{}. The API key lacks permission for this scope.",
            error
        ),
        ApiError::Http { status, .. } if *status == 429 => {
            format!("{}. Rate limit exceeded, try again later.", error)
        }
        ApiError::Http { status, .. } if *status >= 500 => {
            format!("{}. Harness is temporarily unavailable.", error)
        }
        _ => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let out = sanitize_for_log(&body);
        assert!(out.contains("[truncated, 500 bytes total]"));
    }

    #[test]
    fn test_sanitize_strips_control_characters() {
        assert_eq!(sanitize_for_log("a\nb\tc"), "abc");
    }

    #[test]
    fn test_parse_ng_envelope() {
        let (code, message) = parse_error_envelope(
            r#"{"status":"ERROR","code":"RESOURCE_NOT_FOUND","message":"Environment not found"}"#,
        );
        assert_eq!(code.as_deref(), Some("RESOURCE_NOT_FOUND"));
        assert_eq!(message.as_deref(), Some("Environment not found"));
    }

    #[test]
    fn test_parse_numeric_code() {
        let (code, _) = parse_error_envelope(r#"{"code":404,"message":"no flag"}"#);
        assert_eq!(code.as_deref(), Some("404"));
    }

    #[test]
    fn test_parse_garbage_envelope() {
        assert_eq!(parse_error_envelope("<html>"), (None, None));
    }

    #[test]
    fn test_format_unauthorized_hint() {
        let msg = format_harness_error(&ApiError::Unauthorized("bad key".into()));
        assert!(msg.contains("HARNESS_PLATFORM_API_KEY"));
    }
}
