use crate::error::TransportError;
use serde_json::Value;

const MAX_API_ERROR_CHARS: usize = 200;

/// Truncate raw error text so an HTML error page never floods logs.
pub fn sanitize_api_error(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.chars().count() <= MAX_API_ERROR_CHARS {
        return trimmed.to_string();
    }

    let mut end = MAX_API_ERROR_CHARS;
    while end > 0 && !trimmed.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &trimmed[..end])
}

/// Map a non-2xx body to [`TransportError::Status`].
///
/// The service answers errors as `{"error": "...", "details": ...}`; anything
/// else is kept as sanitized text.
pub fn status_error(status: u16, body: &str) -> TransportError {
    let parsed = serde_json::from_str::<Value>(body).ok();

    let message = parsed
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            let text = sanitize_api_error(body);
            (parsed.is_none() && !text.is_empty()).then_some(text)
        })
        .unwrap_or_else(|| format!("Request failed with status {status}"));

    let details = parsed
        .as_ref()
        .and_then(|v| v.get("details"))
        .filter(|d| !d.is_null())
        .cloned();

    TransportError::Status {
        status,
        message,
        details,
    }
}

/// Build a [`TransportError`] from a failed HTTP response.
pub async fn api_error(response: reqwest::Response) -> TransportError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    status_error(status, &body)
}
