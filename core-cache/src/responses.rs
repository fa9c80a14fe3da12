//! Synthetic responses produced when neither cache nor network can answer.

use bridge_traits::HttpResponse;

pub const OFFLINE_MESSAGE: &str = "Offline";
pub const AUDIO_OFFLINE_MESSAGE: &str = "Audio unavailable offline";

/// Plain-text 503 for shell and audio requests.
pub fn offline_text(message: &str) -> HttpResponse {
    HttpResponse::new(503)
        .with_header("content-type", "text/plain; charset=utf-8")
        .with_body(message.to_string())
}

/// 503 in the origin's `{"error": "..."}` envelope, for API classes.
pub fn offline_json(message: &str) -> HttpResponse {
    let body = serde_json::json!({ "error": message }).to_string();
    HttpResponse::new(503)
        .with_header("content-type", "application/json")
        .with_body(body)
}
