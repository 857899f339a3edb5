//! Logging of the requests sent to and the responses read from the
//! Transactions API.

/// Bodies longer than this many bytes are truncated at the `info` level and
/// logged in full at the `debug` level.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// Log an outgoing request.
pub fn log_request(method: &str, url: &str, body: &str) {
    if body.is_empty() {
        tracing::info!("Sending request: {method} {url}");
    } else {
        log_body(&format!("Sending request: {method} {url}"), body);
    }
}

/// Log a response and its body.
pub fn log_response(status: u16, url: &str, body: &str) {
    log_body(&format!("Received response: {status} from {url}"), body);
}

/// Log `summary` with `body` at `info`, truncating bodies longer than
/// [LOG_BODY_LENGTH_LIMIT] bytes and logging the full body at `debug`.
pub fn log_body(summary: &str, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!("{summary}\nbody: {}...", truncate(body, LOG_BODY_LENGTH_LIMIT));
        tracing::debug!("Full body: {body:?}");
    } else {
        tracing::info!("{summary}\nbody: {body:?}");
    }
}

/// The longest prefix of `text` that fits in `limit` bytes without splitting
/// a character.
fn truncate(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }

    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    &text[..end]
}
