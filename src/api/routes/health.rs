//! Health check endpoint

/// GET /health
///
/// Deliberately touches nothing: it answers as long as the process serves
/// HTTP at all.
pub async fn health() -> &'static str {
    "OK"
}
