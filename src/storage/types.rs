use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while writing a record to the document store.
///
/// A failure affects only the record being written; feed output that was
/// already produced is never rolled back.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Document store answered with a non-2xx status
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),

    /// Request exceeded the sink timeout
    #[error("Request timed out")]
    Timeout,

    /// Record could not be encoded as JSON
    #[error("Failed to encode document: {0}")]
    Serialize(#[from] serde_json::Error),
}
