//! Error types for the Stacks node client.

use thiserror::Error;

/// Result type for the Stacks node client.
pub type NodeClientResult<T> = std::result::Result<T, NodeClientError>;

/// Error type for the Stacks node client.
#[derive(Error, Debug)]
pub enum NodeClientError {
    /// Error while parsing the JSON response.
    #[error("Invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),
    /// The node answered with a status the client does not know how to decode.
    #[error("HTTP error {code}: {text}")]
    Http {
        /// HTTP status code.
        code: u16,
        /// HTTP response text.
        text: String,
    },
    /// The node accepted the transaction but returned an empty txid.
    #[error("node returned an empty transaction id")]
    EmptyTxid,
}
