use thiserror::Error;

/// Result type for the Privy client.
pub type PrivyResult<T> = std::result::Result<T, PrivyError>;

/// Error type for the Privy client.
#[derive(Error, Debug)]
pub enum PrivyError {
    /// Transport error while talking to the wallet API.
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// Error while parsing or serializing a JSON body.
    #[error("Invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-2xx answer from the wallet API.
    #[error("Privy API error {code} while {action}: {text}")]
    Api {
        /// What the client was doing.
        action: &'static str,
        /// HTTP status code.
        code: u16,
        /// HTTP response text.
        text: String,
    },

    /// Credentials that cannot be sent as a header value.
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// The authorization key is not a base64 PKCS#8 P-256 key.
    #[error("invalid authorization key: {0}")]
    InvalidAuthorizationKey(String),

    /// An owner id was configured without the key that signs for that owner.
    #[error("an authorization key is required when a wallet owner id is configured")]
    MissingAuthorizationKey,
}
