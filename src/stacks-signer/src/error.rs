use thiserror::Error;

/// Result type for signature resolution.
pub type StacksSignerResult<T> = std::result::Result<T, StacksSignerError>;

/// Error type for signature resolution.
#[derive(Debug, Error)]
pub enum StacksSignerError {
    /// The signature or transaction contains non-hex characters.
    #[error("invalid hex in signature: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Recovery marker outside `0..=3`.
    #[error("recovery marker {0} is out of range, expected 0..=3")]
    InvalidMarker(u8),

    /// Marker order that is not a permutation of all markers.
    #[error("marker priority {0:?} is not a permutation of 0..=3")]
    InvalidPriority([u8; 4]),

    /// Public key that is not a valid SEC1 secp256k1 point.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Transaction too short to hold a single-sig spending condition.
    #[error("transaction is {actual} bytes, expected at least {minimum}")]
    TransactionTooShort { actual: usize, minimum: usize },

    /// Authorization type other than standard.
    #[error("unsupported authorization type {0:#04x}, only standard authorization is supported")]
    UnsupportedAuthType(u8),

    /// Hash mode of a multi-sig spending condition.
    #[error("unsupported hash mode {0:#04x}, only single-sig spending conditions are supported")]
    UnsupportedHashMode(u8),

    /// Generic error from the underlying crypto library.
    #[error("internal error occurred : {0}")]
    Internal(String),
}
