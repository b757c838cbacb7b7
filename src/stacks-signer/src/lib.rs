//! Recovery-id resolution for Stacks transactions signed by a remote wallet.
//!
//! The remote signer returns a bare `r || s` pair. Stacks spending conditions
//! expect `v || r || s`, so this crate builds one candidate per recovery
//! marker and lets [`RecoveryResolver`] broadcast them in priority order until
//! the network accepts one.

pub mod broadcast;
pub mod error;
pub mod http;
pub mod recovery;
pub mod recovery_id;
pub mod signature;
pub mod transaction;

pub use broadcast::{BroadcastRejection, BroadcastResponse, FinalResponse};
pub use error::{StacksSignerError, StacksSignerResult};
pub use recovery::{
    AttemptOutcome, Broadcaster, LogObserver, NoopObserver, RecoveryAttempt, RecoveryObserver,
    RecoveryResolver, ResolutionOutcome, TransactionFactory,
};
pub use signature::{
    generate_candidates, MarkerPriority, RecoveryMarker, SignatureCandidate, SignatureCandidates,
    MARKER_PRIORITY,
};
pub use transaction::{SignedTransaction, SingleSigTemplate};
