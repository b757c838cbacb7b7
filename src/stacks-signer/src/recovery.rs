use async_trait::async_trait;

use crate::broadcast::{BroadcastRejection, BroadcastResponse, FinalResponse};
use crate::error::StacksSignerResult;
use crate::signature::{
    generate_candidates, MarkerPriority, SignatureCandidate, SignatureCandidates,
    RAW_SIGNATURE_HEX_LEN,
};
use crate::transaction::SignedTransaction;

/// Builds a signed transaction around one signature candidate.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionFactory: Send + Sync {
    async fn construct(&self, candidate: &SignatureCandidate) -> anyhow::Result<SignedTransaction>;
}

#[async_trait]
impl<F> TransactionFactory for F
where
    F: Fn(&SignatureCandidate) -> anyhow::Result<SignedTransaction> + Send + Sync,
{
    async fn construct(&self, candidate: &SignatureCandidate) -> anyhow::Result<SignedTransaction> {
        self(candidate)
    }
}

/// Submits a signed transaction to the network.
///
/// `Err` is a transport failure; a node rejection is an `Ok` carrying
/// [`BroadcastResponse::Rejected`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(&self, transaction: &SignedTransaction) -> anyhow::Result<BroadcastResponse>;
}

/// Structured events emitted while resolving a signature.
pub trait RecoveryObserver: Send + Sync {
    fn on_malformed_signature(&self, label: &str, raw_hex_len: usize);

    fn on_attempt(&self, label: &str, attempt: &RecoveryAttempt);

    fn on_resolved(&self, label: &str, outcome: &ResolutionOutcome);
}

impl<O: RecoveryObserver + ?Sized> RecoveryObserver for &O {
    fn on_malformed_signature(&self, label: &str, raw_hex_len: usize) {
        (**self).on_malformed_signature(label, raw_hex_len)
    }

    fn on_attempt(&self, label: &str, attempt: &RecoveryAttempt) {
        (**self).on_attempt(label, attempt)
    }

    fn on_resolved(&self, label: &str, outcome: &ResolutionOutcome) {
        (**self).on_resolved(label, outcome)
    }
}

/// Writes resolution events through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl RecoveryObserver for LogObserver {
    fn on_malformed_signature(&self, label: &str, raw_hex_len: usize) {
        log::warn!(
            "{label}: signer returned {raw_hex_len} hex characters instead of {RAW_SIGNATURE_HEX_LEN}, r and s were zero-padded"
        );
    }

    fn on_attempt(&self, label: &str, attempt: &RecoveryAttempt) {
        let marker = attempt.candidate.marker();
        match &attempt.outcome {
            AttemptOutcome::Accepted { txid } => {
                log::info!("{label}: marker {marker} accepted, txid {txid}")
            }
            AttemptOutcome::RejectedByNetwork(rejection) if rejection.is_signature_validation() => {
                log::debug!(
                    "{label}: marker {marker} failed signature validation: {}",
                    rejection.message()
                )
            }
            AttemptOutcome::RejectedByNetwork(rejection) => log::warn!(
                "{label}: marker {marker} rejected by the node ({}): {}",
                rejection.reason.as_deref().unwrap_or(&rejection.error),
                rejection.message()
            ),
            AttemptOutcome::ThrewDuringConstruction(err) => {
                log::debug!("{label}: marker {marker} could not be built: {err}")
            }
            AttemptOutcome::ThrewDuringBroadcast(err) => {
                log::warn!("{label}: marker {marker} could not be broadcast: {err}")
            }
        }
    }

    fn on_resolved(&self, label: &str, outcome: &ResolutionOutcome) {
        log::info!(
            "{label}: resolution finished, success: {}, marker: {}, tried: {}/{}",
            outcome.success,
            outcome.chosen_candidate.marker(),
            outcome.attempts.len(),
            outcome.attempts_count
        );
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RecoveryObserver for NoopObserver {
    fn on_malformed_signature(&self, _label: &str, _raw_hex_len: usize) {}

    fn on_attempt(&self, _label: &str, _attempt: &RecoveryAttempt) {}

    fn on_resolved(&self, _label: &str, _outcome: &ResolutionOutcome) {}
}

/// What happened to a single candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Accepted { txid: String },
    RejectedByNetwork(BroadcastRejection),
    ThrewDuringConstruction(String),
    ThrewDuringBroadcast(String),
}

impl AttemptOutcome {
    /// Whether the next candidate should be tried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Accepted { .. } => false,
            Self::RejectedByNetwork(rejection) => rejection.is_signature_validation(),
            Self::ThrewDuringConstruction(_) | Self::ThrewDuringBroadcast(_) => true,
        }
    }

    fn to_final_response(&self) -> FinalResponse {
        match self {
            Self::Accepted { txid } => {
                FinalResponse::Broadcast(BroadcastResponse::accepted(txid.clone()))
            }
            Self::RejectedByNetwork(rejection) => {
                FinalResponse::Broadcast(BroadcastResponse::Rejected(rejection.clone()))
            }
            Self::ThrewDuringConstruction(message) | Self::ThrewDuringBroadcast(message) => {
                FinalResponse::exception(message.clone())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryAttempt {
    pub candidate: SignatureCandidate,
    pub outcome: AttemptOutcome,
}

/// Structured result of a resolution. Never an error once candidates exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionOutcome {
    pub success: bool,
    pub final_response: FinalResponse,
    /// The accepted candidate, the one the node rejected for a reason
    /// unrelated to the signature, or the marker `1` candidate when every
    /// attempt failed, whatever the priority order.
    pub chosen_candidate: SignatureCandidate,
    /// Number of generated candidates, regardless of how many were tried.
    pub attempts_count: usize,
    /// Attempts actually made, in order.
    pub attempts: Vec<RecoveryAttempt>,
}

impl ResolutionOutcome {
    pub fn txid(&self) -> Option<&str> {
        self.final_response.txid()
    }
}

/// Tries signature candidates one at a time until the network accepts one.
#[derive(Debug, Default, Clone)]
pub struct RecoveryResolver<O = LogObserver> {
    priority: MarkerPriority,
    observer: O,
}

impl<O: RecoveryObserver> RecoveryResolver<O> {
    pub fn new(observer: O) -> Self {
        Self {
            priority: MarkerPriority::default(),
            observer,
        }
    }

    pub fn with_priority(mut self, priority: MarkerPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn priority(&self) -> &MarkerPriority {
        &self.priority
    }

    /// Resolves the recovery marker for a raw hex `r || s` signature.
    ///
    /// Fails only if the signature contains non-hex characters.
    pub async fn resolve<F, B>(
        &self,
        signature: &str,
        factory: &F,
        broadcaster: &B,
        label: &str,
    ) -> StacksSignerResult<ResolutionOutcome>
    where
        F: TransactionFactory + ?Sized,
        B: Broadcaster + ?Sized,
    {
        let candidates = generate_candidates(signature)?;
        if !candidates.is_well_formed() {
            self.observer
                .on_malformed_signature(label, candidates.raw_hex_len());
        }

        Ok(self
            .resolve_candidates(&candidates, factory, broadcaster, label)
            .await)
    }

    /// Runs the broadcast loop over already generated candidates.
    pub async fn resolve_candidates<F, B>(
        &self,
        candidates: &SignatureCandidates,
        factory: &F,
        broadcaster: &B,
        label: &str,
    ) -> ResolutionOutcome
    where
        F: TransactionFactory + ?Sized,
        B: Broadcaster + ?Sized,
    {
        let mut attempts = Vec::with_capacity(candidates.len());
        let mut last_failure = None;

        for candidate in candidates.in_priority(&self.priority) {
            let outcome = Self::attempt(candidate, factory, broadcaster).await;
            let attempt = RecoveryAttempt {
                candidate: candidate.clone(),
                outcome,
            };
            self.observer.on_attempt(label, &attempt);

            let final_response = attempt.outcome.to_final_response();
            let retryable = attempt.outcome.is_retryable();
            let success = matches!(attempt.outcome, AttemptOutcome::Accepted { .. });
            attempts.push(attempt);

            if !retryable {
                return self.finish(
                    label,
                    ResolutionOutcome {
                        success,
                        final_response,
                        chosen_candidate: candidate.clone(),
                        attempts_count: candidates.len(),
                        attempts,
                    },
                );
            }

            last_failure = Some(final_response);
        }

        let final_response = last_failure
            .unwrap_or_else(|| FinalResponse::exception("no signature candidate was attempted"));

        self.finish(
            label,
            ResolutionOutcome {
                success: false,
                final_response,
                chosen_candidate: candidates.default_candidate().clone(),
                attempts_count: candidates.len(),
                attempts,
            },
        )
    }

    async fn attempt<F, B>(
        candidate: &SignatureCandidate,
        factory: &F,
        broadcaster: &B,
    ) -> AttemptOutcome
    where
        F: TransactionFactory + ?Sized,
        B: Broadcaster + ?Sized,
    {
        let transaction = match factory.construct(candidate).await {
            Ok(transaction) => transaction,
            Err(err) => return AttemptOutcome::ThrewDuringConstruction(format!("{err:#}")),
        };

        match broadcaster.broadcast(&transaction).await {
            Ok(BroadcastResponse::Accepted { txid }) => AttemptOutcome::Accepted { txid },
            Ok(BroadcastResponse::Rejected(rejection)) => {
                AttemptOutcome::RejectedByNetwork(rejection)
            }
            Err(err) => AttemptOutcome::ThrewDuringBroadcast(format!("{err:#}")),
        }
    }

    fn finish(&self, label: &str, outcome: ResolutionOutcome) -> ResolutionOutcome {
        self.observer.on_resolved(label, &outcome);
        outcome
    }
}
