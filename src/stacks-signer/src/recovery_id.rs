use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

use crate::error::{StacksSignerError, StacksSignerResult};
use crate::signature::{RecoveryMarker, SignatureCandidates};

/// Compute the recovery marker for the given digest, public key and signature
/// without going to the network.
///
/// # Arguments
/// * `digest`: The presign hash the wallet signed.
/// * `public_key`: SEC1 encoded public key of the wallet.
/// * `candidates`: Candidates generated from the wallet's raw signature.
pub fn compute_recovery_marker(
    digest: &[u8; 32],
    public_key: &[u8],
    candidates: &SignatureCandidates,
) -> StacksSignerResult<RecoveryMarker> {
    let verifying_key =
        VerifyingKey::from_sec1_bytes(public_key).map_err(|_| StacksSignerError::InvalidPublicKey)?;

    let candidate = candidates.default_candidate();
    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(candidate.r());
    rs[32..].copy_from_slice(candidate.s());

    let signature = Signature::from_slice(&rs).map_err(|e| {
        StacksSignerError::Internal(format!("failed to parse ECDSA signature: {e}"))
    })?;

    let recovery_id = RecoveryId::trial_recovery_from_prehash(&verifying_key, digest, &signature)
        .map_err(|e| StacksSignerError::Internal(format!("failed to compute recovery ID: {e}")))?;

    RecoveryMarker::new(recovery_id.to_byte())
}

/// Parses an optionally `0x`-prefixed hex public key.
pub fn decode_public_key(public_key: &str) -> StacksSignerResult<Vec<u8>> {
    let public_key = public_key.strip_prefix("0x").unwrap_or(public_key);
    Ok(hex::decode(public_key)?)
}
