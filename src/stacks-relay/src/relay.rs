use anyhow::Context;
use async_trait::async_trait;
use privy_client::PrivyClient;
use stacks_signer::recovery_id::{compute_recovery_marker, decode_public_key};
use stacks_signer::{
    generate_candidates, Broadcaster, RecoveryObserver, RecoveryResolver, ResolutionOutcome,
    SingleSigTemplate,
};

/// Custody service holding the wallet keys.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Returns the raw `r || s` hex signature of `digest`.
    async fn sign_digest(&self, wallet_id: &str, digest: &[u8; 32]) -> anyhow::Result<String>;

    /// Returns the SEC1 hex public key of the wallet.
    async fn public_key(&self, wallet_id: &str) -> anyhow::Result<String>;
}

#[async_trait]
impl WalletSigner for PrivyClient {
    async fn sign_digest(&self, wallet_id: &str, digest: &[u8; 32]) -> anyhow::Result<String> {
        let hash = format!("0x{}", hex::encode(digest));
        let signature = self
            .raw_sign(wallet_id, &hash)
            .await
            .with_context(|| format!("failed to sign with wallet {wallet_id}"))?;

        Ok(signature.data.signature)
    }

    async fn public_key(&self, wallet_id: &str) -> anyhow::Result<String> {
        self.get_wallet(wallet_id)
            .await?
            .public_key
            .with_context(|| format!("wallet {wallet_id} has no public key"))
    }
}

/// Signs an unsigned single-sig transaction with a custody wallet and
/// broadcasts it.
pub struct Relay<'a, B: ?Sized, O> {
    pub broadcaster: &'a B,
    pub resolver: RecoveryResolver<O>,
}

impl<'a, B, O> Relay<'a, B, O>
where
    B: Broadcaster + ?Sized,
    O: RecoveryObserver + Clone,
{
    /// When `prefer_recovered_marker` is set, the marker matching the wallet
    /// public key is tried first.
    pub async fn sign_and_broadcast<S: WalletSigner + ?Sized>(
        &self,
        signer: &S,
        wallet_id: &str,
        unsigned_tx: &str,
        label: &str,
        prefer_recovered_marker: bool,
    ) -> anyhow::Result<ResolutionOutcome> {
        let template =
            SingleSigTemplate::from_hex(unsigned_tx).context("invalid unsigned transaction")?;
        let sighash = template.presign_sighash();
        log::debug!("{label}: presign sighash 0x{}", hex::encode(sighash));

        let signature = signer.sign_digest(wallet_id, &sighash).await?;

        let resolver = if prefer_recovered_marker {
            self.preferring_recovered_marker(signer, wallet_id, &sighash, &signature, label)
                .await
        } else {
            self.resolver.clone()
        };

        Ok(resolver
            .resolve(&signature, &template, self.broadcaster, label)
            .await?)
    }

    /// Broadcasts an already obtained signature.
    pub async fn broadcast_signature(
        &self,
        signature: &str,
        unsigned_tx: &str,
        label: &str,
    ) -> anyhow::Result<ResolutionOutcome> {
        let template =
            SingleSigTemplate::from_hex(unsigned_tx).context("invalid unsigned transaction")?;

        Ok(self
            .resolver
            .resolve(signature, &template, self.broadcaster, label)
            .await?)
    }

    async fn preferring_recovered_marker<S: WalletSigner + ?Sized>(
        &self,
        signer: &S,
        wallet_id: &str,
        sighash: &[u8; 32],
        signature: &str,
        label: &str,
    ) -> RecoveryResolver<O> {
        let recovered = async {
            let public_key = decode_public_key(&signer.public_key(wallet_id).await?)?;
            let candidates = generate_candidates(signature)?;
            anyhow::Ok(compute_recovery_marker(sighash, &public_key, &candidates)?)
        }
        .await;

        match recovered {
            Ok(marker) => {
                log::info!("{label}: recovered marker {marker} from the wallet public key");
                let priority = self.resolver.priority().preferring(marker);
                self.resolver.clone().with_priority(priority)
            }
            Err(err) => {
                log::warn!("{label}: could not recover marker offline, using default order: {err:#}");
                self.resolver.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use k256::ecdsa::SigningKey;
    use stacks_signer::{BroadcastRejection, BroadcastResponse, NoopObserver, SignedTransaction};

    use super::*;

    const MARKER_OFFSET: usize = 44;

    struct LocalSigner {
        key: SigningKey,
    }

    impl LocalSigner {
        fn new() -> Self {
            Self {
                key: SigningKey::from_slice(&[42u8; 32]).unwrap(),
            }
        }
    }

    #[async_trait]
    impl WalletSigner for LocalSigner {
        async fn sign_digest(&self, _: &str, digest: &[u8; 32]) -> anyhow::Result<String> {
            let (signature, _) = self.key.sign_prehash_recoverable(digest)?;
            Ok(format!("0x{}", hex::encode(signature.to_bytes())))
        }

        async fn public_key(&self, _: &str) -> anyhow::Result<String> {
            Ok(hex::encode(
                self.key.verifying_key().to_encoded_point(true).as_bytes(),
            ))
        }
    }

    /// Accepts only the given marker and records every marker it saw.
    struct MarkerNode {
        accepted: u8,
        seen: Mutex<Vec<u8>>,
    }

    #[async_trait]
    impl Broadcaster for MarkerNode {
        async fn broadcast(
            &self,
            transaction: &SignedTransaction,
        ) -> anyhow::Result<BroadcastResponse> {
            let marker = transaction.as_bytes()[MARKER_OFFSET];
            self.seen.lock().unwrap().push(marker);
            if marker == self.accepted {
                Ok(BroadcastResponse::accepted("0xfeed"))
            } else {
                Ok(BroadcastResponse::Rejected(BroadcastRejection::new(
                    "transaction rejected",
                    "SignatureValidation",
                )))
            }
        }
    }

    fn unsigned_transfer_hex() -> String {
        let mut bytes = vec![0x80];
        bytes.extend_from_slice(&0x8000_0000u32.to_be_bytes());
        bytes.extend_from_slice(&[0x04, 0x00]);
        bytes.extend_from_slice(&[0x11; 20]);
        bytes.extend_from_slice(&2u64.to_be_bytes());
        bytes.extend_from_slice(&300u64.to_be_bytes());
        bytes.push(0x00);
        bytes.extend_from_slice(&[0u8; 65]);
        bytes.extend_from_slice(&[0x03, 0x02, 0, 0, 0, 0]);
        bytes.extend_from_slice(&[0x00, 0x05, 0x1a]);
        bytes.extend_from_slice(&[0x22; 20]);
        bytes.extend_from_slice(&10_000u64.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 34]);
        format!("0x{}", hex::encode(bytes))
    }

    fn true_marker(signer: &LocalSigner, unsigned_tx: &str) -> u8 {
        let digest = SingleSigTemplate::from_hex(unsigned_tx)
            .unwrap()
            .presign_sighash();
        let (_, recovery_id) = signer.key.sign_prehash_recoverable(&digest).unwrap();
        recovery_id.to_byte()
    }

    #[tokio::test]
    async fn should_try_recovered_marker_first() {
        let signer = LocalSigner::new();
        let unsigned_tx = unsigned_transfer_hex();
        let marker = true_marker(&signer, &unsigned_tx);
        let node = MarkerNode {
            accepted: marker,
            seen: Mutex::default(),
        };

        let relay = Relay {
            broadcaster: &node,
            resolver: RecoveryResolver::new(NoopObserver),
        };
        let outcome = relay
            .sign_and_broadcast(&signer, "wallet", &unsigned_tx, "STX-TRANSFER", true)
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.chosen_candidate.marker().value(), marker);
        assert_eq!(*node.seen.lock().unwrap(), vec![marker]);
    }

    #[tokio::test]
    async fn should_follow_default_order_without_recovery() {
        let signer = LocalSigner::new();
        let unsigned_tx = unsigned_transfer_hex();
        let marker = true_marker(&signer, &unsigned_tx);
        let node = MarkerNode {
            accepted: marker,
            seen: Mutex::default(),
        };

        let relay = Relay {
            broadcaster: &node,
            resolver: RecoveryResolver::new(NoopObserver),
        };
        let outcome = relay
            .sign_and_broadcast(&signer, "wallet", &unsigned_tx, "STX-TRANSFER", false)
            .await
            .unwrap();

        assert!(outcome.success);
        let seen = node.seen.lock().unwrap().clone();
        let expected: Vec<u8> = [1u8, 0, 2, 3]
            .into_iter()
            .take_while(|m| *m != marker)
            .chain(std::iter::once(marker))
            .collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn should_reject_invalid_unsigned_transaction() {
        let node = MarkerNode {
            accepted: 0,
            seen: Mutex::default(),
        };
        let relay = Relay {
            broadcaster: &node,
            resolver: RecoveryResolver::new(NoopObserver),
        };

        assert!(relay
            .broadcast_signature(&"ab".repeat(64), "0x0011", "STX-TRANSFER")
            .await
            .is_err());
        assert!(node.seen.lock().unwrap().is_empty());
    }
}
