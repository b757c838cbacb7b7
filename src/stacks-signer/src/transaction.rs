use async_trait::async_trait;
use sha2::{Digest, Sha512_256};

use crate::error::{StacksSignerError, StacksSignerResult};
use crate::recovery::TransactionFactory;
use crate::signature::{SignatureCandidate, FULL_SIGNATURE_LEN};

const AUTH_TYPE_OFFSET: usize = 5;
const HASH_MODE_OFFSET: usize = 6;
const NONCE_OFFSET: usize = 27;
const FEE_OFFSET: usize = 35;
const SIGNATURE_OFFSET: usize = 44;
const SIGNATURE_END: usize = SIGNATURE_OFFSET + FULL_SIGNATURE_LEN;

const AUTH_TYPE_STANDARD: u8 = 0x04;
const HASH_MODE_P2PKH: u8 = 0x00;
const HASH_MODE_P2WPKH: u8 = 0x02;

/// A serialized, signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction(Vec<u8>);

impl SignedTransaction {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// An unsigned, serialized single-sig transaction.
///
/// Only the fixed-offset fields of the origin spending condition are read or
/// written: version (1), chain id (4), auth type (1), hash mode (1),
/// signer (20), nonce (8), fee (8), key encoding (1), signature (65).
/// Everything after the signature is left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleSigTemplate {
    bytes: Vec<u8>,
}

impl SingleSigTemplate {
    pub fn from_bytes(bytes: Vec<u8>) -> StacksSignerResult<Self> {
        if bytes.len() < SIGNATURE_END {
            return Err(StacksSignerError::TransactionTooShort {
                actual: bytes.len(),
                minimum: SIGNATURE_END,
            });
        }

        let auth_type = bytes[AUTH_TYPE_OFFSET];
        if auth_type != AUTH_TYPE_STANDARD {
            return Err(StacksSignerError::UnsupportedAuthType(auth_type));
        }

        let hash_mode = bytes[HASH_MODE_OFFSET];
        if hash_mode != HASH_MODE_P2PKH && hash_mode != HASH_MODE_P2WPKH {
            return Err(StacksSignerError::UnsupportedHashMode(hash_mode));
        }

        Ok(Self { bytes })
    }

    /// Parses an optionally `0x`-prefixed hex transaction.
    pub fn from_hex(unsigned_tx: &str) -> StacksSignerResult<Self> {
        let unsigned_tx = unsigned_tx.trim();
        let bytes = hex::decode(unsigned_tx.strip_prefix("0x").unwrap_or(unsigned_tx))?;
        Self::from_bytes(bytes)
    }

    pub fn nonce(&self) -> u64 {
        self.read_u64(NONCE_OFFSET)
    }

    pub fn fee(&self) -> u64 {
        self.read_u64(FEE_OFFSET)
    }

    /// Hash the wallet has to sign for the origin spending condition.
    ///
    /// The initial sighash is the txid of the transaction with nonce, fee and
    /// signature cleared; the presign hash binds it to the auth type, fee and
    /// nonce.
    pub fn presign_sighash(&self) -> [u8; 32] {
        let mut cleared = self.bytes.clone();
        cleared[NONCE_OFFSET..FEE_OFFSET].fill(0);
        cleared[FEE_OFFSET..FEE_OFFSET + 8].fill(0);
        cleared[SIGNATURE_OFFSET..SIGNATURE_END].fill(0);
        let initial_sighash = Sha512_256::digest(&cleared);

        let mut hasher = Sha512_256::new();
        hasher.update(initial_sighash);
        hasher.update([self.bytes[AUTH_TYPE_OFFSET]]);
        hasher.update(self.fee().to_be_bytes());
        hasher.update(self.nonce().to_be_bytes());
        hasher.finalize().into()
    }

    /// Copy of the transaction with `candidate` written into the origin
    /// spending condition.
    pub fn with_signature(&self, candidate: &SignatureCandidate) -> SignedTransaction {
        let mut bytes = self.bytes.clone();
        bytes[SIGNATURE_OFFSET..SIGNATURE_END].copy_from_slice(&candidate.full_signature());
        SignedTransaction::new(bytes)
    }

    fn read_u64(&self, offset: usize) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.bytes[offset..offset + 8]);
        u64::from_be_bytes(buf)
    }
}

#[async_trait]
impl TransactionFactory for SingleSigTemplate {
    async fn construct(&self, candidate: &SignatureCandidate) -> anyhow::Result<SignedTransaction> {
        Ok(self.with_signature(candidate))
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    /// An unsigned testnet STX transfer with nonce 5 and fee 180.
    pub fn unsigned_transfer() -> Vec<u8> {
        let mut bytes = vec![0x80];
        bytes.extend_from_slice(&0x8000_0000u32.to_be_bytes());
        bytes.push(0x04);
        bytes.push(0x00);
        bytes.extend_from_slice(&[0x11; 20]);
        bytes.extend_from_slice(&5u64.to_be_bytes());
        bytes.extend_from_slice(&180u64.to_be_bytes());
        bytes.push(0x00);
        bytes.extend_from_slice(&[0u8; 65]);
        // anchor mode, post-condition mode, no post conditions
        bytes.extend_from_slice(&[0x03, 0x02, 0, 0, 0, 0]);
        // token transfer payload
        bytes.push(0x00);
        bytes.extend_from_slice(&[0x05, 0x1a]);
        bytes.extend_from_slice(&[0x22; 20]);
        bytes.extend_from_slice(&10_000u64.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 34]);
        bytes
    }
}
