use serde::{Deserialize, Serialize};

/// A server wallet as returned by `GET /v1/wallets/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub chain_type: Option<String>,
    /// Hex encoded compressed secp256k1 public key.
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
}

impl Wallet {
    pub fn has_owner(&self) -> bool {
        self.owner_id.as_deref().is_some_and(|owner| !owner.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RawSignRequest<'a> {
    pub params: RawSignParams<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RawSignParams<'a> {
    pub hash: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct UpdateWalletRequest<'a> {
    pub owner_id: &'a str,
}

/// Response of `POST /v1/wallets/{id}/raw_sign`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSignature {
    pub method: String,
    pub data: RawSignatureData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSignatureData {
    /// `0x`-prefixed `r || s`, without a recovery marker.
    pub signature: String,
    pub encoding: String,
}

impl RawSignature {
    pub fn signature(&self) -> &str {
        &self.data.signature
    }
}
