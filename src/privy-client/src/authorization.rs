use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::DecodePrivateKey;
use serde_json::{json, Map, Value};

use crate::error::{PrivyError, PrivyResult};

const KEY_PREFIX: &str = "wallet-auth:";
const PAYLOAD_VERSION: u32 = 1;

/// P-256 key that signs wallet API requests on behalf of the wallet owner.
#[derive(Clone)]
pub struct AuthorizationKey(SigningKey);

impl AuthorizationKey {
    /// Parses a base64 PKCS#8 key, optionally prefixed with `wallet-auth:`.
    pub fn from_base64(key: &str) -> PrivyResult<Self> {
        let key = key.trim();
        let der = STANDARD
            .decode(key.strip_prefix(KEY_PREFIX).unwrap_or(key))
            .map_err(|e| PrivyError::InvalidAuthorizationKey(e.to_string()))?;
        let signing_key = SigningKey::from_pkcs8_der(&der)
            .map_err(|e| PrivyError::InvalidAuthorizationKey(e.to_string()))?;

        Ok(Self(signing_key))
    }

    /// Base64 DER ECDSA signature over SHA-256 of `payload`.
    pub fn sign(&self, payload: &[u8]) -> String {
        let signature: Signature = self.0.sign(payload);
        STANDARD.encode(signature.to_der().as_bytes())
    }
}

impl fmt::Debug for AuthorizationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthorizationKey(<redacted>)")
    }
}

/// Canonical JSON of a request as it is signed: keys sorted, no whitespace.
///
/// Only `privy-` headers take part in the signature.
pub fn authorization_payload(
    method: &str,
    url: &str,
    body: &Value,
    headers: &[(&str, &str)],
) -> PrivyResult<Vec<u8>> {
    let headers = headers
        .iter()
        .map(|(name, value)| (name.to_string(), Value::from(*value)))
        .collect::<Map<_, _>>();

    let payload = json!({
        "version": PAYLOAD_VERSION,
        "method": method,
        "url": url,
        "body": canonicalize(body),
        "headers": headers,
    });

    Ok(serde_json::to_vec(&canonicalize(&payload))?)
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries = map.iter().collect::<Vec<_>>();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), canonicalize(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
