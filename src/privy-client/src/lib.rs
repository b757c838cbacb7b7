use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

pub mod authorization;
pub mod error;
pub mod wallet;

pub use authorization::{authorization_payload, AuthorizationKey};
pub use error::{PrivyError, PrivyResult};
pub use wallet::{RawSignature, RawSignatureData, Wallet};
use wallet::{RawSignParams, RawSignRequest, UpdateWalletRequest};

pub const DEFAULT_API_URL: &str = "https://api.privy.io";

const APP_ID_HEADER: &str = "privy-app-id";
const IDEMPOTENCY_KEY_HEADER: &str = "privy-idempotency-key";
const AUTHORIZATION_SIGNATURE_HEADER: &str = "privy-authorization-signature";

/// Credentials and endpoint of the wallet API.
#[derive(Clone)]
pub struct PrivyConfig {
    pub app_id: String,
    pub app_secret: String,
    pub api_url: String,
    /// Owner assigned to wallets that have none before they sign.
    pub owner_id: Option<String>,
    /// Key of the owner, signs every `raw_sign` request when set.
    pub authorization_key: Option<AuthorizationKey>,
    pub request_timeout: Option<Duration>,
}

impl PrivyConfig {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            api_url: DEFAULT_API_URL.to_string(),
            owner_id: None,
            authorization_key: None,
            request_timeout: None,
        }
    }

    fn basic_auth(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.app_id, self.app_secret));
        format!("Basic {token}")
    }
}

impl fmt::Debug for PrivyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivyConfig")
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("owner_id", &self.owner_id)
            .field("authorization_key", &self.authorization_key)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Client of the Privy server wallet API.
#[derive(Clone)]
pub struct PrivyClient {
    client: reqwest::Client,
    api_url: String,
    app_id: String,
    owner_id: Option<String>,
    authorization_key: Option<AuthorizationKey>,
}

impl PrivyClient {
    /// Fails with [`PrivyError::MissingAuthorizationKey`] when an owner id is
    /// configured without an authorization key.
    pub fn new(config: PrivyConfig) -> PrivyResult<Self> {
        if config.owner_id.is_some() && config.authorization_key.is_none() {
            return Err(PrivyError::MissingAuthorizationKey);
        }

        let mut builder = reqwest::Client::builder().default_headers(default_headers(&config)?);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            app_id: config.app_id,
            owner_id: config.owner_id,
            authorization_key: config.authorization_key,
        })
    }

    pub async fn get_wallet(&self, wallet_id: &str) -> PrivyResult<Wallet> {
        log::trace!("fetching wallet {wallet_id}");
        let request = self.client.get(self.wallet_url(wallet_id));
        Self::send(request, "fetching wallet").await
    }

    pub async fn wallet_has_owner(&self, wallet_id: &str) -> PrivyResult<bool> {
        Ok(self.get_wallet(wallet_id).await?.has_owner())
    }

    pub async fn set_wallet_owner(&self, wallet_id: &str, owner_id: &str) -> PrivyResult<Wallet> {
        log::info!("assigning owner {owner_id} to wallet {wallet_id}");
        let request = self
            .client
            .patch(self.wallet_url(wallet_id))
            .json(&UpdateWalletRequest { owner_id });
        Self::send(request, "setting wallet owner").await
    }

    /// Signs a 32 byte digest given as `0x`-prefixed hex.
    ///
    /// The returned signature carries `r || s` only.
    pub async fn raw_sign(&self, wallet_id: &str, hash: &str) -> PrivyResult<RawSignature> {
        if let Some(owner_id) = &self.owner_id {
            if !self.wallet_has_owner(wallet_id).await? {
                self.set_wallet_owner(wallet_id, owner_id).await?;
            }
        }

        let idempotency_key = uuid::Uuid::new_v4().to_string();
        log::debug!("raw_sign on wallet {wallet_id}, idempotency key {idempotency_key}");

        let url = format!("{}/raw_sign", self.wallet_url(wallet_id));
        let body = serde_json::to_value(RawSignRequest {
            params: RawSignParams { hash },
        })?;

        let mut request = self
            .client
            .post(&url)
            .header(IDEMPOTENCY_KEY_HEADER, &idempotency_key);

        if let Some(key) = &self.authorization_key {
            let payload = authorization_payload(
                "POST",
                &url,
                &body,
                &[
                    (APP_ID_HEADER, self.app_id.as_str()),
                    (IDEMPOTENCY_KEY_HEADER, idempotency_key.as_str()),
                ],
            )?;
            request = request.header(AUTHORIZATION_SIGNATURE_HEADER, key.sign(&payload));
        }

        let request = request.json(&body);

        Self::send(request, "signing hash").await
    }

    fn wallet_url(&self, wallet_id: &str) -> String {
        format!("{}/v1/wallets/{wallet_id}", self.api_url)
    }

    async fn send<T: DeserializeOwned>(
        request: RequestBuilder,
        action: &'static str,
    ) -> PrivyResult<T> {
        let response = request.send().await?;
        let body = Self::check_status(response, action).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn check_status(response: Response, action: &'static str) -> PrivyResult<Vec<u8>> {
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        if !status.is_success() {
            return Err(PrivyError::Api {
                action,
                code: status.as_u16(),
                text: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(body)
    }
}

fn default_headers(config: &PrivyConfig) -> PrivyResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(APP_ID_HEADER, HeaderValue::from_str(&config.app_id)?);
    let mut authorization = HeaderValue::from_str(&config.basic_auth())?;
    authorization.set_sensitive(true);
    headers.insert(AUTHORIZATION, authorization);

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_encode_basic_auth() {
        let config = PrivyConfig::new("app", "secret");
        assert_eq!(config.basic_auth(), "Basic YXBwOnNlY3JldA==");
    }

    #[test]
    fn should_redact_secret_in_debug() {
        let config = PrivyConfig::new("app", "super-secret");
        let debug = format!("{config:?}");

        assert!(debug.contains("app"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn should_require_authorization_key_for_owner() {
        let config = PrivyConfig {
            owner_id: Some("owner-1".to_string()),
            ..PrivyConfig::new("app", "secret")
        };

        assert!(matches!(
            PrivyClient::new(config),
            Err(PrivyError::MissingAuthorizationKey)
        ));
    }

    #[test]
    fn should_reject_invalid_app_id() {
        let config = PrivyConfig::new("app\n", "secret");
        assert!(matches!(
            PrivyClient::new(config),
            Err(PrivyError::InvalidHeader(_))
        ));
    }
}
