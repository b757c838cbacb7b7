use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use stacks_signer::{BroadcastRejection, BroadcastResponse, Broadcaster, SignedTransaction};

pub mod error;
#[cfg(feature = "reqwest")]
pub mod reqwest;

pub use error::{NodeClientError, NodeClientResult};

const TRANSACTIONS_PATH: &str = "/v2/transactions";
const ACCOUNTS_PATH: &str = "/v2/accounts";

pub const MAINNET_API_URL: &str = "https://api.mainnet.hiro.so";
pub const TESTNET_API_URL: &str = "https://api.testnet.hiro.so";

/// Stacks network a client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StacksNetwork {
    Mainnet,
    Testnet,
    /// Any other node, by base URL.
    Custom(String),
}

impl StacksNetwork {
    pub fn api_url(&self) -> &str {
        match self {
            StacksNetwork::Mainnet => MAINNET_API_URL,
            StacksNetwork::Testnet => TESTNET_API_URL,
            StacksNetwork::Custom(url) => url,
        }
    }
}

impl FromStr for StacksNetwork {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            url if url.starts_with("http://") || url.starts_with("https://") => {
                Ok(Self::Custom(url.trim_end_matches('/').to_string()))
            }
            other => Err(format!(
                "unknown network '{other}', expected mainnet, testnet or a node URL"
            )),
        }
    }
}

impl fmt::Display for StacksNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StacksNetwork::Mainnet => write!(f, "mainnet"),
            StacksNetwork::Testnet => write!(f, "testnet"),
            StacksNetwork::Custom(url) => write!(f, "{url}"),
        }
    }
}

/// A request to the node API, relative to the node base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRequest {
    Get { path: String },
    PostTransaction { path: String, body: Vec<u8> },
}

/// Raw node answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl NodeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Account state as reported by `/v2/accounts/{principal}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountInfo {
    /// Hex encoded micro-STX balance.
    pub balance: String,
    #[serde(default)]
    pub locked: String,
    pub nonce: u64,
}

/// A client for interacting with a Stacks node over its HTTP API.
#[derive(Clone)]
pub struct StacksNodeClient<C: Client> {
    client: C,
}

impl<C: Client> StacksNodeClient<C> {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `client` - The transport.
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Submits a serialized transaction.
    ///
    /// A node rejection is returned as [`BroadcastResponse::Rejected`], not as
    /// an error.
    pub async fn broadcast_transaction(
        &self,
        transaction: &SignedTransaction,
    ) -> anyhow::Result<BroadcastResponse> {
        log::debug!(
            "broadcasting transaction of {} bytes",
            transaction.as_bytes().len()
        );

        let response = self
            .client
            .send_request(NodeRequest::PostTransaction {
                path: TRANSACTIONS_PATH.to_string(),
                body: transaction.as_bytes().to_vec(),
            })
            .await?;

        decode_broadcast_response(response).context("failed to decode broadcast response")
    }

    /// Returns balance and nonce of an account.
    pub async fn get_account(&self, principal: &str) -> anyhow::Result<AccountInfo> {
        let response = self
            .client
            .send_request(NodeRequest::Get {
                path: format!("{ACCOUNTS_PATH}/{principal}?proof=0"),
            })
            .await?;

        if !response.is_success() {
            return Err(NodeClientError::Http {
                code: response.status,
                text: response.text(),
            }
            .into());
        }

        serde_json::from_slice(&response.body)
            .map_err(NodeClientError::from)
            .context("failed to deserialize account")
    }

    /// Returns the next nonce of an account.
    pub async fn get_account_nonce(&self, principal: &str) -> anyhow::Result<u64> {
        Ok(self.get_account(principal).await?.nonce)
    }
}

#[async_trait]
impl<C: Client> Broadcaster for StacksNodeClient<C> {
    async fn broadcast(&self, transaction: &SignedTransaction) -> anyhow::Result<BroadcastResponse> {
        self.broadcast_transaction(transaction).await
    }
}

/// The node answers `200` with a JSON string txid, or `400` with a rejection
/// object.
fn decode_broadcast_response(response: NodeResponse) -> NodeClientResult<BroadcastResponse> {
    if response.is_success() {
        let text = response.text();
        let txid = text.trim().trim_matches('"');
        if txid.is_empty() {
            return Err(NodeClientError::EmptyTxid);
        }
        return Ok(BroadcastResponse::accepted(txid));
    }

    match serde_json::from_slice::<BroadcastRejection>(&response.body) {
        Ok(rejection) if response.status == 400 => Ok(BroadcastResponse::Rejected(rejection)),
        _ => Err(NodeClientError::Http {
            code: response.status,
            text: response.text(),
        }),
    }
}

/// Transport used by [`StacksNodeClient`].
pub trait Client: Clone + Send + Sync {
    /// Send a request to the node.
    fn send_request(
        &self,
        request: NodeRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<NodeResponse>> + Send>>;
}
