use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use privy_client::{AuthorizationKey, PrivyClient, PrivyConfig, DEFAULT_API_URL};
use serde_json::json;
use stacks_node_client::reqwest::ReqwestClient;
use stacks_node_client::{StacksNetwork, StacksNodeClient};
use stacks_signer::http::{HttpReply, STATUS_OK};
use stacks_signer::{
    generate_candidates, LogObserver, RecoveryResolver, ResolutionOutcome, MARKER_PRIORITY,
};

use crate::relay::Relay;

const DEFAULT_LABEL: &str = "STX-TRANSFER";

/// Signs Stacks transactions with a Privy server wallet and broadcasts them
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct RelayCli {
    /// Log level (default: info, options: trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Stacks network: mainnet, testnet or a node URL
    #[arg(long, env = "STACKS_NETWORK", default_value = "testnet", global = true)]
    pub network: StacksNetwork,

    /// Time in seconds to wait for a response from the node or the signer
    #[arg(long, default_value_t = 60, global = true)]
    pub request_timeout_secs: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign an unsigned transaction with a Privy wallet and broadcast it
    SignAndBroadcast(SignAndBroadcastArgs),

    /// Broadcast an unsigned transaction with an existing raw signature
    BroadcastSignature(BroadcastSignatureArgs),

    /// Print the four signature candidates of a raw signature
    Candidates(CandidatesArgs),

    /// Print the next nonce of an account
    Nonce(NonceArgs),
}

#[derive(Args)]
pub struct PrivyArgs {
    /// Privy application id
    #[arg(long, env = "PRIVY_APP_ID")]
    pub app_id: String,

    /// Privy application secret
    #[arg(long, env = "PRIVY_APP_SECRET", hide_env_values = true)]
    pub app_secret: String,

    /// Owner assigned to wallets without one before signing
    #[arg(long, env = "PRIVY_WALLET_OWNER_ID")]
    pub owner_id: Option<String>,

    /// Base64 PKCS#8 P-256 key of the wallet owner, required with an owner id
    #[arg(long, env = "PRIVY_AUTHORIZATION_KEY", hide_env_values = true)]
    pub authorization_key: Option<String>,

    #[arg(long, env = "PRIVY_API_URL", default_value = DEFAULT_API_URL)]
    pub privy_api_url: String,
}

#[derive(Args)]
pub struct SignAndBroadcastArgs {
    #[command(flatten)]
    pub privy: PrivyArgs,

    /// Privy wallet id
    #[arg(long)]
    pub wallet_id: String,

    /// Hex encoded unsigned single-sig transaction
    #[arg(long)]
    pub unsigned_tx: String,

    /// Label used in logs
    #[arg(long, default_value = DEFAULT_LABEL)]
    pub label: String,

    /// Recover the marker offline from the wallet public key and try it first
    #[arg(long)]
    pub prefer_recovered_marker: bool,
}

#[derive(Args)]
pub struct BroadcastSignatureArgs {
    /// Raw `r || s` hex signature
    #[arg(long)]
    pub signature: String,

    /// Hex encoded unsigned single-sig transaction
    #[arg(long)]
    pub unsigned_tx: String,

    /// Label used in logs
    #[arg(long, default_value = DEFAULT_LABEL)]
    pub label: String,
}

#[derive(Args)]
pub struct CandidatesArgs {
    /// Raw `r || s` hex signature
    pub signature: String,
}

#[derive(Args)]
pub struct NonceArgs {
    /// Stacks principal
    pub principal: String,
}

impl RelayCli {
    pub async fn exec(&self) -> Result<()> {
        match &self.command {
            Commands::SignAndBroadcast(args) => {
                let privy = args.privy.client(self.request_timeout())?;
                let node = self.node_client()?;
                let relay = Relay {
                    broadcaster: &node,
                    resolver: RecoveryResolver::new(LogObserver),
                };
                let outcome = relay
                    .sign_and_broadcast(
                        &privy,
                        &args.wallet_id,
                        &args.unsigned_tx,
                        &args.label,
                        args.prefer_recovered_marker,
                    )
                    .await?;

                print_reply(&outcome)
            }
            Commands::BroadcastSignature(args) => {
                let node = self.node_client()?;
                let relay = Relay {
                    broadcaster: &node,
                    resolver: RecoveryResolver::new(LogObserver),
                };
                let outcome = relay
                    .broadcast_signature(&args.signature, &args.unsigned_tx, &args.label)
                    .await?;

                print_reply(&outcome)
            }
            Commands::Candidates(args) => {
                let candidates = generate_candidates(&args.signature)?;
                if !candidates.is_well_formed() {
                    log::warn!(
                        "signature has {} hex characters, r and s were zero-padded",
                        candidates.raw_hex_len()
                    );
                }

                let candidates = candidates
                    .in_priority(&MARKER_PRIORITY)
                    .map(|candidate| {
                        json!({
                            "marker": candidate.marker().to_hex(),
                            "r": candidate.r_hex(),
                            "s": candidate.s_hex(),
                            "fullSignature": candidate.full_signature_hex(),
                        })
                    })
                    .collect::<Vec<_>>();
                println!("{}", serde_json::to_string_pretty(&candidates)?);

                Ok(())
            }
            Commands::Nonce(args) => {
                let nonce = self.node_client()?.get_account_nonce(&args.principal).await?;
                println!("{nonce}");

                Ok(())
            }
        }
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn node_client(&self) -> Result<StacksNodeClient<ReqwestClient>> {
        let client = reqwest::Client::builder()
            .timeout(self.request_timeout())
            .build()
            .context("failed to build HTTP client")?;

        Ok(StacksNodeClient::new(ReqwestClient::for_network(
            &self.network,
            client,
        )))
    }
}

impl PrivyArgs {
    fn client(&self, request_timeout: Duration) -> Result<PrivyClient> {
        let authorization_key = self
            .authorization_key
            .as_deref()
            .map(AuthorizationKey::from_base64)
            .transpose()
            .context("invalid Privy authorization key")?;

        let config = PrivyConfig {
            api_url: self.privy_api_url.clone(),
            owner_id: self.owner_id.clone(),
            authorization_key,
            request_timeout: Some(request_timeout),
            ..PrivyConfig::new(&self.app_id, &self.app_secret)
        };

        PrivyClient::new(config).context("failed to build Privy client")
    }
}

/// Prints the reply body and fails when the transaction was not accepted.
fn print_reply(outcome: &ResolutionOutcome) -> Result<()> {
    let reply = HttpReply::from_outcome(outcome);
    println!("{}", serde_json::to_string_pretty(&reply.body)?);

    if reply.status != STATUS_OK {
        anyhow::bail!("transaction was not accepted (status {})", reply.status);
    }

    Ok(())
}
