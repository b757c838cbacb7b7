use std::future::Future;
use std::pin::Pin;

use anyhow::Context;
pub use reqwest;
use reqwest::header::CONTENT_TYPE;

use crate::{Client, NodeRequest, NodeResponse, StacksNetwork};

/// Reqwest client implementation.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    endpoint_url: String,
}

impl ReqwestClient {
    /// Creates a new client.
    pub fn new(endpoint_url: String) -> Self {
        Self::new_with_client(endpoint_url, Default::default())
    }

    /// Creates a new client with a custom reqwest client.
    pub fn new_with_client(endpoint_url: String, client: reqwest::Client) -> Self {
        Self {
            endpoint_url: endpoint_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Creates a client for the public API of `network`.
    pub fn for_network(network: &StacksNetwork, client: reqwest::Client) -> Self {
        Self::new_with_client(network.api_url().to_string(), client)
    }
}

impl Client for ReqwestClient {
    fn send_request(
        &self,
        request: NodeRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<NodeResponse>> + Send>> {
        let client = self.client.clone();
        let endpoint_url = self.endpoint_url.clone();
        Box::pin(async move {
            log::trace!("ReqwestClient - sending request {request:?}");

            let builder = match request {
                NodeRequest::Get { path } => client.get(format!("{endpoint_url}{path}")),
                NodeRequest::PostTransaction { path, body } => client
                    .post(format!("{endpoint_url}{path}"))
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(body),
            };

            let response = builder
                .send()
                .await
                .context("failed to send node request")?;
            let status = response.status().as_u16();
            let body = response
                .bytes()
                .await
                .context("failed to read node response")?
                .to_vec();

            log::trace!("response: status {status}, {} bytes", body.len());

            Ok(NodeResponse { status, body })
        })
    }
}
