//! `eth_call` over a JSON-RPC batch request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ChainError;
use crate::reader::{CallOutcome, ChainReader, ContractCall};

#[derive(Serialize)]
struct CallObject {
    to: String,
    data: String,
}

#[derive(Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: usize,
    method: &'static str,
    params: (CallObject, &'static str),
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RpcResponse {
    id: Option<usize>,
    result: Option<String>,
    error: Option<RpcErrorBody>,
}

impl RpcResponse {
    fn into_outcome(self) -> CallOutcome {
        if let Some(err) = self.error {
            return CallOutcome::Failed(format!("rpc error {}: {}", err.code, err.message));
        }
        match self.result {
            Some(hex_data) => hex::decode(hex_data.trim_start_matches("0x"))
                .map_err(|e| format!("invalid hex in result: {e}"))
                .into(),
            None => CallOutcome::Failed("response carried neither result nor error".into()),
        }
    }
}

/// Reads contract state from an Ethereum JSON-RPC endpoint.
#[derive(Clone)]
pub struct JsonRpcReader {
    client: Client,
    url: String,
}

impl JsonRpcReader {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChainReader for JsonRpcReader {
    async fn read_batch(&self, calls: &[ContractCall]) -> Result<Vec<CallOutcome>, ChainError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        let batch: Vec<RpcRequest> = calls
            .iter()
            .enumerate()
            .map(|(id, call)| RpcRequest {
                jsonrpc: "2.0",
                id,
                method: "eth_call",
                params: (
                    CallObject {
                        to: call.to.to_string(),
                        data: format!("0x{}", hex::encode(&call.data)),
                    },
                    "latest",
                ),
            })
            .collect();

        let response = self.client.post(&self.url).json(&batch).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ChainError::Status { status: status.as_u16(), body });
        }

        let responses: Vec<RpcResponse> = match serde_json::from_str(&body) {
            Ok(responses) => responses,
            // Endpoints that reject the whole batch answer with one error object.
            Err(_) => match serde_json::from_str::<RpcResponse>(&body) {
                Ok(RpcResponse { error: Some(err), .. }) => {
                    return Err(ChainError::Malformed(format!("batch rejected: {}", err.message)));
                }
                _ => return Err(ChainError::Malformed(truncate(&body))),
            },
        };

        let mut outcomes = vec![CallOutcome::Failed("missing from batch response".into()); calls.len()];
        for response in responses {
            let id = response.id;
            match id {
                Some(id) if id < outcomes.len() => outcomes[id] = response.into_outcome(),
                other => debug!(id = ?other, "ignoring rpc response with unknown id"),
            }
        }
        Ok(outcomes)
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}
