//! Peer Clients
//!
//! One `PeerClient` per remote SoC, wrapping a reqwest client that posts
//! bincode-encoded DTOs to the peer's handlers.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::protocol::*;
use crate::error::{MemoryError, Result};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// RPC client for one remote SoC.
///
/// Stateless between requests: every call is a fresh POST whose payload is
/// fully self-describing. A dead connection surfaces as a `Transport` error
/// to the caller; there is no retry at this layer.
pub struct PeerClient {
    name: String,
    base_url: String,
    http: reqwest::Client,
}

impl PeerClient {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            base_url: format!("http://{}", address),
            http: reqwest::Client::new(),
        }
    }

    pub fn peer_name(&self) -> &str {
        &self.name
    }

    async fn post(&self, endpoint: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .http
            .post(&url)
            .body(body)
            .send()
            .await
            .map_err(|e| MemoryError::Transport(e.to_string()))?;

        let status = response.status();
        let payload = response
            .bytes()
            .await
            .map_err(|e| MemoryError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = String::from_utf8_lossy(&payload);
            return Err(MemoryError::Transport(format!(
                "{} from {}: {}",
                status, self.name, message
            )));
        }

        Ok(payload.to_vec())
    }

    pub async fn read_memory(&self, address: u64, size: u64) -> Result<Vec<u8>> {
        let body = encode(&ReadMemoryRequest { address, size })?;
        let payload = self.post(ENDPOINT_READ_MEMORY, body).await?;
        let response: ReadMemoryResponse = decode(&payload)?;
        Ok(response.data)
    }

    pub async fn write_memory(&self, address: u64, data: &[u8]) -> Result<()> {
        let body = encode(&WriteMemoryRequest {
            address,
            data: data.to_vec(),
        })?;
        self.post(ENDPOINT_WRITE_MEMORY, body).await?;
        Ok(())
    }

    pub async fn transfer_ownership(&self, start: u64, size: u64, new_owner: &str) -> Result<()> {
        let body = encode(&TransferOwnershipRequest {
            start,
            size,
            new_owner: new_owner.to_string(),
        })?;
        self.post(ENDPOINT_TRANSFER_OWNERSHIP, body).await?;
        Ok(())
    }

    pub async fn run_task(&self, request: &RunTaskRequest) -> Result<RunTaskResponse> {
        let body = encode(request)?;
        let payload = self.post(ENDPOINT_RUN_TASK, body).await?;
        decode(&payload)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let url = format!("{}{}", self.base_url, ENDPOINT_HEALTH);
        let response = self
            .http
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| MemoryError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MemoryError::Transport(format!(
                "{} from {}",
                response.status(),
                self.name
            )));
        }

        response
            .json::<HealthResponse>()
            .await
            .map_err(|e| MemoryError::Transport(e.to_string()))
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| MemoryError::Transport(e.to_string()))
}

fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    bincode::deserialize(payload).map_err(|e| MemoryError::Transport(e.to_string()))
}
