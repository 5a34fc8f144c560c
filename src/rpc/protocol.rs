//! Fabric Wire Protocol
//!
//! Endpoint paths and Data Transfer Objects for internode communication.
//! All DTOs are bincode-encoded on the wire; payload byte ranges travel
//! inline, there is no streaming.

use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Read a byte range of the global space from the node that owns it.
pub const ENDPOINT_READ_MEMORY: &str = "/memory/read";
/// Write a byte range of the global space on the node that owns it.
pub const ENDPOINT_WRITE_MEMORY: &str = "/memory/write";
/// Submit a task for execution on this node.
pub const ENDPOINT_RUN_TASK: &str = "/task/run";
/// Internal endpoint: a peer pushes an ownership change into this node's
/// address table.
pub const ENDPOINT_TRANSFER_OWNERSHIP: &str = "/internal/transfer_ownership";
/// Liveness and capacity probe; also the connect-retry target.
pub const ENDPOINT_HEALTH: &str = "/health";

// --- Data Transfer Objects ---

/// Read `size` bytes starting at the 64-bit global `address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadMemoryRequest {
    pub address: u64,
    pub size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadMemoryResponse {
    pub data: Vec<u8>,
}

/// Write `data` starting at the 64-bit global `address`. The write is
/// acknowledged by the HTTP status alone.
#[derive(Debug, Serialize, Deserialize)]
pub struct WriteMemoryRequest {
    pub address: u64,
    pub data: Vec<u8>,
}

/// Announcement that `[start, start + size)` now belongs to `new_owner`.
///
/// Sent by the node that performed the transfer to every peer, so their
/// translations resolve the new owner before the follow-up write arrives.
/// The receiver applies it to its own table only and never re-broadcasts.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransferOwnershipRequest {
    pub start: u64,
    pub size: u64,
    pub new_owner: String,
}

/// A task handed to the persistent interpreter on the receiving node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTaskRequest {
    /// Unique task id.
    pub id: String,
    /// "python", "go" or "bin".
    pub code_type: String,
    /// Source code or binary path.
    pub code: String,
    pub args: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunTaskResponse {
    pub result: String,
    pub error: Option<String>,
}

/// Snapshot served by the health endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub name: String,
    /// Bytes this node contributes to the global space.
    pub capacity: u64,
    /// Bytes written into the local store so far.
    pub usage: u64,
    pub soft_limit: u64,
    pub mem_used_mb: u64,
    pub mem_total_mb: u64,
}
