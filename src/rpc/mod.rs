//! Memory Fabric RPC Module
//!
//! Symmetric per-node RPC: every node serves the same handlers and holds a
//! client per peer.
//!
//! ## Core Mechanisms
//! - **Wire format**: requests and responses are bincode-encoded DTOs
//!   carried as HTTP POST bodies; HTTP supplies the length framing, one
//!   endpoint per request type supplies the dispatch.
//! - **Peer registry**: clients are registered with the local
//!   `MemoryManager` as soon as the peer's health endpoint answers.
//! - **Startup connect**: one retry worker per peer, bounded attempts with
//!   exponential backoff. A peer that never answers is logged and skipped;
//!   the node keeps serving.

pub mod client;
pub mod connect;
pub mod handlers;
pub mod protocol;
