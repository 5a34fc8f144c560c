//! Shared-Memory SoC Cluster Library
//!
//! This library crate defines the core modules that federate the RAM of a
//! mixed big/little SoC cluster into a single flat global address space.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of four loosely coupled subsystems:
//!
//! - **`addrspace`**: The ownership book of the global space. Tracks free
//!   and allocated regions, hands out first-fit allocations, coalesces
//!   freed neighbours and re-owns ranges when a node's budget overflows.
//! - **`memory`**: The per-node data plane. Translates global addresses,
//!   serves locally owned ranges out of the node's byte buffer, forwards
//!   the rest over RPC, and splits writes that cross the soft capacity
//!   limit.
//! - **`rpc`**: Symmetric internode communication: bincode-encoded DTOs
//!   over HTTP, a client per peer, bounded connect-retry at startup.
//! - **`config`**: The shared JSON cluster description every node loads at
//!   boot and from which each derives the identical address-space layout.

pub mod addrspace;
pub mod config;
pub mod error;
pub mod memory;
pub mod rpc;
