//! Startup Peer Connect
//!
//! One retry worker per outbound peer. A worker probes the peer's health
//! endpoint and registers a client with the local `MemoryManager` the
//! moment it answers; until then the peer is simply absent from the
//! registry and operations that need it fail with `UnknownPeer`.

use std::sync::Arc;
use std::time::Duration;

use super::client::PeerClient;
use crate::config::SocConfig;
use crate::memory::MemoryManager;

/// The cluster usually comes up within seconds, but nodes may boot minutes
/// apart; retry for a while before giving up on a peer.
const CONNECT_ATTEMPTS: u32 = 20;
const CONNECT_BACKOFF_START: Duration = Duration::from_secs(1);
const CONNECT_BACKOFF_CAP: Duration = Duration::from_secs(10);

/// Connects outward to every other SoC in the cluster, in parallel.
/// Failures are logged and never abort the node.
pub fn spawn_peer_connectors(manager: Arc<MemoryManager>, socs: &[SocConfig]) {
    for soc in socs {
        if soc.name == manager.name() {
            continue;
        }
        let manager = manager.clone();
        let soc = soc.clone();

        tokio::spawn(async move {
            let client = PeerClient::new(&soc.name, &soc.address);
            let mut delay = CONNECT_BACKOFF_START;

            for attempt in 1..=CONNECT_ATTEMPTS {
                match client.health().await {
                    Ok(_) => {
                        tracing::info!("Connected to {} at {}", soc.name, soc.address);
                        manager.register_peer(client);
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Retry {}: cannot reach {} at {}: {}",
                            attempt,
                            soc.name,
                            soc.address,
                            e
                        );
                    }
                }

                let jitter = Duration::from_millis(rand::random::<u64>() % 100);
                tokio::time::sleep(delay + jitter).await;
                if delay < CONNECT_BACKOFF_CAP {
                    delay = (delay * 2).min(CONNECT_BACKOFF_CAP);
                }
            }

            tracing::error!(
                "Failed to connect to {} at {} after {} attempts",
                soc.name,
                soc.address,
                CONNECT_ATTEMPTS
            );
        });
    }
}
