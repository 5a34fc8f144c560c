use std::cmp::min;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use super::store::LocalStore;
use crate::addrspace::{AddressTable, Region};
use crate::error::{MemoryError, Result};
use crate::rpc::client::PeerClient;

/// Fraction of local capacity writable before writes overflow onto a peer.
const SOFT_LIMIT_RATIO: f64 = 0.9;

/// Per-node façade over the fabric: translates global addresses, routes to
/// the local store or a peer, and rebalances ownership when the local budget
/// runs out.
pub struct MemoryManager {
    self_name: String,
    table: Arc<AddressTable>,
    local: LocalStore,
    /// Transport handles keyed by peer name. Mostly populated during
    /// startup, but late connect-retry workers may still be inserting while
    /// the data plane reads.
    peers: DashMap<String, Arc<PeerClient>>,
    /// Bytes written into the local store, counted against the soft limit.
    /// A high-water mark: freeing a region returns address space to the
    /// table, not accounting headroom.
    usage: Mutex<u64>,
    soft_limit: AtomicU64,
}

impl MemoryManager {
    /// Creates the manager for `name`, sized from that node's capacity in
    /// the shared table.
    pub fn new(name: &str, table: Arc<AddressTable>) -> Self {
        let capacity = table.capacity(name);
        let soft_limit = (capacity as f64 * SOFT_LIMIT_RATIO) as u64;
        Self {
            self_name: name.to_string(),
            table,
            local: LocalStore::new(capacity),
            peers: DashMap::new(),
            usage: Mutex::new(0),
            soft_limit: AtomicU64::new(soft_limit),
        }
    }

    pub fn name(&self) -> &str {
        &self.self_name
    }

    /// The table this manager routes through.
    pub fn table(&self) -> &Arc<AddressTable> {
        &self.table
    }

    pub fn capacity(&self) -> u64 {
        self.local.capacity()
    }

    pub fn usage(&self) -> u64 {
        *self.usage.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn soft_limit(&self) -> u64 {
        self.soft_limit.load(Ordering::Relaxed)
    }

    pub fn set_soft_limit(&self, limit: u64) {
        self.soft_limit.store(limit, Ordering::Relaxed);
    }

    pub fn register_peer(&self, client: PeerClient) {
        self.peers
            .insert(client.peer_name().to_string(), Arc::new(client));
    }

    fn peer(&self, name: &str) -> Result<Arc<PeerClient>> {
        self.peers
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| MemoryError::UnknownPeer(name.to_string()))
    }

    /// Reads `size` bytes starting at the global address `addr`.
    ///
    /// The range may span several regions (a write that overflowed leaves
    /// its suffix on another node), so the read walks the containing regions
    /// and stitches local and remote chunks together. For a range inside a
    /// single locally-owned region this is one bounds-checked buffer read.
    pub async fn read(&self, addr: u64, size: u64) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(size as usize);
        let mut cur = addr;
        let end = addr.checked_add(size).ok_or(MemoryError::Unmapped(addr))?;

        while cur < end {
            let region = self.table.region_containing(cur)?;
            let chunk = min(end - cur, region.end() - cur);
            if region.owner == self.self_name {
                out.extend(self.local.read(cur - region.start, chunk)?);
            } else {
                tracing::debug!("reading [{:#x}, +{}) from {}", cur, chunk, region.owner);
                out.extend(self.peer(&region.owner)?.read_memory(cur, chunk).await?);
            }
            cur += chunk;
        }

        Ok(out)
    }

    /// Writes `data` at the global address `addr`.
    ///
    /// A range owned by a peer is forwarded whole. A local range is copied
    /// into the store unless it would push usage past the soft limit; the
    /// portion up to the limit lands locally and the remainder is re-owned
    /// to a node with free space and written there.
    ///
    /// The overflow path is not atomic: the ownership transfer commits
    /// before the remote write, so a transport failure leaves the range
    /// partially applied and the caller must treat it as indeterminate.
    pub async fn write(&self, addr: u64, data: &[u8]) -> Result<()> {
        let (owner, offset) = self.table.translate(addr)?;
        if owner != self.self_name {
            tracing::debug!("forwarding write [{:#x}, +{}) to {}", addr, data.len(), owner);
            return self.peer(&owner)?.write_memory(addr, data).await;
        }

        let len = data.len() as u64;
        let allowed = {
            let mut usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());

            if offset
                .checked_add(len)
                .is_none_or(|end| end > self.local.capacity())
            {
                return Err(MemoryError::OutOfBounds {
                    offset,
                    len,
                    capacity: self.local.capacity(),
                });
            }

            let limit = self.soft_limit.load(Ordering::Relaxed);
            if *usage + len <= limit {
                self.local.write(offset, data)?;
                *usage += len;
                return Ok(());
            }

            let allowed = min(len, limit.saturating_sub(*usage));
            self.local.write(offset, &data[..allowed as usize])?;
            *usage += allowed;
            allowed
        };

        // Overflow: the suffix moves to whichever node still has room.
        let overflow_addr = addr + allowed;
        let overflow_data = &data[allowed as usize..];
        let overflow_len = overflow_data.len() as u64;

        let target = self.table.find_owner_with_free(overflow_len)?;
        tracing::info!(
            "write at {:#x} exceeds soft limit of {}; moving {} bytes to {}",
            addr,
            self.soft_limit(),
            overflow_len,
            target
        );

        self.update_ownership(overflow_addr, overflow_len, &target)
            .await?;
        self.peer(&target)?
            .write_memory(overflow_addr, overflow_data)
            .await
    }

    /// Reserves `size` bytes out of `owner`'s free space.
    pub fn allocate_region(&self, size: u64, owner: &str) -> Result<Region> {
        self.table.allocate(size, owner)
    }

    pub fn free_region(&self, start: u64) -> Result<()> {
        self.table.free(start)
    }

    /// Re-owns `[start, start + size)` to `new_owner` in the local table and
    /// pushes the change to every registered peer so their translations
    /// resolve the new owner too.
    ///
    /// Peer updates are best effort: a node that misses one forwards on its
    /// stale view and the receiving node routes the access again.
    pub async fn update_ownership(&self, start: u64, size: u64, new_owner: &str) -> Result<()> {
        self.table.transfer_ownership(start, size, new_owner)?;

        let peers: Vec<(String, Arc<PeerClient>)> = self
            .peers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        for (name, peer) in peers {
            if let Err(e) = peer.transfer_ownership(start, size, new_owner).await {
                tracing::warn!("ownership sync to {} failed: {}", name, e);
            }
        }

        Ok(())
    }

    /// Applies an ownership change announced by a peer to the local table.
    /// No re-broadcast: the announcing node already reaches everyone.
    pub fn apply_transfer(&self, start: u64, size: u64, new_owner: &str) -> Result<()> {
        self.table.transfer_ownership(start, size, new_owner)
    }
}
