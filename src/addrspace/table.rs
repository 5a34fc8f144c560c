//! The authoritative map from global addresses to owning SoCs.
//!
//! One reader/writer lock guards the whole table. Mutators take the write
//! lock; lookups take the read lock. Critical sections are O(#regions) and
//! the region count stays small (one per live allocation plus one per node),
//! so contention is not a concern here.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::region::Region;
use crate::error::{MemoryError, Result};

struct TableState {
    /// Allocated regions keyed by start address. Start addresses are unique.
    allocated: HashMap<u64, Region>,
    /// Free regions, kept canonical: sorted by start, adjacent same-owner
    /// runs merged.
    free: Vec<Region>,
}

/// Tracks the free and allocated halves of the global address space and the
/// fixed per-SoC capacities behind them.
///
/// Together `allocated` and `free` tile `[0, total_capacity())` with no gaps
/// and no overlaps; every mutation preserves that.
pub struct AddressTable {
    state: RwLock<TableState>,
    capacity: HashMap<String, u64>,
    total: u64,
}

impl AddressTable {
    /// Builds a table from the initial layout: one region per SoC, which all
    /// start out free. Rejects layouts in which any two regions overlap.
    pub fn new(mut regions: Vec<Region>) -> Result<Self> {
        regions.sort_by_key(|r| r.start);
        for pair in regions.windows(2) {
            if pair[0].end() > pair[1].start {
                return Err(MemoryError::LayoutOverlap);
            }
        }

        let mut capacity: HashMap<String, u64> = HashMap::new();
        for region in &regions {
            *capacity.entry(region.owner.clone()).or_default() += region.length;
        }
        let total = regions.iter().map(|r| r.length).sum();

        Ok(Self {
            state: RwLock::new(TableState {
                allocated: HashMap::new(),
                free: regions,
            }),
            capacity,
            total,
        })
    }

    fn read_state(&self) -> RwLockReadGuard<'_, TableState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, TableState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Fixed number of bytes `owner` contributes to the global space.
    pub fn capacity(&self, owner: &str) -> u64 {
        self.capacity.get(owner).copied().unwrap_or(0)
    }

    pub fn total_capacity(&self) -> u64 {
        self.total
    }

    /// Owner and local-buffer offset for a global address.
    ///
    /// Allocated regions are consulted before free ones, because reads and
    /// writes target live allocations; both classes are valid for
    /// translation.
    pub fn translate(&self, addr: u64) -> Result<(String, u64)> {
        let region = self.region_containing(addr)?;
        let offset = addr - region.start;
        Ok((region.owner, offset))
    }

    /// The region containing `addr`, allocated regions first. Returns a copy:
    /// the underlying entry may be split or merged by any later mutation.
    pub fn region_containing(&self, addr: u64) -> Result<Region> {
        let state = self.read_state();
        region_at(&state, addr)
            .cloned()
            .ok_or(MemoryError::Unmapped(addr))
    }

    /// First-fit allocation out of `owner`'s free space.
    ///
    /// Scans the canonical free list, so the lowest start address wins and
    /// the same call sequence always yields the same regions.
    pub fn allocate(&self, size: u64, owner: &str) -> Result<Region> {
        if size == 0 {
            return Err(MemoryError::NoCapacity(0));
        }

        let mut state = self.write_state();
        let idx = state
            .free
            .iter()
            .position(|r| r.owner == owner && r.length >= size)
            .ok_or(MemoryError::NoCapacity(size))?;

        let region = Region::new(state.free[idx].start, size, owner);
        if state.free[idx].length == size {
            state.free.remove(idx);
        } else {
            state.free[idx].start += size;
            state.free[idx].length -= size;
        }
        state.allocated.insert(region.start, region.clone());

        tracing::debug!(
            "allocated [{:#x}, +{}) for {}",
            region.start,
            region.length,
            owner
        );
        Ok(region)
    }

    /// Returns the allocation beginning at `start` to the free list under its
    /// current owner and coalesces neighbours.
    pub fn free(&self, start: u64) -> Result<()> {
        let mut state = self.write_state();
        let region = state
            .allocated
            .remove(&start)
            .ok_or(MemoryError::NotAllocated(start))?;
        state.free.push(region);
        merge_free(&mut state);
        Ok(())
    }

    /// Re-owns the range `[start, start + size)` to `new_owner`.
    ///
    /// The range may span one or more allocated or free regions; boundary
    /// regions are split and the fragments outside the range keep their
    /// previous classification and owner. The transferred range itself enters
    /// the free list under `new_owner`. There is no direct
    /// allocated-to-allocated transfer.
    ///
    /// Fails with `Unmapped` when `start` lies in no region, and with
    /// `RangeTooSmall` when the contiguous mapped span from `start` is
    /// shorter than `size`.
    pub fn transfer_ownership(&self, start: u64, size: u64, new_owner: &str) -> Result<()> {
        if size == 0 {
            return Ok(());
        }
        let end = start.checked_add(size).ok_or(MemoryError::Unmapped(start))?;
        let mut state = self.write_state();

        // The whole range must be covered by a contiguous run of regions.
        let mut cur = start;
        while cur < end {
            match region_at(&state, cur) {
                Some(region) => cur = region.end().min(end),
                None if cur == start => return Err(MemoryError::Unmapped(start)),
                None => {
                    return Err(MemoryError::RangeTooSmall {
                        start,
                        requested: size,
                        available: cur - start,
                    });
                }
            }
        }

        // Carve the range out of every overlapping allocation, keeping the
        // fragments on either side allocated under their original owner.
        let overlapping: Vec<u64> = state
            .allocated
            .values()
            .filter(|r| r.start < end && r.end() > start)
            .map(|r| r.start)
            .collect();
        for key in overlapping {
            if let Some(region) = state.allocated.remove(&key) {
                if region.start < start {
                    let left = Region::new(region.start, start - region.start, &region.owner);
                    state.allocated.insert(left.start, left);
                }
                if region.end() > end {
                    let right = Region::new(end, region.end() - end, &region.owner);
                    state.allocated.insert(right.start, right);
                }
            }
        }

        // Same carve-out for overlapping free regions.
        let mut kept = Vec::with_capacity(state.free.len() + 2);
        for region in state.free.drain(..) {
            if region.start >= end || region.end() <= start {
                kept.push(region);
                continue;
            }
            if region.start < start {
                kept.push(Region::new(
                    region.start,
                    start - region.start,
                    &region.owner,
                ));
            }
            if region.end() > end {
                kept.push(Region::new(end, region.end() - end, &region.owner));
            }
        }
        state.free = kept;

        state.free.push(Region::new(start, size, new_owner));
        merge_free(&mut state);

        tracing::debug!("re-owned [{:#x}, +{}) to {}", start, size, new_owner);
        Ok(())
    }

    /// Owner of the first free region of at least `size` bytes, in canonical
    /// free-list order.
    pub fn find_owner_with_free(&self, size: u64) -> Result<String> {
        let state = self.read_state();
        state
            .free
            .iter()
            .find(|r| r.length >= size)
            .map(|r| r.owner.clone())
            .ok_or(MemoryError::NoCapacity(size))
    }

    /// Snapshot of the free list, in canonical order.
    pub fn free_regions(&self) -> Vec<Region> {
        self.read_state().free.clone()
    }

    /// Snapshot of the allocated regions, sorted by start address.
    pub fn allocated_regions(&self) -> Vec<Region> {
        let state = self.read_state();
        let mut regions: Vec<Region> = state.allocated.values().cloned().collect();
        regions.sort_by_key(|r| r.start);
        regions
    }
}

fn region_at<'a>(state: &'a TableState, addr: u64) -> Option<&'a Region> {
    state
        .allocated
        .values()
        .find(|r| r.contains(addr))
        .or_else(|| state.free.iter().find(|r| r.contains(addr)))
}

/// Restores the free list to canonical form: sorted by start, adjacent
/// regions with the same owner merged.
fn merge_free(state: &mut TableState) {
    state.free.sort_by_key(|r| r.start);

    let mut merged: Vec<Region> = Vec::with_capacity(state.free.len());
    for region in state.free.drain(..) {
        match merged.last_mut() {
            Some(prev) if prev.owner == region.owner && prev.end() == region.start => {
                prev.length += region.length;
            }
            _ => merged.push(region),
        }
    }
    state.free = merged;
}
