use std::cmp::min;
use std::sync::Arc;

use super::manager::MemoryManager;
use crate::addrspace::Region;
use crate::error::{MemoryError, Result};

/// Zeroing runs through the manager in chunks of this size.
const ZERO_CHUNK: u64 = 1024 * 1024;

/// A handle over one allocated contiguous range, addressed by offsets
/// relative to its start.
///
/// The block is zero-filled on creation. Dropping the handle does not free
/// the allocation; call [`VirtualBlock::free`] explicitly.
pub struct VirtualBlock {
    region: Region,
    manager: Arc<MemoryManager>,
}

impl VirtualBlock {
    /// Allocates `size` bytes out of `owner`'s space and zero-fills them.
    /// If any fill write fails the allocation is released before the error
    /// surfaces.
    pub async fn new(size: u64, manager: Arc<MemoryManager>, owner: &str) -> Result<Self> {
        let region = manager.allocate_region(size, owner)?;

        let chunk = vec![0u8; min(size, ZERO_CHUNK) as usize];
        let mut written = 0u64;
        while written < size {
            let n = min(size - written, ZERO_CHUNK);
            if let Err(e) = manager.write(region.start + written, &chunk[..n as usize]).await {
                if let Err(free_err) = manager.free_region(region.start) {
                    tracing::warn!(
                        "could not release block at {:#x} after failed init: {}",
                        region.start,
                        free_err
                    );
                }
                return Err(e);
            }
            written += n;
        }

        Ok(Self { region, manager })
    }

    pub fn start(&self) -> u64 {
        self.region.start
    }

    pub fn len(&self) -> u64 {
        self.region.length
    }

    pub fn is_empty(&self) -> bool {
        self.region.length == 0
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    fn check_bounds(&self, offset: u64, len: u64) -> Result<()> {
        if offset
            .checked_add(len)
            .is_none_or(|end| end > self.region.length)
        {
            return Err(MemoryError::OutOfBounds {
                offset,
                len,
                capacity: self.region.length,
            });
        }
        Ok(())
    }

    pub async fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
        self.check_bounds(offset, length)?;
        self.manager.read(self.region.start + offset, length).await
    }

    pub async fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.check_bounds(offset, data.len() as u64)?;
        self.manager.write(self.region.start + offset, data).await
    }

    /// Releases the underlying allocation.
    pub fn free(&self) -> Result<()> {
        self.manager.free_region(self.region.start)
    }
}
