use std::sync::RwLock;

use crate::error::{MemoryError, Result};

/// The byte buffer backing this node's share of the global space.
///
/// Addressed by the offsets the `AddressTable` translation yields, never by
/// global addresses. A private reader/writer lock serialises access.
pub struct LocalStore {
    buf: RwLock<Vec<u8>>,
    capacity: u64,
}

impl LocalStore {
    pub fn new(capacity: u64) -> Self {
        Self {
            buf: RwLock::new(vec![0u8; capacity as usize]),
            capacity,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    fn check_bounds(&self, offset: u64, len: u64) -> Result<u64> {
        offset
            .checked_add(len)
            .filter(|&end| end <= self.capacity)
            .ok_or(MemoryError::OutOfBounds {
                offset,
                len,
                capacity: self.capacity,
            })
    }

    pub fn read(&self, offset: u64, size: u64) -> Result<Vec<u8>> {
        let end = self.check_bounds(offset, size)?;
        let buf = self.buf.read().unwrap_or_else(|e| e.into_inner());
        Ok(buf[offset as usize..end as usize].to_vec())
    }

    pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = self.check_bounds(offset, data.len() as u64)?;
        let mut buf = self.buf.write().unwrap_or_else(|e| e.into_inner());
        buf[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }
}
