use serde::{Deserialize, Serialize};

use crate::config::SocConfig;

/// A contiguous chunk of the global address space owned by one SoC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Start address in the global space.
    pub start: u64,
    /// Size in bytes. Always greater than zero.
    pub length: u64,
    /// Name of the SoC whose local buffer backs this range.
    pub owner: String,
}

impl Region {
    pub fn new(start: u64, length: u64, owner: &str) -> Self {
        Self {
            start,
            length,
            owner: owner.to_string(),
        }
    }

    /// One past the last address of the region.
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end()
    }
}

/// Lays out each SoC's memory contribution as one contiguous block, starting
/// from address 0 upwards.
///
/// SoCs are sorted by name so that every node derives byte-identical regions
/// from the shared configuration, regardless of the order entries appear in
/// the file.
pub fn initial_layout(socs: &[SocConfig]) -> Vec<Region> {
    let mut socs: Vec<&SocConfig> = socs.iter().collect();
    socs.sort_by(|a, b| a.name.cmp(&b.name));

    let mut regions = Vec::with_capacity(socs.len());
    let mut current_addr = 0u64;
    for soc in socs {
        let length = soc.memory_bytes();
        regions.push(Region::new(current_addr, length, &soc.name));
        current_addr += length;
    }

    regions
}
