use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::manager::MemoryManager;
use crate::addrspace::Region;
use crate::error::Result;

/// Per-task allocation bookkeeping, so a task's memory is released as a
/// unit when it finishes.
pub struct TaskAllocations {
    manager: Arc<MemoryManager>,
    allocations: Mutex<HashMap<String, Vec<Region>>>,
}

impl TaskAllocations {
    pub fn new(manager: Arc<MemoryManager>) -> Self {
        Self {
            manager,
            allocations: Mutex::new(HashMap::new()),
        }
    }

    /// Allocates `size` bytes for `task_id` and records the region against
    /// the task.
    pub fn alloc(&self, task_id: &str, size: u64, owner: &str) -> Result<Region> {
        let region = self.manager.allocate_region(size, owner)?;
        self.allocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(task_id.to_string())
            .or_default()
            .push(region.clone());
        Ok(region)
    }

    /// Frees every region recorded for `task_id`. Each region is attempted
    /// even after a failure; the first error is returned afterwards.
    pub fn free(&self, task_id: &str) -> Result<()> {
        let regions = self
            .allocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(task_id)
            .unwrap_or_default();

        let mut first_err = None;
        for region in regions {
            if let Err(e) = self.manager.free_region(region.start) {
                tracing::warn!(
                    "freeing region {:#x} for task {} failed: {}",
                    region.start,
                    task_id,
                    e
                );
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Snapshot of the regions currently recorded for `task_id`.
    pub fn lookup(&self, task_id: &str) -> Vec<Region> {
        self.allocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(task_id)
            .cloned()
            .unwrap_or_default()
    }
}
