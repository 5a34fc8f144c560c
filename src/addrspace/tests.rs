#[cfg(test)]
mod tests {
    use crate::addrspace::region::{Region, initial_layout};
    use crate::addrspace::table::AddressTable;
    use crate::config::{CpuClass, SocConfig};
    use crate::error::MemoryError;

    const MIB: u64 = 1024 * 1024;

    fn soc(name: &str, memory_mb: u64) -> SocConfig {
        SocConfig {
            name: name.to_string(),
            cpu_class: CpuClass::Little,
            memory_mb,
            address: "127.0.0.1:0".to_string(),
            python_port: None,
        }
    }

    fn two_node_table() -> AddressTable {
        AddressTable::new(vec![
            Region::new(0, 512 * MIB, "soc-a"),
            Region::new(512 * MIB, 512 * MIB, "soc-b"),
        ])
        .unwrap()
    }

    /// allocated ∪ free must tile [0, total) exactly, whatever the history.
    fn assert_tiles(table: &AddressTable) {
        let mut regions = table.allocated_regions();
        regions.extend(table.free_regions());
        regions.sort_by_key(|r| r.start);

        let mut cursor = 0u64;
        for region in &regions {
            assert_eq!(
                region.start, cursor,
                "gap or overlap before {:#x}",
                region.start
            );
            assert!(region.length > 0);
            cursor = region.end();
        }
        assert_eq!(cursor, table.total_capacity());
    }

    // ============================================================
    // LAYOUT
    // ============================================================

    #[test]
    fn test_initial_layout_is_contiguous_and_name_sorted() {
        let socs = vec![soc("soc-b", 1024), soc("soc-a", 512)];
        let regions = initial_layout(&socs);

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].owner, "soc-a");
        assert_eq!(regions[0].start, 0);
        assert_eq!(regions[1].owner, "soc-b");
        assert_eq!(regions[1].start, 512 * MIB);
        assert_eq!(regions[1].length, 1024 * MIB);
    }

    #[test]
    fn test_initial_layout_empty_cluster() {
        assert!(initial_layout(&[]).is_empty());
    }

    #[test]
    fn test_new_rejects_overlapping_regions() {
        let result = AddressTable::new(vec![
            Region::new(0, 2 * MIB, "soc-a"),
            Region::new(MIB, 2 * MIB, "soc-b"),
        ]);
        assert!(matches!(result, Err(MemoryError::LayoutOverlap)));
    }

    // ============================================================
    // TRANSLATION
    // ============================================================

    #[test]
    fn test_translate_across_the_layout() {
        let table = two_node_table();

        let (owner, offset) = table.translate(0x1000_0000).unwrap();
        assert_eq!(owner, "soc-a");
        assert_eq!(offset, 0x1000_0000);

        let (owner, offset) = table.translate(0x2000_0000).unwrap();
        assert_eq!(owner, "soc-b");
        assert_eq!(offset, 0);

        assert!(matches!(
            table.translate(0x9000_0000),
            Err(MemoryError::Unmapped(0x9000_0000))
        ));
    }

    #[test]
    fn test_translate_prefers_allocated_regions() {
        let table = two_node_table();
        let region = table.allocate(128 * 1024, "soc-a").unwrap();

        // Offsets are relative to the containing allocation, not to the
        // node's whole free block.
        let (owner, offset) = table.translate(region.start + 5).unwrap();
        assert_eq!(owner, "soc-a");
        assert_eq!(offset, 5);
    }

    // ============================================================
    // ALLOCATE / FREE
    // ============================================================

    #[test]
    fn test_allocate_first_fit_lowest_start() {
        let table = two_node_table();

        let first = table.allocate(MIB, "soc-a").unwrap();
        let second = table.allocate(MIB, "soc-a").unwrap();
        assert_eq!(first.start, 0);
        assert_eq!(second.start, MIB);

        // soc-b allocations start in soc-b's half of the space.
        let remote = table.allocate(MIB, "soc-b").unwrap();
        assert_eq!(remote.start, 512 * MIB);
        assert_tiles(&table);
    }

    #[test]
    fn test_allocate_exact_fit_removes_free_region() {
        let table = AddressTable::new(vec![Region::new(0, MIB, "soc-a")]).unwrap();
        let region = table.allocate(MIB, "soc-a").unwrap();

        assert_eq!(region.length, MIB);
        assert!(table.free_regions().is_empty());
        assert_tiles(&table);
    }

    #[test]
    fn test_allocate_respects_owner_budget() {
        let table = two_node_table();
        assert!(matches!(
            table.allocate(600 * MIB, "soc-a"),
            Err(MemoryError::NoCapacity(_))
        ));
        assert!(matches!(
            table.allocate(MIB, "soc-c"),
            Err(MemoryError::NoCapacity(_))
        ));
        assert!(matches!(
            table.allocate(0, "soc-a"),
            Err(MemoryError::NoCapacity(0))
        ));
    }

    #[test]
    fn test_free_returns_space_and_merges() {
        let table = two_node_table();
        let first = table.allocate(MIB, "soc-a").unwrap();
        let second = table.allocate(MIB, "soc-a").unwrap();

        table.free(first.start).unwrap();
        table.free(second.start).unwrap();

        // Both freed chunks coalesce back into soc-a's single free block.
        let free = table.free_regions();
        assert_eq!(free.len(), 2);
        assert_eq!(free[0], Region::new(0, 512 * MIB, "soc-a"));
        assert_tiles(&table);
    }

    #[test]
    fn test_free_unknown_start_fails() {
        let table = two_node_table();
        assert!(matches!(
            table.free(0x42),
            Err(MemoryError::NotAllocated(0x42))
        ));
    }

    #[test]
    fn test_merge_keeps_distinct_owners_apart() {
        let table = two_node_table();

        // Consume soc-a's space entirely so its free list empties, then free
        // it again: the free region adjacent to soc-b's must not merge.
        let region = table.allocate(512 * MIB, "soc-a").unwrap();
        table.free(region.start).unwrap();

        let free = table.free_regions();
        assert_eq!(free.len(), 2);
        assert_eq!(free[0].owner, "soc-a");
        assert_eq!(free[1].owner, "soc-b");
        assert_tiles(&table);
    }

    // ============================================================
    // OWNERSHIP TRANSFER
    // ============================================================

    #[test]
    fn test_transfer_whole_allocation() {
        let table = two_node_table();
        let region = table.allocate(128 * 1024, "soc-a").unwrap();

        table
            .transfer_ownership(region.start, region.length, "soc-b")
            .unwrap();

        let (owner, _) = table.translate(region.start).unwrap();
        assert_eq!(owner, "soc-b");

        // The reclaimed space is immediately allocatable for the new owner,
        // at the same start address.
        let reclaimed = table.allocate(128 * 1024, "soc-b").unwrap();
        assert_eq!(reclaimed.start, region.start);
        assert_tiles(&table);
    }

    #[test]
    fn test_transfer_splits_allocation_in_the_middle() {
        let table = two_node_table();
        let region = table.allocate(100, "soc-a").unwrap();

        table
            .transfer_ownership(region.start + 10, 20, "soc-b")
            .unwrap();

        // Left fragment stays allocated to soc-a.
        let left = table.region_containing(region.start).unwrap();
        assert_eq!(left, Region::new(region.start, 10, "soc-a"));

        // The carved middle is free space of soc-b now.
        let middle = table.region_containing(region.start + 10).unwrap();
        assert_eq!(middle, Region::new(region.start + 10, 20, "soc-b"));

        // Right fragment stays allocated to soc-a under its new start.
        let right = table.region_containing(region.start + 30).unwrap();
        assert_eq!(right, Region::new(region.start + 30, 70, "soc-a"));
        assert_tiles(&table);
    }

    #[test]
    fn test_transfer_suffix_of_allocation() {
        let table = two_node_table();
        let region = table.allocate(100, "soc-a").unwrap();

        // The overflow shape: re-own everything past a write cutoff.
        table
            .transfer_ownership(region.start + 64, 36, "soc-b")
            .unwrap();

        let prefix = table.region_containing(region.start).unwrap();
        assert_eq!(prefix.length, 64);
        assert_eq!(prefix.owner, "soc-a");

        let suffix = table.region_containing(region.start + 64).unwrap();
        assert_eq!(suffix, Region::new(region.start + 64, 36, "soc-b"));
        assert_tiles(&table);
    }

    #[test]
    fn test_transfer_out_of_free_space() {
        // A peer applying a broadcast transfer has never seen the sender's
        // allocation; the range lies in what it still considers free space.
        let table = two_node_table();
        table.transfer_ownership(4096, 64, "soc-b").unwrap();

        let (owner, _) = table.translate(4096).unwrap();
        assert_eq!(owner, "soc-b");
        assert_tiles(&table);
    }

    #[test]
    fn test_transfer_error_cases() {
        let table = two_node_table();

        assert!(matches!(
            table.transfer_ownership(0x9000_0000, 10, "soc-b"),
            Err(MemoryError::Unmapped(_))
        ));

        // Runs off the end of the mapped space.
        let total = table.total_capacity();
        assert!(matches!(
            table.transfer_ownership(total - 10, 20, "soc-b"),
            Err(MemoryError::RangeTooSmall { available: 10, .. })
        ));
    }

    // ============================================================
    // OVERFLOW TARGET LOOKUP
    // ============================================================

    #[test]
    fn test_find_owner_with_free_scans_canonical_order() {
        let table = two_node_table();
        assert_eq!(table.find_owner_with_free(MIB).unwrap(), "soc-a");

        // Exhaust soc-a: the scan falls through to soc-b.
        table.allocate(512 * MIB, "soc-a").unwrap();
        assert_eq!(table.find_owner_with_free(MIB).unwrap(), "soc-b");

        assert!(matches!(
            table.find_owner_with_free(600 * MIB),
            Err(MemoryError::NoCapacity(_))
        ));
    }

    // ============================================================
    // PROPERTIES
    // ============================================================

    #[test]
    fn test_coverage_preserved_by_mixed_history() {
        let table = two_node_table();

        let a1 = table.allocate(3 * MIB, "soc-a").unwrap();
        let a2 = table.allocate(MIB, "soc-a").unwrap();
        let b1 = table.allocate(2 * MIB, "soc-b").unwrap();
        assert_tiles(&table);

        table.free(a1.start).unwrap();
        assert_tiles(&table);

        table
            .transfer_ownership(a2.start, a2.length, "soc-b")
            .unwrap();
        assert_tiles(&table);

        table.free(b1.start).unwrap();
        table.allocate(MIB / 2, "soc-b").unwrap();
        assert_tiles(&table);

        // Capacity is conserved globally across transfers.
        let owned: u64 = table
            .allocated_regions()
            .iter()
            .chain(table.free_regions().iter())
            .map(|r| r.length)
            .sum();
        assert_eq!(owned, table.total_capacity());
    }

    #[test]
    fn test_allocator_is_deterministic() {
        let run = || {
            let table = two_node_table();
            let r1 = table.allocate(MIB, "soc-a").unwrap();
            let r2 = table.allocate(2 * MIB, "soc-a").unwrap();
            table.free(r1.start).unwrap();
            let r3 = table.allocate(MIB / 2, "soc-a").unwrap();
            table
                .transfer_ownership(r2.start, r2.length, "soc-b")
                .unwrap();
            let _ = r3;
            (table.allocated_regions(), table.free_regions())
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_no_adjacent_free_regions_share_an_owner() {
        let table = two_node_table();
        let regions: Vec<_> = (0..8)
            .map(|_| table.allocate(MIB, "soc-a").unwrap())
            .collect();
        // Free in an interleaved order to exercise the merge.
        for region in regions.iter().step_by(2).chain(regions.iter().skip(1).step_by(2)) {
            table.free(region.start).unwrap();
        }

        let free = table.free_regions();
        for pair in free.windows(2) {
            assert!(
                !(pair[0].owner == pair[1].owner && pair[0].end() == pair[1].start),
                "unmerged free neighbours: {:?} / {:?}",
                pair[0],
                pair[1]
            );
        }
        assert_tiles(&table);
    }
}
