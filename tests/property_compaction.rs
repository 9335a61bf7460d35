//! Property-based tests for compaction invariants
//!
//! Uses proptest to verify block list invariants hold across random disk maps

use diskmap_rs::core::validation;
use diskmap_rs::{
    BlockList, ChecksumCalculator, CompactionEvent, Compactor, FragmentCompactor, Policy,
    WholeFileCompactor,
};
use proptest::prelude::*;

fn disk_map() -> impl Strategy<Value = String> {
    prop::collection::vec(0u8..10, 0..60)
        .prop_map(|digits| digits.iter().map(|d| char::from(b'0' + d)).collect())
}

fn compactor(policy: Policy) -> Box<dyn Compactor> {
    match policy {
        Policy::Fragment => Box::new(FragmentCompactor::new()),
        Policy::WholeFile => Box::new(WholeFileCompactor::new()),
    }
}

fn any_policy() -> impl Strategy<Value = Policy> {
    prop_oneof![Just(Policy::Fragment), Just(Policy::WholeFile)]
}

proptest! {
    #[test]
    fn prop_total_size_is_conserved(input in disk_map(), policy in any_policy()) {
        let mut list = BlockList::parse(&input).unwrap();
        let before = list.total_size();

        compactor(policy).compact(&mut list).unwrap();

        prop_assert_eq!(list.total_size(), before);
    }

    #[test]
    fn prop_no_adjacent_free_after_every_step(input in disk_map(), policy in any_policy()) {
        let mut list = BlockList::parse(&input).unwrap();
        prop_assert!(list.validate().is_ok());

        let mut violations = Vec::new();
        let mut observer = |_: &CompactionEvent, list: &BlockList| {
            if let Err(e) = list.validate() {
                violations.push(e.to_string());
            }
        };
        compactor(policy).compact_with(&mut list, &mut observer).unwrap();

        prop_assert!(violations.is_empty(), "violations: {:?}", violations);
        prop_assert!(list.validate().is_ok());
    }

    #[test]
    fn prop_fragment_packs_fully(input in disk_map()) {
        let mut list = BlockList::parse(&input).unwrap();
        FragmentCompactor::new().compact(&mut list).unwrap();

        prop_assert!(validation::check_packed(&list).is_ok());
        prop_assert_eq!(list.interior_free_runs(), 0);
    }

    #[test]
    fn prop_fragment_preserves_unit_counts(input in disk_map()) {
        let mut list = BlockList::parse(&input).unwrap();
        let before: Vec<(u64, u64)> = list
            .file_extents()
            .into_iter()
            .map(|(id, extents)| (id, extents.iter().map(|e| e.length).sum()))
            .collect();

        FragmentCompactor::new().compact(&mut list).unwrap();

        let after: Vec<(u64, u64)> = list
            .file_extents()
            .into_iter()
            .map(|(id, extents)| (id, extents.iter().map(|e| e.length).sum()))
            .collect();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn prop_whole_file_moves_each_file_once_and_left(input in disk_map()) {
        let mut list = BlockList::parse(&input).unwrap();
        let before = list.file_extents();

        WholeFileCompactor::new().compact(&mut list).unwrap();
        let after = list.file_extents();

        prop_assert!(validation::check_unfragmented(&list).is_ok());
        prop_assert_eq!(before.len(), after.len());
        for (id, extents) in &after {
            let original = before[id][0];
            prop_assert_eq!(extents.len(), 1);
            prop_assert_eq!(extents[0].length, original.length);
            prop_assert!(extents[0].start <= original.start, "file {} moved right", id);
        }
    }

    #[test]
    fn prop_rerun_is_idempotent(input in disk_map(), policy in any_policy()) {
        let mut list = BlockList::parse(&input).unwrap();
        compactor(policy).compact(&mut list).unwrap();
        let settled = list.clone();
        let checksum = ChecksumCalculator::compute(&list);

        let stats = compactor(policy).compact(&mut list).unwrap();

        prop_assert_eq!(stats.steps, 0);
        prop_assert_eq!(&list, &settled);
        prop_assert_eq!(ChecksumCalculator::compute(&list), checksum);
    }

    #[test]
    fn prop_fragment_checksum_matches_unit_simulation(input in disk_map()) {
        // Straightforward unit-array model of the fragment policy
        let list = BlockList::parse(&input).unwrap();
        let mut units: Vec<Option<u64>> = list
            .blocks()
            .iter()
            .flat_map(|b| std::iter::repeat(b.id).take(b.size as usize))
            .collect();

        let (mut left, mut right) = (0usize, units.len());
        loop {
            while left < units.len() && units[left].is_some() {
                left += 1;
            }
            while right > 0 && units[right - 1].is_none() {
                right -= 1;
            }
            if right == 0 || left >= right - 1 {
                break;
            }
            units.swap(left, right - 1);
        }
        let expected: u64 = units
            .iter()
            .enumerate()
            .map(|(pos, id)| pos as u64 * id.unwrap_or(0))
            .sum();

        let mut list = list;
        FragmentCompactor::new().compact(&mut list).unwrap();
        prop_assert_eq!(ChecksumCalculator::compute(&list), expected);
    }
}
