//! Daily schedule planner
//!
//! Draws each work-item kind's quota of slices, uniformly at random and
//! without replacement, from the slice indices `1..=SliceCount`, in the
//! fixed order `NoSync`, `AllSync`, `DaySync`, `HourSync`, then returns the
//! resulting allocations sorted ascending by slice. Grounded on
//! `gossip/topology.rs`'s `PeerSampler::sample_random`, which uses
//! `rand::seq::SliceRandom::choose_multiple` for the same without-replacement
//! draw; generalized here to four sequential draws against a shrinking pool.

use rand::rngs::ThreadRng;
use rand::seq::SliceRandom;

use crate::domain::{Allocation, ScheduleWants, WorkItemKind};

const KINDS_IN_DRAW_ORDER: [WorkItemKind; 4] = [
    WorkItemKind::NoSync,
    WorkItemKind::AllSync,
    WorkItemKind::DaySync,
    WorkItemKind::HourSync,
];

/// Build a day's plan from `wants`, drawing slices with `rand::thread_rng()`.
pub fn plan_day(wants: ScheduleWants) -> Vec<Allocation> {
    plan_day_with(wants, &mut rand::thread_rng())
}

/// Build a day's plan using a caller-supplied RNG, so planner invariants can
/// be exercised deterministically in tests.
pub fn plan_day_with<R: rand::Rng + ?Sized>(wants: ScheduleWants, rng: &mut R) -> Vec<Allocation> {
    let slice_count = wants.slice_count();
    let mut remaining: Vec<u32> = (1..=slice_count).collect();
    let quotas = [
        wants.no_sync,
        wants.all_sync,
        wants.day_sync,
        wants.hour_sync,
    ];

    let mut plan = Vec::with_capacity(slice_count as usize);
    for (kind, quota) in KINDS_IN_DRAW_ORDER.iter().zip(quotas) {
        let draw_size = (quota as usize).min(remaining.len());
        let drawn: Vec<u32> = remaining
            .choose_multiple(rng, draw_size)
            .copied()
            .collect();
        remaining.retain(|slice| !drawn.contains(slice));
        plan.extend(drawn.into_iter().map(|slice| Allocation { slice, kind: *kind }));
    }

    plan.sort_by_key(|a| a.slice);
    plan
}

/// Convenience wrapper exposing [`plan_day`] through the thread-local RNG,
/// matching `gossip::topology::PeerSampler`'s style of using
/// `rand::rngs::ThreadRng` as the default generator type.
pub fn plan_day_default(wants: ScheduleWants) -> Vec<Allocation> {
    let mut rng: ThreadRng = rand::thread_rng();
    plan_day_with(wants, &mut rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn seeded(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    #[test]
    fn plan_covers_every_slice_exactly_once() {
        let wants = ScheduleWants::new(10, 5, 5, 4);
        let mut rng = seeded(42);
        let plan = plan_day_with(wants, &mut rng);

        assert_eq!(plan.len(), wants.slice_count() as usize);
        let slices: HashSet<u32> = plan.iter().map(|a| a.slice).collect();
        assert_eq!(slices.len(), plan.len());
        for slice in 1..=wants.slice_count() {
            assert!(slices.contains(&slice));
        }
    }

    #[test]
    fn plan_is_sorted_ascending_by_slice() {
        let wants = ScheduleWants::new(3, 3, 3, 3);
        let mut rng = seeded(7);
        let plan = plan_day_with(wants, &mut rng);
        let slices: Vec<u32> = plan.iter().map(|a| a.slice).collect();
        let mut sorted = slices.clone();
        sorted.sort_unstable();
        assert_eq!(slices, sorted);
    }

    #[test]
    fn per_kind_counts_match_quotas() {
        let wants = ScheduleWants::new(6, 4, 2, 1);
        let mut rng = seeded(123);
        let plan = plan_day_with(wants, &mut rng);

        let count = |kind: WorkItemKind| plan.iter().filter(|a| a.kind == kind).count() as u32;
        assert_eq!(count(WorkItemKind::NoSync), wants.no_sync);
        assert_eq!(count(WorkItemKind::AllSync), wants.all_sync);
        assert_eq!(count(WorkItemKind::DaySync), wants.day_sync);
        assert_eq!(count(WorkItemKind::HourSync), wants.hour_sync);
    }

    #[test]
    fn disabled_scope_yields_twenty_four_no_sync_slices() {
        let wants = ScheduleWants::disabled();
        let mut rng = seeded(1);
        let plan = plan_day_with(wants, &mut rng);
        assert_eq!(plan.len(), 24);
        assert!(plan.iter().all(|a| a.kind == WorkItemKind::NoSync));
    }

    #[test]
    fn zero_quota_plan_is_empty() {
        let wants = ScheduleWants::new(0, 0, 0, 0);
        let mut rng = seeded(9);
        let plan = plan_day_with(wants, &mut rng);
        assert!(plan.is_empty());
    }

    use proptest::prelude::any;

    proptest::proptest! {
        #[test]
        fn invariant_every_slice_appears_exactly_once(
            no_sync in 0u32..20,
            all_sync in 0u32..20,
            day_sync in 0u32..20,
            hour_sync in 0u32..20,
            seed in any::<u64>(),
        ) {
            let wants = ScheduleWants::new(no_sync, all_sync, day_sync, hour_sync);
            let mut rng = StdRng::seed_from_u64(seed);
            let plan = plan_day_with(wants, &mut rng);

            proptest::prop_assert_eq!(plan.len(), wants.slice_count() as usize);
            let slices: HashSet<u32> = plan.iter().map(|a| a.slice).collect();
            proptest::prop_assert_eq!(slices.len(), plan.len());
            for slice in 1..=wants.slice_count() {
                proptest::prop_assert!(slices.contains(&slice));
            }

            let sorted_slices: Vec<u32> = plan.iter().map(|a| a.slice).collect();
            let mut expected = sorted_slices.clone();
            expected.sort_unstable();
            proptest::prop_assert_eq!(sorted_slices, expected);
        }
    }
}
