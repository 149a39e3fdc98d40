//! Slice dispatcher
//!
//! Walks a day's pending allocation list against the wall clock, popping the
//! head and either firing it (still in the future) or skipping it (overdue)
//! and recursing on the tail. When the pending list empties, asks the
//! [`planner`](super::planner) for a fresh plan and advances `scheduleStart`
//! by exactly one day. Grounded on the teacher's `gossip/convergence.rs`
//! round-based tick loop (pop next unit of work, decide fire-or-skip, repeat)
//! generalized from fixed rounds to wall-clock-scheduled slices.

use std::collections::VecDeque;

use tracing::debug;

use crate::domain::{Allocation, NodeInfo, ScheduleWants, WorkItemKind};
use crate::time::EpochSecs;

use super::planner::plan_day;

const SECONDS_PER_DAY: u64 = 86_400;

/// Result of asking the dispatcher for the next slice to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// The work-item kind to dispatch.
    pub kind: WorkItemKind,
    /// Seconds to wait (from `now`) before firing it. Zero or more.
    pub wait_seconds: u64,
}

/// Holds the mutable scheduling state the dispatcher threads across calls:
/// the remaining allocations for the current day and the day's start time.
#[derive(Debug, Clone)]
pub struct SliceDispatcher {
    pending: VecDeque<Allocation>,
    schedule_start: EpochSecs,
    slice_count: u32,
}

impl SliceDispatcher {
    /// Start a dispatcher with an already-computed pending list.
    pub fn new(pending: Vec<Allocation>, schedule_start: EpochSecs, slice_count: u32) -> Self {
        Self {
            pending: pending.into(),
            schedule_start,
            slice_count,
        }
    }

    /// Start a dispatcher by planning the first day from `wants`.
    pub fn plan_from(wants: ScheduleWants, schedule_start: EpochSecs) -> Self {
        Self::new(plan_day(wants), schedule_start, wants.slice_count())
    }

    /// Current day-start timestamp.
    pub fn schedule_start(&self) -> EpochSecs {
        self.schedule_start
    }

    /// Number of allocations left to dispatch in the current day.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn slice_seconds(&self) -> u64 {
        SECONDS_PER_DAY / self.slice_count as u64
    }

    fn fire_time(&self, slice: u32, node: NodeInfo) -> EpochSecs {
        let slice_seconds = self.slice_seconds();
        let per_node_offset = (node.node_ordinal as u64 - 1) * (slice_seconds / node.node_count as u64);
        self.schedule_start + per_node_offset + slice as u64 * slice_seconds
    }

    /// Pop and return the next due (or overdue-skipped) allocation, planning
    /// a fresh day and advancing `scheduleStart` by 24h whenever the pending
    /// list runs dry.
    pub fn next(&mut self, wants: ScheduleWants, node: NodeInfo, now: EpochSecs) -> DispatchOutcome {
        loop {
            let Some(allocation) = self.pending.pop_front() else {
                self.schedule_start += SECONDS_PER_DAY;
                self.slice_count = wants.slice_count();
                self.pending = plan_day(wants).into();
                debug!(schedule_start = self.schedule_start, "regenerated daily plan");
                continue;
            };

            let fire_time = self.fire_time(allocation.slice, node);
            if fire_time > now {
                return DispatchOutcome {
                    kind: allocation.kind,
                    wait_seconds: fire_time - now,
                };
            }

            debug!(slice = allocation.slice, kind = ?allocation.kind, "skipping overdue slice");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Allocation;

    fn node(ordinal: u32, count: u32) -> NodeInfo {
        NodeInfo::new(ordinal, count)
    }

    #[test]
    fn empty_pending_regenerates_plan_and_advances_schedule_start() {
        let wants = ScheduleWants::new(100, 0, 0, 0);
        let now = 1_000_000;
        let mut dispatcher = SliceDispatcher::new(Vec::new(), now - SECONDS_PER_DAY, 100);

        let outcome = dispatcher.next(wants, node(1, 8), now);

        assert_eq!(outcome.kind, WorkItemKind::NoSync);
        assert!(dispatcher.schedule_start() > now);
        assert!(outcome.wait_seconds > 0);
    }

    #[test]
    fn higher_ordinal_waits_strictly_longer() {
        let wants = ScheduleWants::new(100, 0, 0, 0);
        let now = 1_000_000;

        let mut d1 = SliceDispatcher::new(Vec::new(), now - SECONDS_PER_DAY, 100);
        let o1 = d1.next(wants, node(1, 8), now);

        let mut d2 = SliceDispatcher::new(Vec::new(), now - SECONDS_PER_DAY, 100);
        let o2 = d2.next(wants, node(2, 8), now);

        let mut d7 = SliceDispatcher::new(Vec::new(), now - SECONDS_PER_DAY, 100);
        let o7 = d7.next(wants, node(7, 8), now);

        assert!(o2.wait_seconds > o1.wait_seconds);
        assert!(o7.wait_seconds > o2.wait_seconds);
    }

    #[test]
    fn overdue_slices_are_skipped_not_fired() {
        let schedule_start = 0;
        let slice_count = 4;
        let pending = vec![
            Allocation { slice: 0, kind: WorkItemKind::NoSync },
            Allocation { slice: 1, kind: WorkItemKind::AllSync },
            Allocation { slice: 2, kind: WorkItemKind::DaySync },
            Allocation { slice: 3, kind: WorkItemKind::HourSync },
        ];
        let mut dispatcher = SliceDispatcher::new(pending, schedule_start, slice_count);
        let wants = ScheduleWants::new(1, 1, 1, 1);

        // slice_seconds = 86400/4 = 21600; slices 0 and 1 fire at 0 and
        // 21600 respectively, both in the past relative to `now`.
        let now = 21_601;
        let outcome = dispatcher.next(wants, node(1, 1), now);

        assert_eq!(outcome.kind, WorkItemKind::DaySync);
        assert_eq!(dispatcher.pending_len(), 1);
    }

    #[test]
    fn future_slice_reports_positive_wait() {
        let schedule_start = 100_000;
        let pending = vec![Allocation { slice: 5, kind: WorkItemKind::AllSync }];
        let mut dispatcher = SliceDispatcher::new(pending, schedule_start, 100);
        let wants = ScheduleWants::new(0, 100, 0, 0);

        let now = schedule_start;
        let outcome = dispatcher.next(wants, node(1, 1), now);

        assert_eq!(outcome.kind, WorkItemKind::AllSync);
        assert_eq!(outcome.wait_seconds, 5 * (SECONDS_PER_DAY / 100));
    }

    proptest::proptest! {
        #[test]
        fn invariant_monotonicity_by_node_ordinal(
            slice in 1u32..20,
            slice_count in 20u32..100,
            node_count in 2u32..10,
        ) {
            let schedule_start = 100_000;
            let wants = ScheduleWants::new(slice_count, 0, 0, 0);
            let now = schedule_start;

            let mut prev_wait = 0u64;
            for ordinal in 1..=node_count {
                let pending = vec![Allocation { slice, kind: WorkItemKind::NoSync }];
                let mut dispatcher = SliceDispatcher::new(pending, schedule_start, slice_count);
                let outcome = dispatcher.next(wants, node(ordinal, node_count), now);
                if ordinal > 1 {
                    proptest::prop_assert!(outcome.wait_seconds > prev_wait);
                }
                prev_wait = outcome.wait_seconds;
            }
        }

        #[test]
        fn invariant_plan_regeneration_advances_schedule_start_by_one_day(
            no_sync in 1u32..20,
            now_offset in 0u64..1000,
        ) {
            let schedule_start = 1_000_000;
            let wants = ScheduleWants::new(no_sync, 0, 0, 0);
            let mut dispatcher = SliceDispatcher::new(Vec::new(), schedule_start, no_sync);

            let now = schedule_start + now_offset;
            dispatcher.next(wants, node(1, 1), now);

            proptest::prop_assert_eq!(dispatcher.schedule_start(), schedule_start + SECONDS_PER_DAY);
        }
    }
}
