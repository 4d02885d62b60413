//! Coalesced runs of occupied slots.
//!
//! The native `XXSetShaderResources(start, count, views)` family is cheapest when it is called
//! once per contiguous run of bound slots. [`SlotRanges`] keeps those runs up to date
//! incrementally as individual slots are filled or cleared, so committing the bindings never has
//! to rescan the slot array.
//!
//! Invariant, checked by [`SlotRanges::assert_matches`]: ranges are sorted by start, non-empty,
//! non-overlapping, and separated by at least one empty slot.

use tracing::trace;

/// A run of consecutive occupied slot-array offsets `[start, start + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRange {
    pub start: usize,
    pub len: usize,
}

impl SlotRange {
    pub const fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    const fn single(index: usize) -> Self {
        Self::new(index, 1)
    }

    /// One past the last offset.
    pub const fn end(self) -> usize {
        self.start + self.len
    }

    /// Last offset in the range.
    pub const fn last(self) -> usize {
        self.start + self.len - 1
    }

    pub const fn contains(self, index: usize) -> bool {
        index >= self.start && index < self.end()
    }
}

impl From<(usize, usize)> for SlotRange {
    fn from((start, len): (usize, usize)) -> Self {
        Self::new(start, len)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotRanges {
    ranges: Vec<SlotRange>,
}

impl SlotRanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the ranges from scratch by scanning an occupancy sequence.
    pub fn from_occupancy(occupied: impl IntoIterator<Item = bool>) -> Self {
        let mut ranges: Vec<SlotRange> = Vec::new();
        for (index, occupied) in occupied.into_iter().enumerate() {
            if !occupied {
                continue;
            }
            match ranges.last_mut() {
                Some(last) if last.end() == index => last.len += 1,
                _ => ranges.push(SlotRange::single(index)),
            }
        }
        Self { ranges }
    }

    pub fn as_slice(&self) -> &[SlotRange] {
        &self.ranges
    }

    pub fn iter(&self) -> impl Iterator<Item = SlotRange> + '_ {
        self.ranges.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Total number of occupied slots covered.
    pub fn occupied(&self) -> usize {
        self.ranges.iter().map(|r| r.len).sum()
    }

    pub fn clear_all(&mut self) {
        self.ranges.clear();
    }

    /// Record that the empty slot at `index` became occupied.
    pub fn fill(&mut self, index: usize) {
        for i in 0..self.ranges.len() {
            let range = self.ranges[i];

            if index + 1 == range.start {
                let range = &mut self.ranges[i];
                range.start -= 1;
                range.len += 1;
                let merged = self.merge_with_next(i.wrapping_sub(1));
                trace!(index, merged, "slot range extended backward");
                return;
            }

            if index == range.end() {
                self.ranges[i].len += 1;
                let merged = self.merge_with_next(i);
                trace!(index, merged, "slot range extended forward");
                return;
            }

            if index < range.start {
                self.ranges.insert(i, SlotRange::single(index));
                trace!(index, at = i, "slot range inserted");
                return;
            }
        }

        self.ranges.push(SlotRange::single(index));
        let merged = self.merge_with_next(self.ranges.len().wrapping_sub(2));
        trace!(index, merged, "slot range appended");
    }

    /// Record that the occupied slot at `index` became empty.
    ///
    /// Panics when no range covers `index`; that means the caller's occupancy bookkeeping and the
    /// range list have diverged.
    pub fn clear(&mut self, index: usize) {
        let Some(i) = self.ranges.iter().position(|r| r.contains(index)) else {
            panic!("cleared slot {index} is not covered by any range: {:?}", self.ranges);
        };

        let range = self.ranges[i];
        if range.len == 1 {
            self.ranges.remove(i);
            trace!(index, "slot range removed");
        } else if index == range.start {
            let range = &mut self.ranges[i];
            range.start += 1;
            range.len -= 1;
            trace!(index, "slot range shrunk from front");
        } else if index == range.last() {
            self.ranges[i].len -= 1;
            trace!(index, "slot range shrunk from back");
        } else {
            self.ranges[i].len = index - range.start;
            self.ranges
                .insert(i + 1, SlotRange::new(index + 1, range.last() - index));
            trace!(index, "slot range split");
        }
    }

    /// Merge `ranges[i + 1]` into `ranges[i]` when they touch. `i` may be `usize::MAX` (no
    /// predecessor), which is a no-op.
    fn merge_with_next(&mut self, i: usize) -> bool {
        let Some(next) = i.checked_add(1) else {
            return false;
        };
        if next >= self.ranges.len() || self.ranges[i].end() != self.ranges[next].start {
            return false;
        }
        self.ranges[i].len += self.ranges[next].len;
        self.ranges.remove(next);
        true
    }

    /// Fatal check that the ranges describe exactly the occupied runs of `occupied`.
    pub fn assert_matches(&self, occupied: impl IntoIterator<Item = bool>) {
        let expected = Self::from_occupancy(occupied);
        assert_eq!(
            self.ranges, expected.ranges,
            "slot ranges diverged from slot occupancy"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(pairs: &[(usize, usize)]) -> Vec<SlotRange> {
        pairs.iter().copied().map(SlotRange::from).collect()
    }

    struct Model {
        occupied: Vec<bool>,
        ranges: SlotRanges,
    }

    impl Model {
        fn new(len: usize) -> Self {
            Self {
                occupied: vec![false; len],
                ranges: SlotRanges::new(),
            }
        }

        fn set(&mut self, index: usize, occupied: bool) {
            if self.occupied[index] == occupied {
                return;
            }
            self.occupied[index] = occupied;
            if occupied {
                self.ranges.fill(index);
            } else {
                self.ranges.clear(index);
            }
        }
    }

    #[test]
    fn sparse_fill_yields_three_ranges() {
        let mut model = Model::new(10);
        for index in [7, 3, 0, 4, 2] {
            model.set(index, true);
        }
        assert_eq!(
            model.ranges.as_slice(),
            ranges(&[(0, 1), (2, 3), (7, 1)])
        );
        assert_eq!(model.ranges.occupied(), 5);
    }

    #[test]
    fn filling_gap_merges_neighbours() {
        let mut model = Model::new(5);
        for index in [0, 1, 3, 4] {
            model.set(index, true);
        }
        assert_eq!(model.ranges.as_slice(), ranges(&[(0, 2), (3, 2)]));

        model.set(2, true);
        assert_eq!(model.ranges.as_slice(), ranges(&[(0, 5)]));
    }

    #[test]
    fn clearing_middle_splits_range() {
        let mut model = Model::new(5);
        for index in 0..5 {
            model.set(index, true);
        }
        assert_eq!(model.ranges.as_slice(), ranges(&[(0, 5)]));

        model.set(2, false);
        assert_eq!(model.ranges.as_slice(), ranges(&[(0, 2), (3, 2)]));
    }

    #[test]
    fn clearing_edges_shrinks_range() {
        let mut model = Model::new(6);
        for index in 1..5 {
            model.set(index, true);
        }
        model.set(1, false);
        assert_eq!(model.ranges.as_slice(), ranges(&[(2, 3)]));
        model.set(4, false);
        assert_eq!(model.ranges.as_slice(), ranges(&[(2, 2)]));
        model.set(2, false);
        model.set(3, false);
        assert!(model.ranges.is_empty());
    }

    #[test]
    fn backward_extension_merges_with_previous() {
        let mut ranges_list = SlotRanges::new();
        ranges_list.fill(0);
        ranges_list.fill(4);
        ranges_list.fill(3);
        ranges_list.fill(2);
        assert_eq!(ranges_list.as_slice(), ranges(&[(0, 1), (2, 3)]));
        ranges_list.fill(1);
        assert_eq!(ranges_list.as_slice(), ranges(&[(0, 5)]));
    }

    #[test]
    fn insert_before_first_range() {
        let mut ranges_list = SlotRanges::new();
        ranges_list.fill(5);
        ranges_list.fill(1);
        assert_eq!(ranges_list.as_slice(), ranges(&[(1, 1), (5, 1)]));
    }

    #[test]
    #[should_panic(expected = "not covered by any range")]
    fn clearing_uncovered_slot_is_fatal() {
        let mut ranges_list = SlotRanges::new();
        ranges_list.fill(2);
        ranges_list.clear(3);
    }

    #[test]
    fn from_occupancy_matches_brute_force_runs() {
        let derived = SlotRanges::from_occupancy([true, false, true, true, true, false, false, true]);
        assert_eq!(derived.as_slice(), ranges(&[(0, 1), (2, 3), (7, 1)]));
        assert!(SlotRanges::from_occupancy([false; 4]).is_empty());
    }

    #[cfg(not(target_arch = "wasm32"))]
    mod props {
        use super::*;
        use proptest::prelude::*;

        fn ops(len: usize) -> impl Strategy<Value = Vec<(usize, bool)>> {
            proptest::collection::vec((0..len, any::<bool>()), 0..256)
        }

        proptest! {
            #[test]
            fn ranges_track_occupancy(ops in ops(40)) {
                let mut model = Model::new(40);
                for (index, occupied) in ops {
                    model.set(index, occupied);
                    let expected = SlotRanges::from_occupancy(model.occupied.iter().copied());
                    prop_assert_eq!(model.ranges.as_slice(), expected.as_slice());
                }
            }

            #[test]
            fn ranges_stay_sorted_and_separated(ops in ops(128)) {
                let mut model = Model::new(128);
                for (index, occupied) in ops {
                    model.set(index, occupied);
                }
                for pair in model.ranges.as_slice().windows(2) {
                    prop_assert!(pair[0].len > 0 && pair[1].len > 0);
                    prop_assert!(pair[0].end() < pair[1].start);
                }
            }
        }
    }
}
