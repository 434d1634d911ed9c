//! The indexed Bloom filter.
//!
//! A single-hash Bloom filter over `S` bits whose set bits additionally carry
//! a posting list of group identifiers. Construction is an irreversible
//! sequence of phases:
//!
//! 1. [`Mode::Inserting`]: [`mark`](IndexedBloomFilter::mark) slots.
//! 2. [`Mode::Sizing`]: rank support is built over the bits and each set bit
//!    gets a counter; [`count_hint`](IndexedBloomFilter::count_hint) announces
//!    how many groups will land in each slot.
//! 3. [`Mode::Populating`]: counters are prefix-summed into a boundary vector
//!    (a 1 at the last cell of each slot's region) and the flat posting array
//!    is allocated; [`populate`](IndexedBloomFilter::populate) fills each
//!    region from its end backward.
//! 4. [`Mode::Queryable`]: read-only; [`query`](IndexedBloomFilter::query)
//!    returns the region of a k-mer as a range into
//!    [`postings`](IndexedBloomFilter::postings).
//!
//! Every mutating operation takes `&self` and is safe to call from many
//! threads at once: bits are set with atomic `or`, counters are atomic, and
//! each `populate` claims its cell with an atomic decrement of the slot's
//! remaining count, so concurrent writers never share a cell.

pub mod bits;

use std::ops::Range;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use log::{debug, warn};

use crate::kmer::slot_of;
use crate::FilterError;
use bits::{RankBitVector, SelectBitVector};

/// Integer identifier of a reference group.
pub type GroupId = u32;

const UNFILLED: GroupId = GroupId::MAX;

/// Construction phase of an [`IndexedBloomFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    Inserting,
    Sizing,
    Populating,
    Queryable,
}

impl Mode {
    /// The only phase this one may switch to.
    pub fn next(self) -> Option<Mode> {
        match self {
            Mode::Inserting => Some(Mode::Sizing),
            Mode::Sizing => Some(Mode::Populating),
            Mode::Populating => Some(Mode::Queryable),
            Mode::Queryable => None,
        }
    }
}

enum State {
    Inserting {
        bits: Vec<AtomicU64>,
    },
    Sizing {
        bits: RankBitVector,
        counts: Vec<AtomicU32>,
    },
    Populating {
        bits: RankBitVector,
        boundary: SelectBitVector,
        remaining: Vec<AtomicU32>,
        postings: Vec<AtomicU32>,
    },
    Queryable {
        bits: RankBitVector,
        boundary: SelectBitVector,
        postings: Vec<GroupId>,
    },
}

/// A Bloom filter whose set bits index compact posting lists.
///
/// # Examples
///
/// ```rust
/// use shark::{IndexedBloomFilter, Mode};
///
/// # fn main() -> Result<(), shark::FilterError> {
/// let mut filter = IndexedBloomFilter::new(1 << 16);
/// let (a, b) = (filter.slot(0x1b), filter.slot(0x2c));
///
/// filter.mark(a)?;
/// filter.mark(b)?;
/// filter.switch(Mode::Sizing)?;
///
/// // group 0 owns both k-mers, group 1 only the first
/// let mut group0 = vec![a, b];
/// group0.sort_unstable();
/// filter.count_hint(&group0)?;
/// filter.count_hint(&[a])?;
/// filter.switch(Mode::Populating)?;
///
/// filter.populate(&group0, 0)?;
/// filter.populate(&[a], 1)?;
/// filter.switch(Mode::Queryable)?;
///
/// let mut groups = filter.lookup(0x1b)?.to_vec();
/// groups.sort_unstable();
/// assert_eq!(groups, vec![0, 1]);
/// assert_eq!(filter.lookup(0x2c)?, &[0]);
/// # Ok(())
/// # }
/// ```
pub struct IndexedBloomFilter {
    size: u64,
    seed: u64,
    state: State,
}

impl IndexedBloomFilter {
    /// Create an empty filter of `size` bits in [`Mode::Inserting`].
    pub fn new(size: u64) -> Self {
        Self::with_seed(size, 0)
    }

    /// Like [`new`](Self::new) but hashing k-mers with `seed`.
    pub fn with_seed(size: u64, seed: u64) -> Self {
        let size = size.max(1);
        let bits = (0..size.div_ceil(64)).map(|_| AtomicU64::new(0)).collect();
        Self {
            size,
            seed,
            state: State::Inserting { bits },
        }
    }

    /// Number of bits `S` of the filter.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn mode(&self) -> Mode {
        match self.state {
            State::Inserting { .. } => Mode::Inserting,
            State::Sizing { .. } => Mode::Sizing,
            State::Populating { .. } => Mode::Populating,
            State::Queryable { .. } => Mode::Queryable,
        }
    }

    /// Slot of a canonical k-mer code.
    #[inline]
    pub fn slot(&self, code: u64) -> u64 {
        slot_of(code, self.size, self.seed)
    }

    fn wrong_mode(&self, expected: Mode) -> FilterError {
        FilterError::WrongMode {
            expected,
            actual: self.mode(),
        }
    }

    /// Whether the bit of `slot` is set. Valid in every phase.
    pub fn test_slot(&self, slot: u64) -> bool {
        match &self.state {
            State::Inserting { bits } => {
                slot < self.size
                    && (bits[(slot / 64) as usize].load(Ordering::Relaxed) >> (slot % 64)) & 1 == 1
            }
            State::Sizing { bits, .. }
            | State::Populating { bits, .. }
            | State::Queryable { bits, .. } => bits.get(slot),
        }
    }

    /// Approximate membership of a canonical k-mer code.
    pub fn contains(&self, code: u64) -> bool {
        self.test_slot(self.slot(code))
    }

    /// Number of set bits.
    pub fn marked_slots(&self) -> u64 {
        match &self.state {
            State::Inserting { bits } => bits
                .iter()
                .map(|w| u64::from(w.load(Ordering::Relaxed).count_ones()))
                .sum(),
            State::Sizing { bits, .. }
            | State::Populating { bits, .. }
            | State::Queryable { bits, .. } => bits.ones(),
        }
    }

    /// Set the bit of `slot`. Idempotent.
    pub fn mark(&self, slot: u64) -> Result<(), FilterError> {
        let State::Inserting { bits } = &self.state else {
            return Err(self.wrong_mode(Mode::Inserting));
        };
        if slot >= self.size {
            return Err(FilterError::SlotOutOfRange {
                slot,
                size: self.size,
            });
        }
        bits[(slot / 64) as usize].fetch_or(1u64 << (slot % 64), Ordering::Relaxed);
        Ok(())
    }

    /// Mark the slot of a canonical k-mer code.
    pub fn insert(&self, code: u64) -> Result<(), FilterError> {
        self.mark(self.slot(code))
    }

    /// Move to the next phase. Anything but `self.mode().next()` is refused
    /// and leaves the filter untouched.
    ///
    /// Entering [`Mode::Populating`] allocates the posting array; failure to
    /// do so is reported as [`FilterError::Allocation`] and is not
    /// recoverable by retrying.
    pub fn switch(&mut self, to: Mode) -> Result<(), FilterError> {
        let from = self.mode();
        if from.next() != Some(to) {
            return Err(FilterError::InvalidTransition { from, to });
        }
        let next = match &mut self.state {
            State::Inserting { bits } => {
                let words: Vec<u64> = std::mem::take(bits)
                    .into_iter()
                    .map(AtomicU64::into_inner)
                    .collect();
                let bits = RankBitVector::from_words(words, self.size);
                debug!("Sizing {} marked slots", bits.ones());
                let counts = (0..bits.ones()).map(|_| AtomicU32::new(0)).collect();
                State::Sizing { bits, counts }
            }
            State::Sizing { bits, counts } => prepare_population(bits, counts)?,
            State::Populating {
                bits,
                boundary,
                remaining,
                postings,
            } => freeze(bits, boundary, remaining, postings),
            State::Queryable { .. } => return Err(FilterError::InvalidTransition { from, to }),
        };
        self.state = next;
        Ok(())
    }

    /// Announce that one group will be attached to each distinct slot in
    /// `sorted_slots`. Adjacent duplicates count once; unset slots are
    /// ignored. Returns the number of slots counted.
    pub fn count_hint(&self, sorted_slots: &[u64]) -> Result<usize, FilterError> {
        let State::Sizing { bits, counts } = &self.state else {
            return Err(self.wrong_mode(Mode::Sizing));
        };
        check_sorted(sorted_slots)?;

        let mut counted = 0;
        for slot in dedup_adjacent(sorted_slots) {
            if bits.get(slot) {
                counts[bits.rank(slot) as usize].fetch_add(1, Ordering::Relaxed);
                counted += 1;
            }
        }
        Ok(counted)
    }

    /// Attach `group` to each distinct slot in `sorted_slots`, filling each
    /// slot's region from its last cell backward. Returns the number of
    /// cells written.
    pub fn populate(&self, sorted_slots: &[u64], group: GroupId) -> Result<usize, FilterError> {
        let State::Populating {
            bits,
            boundary,
            remaining,
            postings,
        } = &self.state
        else {
            return Err(self.wrong_mode(Mode::Populating));
        };
        check_sorted(sorted_slots)?;

        let mut written = 0;
        for slot in dedup_adjacent(sorted_slots) {
            if !bits.get(slot) {
                continue;
            }
            let r = bits.rank(slot);
            let left = remaining[r as usize]
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| c.checked_sub(1))
                .map_err(|_| FilterError::CountOverflow { slot })?;
            let cell = region_begin(boundary, r) + left as usize - 1;
            postings[cell].store(group, Ordering::Relaxed);
            written += 1;
        }
        Ok(written)
    }

    /// Region of the posting array attached to `slot`; empty when the bit
    /// is unset.
    pub fn query_slot(&self, slot: u64) -> Result<Range<usize>, FilterError> {
        let State::Queryable { bits, boundary, .. } = &self.state else {
            return Err(self.wrong_mode(Mode::Queryable));
        };
        if !bits.get(slot) {
            return Ok(0..0);
        }
        let r = bits.rank(slot);
        match boundary.select(r) {
            Some(end) => Ok(region_begin(boundary, r)..end as usize + 1),
            None => Ok(0..0),
        }
    }

    /// Region of the posting array attached to a canonical k-mer code.
    pub fn query(&self, code: u64) -> Result<Range<usize>, FilterError> {
        self.query_slot(self.slot(code))
    }

    /// The flat posting array. Empty before [`Mode::Queryable`].
    pub fn postings(&self) -> &[GroupId] {
        match &self.state {
            State::Queryable { postings, .. } => postings,
            _ => &[],
        }
    }

    /// Groups attached to a canonical k-mer code, in unspecified order.
    pub fn lookup(&self, code: u64) -> Result<&[GroupId], FilterError> {
        let range = self.query(code)?;
        Ok(&self.postings()[range])
    }

    /// Total number of posting cells (available from [`Mode::Populating`]).
    pub fn posting_len(&self) -> usize {
        match &self.state {
            State::Inserting { .. } | State::Sizing { .. } => 0,
            State::Populating { postings, .. } => postings.len(),
            State::Queryable { postings, .. } => postings.len(),
        }
    }
}

fn check_sorted(slots: &[u64]) -> Result<(), FilterError> {
    match slots.windows(2).position(|w| w[0] > w[1]) {
        Some(index) => Err(FilterError::UnsortedSlots { index: index + 1 }),
        None => Ok(()),
    }
}

fn dedup_adjacent(slots: &[u64]) -> impl Iterator<Item = u64> + '_ {
    let mut prev = None;
    slots.iter().copied().filter(move |&slot| {
        let fresh = prev != Some(slot);
        prev = Some(slot);
        fresh
    })
}

#[inline]
fn region_begin(boundary: &SelectBitVector, rank: u64) -> usize {
    if rank == 0 {
        return 0;
    }
    boundary.select(rank - 1).map_or(0, |p| p as usize + 1)
}

/// Sizing -> Populating. Allocates first so that a failed allocation leaves
/// the Sizing state intact.
fn prepare_population(
    bits: &mut RankBitVector,
    counts: &mut [AtomicU32],
) -> Result<State, FilterError> {
    let counts: Vec<u32> = counts.iter().map(|c| c.load(Ordering::Relaxed)).collect();
    let total: u64 = counts.iter().map(|&c| u64::from(c)).sum();
    let cells = usize::try_from(total).map_err(|_| FilterError::Allocation { cells: usize::MAX })?;

    let mut postings = Vec::new();
    postings
        .try_reserve_exact(cells)
        .map_err(|_| FilterError::Allocation { cells })?;
    postings.extend((0..cells).map(|_| AtomicU32::new(UNFILLED)));

    let empty = counts.iter().filter(|&&c| c == 0).count();
    let (bits, counts) = if empty > 0 {
        warn!("Dropping {empty} marked slots that no group was counted for");
        let kept = bits.retain_ranks(|r| counts[r as usize] > 0);
        (kept, counts.into_iter().filter(|&c| c > 0).collect())
    } else {
        (std::mem::take(bits), counts)
    };

    let mut end = 0u64;
    let boundary = SelectBitVector::from_positions(
        total,
        counts.iter().map(|&c| {
            end += u64::from(c);
            end - 1
        }),
    );
    debug!(
        "Allocated {cells} posting cells for {} slots",
        boundary.ones()
    );
    let remaining = counts.into_iter().map(AtomicU32::new).collect();

    Ok(State::Populating {
        bits,
        boundary,
        remaining,
        postings,
    })
}

/// Populating -> Queryable. Releases the counters. Regions that were not
/// completely filled are compacted so that every cell holds a real group.
fn freeze(
    bits: &mut RankBitVector,
    boundary: &mut SelectBitVector,
    remaining: &mut [AtomicU32],
    postings: &mut Vec<AtomicU32>,
) -> State {
    let postings: Vec<GroupId> = std::mem::take(postings)
        .into_iter()
        .map(AtomicU32::into_inner)
        .collect();
    let remaining: Vec<u32> = remaining.iter().map(|c| c.load(Ordering::Relaxed)).collect();
    let unfilled: u64 = remaining.iter().map(|&c| u64::from(c)).sum();
    if unfilled == 0 {
        return State::Queryable {
            bits: std::mem::take(bits),
            boundary: std::mem::take(boundary),
            postings,
        };
    }

    warn!("{unfilled} posting cells were counted but never populated; compacting");
    let mut compacted = Vec::with_capacity(postings.len() - unfilled as usize);
    let mut ends = Vec::new();
    let mut keep = Vec::with_capacity(remaining.len());
    let mut begin = 0usize;
    for (r, &left) in remaining.iter().enumerate() {
        let Some(end) = boundary.select(r as u64) else {
            break;
        };
        let end = end as usize;
        // filled cells sit at the tail of the region
        compacted.extend_from_slice(&postings[begin + left as usize..end + 1]);
        let filled = end + 1 - begin > left as usize;
        if filled {
            ends.push(compacted.len() as u64 - 1);
        }
        keep.push(filled);
        begin = end + 1;
    }

    State::Queryable {
        bits: bits.retain_ranks(|r| keep.get(r as usize).copied().unwrap_or(false)),
        boundary: SelectBitVector::from_positions(compacted.len() as u64, ends),
        postings: compacted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::KmerEncoder;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::HashSet;

    fn sorted_slots(filter: &IndexedBloomFilter, codes: &[u64]) -> Vec<u64> {
        let mut slots: Vec<u64> = codes.iter().map(|&c| filter.slot(c)).collect();
        slots.sort_unstable();
        slots
    }

    /// Build a queryable filter where group `i` owns `groups[i]`.
    fn build(size: u64, groups: &[Vec<u64>]) -> IndexedBloomFilter {
        let mut filter = IndexedBloomFilter::new(size);
        for codes in groups {
            for &c in codes {
                filter.insert(c).unwrap();
            }
        }
        filter.switch(Mode::Sizing).unwrap();
        let lists: Vec<Vec<u64>> = groups.iter().map(|g| sorted_slots(&filter, g)).collect();
        for slots in &lists {
            filter.count_hint(slots).unwrap();
        }
        filter.switch(Mode::Populating).unwrap();
        for (gid, slots) in lists.iter().enumerate() {
            filter.populate(slots, gid as GroupId).unwrap();
        }
        filter.switch(Mode::Queryable).unwrap();
        filter
    }

    fn groups_of(filter: &IndexedBloomFilter, code: u64) -> Vec<GroupId> {
        let mut groups = filter.lookup(code).unwrap().to_vec();
        groups.sort_unstable();
        groups
    }

    #[test]
    fn test_mode_order() {
        assert_eq!(Mode::Inserting.next(), Some(Mode::Sizing));
        assert_eq!(Mode::Sizing.next(), Some(Mode::Populating));
        assert_eq!(Mode::Populating.next(), Some(Mode::Queryable));
        assert_eq!(Mode::Queryable.next(), None);
        assert!(Mode::Inserting < Mode::Queryable);
    }

    #[test]
    fn test_invalid_transitions_leave_state() {
        let mut filter = IndexedBloomFilter::new(128);
        for to in [Mode::Inserting, Mode::Populating, Mode::Queryable] {
            assert_eq!(
                filter.switch(to),
                Err(FilterError::InvalidTransition {
                    from: Mode::Inserting,
                    to
                })
            );
            assert_eq!(filter.mode(), Mode::Inserting);
        }
        filter.switch(Mode::Sizing).unwrap();
        assert!(filter.switch(Mode::Sizing).is_err());
        assert!(filter.switch(Mode::Queryable).is_err());
        filter.switch(Mode::Populating).unwrap();
        filter.switch(Mode::Queryable).unwrap();
        assert!(filter.switch(Mode::Inserting).is_err());
        assert_eq!(filter.mode(), Mode::Queryable);
    }

    #[test]
    fn test_operations_in_wrong_mode() {
        let mut filter = IndexedBloomFilter::new(128);
        assert!(matches!(
            filter.count_hint(&[1]),
            Err(FilterError::WrongMode {
                expected: Mode::Sizing,
                actual: Mode::Inserting
            })
        ));
        assert!(filter.populate(&[1], 0).is_err());
        assert!(filter.query_slot(1).is_err());
        filter.mark(1).unwrap();

        filter.switch(Mode::Sizing).unwrap();
        assert!(matches!(
            filter.mark(2),
            Err(FilterError::WrongMode { .. })
        ));
        // the refused mark did not set anything
        assert!(!filter.test_slot(2));
        assert!(filter.test_slot(1));
    }

    #[test]
    fn test_mark_out_of_range() {
        let filter = IndexedBloomFilter::new(100);
        assert_eq!(
            filter.mark(100),
            Err(FilterError::SlotOutOfRange {
                slot: 100,
                size: 100
            })
        );
        filter.mark(99).unwrap();
        filter.mark(99).unwrap();
        assert_eq!(filter.marked_slots(), 1);
    }

    #[test]
    fn test_query_returns_all_groups() {
        let groups = vec![vec![10, 11, 12], vec![11, 13], vec![12, 13, 14, 10]];
        let filter = build(1 << 20, &groups);

        assert_eq!(groups_of(&filter, 10), vec![0, 2]);
        assert_eq!(groups_of(&filter, 11), vec![0, 1]);
        assert_eq!(groups_of(&filter, 12), vec![0, 2]);
        assert_eq!(groups_of(&filter, 13), vec![1, 2]);
        assert_eq!(groups_of(&filter, 14), vec![2]);
        assert_eq!(filter.posting_len(), 9);
    }

    #[test]
    fn test_absent_kmer_is_empty() {
        let filter = build(1 << 20, &[vec![1, 2, 3]]);
        let absent = (100..200).find(|&c| !filter.contains(c)).unwrap();
        assert_eq!(filter.query(absent).unwrap(), 0..0);
        assert!(filter.lookup(absent).unwrap().is_empty());
    }

    #[test]
    fn test_adjacent_duplicates_collapse() {
        let mut filter = IndexedBloomFilter::new(256);
        filter.mark(5).unwrap();
        filter.mark(9).unwrap();
        filter.switch(Mode::Sizing).unwrap();
        assert_eq!(filter.count_hint(&[5, 5, 5, 9, 9]).unwrap(), 2);
        // unset slots are silently skipped
        assert_eq!(filter.count_hint(&[1, 5]).unwrap(), 1);
        filter.switch(Mode::Populating).unwrap();
        assert_eq!(filter.posting_len(), 3);
        assert_eq!(filter.populate(&[5, 5, 9], 0).unwrap(), 2);
        assert_eq!(filter.populate(&[5], 1).unwrap(), 1);
        filter.switch(Mode::Queryable).unwrap();

        let mut five = filter.lookup_slot_for_test(5);
        five.sort_unstable();
        assert_eq!(five, vec![0, 1]);
        assert_eq!(filter.lookup_slot_for_test(9), vec![0]);
    }

    #[test]
    fn test_unsorted_slots_refused() {
        let mut filter = IndexedBloomFilter::new(256);
        filter.mark(3).unwrap();
        filter.mark(7).unwrap();
        filter.switch(Mode::Sizing).unwrap();
        assert_eq!(
            filter.count_hint(&[7, 3]),
            Err(FilterError::UnsortedSlots { index: 1 })
        );
        filter.count_hint(&[3, 7]).unwrap();
        filter.switch(Mode::Populating).unwrap();
        assert_eq!(filter.posting_len(), 2);
        assert!(filter.populate(&[7, 3], 0).is_err());
    }

    #[test]
    fn test_count_overflow() {
        let mut filter = IndexedBloomFilter::new(64);
        filter.mark(4).unwrap();
        filter.switch(Mode::Sizing).unwrap();
        filter.count_hint(&[4]).unwrap();
        filter.switch(Mode::Populating).unwrap();
        filter.populate(&[4], 0).unwrap();
        assert_eq!(
            filter.populate(&[4], 1),
            Err(FilterError::CountOverflow { slot: 4 })
        );
    }

    #[test]
    fn test_uncounted_slot_dropped() {
        let mut filter = IndexedBloomFilter::new(64);
        filter.mark(4).unwrap();
        filter.mark(8).unwrap();
        filter.switch(Mode::Sizing).unwrap();
        filter.count_hint(&[8]).unwrap();
        filter.switch(Mode::Populating).unwrap();
        assert!(!filter.test_slot(4));
        filter.populate(&[4, 8], 3).unwrap();
        filter.switch(Mode::Queryable).unwrap();
        assert_eq!(filter.query_slot(4).unwrap(), 0..0);
        assert_eq!(filter.lookup_slot_for_test(8), vec![3]);
    }

    #[test]
    fn test_partially_populated_regions_compacted() {
        let mut filter = IndexedBloomFilter::new(64);
        for slot in [1, 2, 3] {
            filter.mark(slot).unwrap();
        }
        filter.switch(Mode::Sizing).unwrap();
        filter.count_hint(&[1, 2, 3]).unwrap();
        filter.count_hint(&[1, 2, 3]).unwrap();
        filter.switch(Mode::Populating).unwrap();
        filter.populate(&[1, 3], 0).unwrap();
        filter.populate(&[3], 1).unwrap();
        filter.switch(Mode::Queryable).unwrap();

        assert_eq!(filter.posting_len(), 3);
        assert_eq!(filter.lookup_slot_for_test(1), vec![0]);
        assert_eq!(filter.query_slot(2).unwrap(), 0..0);
        assert!(!filter.test_slot(2));
        let mut three = filter.lookup_slot_for_test(3);
        three.sort_unstable();
        assert_eq!(three, vec![0, 1]);
    }

    #[test]
    fn test_query_after_long_region() {
        let hot = 1_000_000u32;
        let mut filter = IndexedBloomFilter::new(256);
        for slot in 0..200 {
            filter.mark(slot).unwrap();
        }
        filter.switch(Mode::Sizing).unwrap();
        let all: Vec<u64> = (0..200).collect();
        filter.count_hint(&all).unwrap();
        for _ in 1..hot {
            filter.count_hint(&[1]).unwrap();
        }
        filter.switch(Mode::Populating).unwrap();
        filter.populate(&all, 7).unwrap();
        for _ in 1..hot {
            filter.populate(&[1], 8).unwrap();
        }
        filter.switch(Mode::Queryable).unwrap();

        assert_eq!(filter.posting_len(), hot as usize + 199);
        assert_eq!(filter.query_slot(1).unwrap(), 1..hot as usize + 1);
        for slot in 2..200u64 {
            let range = filter.query_slot(slot).unwrap();
            assert_eq!(range.len(), 1);
            assert_eq!(range.start, hot as usize + slot as usize - 1);
            assert_eq!(filter.postings()[range], [7]);
        }
    }

    #[test]
    fn test_empty_filter() {
        let mut filter = IndexedBloomFilter::new(1000);
        filter.switch(Mode::Sizing).unwrap();
        filter.switch(Mode::Populating).unwrap();
        filter.switch(Mode::Queryable).unwrap();
        assert_eq!(filter.posting_len(), 0);
        assert_eq!(filter.query(42).unwrap(), 0..0);
    }

    #[test]
    fn test_concurrent_population() {
        let encoder = KmerEncoder::new(11).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let seqs: Vec<Vec<u8>> = (0..32)
            .map(|_| (0..300).map(|_| b"ACGT"[rng.random_range(0..4)]).collect())
            .collect();

        let mut filter = IndexedBloomFilter::new(1 << 18);
        for seq in &seqs {
            for kmer in encoder.kmers(seq) {
                filter.insert(kmer.code).unwrap();
            }
        }
        filter.switch(Mode::Sizing).unwrap();
        let lists: Vec<Vec<u64>> = seqs
            .iter()
            .map(|s| {
                let mut slots: Vec<u64> = encoder.slots(s, filter.size(), filter.seed()).collect();
                slots.sort_unstable();
                slots
            })
            .collect();

        std::thread::scope(|scope| {
            for chunk in lists.chunks(8) {
                let filter = &filter;
                scope.spawn(move || {
                    for slots in chunk {
                        filter.count_hint(slots).unwrap();
                    }
                });
            }
        });
        filter.switch(Mode::Populating).unwrap();
        std::thread::scope(|scope| {
            for (t, chunk) in lists.chunks(8).enumerate() {
                let filter = &filter;
                scope.spawn(move || {
                    for (i, slots) in chunk.iter().enumerate() {
                        filter.populate(slots, (t * 8 + i) as GroupId).unwrap();
                    }
                });
            }
        });
        filter.switch(Mode::Queryable).unwrap();

        for (gid, seq) in seqs.iter().enumerate() {
            for kmer in encoder.kmers(seq) {
                let groups = filter.lookup(kmer.code).unwrap();
                assert!(groups.contains(&(gid as GroupId)));
                let distinct: HashSet<_> = groups.iter().collect();
                assert_eq!(distinct.len(), groups.len());
            }
        }
    }

    #[test]
    fn test_false_positive_rate() {
        let size: u64 = 1 << 20;
        let inserted = 10_000usize;
        let mut rng = StdRng::seed_from_u64(99);
        let mask = (1u64 << 42) - 1;

        let filter = IndexedBloomFilter::new(size);
        let mut keys = HashSet::with_capacity(inserted);
        while keys.len() < inserted {
            keys.insert(rng.random::<u64>() & mask);
        }
        for &key in &keys {
            filter.insert(key).unwrap();
        }

        let trials = 100_000;
        let mut false_positives = 0;
        let mut tested = 0;
        while tested < trials {
            let key = rng.random::<u64>() & mask;
            if keys.contains(&key) {
                continue;
            }
            tested += 1;
            if filter.contains(key) {
                false_positives += 1;
            }
        }
        let observed = false_positives as f64 / trials as f64;
        let expected = 1.0 - (-(inserted as f64) / size as f64).exp();
        assert!(
            observed < 2.0 * expected + 0.005,
            "observed {observed}, expected {expected}"
        );
    }

    impl IndexedBloomFilter {
        fn lookup_slot_for_test(&self, slot: u64) -> Vec<GroupId> {
            let range = self.query_slot(slot).unwrap();
            self.postings()[range].to_vec()
        }
    }
}
