//! Rank and select over fixed-length bit vectors.
//!
//! Both types wrap a [`simple_sds`] [`BitVector`]. [`RankBitVector`] enables
//! rank support only; [`SelectBitVector`] enables select support only. Both
//! answer in constant time regardless of how the set bits are distributed.

use simple_sds::bit_vector::BitVector;
use simple_sds::ops::{BitVec, Rank, Select};
use simple_sds::raw_vector::{AccessRaw, RawVector};

fn raw_from_positions<I: IntoIterator<Item = u64>>(len: u64, positions: I) -> RawVector {
    let mut raw = RawVector::with_len(len as usize, false);
    for pos in positions {
        debug_assert!(pos < len);
        raw.set_bit(pos as usize, true);
    }
    raw
}

/// Set positions of `len` bits packed little-endian into `words`.
fn word_ones(words: &[u64], len: u64) -> impl Iterator<Item = u64> + '_ {
    words
        .iter()
        .enumerate()
        .flat_map(|(wi, &w)| {
            let mut word = w;
            std::iter::from_fn(move || {
                if word == 0 {
                    return None;
                }
                let tz = u64::from(word.trailing_zeros());
                word &= word - 1;
                Some(wi as u64 * 64 + tz)
            })
        })
        .take_while(move |&pos| pos < len)
}

/// Fixed-length bit vector with rank support.
#[derive(Debug, Clone)]
pub struct RankBitVector {
    bv: BitVector,
}

impl Default for RankBitVector {
    fn default() -> Self {
        Self::from_positions(0, std::iter::empty())
    }
}

impl RankBitVector {
    /// Build a vector of `len` bits with the given positions set.
    pub fn from_positions<I: IntoIterator<Item = u64>>(len: u64, positions: I) -> Self {
        let mut bv = BitVector::from(raw_from_positions(len, positions));
        bv.enable_rank();
        Self { bv }
    }

    /// Wrap `words` holding `len` bits.
    pub fn from_words(words: Vec<u64>, len: u64) -> Self {
        Self::from_positions(len, word_ones(&words, len))
    }

    pub fn len(&self) -> u64 {
        self.bv.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of set bits.
    pub fn ones(&self) -> u64 {
        self.bv.count_ones() as u64
    }

    #[inline]
    pub fn get(&self, i: u64) -> bool {
        i < self.len() && self.bv.get(i as usize)
    }

    /// Number of set bits strictly before position `i`.
    #[inline]
    pub fn rank(&self, i: u64) -> u64 {
        if i >= self.len() {
            return self.ones();
        }
        self.bv.rank(i as usize) as u64
    }

    /// Positions of all set bits, ascending.
    pub fn iter_ones(&self) -> impl Iterator<Item = u64> + '_ {
        self.bv.one_iter().map(|(_, pos)| pos as u64)
    }

    /// Keep only the set bits whose rank satisfies `keep`.
    pub fn retain_ranks<F: FnMut(u64) -> bool>(&self, mut keep: F) -> Self {
        let kept = self
            .bv
            .one_iter()
            .filter(|&(rank, _)| keep(rank as u64))
            .map(|(_, pos)| pos as u64);
        Self::from_positions(self.len(), kept)
    }
}

/// Fixed-length bit vector with select support.
#[derive(Debug, Clone)]
pub struct SelectBitVector {
    bv: BitVector,
}

impl Default for SelectBitVector {
    fn default() -> Self {
        Self::from_positions(0, std::iter::empty())
    }
}

impl SelectBitVector {
    /// Build a vector of `len` bits with the given positions set.
    pub fn from_positions<I: IntoIterator<Item = u64>>(len: u64, positions: I) -> Self {
        let mut bv = BitVector::from(raw_from_positions(len, positions));
        bv.enable_select();
        Self { bv }
    }

    pub fn len(&self) -> u64 {
        self.bv.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ones(&self) -> u64 {
        self.bv.count_ones() as u64
    }

    #[inline]
    pub fn get(&self, i: u64) -> bool {
        i < self.len() && self.bv.get(i as usize)
    }

    /// Position of the `r`-th (0-based) set bit, `None` if there are not
    /// that many.
    #[inline]
    pub fn select(&self, r: u64) -> Option<u64> {
        if r >= self.ones() {
            return None;
        }
        self.bv.select(r as usize).map(|pos| pos as u64)
    }
}
