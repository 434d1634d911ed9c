//! K-mer encoding: 2-bit packing, rolling reverse complement, canonicalization
//! and slot hashing.
//!
//! Codes are **LSB-aligned**: a k-mer occupies the lower `2k` bits of a `u64`
//! with the first base in the most significant position (A=00, C=01, G=10,
//! T=11). Only `k` in `1..=31` is supported.

use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::{Result, SharkError};

/// Largest supported k-mer length.
pub const MAX_K: usize = 31;

const X: u8 = 0xFF;

/// 256-entry LUT: ASCII -> 2-bit code, `0xFF` for anything that is not ACGT.
pub static BASE_LUT: [u8; 256] = {
    let mut t = [X; 256];
    t[b'A' as usize] = 0;
    t[b'a' as usize] = 0;
    t[b'C' as usize] = 1;
    t[b'c' as usize] = 1;
    t[b'G' as usize] = 2;
    t[b'g' as usize] = 2;
    t[b'T' as usize] = 3;
    t[b't' as usize] = 3;
    t
};

const DECODE: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// 2-bit code of a base, `None` if it is not one of ACGT (either case).
#[inline]
pub fn encode_base(b: u8) -> Option<u8> {
    let v = BASE_LUT[b as usize];
    if v <= 3 {
        Some(v)
    } else {
        None
    }
}

/// Number of ACGT bases in `seq`.
pub fn valid_bases(seq: &[u8]) -> usize {
    seq.iter().filter(|&&b| BASE_LUT[b as usize] <= 3).count()
}

/// Encode a whole window. `None` if it is empty, longer than [`MAX_K`] or
/// contains an ambiguous base.
#[inline]
pub fn encode(window: &[u8]) -> Option<u64> {
    if window.is_empty() || window.len() > MAX_K {
        return None;
    }
    let mut code = 0u64;
    for &b in window {
        code = (code << 2) | u64::from(encode_base(b)?);
    }
    Some(code)
}

/// Decode the lower `2k` bits of `code` back to uppercase nucleotides.
pub fn decode(code: u64, k: usize) -> Vec<u8> {
    (0..k)
        .rev()
        .map(|i| DECODE[((code >> (2 * i)) & 0b11) as usize])
        .collect()
}

/// Reverse complement of an LSB-aligned code.
#[inline]
pub fn revcomp(code: u64, k: usize) -> u64 {
    debug_assert!(k <= MAX_K);
    let mut rc = 0u64;
    for i in 0..k {
        let base = (code >> (2 * i)) & 0b11;
        rc = (rc << 2) | (base ^ 0b11);
    }
    rc
}

/// Strand-independent key: the smaller of a code and its reverse complement.
#[inline]
pub fn canonical(code: u64, k: usize) -> u64 {
    code.min(revcomp(code, k))
}

/// Slot of a canonical code in a bit array of `size` bits.
#[inline]
pub fn slot_of(code: u64, size: u64, seed: u64) -> u64 {
    xxh3_64_with_seed(&code.to_le_bytes(), seed) % size
}

/// A canonical k-mer together with the 0-based start of its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kmer {
    pub pos: usize,
    pub code: u64,
}

/// Produces canonical k-mer codes for sequences with a fixed `k`.
///
/// # Examples
///
/// ```rust
/// use shark::KmerEncoder;
///
/// # fn main() -> shark::Result<()> {
/// let encoder = KmerEncoder::new(3)?;
/// // The N breaks the window: only ACG and TTT survive.
/// let kmers: Vec<_> = encoder.kmers(b"ACGNTTT").collect();
/// assert_eq!(kmers.len(), 2);
/// assert_eq!(kmers[0].pos, 0);
/// assert_eq!(kmers[1].pos, 4);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmerEncoder {
    k: usize,
}

impl KmerEncoder {
    pub fn new(k: usize) -> Result<Self> {
        if k == 0 || k > MAX_K {
            return Err(SharkError::InvalidKmerSize(k));
        }
        Ok(Self { k })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Lazily iterate the canonical k-mers of `seq`. Calling this again on
    /// the same sequence restarts from the beginning.
    pub fn kmers<'a>(&self, seq: &'a [u8]) -> KmerIter<'a> {
        KmerIter::new(seq, self.k)
    }

    /// Hash every canonical k-mer of `seq` to its slot.
    pub fn slots<'a>(
        &self,
        seq: &'a [u8],
        size: u64,
        seed: u64,
    ) -> impl Iterator<Item = u64> + 'a {
        self.kmers(seq).map(move |kmer| slot_of(kmer.code, size, seed))
    }
}

/// Rolling canonical k-mer iterator, see [`KmerEncoder::kmers`].
///
/// Each base costs O(1): the forward window is shifted left and appended to,
/// the reverse-complement window is shifted right and prepended to. An
/// ambiguous base empties both windows and the next `k` valid bases rebuild
/// them.
#[derive(Debug, Clone)]
pub struct KmerIter<'a> {
    seq: &'a [u8],
    k: usize,
    mask: u64,
    shift: usize,
    idx: usize,
    fwd: u64,
    rc: u64,
    len: usize,
}

impl<'a> KmerIter<'a> {
    fn new(seq: &'a [u8], k: usize) -> Self {
        Self {
            seq,
            k,
            mask: (1u64 << (2 * k)) - 1,
            shift: 2 * (k - 1),
            idx: 0,
            fwd: 0,
            rc: 0,
            len: 0,
        }
    }
}

impl Iterator for KmerIter<'_> {
    type Item = Kmer;

    fn next(&mut self) -> Option<Kmer> {
        while self.idx < self.seq.len() {
            let b = self.seq[self.idx];
            self.idx += 1;

            let Some(v) = encode_base(b) else {
                self.fwd = 0;
                self.rc = 0;
                self.len = 0;
                continue;
            };
            let v = u64::from(v);
            self.fwd = ((self.fwd << 2) | v) & self.mask;
            self.rc = (self.rc >> 2) | ((v ^ 0b11) << self.shift);
            self.len += 1;

            if self.len >= self.k {
                return Some(Kmer {
                    pos: self.idx - self.k,
                    code: self.fwd.min(self.rc),
                });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.seq.len() - self.idx;
        let upper = (remaining + self.len.min(self.k - 1)).saturating_sub(self.k - 1);
        (0, Some(upper))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_seq(rng: &mut StdRng, len: usize) -> Vec<u8> {
        (0..len).map(|_| DECODE[rng.random_range(0..4)]).collect()
    }

    fn reverse_complement(seq: &[u8]) -> Vec<u8> {
        seq.iter()
            .rev()
            .map(|&b| match b {
                b'A' => b'T',
                b'C' => b'G',
                b'G' => b'C',
                b'T' => b'A',
                other => other,
            })
            .collect()
    }

    #[test]
    fn test_encode_revcomp_canonical() {
        let code = encode(b"AC").unwrap();
        assert_eq!(code, 0b0001);
        // revcomp(AC) = GT
        assert_eq!(revcomp(code, 2), 0b1011);
        assert_eq!(canonical(code, 2), 0b0001);
        assert_eq!(canonical(0b1011, 2), 0b0001);
    }

    #[test]
    fn test_encode_rejects() {
        assert_eq!(encode(b""), None);
        assert_eq!(encode(b"ACGN"), None);
        assert_eq!(encode(&[b'A'; 32]), None);
        assert!(encode(&[b'T'; 31]).is_some());
    }

    #[test]
    fn test_encoder_rejects_k() {
        assert!(matches!(
            KmerEncoder::new(0),
            Err(SharkError::InvalidKmerSize(0))
        ));
        assert!(matches!(
            KmerEncoder::new(32),
            Err(SharkError::InvalidKmerSize(32))
        ));
        assert!(KmerEncoder::new(31).is_ok());
    }

    #[test]
    fn test_decode_round_trip_all_k() {
        let mut rng = StdRng::seed_from_u64(7);
        for k in 1..=MAX_K {
            let window = random_seq(&mut rng, k);
            let lower = window.to_ascii_lowercase();
            assert_eq!(decode(encode(&window).unwrap(), k), window);
            assert_eq!(decode(encode(&lower).unwrap(), k), window);
        }
    }

    #[test]
    fn test_canonical_strand_independent() {
        let mut rng = StdRng::seed_from_u64(11);
        for k in 1..=MAX_K {
            for _ in 0..20 {
                let window = random_seq(&mut rng, k);
                let rc = reverse_complement(&window);
                let a = canonical(encode(&window).unwrap(), k);
                let b = canonical(encode(&rc).unwrap(), k);
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn test_rolling_matches_window_encoding() {
        let mut rng = StdRng::seed_from_u64(13);
        for k in [1, 4, 17, 31] {
            let mut seq = random_seq(&mut rng, 200);
            seq[50] = b'N';
            seq[51] = b'n';
            seq[120] = b'R';
            let encoder = KmerEncoder::new(k).unwrap();

            let expected: Vec<Kmer> = seq
                .windows(k)
                .enumerate()
                .filter_map(|(pos, w)| {
                    encode(w).map(|code| Kmer {
                        pos,
                        code: canonical(code, k),
                    })
                })
                .collect();
            let rolled: Vec<Kmer> = encoder.kmers(&seq).collect();
            assert_eq!(rolled, expected, "k = {k}");
        }
    }

    #[test]
    fn test_rolling_reverse_strand() {
        let mut rng = StdRng::seed_from_u64(17);
        let seq = random_seq(&mut rng, 100);
        let rc = reverse_complement(&seq);
        let encoder = KmerEncoder::new(9).unwrap();

        let mut fwd: Vec<u64> = encoder.kmers(&seq).map(|k| k.code).collect();
        let mut rev: Vec<u64> = encoder.kmers(&rc).map(|k| k.code).collect();
        fwd.sort_unstable();
        rev.sort_unstable();
        assert_eq!(fwd, rev);
    }

    #[test]
    fn test_short_and_ambiguous_sequences() {
        let encoder = KmerEncoder::new(5).unwrap();
        assert_eq!(encoder.kmers(b"").count(), 0);
        assert_eq!(encoder.kmers(b"ACGT").count(), 0);
        assert_eq!(encoder.kmers(b"NNNNNNNN").count(), 0);
        assert_eq!(encoder.kmers(b"ACGTNACGTN").count(), 0);
        assert_eq!(encoder.kmers(b"ACGTA").count(), 1);
    }

    #[test]
    fn test_iterator_restartable() {
        let encoder = KmerEncoder::new(4).unwrap();
        let seq = b"ACGTACGTACGT";
        let first: Vec<_> = encoder.kmers(seq).collect();
        let second: Vec<_> = encoder.kmers(seq).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), seq.len() - 3);
    }

    #[test]
    fn test_size_hint_upper_bound() {
        let encoder = KmerEncoder::new(4).unwrap();
        let mut iter = encoder.kmers(b"ACGTACGTAC");
        let (_, upper) = iter.size_hint();
        assert_eq!(upper, Some(7));
        iter.next();
        let (_, upper) = iter.size_hint();
        assert_eq!(upper, Some(6));
    }

    #[test]
    fn test_valid_bases() {
        assert_eq!(valid_bases(b"ACGTNacgtn"), 8);
        assert_eq!(valid_bases(b""), 0);
    }

    #[test]
    fn test_slot_in_range() {
        let encoder = KmerEncoder::new(11).unwrap();
        let seq = b"ACGTTGCAACGTAGCTAGCTAGGATCGATCGA";
        for slot in encoder.slots(seq, 1000, 42) {
            assert!(slot < 1000);
        }
    }
}
