//! Run configuration.

use crate::io::DEFAULT_BATCH_SIZE;
use crate::kmer::{KmerEncoder, MAX_K};
use crate::{Result, SharkError};

/// Default k-mer length.
pub const DEFAULT_K: usize = 17;

/// Number of bits in one GiB of filter.
pub const GIB_BITS: u64 = 1 << 33;

/// Default share of a read's valid bases that must be covered.
pub const DEFAULT_CONFIDENCE: f64 = 0.6;

/// All tunables of a run.
///
/// # Examples
///
/// ```rust
/// use shark::Config;
///
/// # fn main() -> shark::Result<()> {
/// let config = Config::default()
///     .with_k(21)
///     .with_confidence(0.8)
///     .with_threads(4)
///     .with_single(true);
/// config.validate()?;
/// assert_eq!(config.k(), 21);
/// assert_eq!(config.filter_size(), 1 << 33);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct Config {
    k: usize,
    filter_size: u64,
    confidence: f64,
    single: bool,
    threads: usize,
    min_quality: u8,
    batch_size: usize,
    seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            filter_size: GIB_BITS,
            confidence: DEFAULT_CONFIDENCE,
            single: false,
            threads: 1,
            min_quality: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            seed: 0,
        }
    }
}

impl Config {
    /// K-mer length, 1 to 31.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }
    /// Size of the filter bit array.
    pub fn with_filter_size(mut self, bits: u64) -> Self {
        self.filter_size = bits;
        self
    }
    /// Required coverage as a fraction of a read's valid bases.
    pub fn with_confidence(mut self, c: f64) -> Self {
        self.confidence = c;
        self
    }
    /// Only report reads that resolve to exactly one group identifier.
    pub fn with_single(mut self, yes: bool) -> Self {
        self.single = yes;
        self
    }
    /// Worker threads; zero uses every core.
    pub fn with_threads(mut self, n: usize) -> Self {
        self.threads = n;
        self
    }
    /// Phred cutoff below which bases are masked; zero disables masking.
    pub fn with_min_quality(mut self, q: u8) -> Self {
        self.min_quality = q;
        self
    }
    /// Records per batch handed to a worker.
    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }
    /// Seed of the slot hash.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }
    pub fn filter_size(&self) -> u64 {
        self.filter_size
    }
    pub fn confidence(&self) -> f64 {
        self.confidence
    }
    pub fn single(&self) -> bool {
        self.single
    }
    pub fn threads(&self) -> usize {
        self.threads
    }
    pub fn min_quality(&self) -> u8 {
        self.min_quality
    }
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn validate(&self) -> Result<()> {
        if self.k == 0 || self.k > MAX_K {
            return Err(SharkError::InvalidKmerSize(self.k));
        }
        if self.filter_size == 0 {
            return Err(SharkError::InvalidConfig(
                "filter size must be at least one bit".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(SharkError::InvalidConfig(format!(
                "confidence must be within [0, 1], got {}",
                self.confidence
            )));
        }
        if self.batch_size == 0 {
            return Err(SharkError::InvalidConfig(
                "batch size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Encoder for the configured k.
    pub fn encoder(&self) -> Result<KmerEncoder> {
        KmerEncoder::new(self.k)
    }
}
