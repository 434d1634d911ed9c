use parking_lot::Mutex;

use crate::io::SequenceSource;
use crate::Result;

/// Records per batch when none is configured.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// A run of consecutive records and the stream position of the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    pub base: u64,
    pub records: Vec<T>,
}

impl<T> Batch<T> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stream position one past the last record.
    pub fn end(&self) -> u64 {
        self.base + self.records.len() as u64
    }
}

struct Shared<S> {
    source: S,
    next_index: u64,
    exhausted: bool,
}

/// Hands out batches of a single [`SequenceSource`] to many workers.
///
/// Calls to [`next_batch`](Self::next_batch) are serialized. Base indices
/// are strictly increasing and gapless over the life of the batcher, and an
/// empty batch means the source is exhausted.
///
/// # Examples
///
/// ```rust
/// use shark::{SeqRecord, SequenceBatcher, VecSource};
///
/// # fn main() -> shark::Result<()> {
/// let source: VecSource<_> = (0..5).map(|i| SeqRecord::new(format!("r{i}"), "ACGT")).collect();
/// let batcher = SequenceBatcher::new(source, 2);
///
/// let first = batcher.next_batch(2)?;
/// let second = batcher.next_batch(2)?;
/// let third = batcher.next_batch(2)?;
/// assert_eq!((first.base, second.base, third.base), (0, 2, 4));
/// assert_eq!(third.len(), 1);
/// assert!(batcher.next_batch(2)?.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct SequenceBatcher<S: SequenceSource> {
    shared: Mutex<Shared<S>>,
    batch_size: usize,
}

impl<S: SequenceSource> SequenceBatcher<S> {
    /// `batch_size` is the default for [`fill`](Self::fill); zero is raised to one.
    pub fn new(source: S, batch_size: usize) -> Self {
        Self {
            shared: Mutex::new(Shared {
                source,
                next_index: 0,
                exhausted: false,
            }),
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Pull up to `max_n` records.
    ///
    /// A source error ends the stream for every worker: the failing call
    /// returns it and later calls get empty batches.
    pub fn next_batch(&self, max_n: usize) -> Result<Batch<S::Item>> {
        let mut shared = self.shared.lock();
        let base = shared.next_index;
        let mut records = Vec::with_capacity(max_n.min(self.batch_size));
        while !shared.exhausted && records.len() < max_n {
            match shared.source.next_item() {
                Ok(Some(record)) => records.push(record),
                Ok(None) => shared.exhausted = true,
                Err(e) => {
                    shared.exhausted = true;
                    return Err(e);
                }
            }
        }
        shared.next_index += records.len() as u64;
        Ok(Batch { base, records })
    }

    /// Pull a batch of the configured size.
    pub fn fill(&self) -> Result<Batch<S::Item>> {
        self.next_batch(self.batch_size)
    }

    /// Records handed out so far.
    pub fn records_read(&self) -> u64 {
        self.shared.lock().next_index
    }
}
