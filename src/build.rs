//! Building the index from reference sequences.
//!
//! The reference is read twice:
//!
//! 1. **Marking** ([`Marker`]): every k-mer slot of every record is set. Any
//!    worker, any order.
//! 2. **Sizing** ([`Sizer`]): each record's sorted slot list is computed in
//!    parallel, then committed through an [`OrderedCommit`], whose gate
//!    admits batches strictly by stream position. Inside the gate each
//!    record with at least one valid k-mer receives the next group
//!    identifier and its name is appended to the legend, so identifiers
//!    equal the order of a single-threaded run. Counting happens after the
//!    gate is released since it commutes.
//!
//! The committed slot lists are kept in memory and written into the
//! posting array by a third, order-free parallel step ([`Populator`]).

use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::filter::GroupId;
use crate::io::{FastxReader, SequenceBatcher, SequenceSource, VecSource};
use crate::kmer::KmerEncoder;
use crate::parallel::{BatchInfo, ParallelProcessor, ParallelReader};
use crate::{Config, IndexedBloomFilter, Legend, Mode, Result, SeqRecord, Sequencer};

/// Sorted, deduplicated slots of one reference record and its group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotList {
    pub group: GroupId,
    pub slots: Vec<u64>,
}

/// Sorted and deduplicated slots of every k-mer in `seq`.
pub fn sorted_slots(encoder: &KmerEncoder, filter: &IndexedBloomFilter, seq: &[u8]) -> Vec<u64> {
    let mut slots: Vec<u64> = encoder.slots(seq, filter.size(), filter.seed()).collect();
    slots.sort_unstable();
    slots.dedup();
    slots
}

/// Marking-pass worker: sets the slot of every k-mer.
#[derive(Clone)]
pub struct Marker<'a> {
    filter: &'a IndexedBloomFilter,
    encoder: KmerEncoder,
}

impl<'a> Marker<'a> {
    pub fn new(filter: &'a IndexedBloomFilter, encoder: KmerEncoder) -> Self {
        Self { filter, encoder }
    }
}

impl ParallelProcessor<SeqRecord> for Marker<'_> {
    fn process_record(&mut self, record: SeqRecord) -> Result<()> {
        for slot in self
            .encoder
            .slots(&record.seq, self.filter.size(), self.filter.seed())
        {
            self.filter.mark(slot)?;
        }
        Ok(())
    }
}

/// State shared by every [`Sizer`] of one sizing pass.
#[derive(Default)]
pub struct OrderedCommit {
    gate: Sequencer,
    legend: Mutex<Legend>,
    committed: Mutex<Vec<SlotList>>,
    skipped: AtomicU64,
}

impl OrderedCommit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference records without a single valid k-mer.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn into_parts(self) -> (Legend, Vec<SlotList>) {
        (self.legend.into_inner(), self.committed.into_inner())
    }
}

/// Sizing-pass worker.
///
/// Records of a batch are staged in stream order; the batch is committed
/// once its turn at the gate comes up.
#[derive(Clone)]
pub struct Sizer<'a> {
    filter: &'a IndexedBloomFilter,
    encoder: KmerEncoder,
    commit: &'a OrderedCommit,
    pending: Vec<(String, Vec<u64>)>,
}

impl<'a> Sizer<'a> {
    pub fn new(filter: &'a IndexedBloomFilter, encoder: KmerEncoder, commit: &'a OrderedCommit) -> Self {
        Self {
            filter,
            encoder,
            commit,
            pending: Vec::new(),
        }
    }
}

impl ParallelProcessor<SeqRecord> for Sizer<'_> {
    fn process_record(&mut self, record: SeqRecord) -> Result<()> {
        let slots = sorted_slots(&self.encoder, self.filter, &record.seq);
        self.pending.push((record.id, slots));
        Ok(())
    }

    fn on_batch_complete(&mut self, batch: BatchInfo) -> Result<()> {
        debug_assert_eq!(self.pending.len(), batch.len);
        let turn = self.commit.gate.enter(batch.base)?;
        let mut lists = Vec::with_capacity(self.pending.len());
        {
            let mut legend = self.commit.legend.lock();
            for (name, slots) in self.pending.drain(..) {
                if slots.is_empty() {
                    debug!("Reference record {name} has no valid k-mer");
                    self.commit.skipped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                let group = legend.push(name);
                lists.push(SlotList { group, slots });
            }
        }
        turn.finish(batch.end());

        for list in &lists {
            self.filter.count_hint(&list.slots)?;
        }
        self.commit.committed.lock().extend(lists);
        Ok(())
    }

    fn on_abort(&mut self) {
        self.commit.gate.abort();
    }
}

/// Population worker: writes each committed group into its slots' regions.
#[derive(Clone)]
pub struct Populator<'a> {
    filter: &'a IndexedBloomFilter,
}

impl<'a> Populator<'a> {
    pub fn new(filter: &'a IndexedBloomFilter) -> Self {
        Self { filter }
    }
}

impl ParallelProcessor<SlotList> for Populator<'_> {
    fn process_record(&mut self, list: SlotList) -> Result<()> {
        self.filter.populate(&list.slots, list.group)?;
        Ok(())
    }
}

/// A queryable filter together with the names of its groups.
pub struct ReferenceIndex {
    filter: IndexedBloomFilter,
    legend: Legend,
    encoder: KmerEncoder,
}

impl ReferenceIndex {
    pub fn filter(&self) -> &IndexedBloomFilter {
        &self.filter
    }

    pub fn legend(&self) -> &Legend {
        &self.legend
    }

    pub fn encoder(&self) -> KmerEncoder {
        self.encoder
    }

    /// Groups attached to the slot of a canonical k-mer code.
    pub fn groups(&self, code: u64) -> Result<&[GroupId]> {
        Ok(self.filter.lookup(code)?)
    }
}

/// Builds a [`ReferenceIndex`] with a pool of workers.
///
/// # Examples
///
/// ```rust
/// use shark::{Config, IndexBuilder, SeqRecord};
///
/// # fn main() -> shark::Result<()> {
/// let config = Config::default().with_k(4).with_filter_size(1 << 16);
/// let index = IndexBuilder::new(config)?.build_from_records(vec![
///     SeqRecord::new("g1", "ACGTACGTACGT"),
///     SeqRecord::new("g2", "TTTTAAAACCCC"),
/// ])?;
///
/// assert_eq!(index.legend().names(), &["g1", "g2"]);
/// let acgt = shark::kmer::canonical(shark::kmer::encode(b"ACGT").unwrap(), 4);
/// assert!(index.groups(acgt)?.contains(&0));
/// # Ok(())
/// # }
/// ```
pub struct IndexBuilder {
    config: Config,
}

impl IndexBuilder {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build from a source that can be opened twice.
    pub fn build<F, S>(&self, mut open: F) -> Result<ReferenceIndex>
    where
        F: FnMut() -> Result<S>,
        S: SequenceSource<Item = SeqRecord> + Send,
    {
        let encoder = self.config.encoder()?;
        let threads = self.config.threads();
        let batch_size = self.config.batch_size();
        let mut filter =
            IndexedBloomFilter::with_seed(self.config.filter_size(), self.config.seed());

        let batcher = SequenceBatcher::new(open()?, batch_size);
        batcher.process_parallel(Marker::new(&filter, encoder), threads)?;
        info!(
            "Marked {} slots from {} reference records",
            filter.marked_slots(),
            batcher.records_read()
        );
        filter.switch(Mode::Sizing)?;

        let commit = OrderedCommit::new();
        let batcher = SequenceBatcher::new(open()?, batch_size);
        batcher.process_parallel(Sizer::new(&filter, encoder, &commit), threads)?;
        if commit.skipped() > 0 {
            warn!(
                "Skipped {} reference records without a valid {}-mer",
                commit.skipped(),
                encoder.k()
            );
        }
        let (legend, lists) = commit.into_parts();

        filter.switch(Mode::Populating)?;
        info!(
            "Indexed {} groups over {} posting cells",
            legend.len(),
            filter.posting_len()
        );
        SequenceBatcher::new(VecSource::new(lists), batch_size)
            .process_parallel(Populator::new(&filter), threads)?;
        filter.switch(Mode::Queryable)?;

        Ok(ReferenceIndex {
            filter,
            legend,
            encoder,
        })
    }

    /// Build from a (possibly compressed) FASTA file.
    pub fn build_from_path<P: AsRef<std::path::Path>>(&self, path: P) -> Result<ReferenceIndex> {
        self.build(|| FastxReader::from_path(path.as_ref()))
    }

    /// Build from records held in memory.
    pub fn build_from_records(&self, records: Vec<SeqRecord>) -> Result<ReferenceIndex> {
        self.build(|| Ok(VecSource::new(records.clone())))
    }
}
