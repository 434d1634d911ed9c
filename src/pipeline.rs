//! End-to-end run: build the index, classify reads, flush the sink.

use log::info;

use crate::build::{IndexBuilder, ReferenceIndex};
use crate::classify::ClassifyProcessor;
use crate::io::{OutputSink, SequenceBatcher, SequenceSource};
use crate::parallel::ParallelReader;
use crate::{Config, Fragment, Result, SeqRecord};

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunStats {
    /// Reference records that became groups.
    pub groups: usize,
    pub marked_slots: u64,
    pub postings: usize,
    /// Fragments read.
    pub reads: u64,
    /// Fragments with at least one association.
    pub associated_reads: u64,
    /// Association lines written.
    pub associations: u64,
}

/// Classify every fragment of `reads` into `sink`. Returns the number of
/// fragments read.
pub fn classify_reads<S>(
    index: &ReferenceIndex,
    config: &Config,
    reads: S,
    sink: &OutputSink,
) -> Result<u64>
where
    S: SequenceSource<Item = Fragment> + Send,
{
    let batcher = SequenceBatcher::new(reads, config.batch_size());
    batcher.process_parallel(
        ClassifyProcessor::new(index, config, sink),
        config.threads(),
    )?;
    sink.finish()?;
    Ok(batcher.records_read())
}

/// Build the index from `reference` (opened once per pass) and classify
/// `reads` against it.
pub fn run<F, S, R>(config: &Config, reference: F, reads: R, sink: &OutputSink) -> Result<RunStats>
where
    F: FnMut() -> Result<S>,
    S: SequenceSource<Item = SeqRecord> + Send,
    R: SequenceSource<Item = Fragment> + Send,
{
    let index = IndexBuilder::new(config.clone())?.build(reference)?;
    info!(
        "Index ready: {} groups, {} marked slots, {} postings",
        index.legend().len(),
        index.filter().marked_slots(),
        index.filter().posting_len()
    );

    let reads = classify_reads(&index, config, reads, sink)?;
    let stats = RunStats {
        groups: index.legend().len(),
        marked_slots: index.filter().marked_slots(),
        postings: index.filter().posting_len(),
        reads,
        associated_reads: sink.reads(),
        associations: sink.associations(),
    };
    info!(
        "Associated {} of {} reads ({} associations)",
        stats.associated_reads, stats.reads, stats.associations
    );
    Ok(stats)
}
