//! # shark - Mapping-free association of reads to reference groups
//!
//! `shark` assigns sequencing reads to the reference groups (genes,
//! transcripts) whose k-mers cover them best, without aligning anything.
//! Reference k-mers go into an [`IndexedBloomFilter`]: a Bloom filter bit
//! array extended with a flat array of group identifiers per set bit,
//! addressed through rank over the bit array and select over a boundary
//! vector.
//!
//! ## Building the index
//!
//! The filter moves through four phases, each entered with
//! [`IndexedBloomFilter::switch`] and never left:
//!
//! 1. [`Mode::Inserting`]: slots of every reference k-mer are marked.
//! 2. [`Mode::Sizing`]: each group announces its slots so every set bit
//!    learns how many identifiers it will hold.
//! 3. [`Mode::Populating`]: the posting array is allocated and each group
//!    writes its identifier into its slots' regions.
//! 4. [`Mode::Queryable`]: read-only; a k-mer yields a range of group ids.
//!
//! [`IndexBuilder`] drives these phases over a reference read twice, with a
//! worker pool. Group identifiers follow reference order regardless of the
//! number of workers.
//!
//! ```rust
//! use shark::{Config, IndexBuilder, SeqRecord};
//!
//! # fn main() -> shark::Result<()> {
//! let config = Config::default().with_k(4).with_filter_size(1 << 16);
//! let index = IndexBuilder::new(config)?.build_from_records(vec![
//!     SeqRecord::new("g1", "ACGTACGTACGT"),
//!     SeqRecord::new("g2", "TTTTAAAACCCC"),
//! ])?;
//! assert_eq!(index.legend().len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Classifying reads
//!
//! A [`Classifier`] accumulates, per group, the bases of a read covered by
//! the group's k-mers and reports the best-covered groups when they cover
//! enough of the read. [`run`] chains both stages and writes one
//! `read_id<TAB>group_name` line per association:
//!
//! ```rust,no_run
//! use shark::{run, Config, FastxReader, OutputSink, PairedSource};
//!
//! # fn main() -> shark::Result<()> {
//! let config = Config::default().with_threads(0).with_confidence(0.6);
//! let reads = PairedSource::paired(
//!     FastxReader::from_path("reads_1.fq.gz")?,
//!     FastxReader::from_path("reads_2.fq.gz")?,
//! );
//! let sink = OutputSink::new(Box::new(std::io::stdout()));
//! let stats = run(
//!     &config,
//!     || FastxReader::from_path("transcripts.fa"),
//!     reads,
//!     &sink,
//! )?;
//! println!("{} reads associated", stats.associated_reads);
//! # Ok(())
//! # }
//! ```
//!
//! ## Parallel processing
//!
//! Every stage runs on the same pool abstraction: a [`SequenceBatcher`]
//! hands out gapless batches and a [`ParallelProcessor`] clone per worker
//! consumes them. Stages that must commit in stream order go through a
//! [`Sequencer`].
//!
//! ## Error Handling
//!
//! Fallible operations return [`Result<T, SharkError>`](SharkError). Phase
//! violations on the filter are refused with a [`FilterError`] and leave it
//! untouched:
//!
//! ```rust
//! use shark::{FilterError, IndexedBloomFilter, Mode};
//!
//! let filter = IndexedBloomFilter::new(1024);
//! match filter.populate(&[1, 2, 3], 0) {
//!     Err(FilterError::WrongMode { expected, actual }) => {
//!         assert_eq!(expected, Mode::Populating);
//!         assert_eq!(actual, Mode::Inserting);
//!     }
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

mod build;
mod classify;
mod config;
mod constructs;
mod error;
mod filter;
mod io;
pub mod kmer;
mod logging;
mod parallel;
mod pipeline;
mod sequencer;

pub use build::{IndexBuilder, Marker, OrderedCommit, Populator, ReferenceIndex, Sizer, SlotList};
pub use classify::{Classification, Classifier, ClassifyProcessor};
pub use config::{Config, DEFAULT_CONFIDENCE, DEFAULT_K, GIB_BITS};
pub use constructs::{Fragment, GroupList, Legend, SeqRecord, INLINE_CAPACITY, PHRED_OFFSET};
pub use error::{FilterError, IntoSharkError, Result, SharkError};
pub use filter::bits::{RankBitVector, SelectBitVector};
pub use filter::{GroupId, IndexedBloomFilter, Mode};
pub use io::{
    AssociationWriter, Batch, BoxedReader, BoxedWriter, FastxReader, LocalOutput, OutputSink,
    PairedSource, SequenceBatcher, SequenceSource, VecSource, DEFAULT_BATCH_SIZE,
};
pub use kmer::{Kmer, KmerEncoder, KmerIter, MAX_K};
pub use logging::init_logger;
pub use parallel::{resolve_threads, BatchInfo, ParallelProcessor, ParallelReader};
pub use pipeline::{classify_reads, run, RunStats};
pub use sequencer::{Sequencer, Turn};
