//! Error handling for the shark library.
//!
//! Two layers of errors exist. [`FilterError`] describes precondition
//! violations on the [`IndexedBloomFilter`](crate::IndexedBloomFilter): an
//! operation called in the wrong [`Mode`], an illegal phase transition, or an
//! inconsistent population. These are recoverable; the filter refuses the
//! operation and stays in its current state. [`SharkError`] covers everything
//! that terminates a run: I/O and parsing failures, invalid configuration,
//! allocation failure of the posting array and worker failures.

use std::error::Error as StdError;
use thiserror::Error;

use crate::Mode;

/// A specialized `Result` type for shark operations.
pub type Result<T> = std::result::Result<T, SharkError>;

/// Precondition violations reported by the indexed Bloom filter.
///
/// # Examples
///
/// ```rust
/// use shark::{FilterError, IndexedBloomFilter, Mode};
///
/// let mut filter = IndexedBloomFilter::new(1024);
/// // Populating is two steps away from Inserting.
/// let err = filter.switch(Mode::Populating).unwrap_err();
/// assert!(matches!(err, FilterError::InvalidTransition { .. }));
/// assert_eq!(filter.mode(), Mode::Inserting);
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// `switch` was asked for anything other than the next phase.
    #[error("Invalid phase transition from {from:?} to {to:?}")]
    InvalidTransition { from: Mode, to: Mode },

    /// An operation was called outside of the phase it is valid in.
    #[error("Operation requires phase {expected:?} but filter is in {actual:?}")]
    WrongMode { expected: Mode, actual: Mode },

    /// A slot outside of the bit array.
    #[error("Slot {slot} is out of range for a filter of {size} bits")]
    SlotOutOfRange { slot: u64, size: u64 },

    /// A slot list handed to `count_hint` or `populate` was not in
    /// non-decreasing order.
    #[error("Slot list is not sorted at index {index}")]
    UnsortedSlots { index: usize },

    /// A slot received more group identifiers than were announced for it
    /// during sizing.
    #[error("Slot {slot} received more identifiers than were counted for it")]
    CountOverflow { slot: u64 },

    /// The posting-list array could not be allocated.
    #[error("Unable to allocate a posting array of {cells} cells")]
    Allocation { cells: usize },
}

/// Error types for shark operations.
///
/// # Examples
///
/// ```rust
/// use shark::{Config, SharkError};
///
/// let config = Config::default().with_k(40);
/// match config.validate() {
///     Err(SharkError::InvalidKmerSize(k)) => assert_eq!(k, 40),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum SharkError {
    /// I/O error from an underlying reader or writer.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// Compression/decompression error from niffler.
    #[cfg(feature = "niffler")]
    #[error("Niffler error")]
    Niffler(#[from] niffler::Error),

    /// Malformed FASTA input.
    #[error("FASTA parsing error")]
    Fasta(#[from] seq_io::fasta::Error),

    /// Malformed FASTQ input.
    #[error("FASTQ parsing error")]
    Fastq(#[from] seq_io::fastq::Error),

    /// Input that starts with neither `>` nor `@`.
    #[error("Unrecognized sequence format: input starts with byte {0:#04x}")]
    UnrecognizedFormat(u8),

    /// A record identifier that is not valid UTF-8.
    #[error("Invalid UTF-8 in record identifier")]
    Utf8(#[from] std::str::Utf8Error),

    /// A refused operation on the indexed Bloom filter.
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    /// K-mer length outside the supported range.
    #[error("Invalid k-mer size: {0} (must be 1-31)")]
    InvalidKmerSize(usize),

    /// Any other configuration value that fails validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The two mate files of a paired sample ran out of sync.
    #[error("Mate files are out of sync: mate 1 at {mate1}, mate 2 at {mate2}")]
    UnpairedMates { mate1: String, mate2: String },

    /// The ordering gate was abandoned by a failing worker.
    #[error("Ordered commit aborted by a failing worker")]
    SequencerAborted,

    /// A worker thread panicked.
    #[error("Worker thread panicked")]
    WorkerPanic,

    /// Error raised by a user-supplied parallel processor.
    #[error("Processing error: {0}")]
    Process(Box<dyn StdError + Send + Sync>),
}

/// Trait for converting errors into `SharkError::Process` variants.
///
/// # Examples
///
/// ```rust
/// use shark::{IntoSharkError, SharkError};
///
/// let err = std::fmt::Error.into_shark_error();
/// assert!(matches!(err, SharkError::Process(_)));
/// ```
pub trait IntoSharkError {
    /// Converts the error into a `SharkError`.
    fn into_shark_error(self) -> SharkError;
}

impl<E> IntoSharkError for E
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_shark_error(self) -> SharkError {
        SharkError::Process(self.into())
    }
}
