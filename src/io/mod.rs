mod batcher;
mod reader;
mod writer;

pub use batcher::{Batch, SequenceBatcher, DEFAULT_BATCH_SIZE};
pub use reader::{BoxedReader, FastxReader, PairedSource, SequenceSource, VecSource};
pub use writer::{AssociationWriter, BoxedWriter, LocalOutput, OutputSink};

#[cfg(test)]
pub(crate) use writer::tests::SharedBuf;
