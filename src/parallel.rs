//! Fixed-size worker pool over a [`SequenceBatcher`].
//!
//! The pool spawns one OS thread per worker. Each worker owns a clone of the
//! processor, pulls batches until the batcher runs dry and feeds every
//! record through the processor.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use log::debug;

use crate::io::{Batch, SequenceBatcher, SequenceSource};
use crate::{Result, SharkError};

/// Resolve a requested worker count: zero means one per core.
pub fn resolve_threads(num_threads: usize) -> usize {
    if num_threads == 0 {
        num_cpus::get()
    } else {
        num_threads
    }
}

/// Position and size of a batch that a worker has just finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchInfo {
    pub base: u64,
    pub len: usize,
}

impl BatchInfo {
    pub fn end(&self) -> u64 {
        self.base + self.len as u64
    }
}

impl<T> From<&Batch<T>> for BatchInfo {
    fn from(batch: &Batch<T>) -> Self {
        Self {
            base: batch.base,
            len: batch.len(),
        }
    }
}

/// Trait for types that can process records in parallel.
///
/// This is implemented by the **processor** not by the **reader**.
/// For the **reader**, see the [`ParallelReader`] trait.
pub trait ParallelProcessor<T>: Send + Clone {
    /// Process a single record
    fn process_record(&mut self, record: T) -> Result<()>;

    /// Called when a thread finishes processing its batch
    #[allow(unused_variables)]
    fn on_batch_complete(&mut self, batch: BatchInfo) -> Result<()> {
        Ok(())
    }

    /// Called once on the worker that failed, before its error is returned.
    ///
    /// Processors that make other workers wait on them release those
    /// workers here.
    fn on_abort(&mut self) {}

    /// Set the thread ID for this processor
    #[allow(unused_variables)]
    fn set_tid(&mut self, tid: usize) {}

    /// Get the thread ID for this processor
    fn get_tid(&self) -> Option<usize> {
        None
    }
}

/// Trait for sources that can process records in parallel
///
/// This is implemented by the **reader** not by the **processor**.
/// For the **processor**, see the [`ParallelProcessor`] trait.
pub trait ParallelReader {
    type Item;

    /// Run `processor` on `num_threads` workers (zero means one per core)
    /// until the input is exhausted. The first worker error is returned,
    /// preferring any error over [`SharkError::SequencerAborted`].
    fn process_parallel<P: ParallelProcessor<Self::Item>>(
        &self,
        processor: P,
        num_threads: usize,
    ) -> Result<()>;
}

impl<S> ParallelReader for SequenceBatcher<S>
where
    S: SequenceSource + Send,
{
    type Item = S::Item;

    fn process_parallel<P: ParallelProcessor<S::Item>>(
        &self,
        processor: P,
        num_threads: usize,
    ) -> Result<()> {
        let num_threads = resolve_threads(num_threads);
        debug!("Processing with {num_threads} worker threads");

        thread::scope(|scope| {
            let handles: Vec<_> = (0..num_threads)
                .map(|tid| {
                    let mut thread_processor = processor.clone();
                    thread_processor.set_tid(tid);
                    scope.spawn(move || {
                        let outcome =
                            catch_unwind(AssertUnwindSafe(|| drive(self, &mut thread_processor)));
                        match outcome {
                            Ok(Ok(())) => Ok(()),
                            Ok(Err(e)) => {
                                thread_processor.on_abort();
                                Err(e)
                            }
                            Err(_) => {
                                thread_processor.on_abort();
                                Err(SharkError::WorkerPanic)
                            }
                        }
                    })
                })
                .collect();

            let mut first_error = None;
            for handle in handles {
                let result = handle.join().unwrap_or(Err(SharkError::WorkerPanic));
                if let Err(e) = result {
                    // an aborted gate only echoes another worker's failure
                    let echoed = matches!(first_error, Some(SharkError::SequencerAborted));
                    if first_error.is_none() || echoed {
                        first_error = Some(e);
                    }
                }
            }
            first_error.map_or(Ok(()), Err)
        })
    }
}

fn drive<S, P>(batcher: &SequenceBatcher<S>, processor: &mut P) -> Result<()>
where
    S: SequenceSource,
    P: ParallelProcessor<S::Item>,
{
    loop {
        let batch = batcher.fill()?;
        if batch.is_empty() {
            return Ok(());
        }
        let info = BatchInfo::from(&batch);
        for record in batch.records {
            processor.process_record(record)?;
        }
        processor.on_batch_complete(info)?;
    }
}
