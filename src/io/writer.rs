//! Writers for classification output.
//!
//! [`AssociationWriter`] is a buffered text writer for association lines
//! (`read_id<TAB>group_name`) and FASTQ records. [`OutputSink`] owns the
//! run's writers behind one mutex; workers stage a whole batch of output in
//! a [`LocalOutput`] and hand it over with a single
//! [`commit`](OutputSink::commit).

use std::{fs::File, io::Write, path::Path};

use parking_lot::Mutex;

use crate::{Fragment, Result, SeqRecord};

const DEFAULT_BUFFER_SIZE: usize = 1 << 20;
pub type BoxedWriter = Box<dyn Write + Send>;

/// Buffered writer for association lines and FASTQ records.
///
/// Output is staged in an internal buffer and written to the inner writer
/// when the buffer fills up, on [`finish`](Self::finish), or on drop.
///
/// # Examples
///
/// ```rust
/// use shark::AssociationWriter;
///
/// # fn main() -> shark::Result<()> {
/// let mut writer = AssociationWriter::new(Vec::new());
/// writer.write_association("read1", "GENE_A")?;
/// writer.write_association("read1", "GENE_B")?;
/// assert_eq!(writer.records_written(), 2);
///
/// let output = writer.into_inner()?;
/// assert_eq!(output, b"read1\tGENE_A\nread1\tGENE_B\n");
/// # Ok(())
/// # }
/// ```
pub struct AssociationWriter<W: Write> {
    inner: W,
    buffer: Vec<u8>,
    capacity: usize,
    records_written: u64,
}

impl<W: Write> AssociationWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_capacity(inner, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(inner: W, capacity: usize) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(capacity.min(DEFAULT_BUFFER_SIZE)),
            capacity,
            records_written: 0,
        }
    }

    /// Association lines and FASTQ records written so far.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Bytes staged but not yet handed to the inner writer.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            self.inner.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }

    fn flush_if_full(&mut self) -> Result<()> {
        if self.buffer.len() >= self.capacity {
            self.flush_buffer()?;
        }
        Ok(())
    }

    pub fn write_association(&mut self, read_id: &str, group: &str) -> Result<()> {
        self.buffer.extend_from_slice(read_id.as_bytes());
        self.buffer.push(b'\t');
        self.buffer.extend_from_slice(group.as_bytes());
        self.buffer.push(b'\n');
        self.records_written += 1;
        self.flush_if_full()
    }

    pub fn write_fastq(&mut self, record: &SeqRecord) -> Result<()> {
        record.write_fastq(&mut self.buffer)?;
        self.records_written += 1;
        self.flush_if_full()
    }

    /// Move everything staged in `other` into this writer.
    pub fn ingest(&mut self, other: &mut AssociationWriter<Vec<u8>>) -> Result<()> {
        other.flush_buffer()?;
        if other.inner.len() > self.capacity {
            self.flush_buffer()?;
            self.inner.write_all(&other.inner)?;
        } else {
            self.buffer.extend_from_slice(&other.inner);
            self.flush_if_full()?;
        }
        self.records_written += other.records_written;
        other.inner.clear();
        other.records_written = 0;
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        self.flush_buffer()?;
        self.inner.flush()?;
        Ok(())
    }

    /// Flush and return the inner writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;
        let mut this = std::mem::ManuallyDrop::new(self);
        // SAFETY: `this` is never touched again and its `Drop` is suppressed;
        // `inner` is moved out exactly once and `buffer` is dropped in place.
        unsafe {
            std::ptr::drop_in_place(&mut this.buffer);
            Ok(std::ptr::read(&this.inner))
        }
    }
}

impl<W: Write> Drop for AssociationWriter<W> {
    fn drop(&mut self) {
        self.finish().ok();
    }
}

impl AssociationWriter<BoxedWriter> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    pub fn from_stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Write to `path`, or to stdout when there is none.
    pub fn from_optional_path<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::from_stdout()),
        }
    }
}

/// Per-worker staging area for one batch of output.
pub struct LocalOutput {
    associations: AssociationWriter<Vec<u8>>,
    mate1: Option<AssociationWriter<Vec<u8>>>,
    mate2: Option<AssociationWriter<Vec<u8>>>,
    last_id: Option<String>,
    reads: u64,
}

impl LocalOutput {
    fn staging() -> AssociationWriter<Vec<u8>> {
        // never flushes on its own; the sink drains it on commit
        AssociationWriter::with_capacity(Vec::new(), usize::MAX)
    }

    /// Record the accepted groups of one fragment.
    ///
    /// One association line is written per group. The fragment itself goes
    /// to the FASTQ outputs once, unless the previous fragment had the same
    /// identifier.
    pub fn record(&mut self, fragment: &Fragment, groups: &[&str]) -> Result<()> {
        if groups.is_empty() {
            return Ok(());
        }
        for group in groups {
            self.associations.write_association(fragment.id(), group)?;
        }
        self.reads += 1;

        if self.last_id.as_deref() == Some(fragment.id()) {
            return Ok(());
        }
        if let Some(out) = &mut self.mate1 {
            out.write_fastq(&fragment.mate1)?;
        }
        if let (Some(out), Some(mate2)) = (&mut self.mate2, &fragment.mate2) {
            out.write_fastq(mate2)?;
        }
        match &mut self.last_id {
            Some(id) => {
                id.clear();
                id.push_str(fragment.id());
            }
            None => self.last_id = Some(fragment.id().to_string()),
        }
        Ok(())
    }

    /// Fragments recorded since the last commit.
    pub fn reads(&self) -> u64 {
        self.reads
    }
}

struct SinkWriters {
    associations: AssociationWriter<BoxedWriter>,
    mate1: Option<AssociationWriter<BoxedWriter>>,
    mate2: Option<AssociationWriter<BoxedWriter>>,
    reads: u64,
}

/// Destination of every accepted association in a run.
///
/// Ordering across batches is whatever order workers commit in.
pub struct OutputSink {
    writers: Mutex<SinkWriters>,
}

impl OutputSink {
    pub fn new(associations: BoxedWriter) -> Self {
        Self::with_fastq(associations, None, None)
    }

    /// Also write accepted reads as FASTQ: first mates to `out1`, second
    /// mates to `out2`.
    pub fn with_fastq(
        associations: BoxedWriter,
        out1: Option<BoxedWriter>,
        out2: Option<BoxedWriter>,
    ) -> Self {
        Self {
            writers: Mutex::new(SinkWriters {
                associations: AssociationWriter::new(associations),
                mate1: out1.map(AssociationWriter::new),
                mate2: out2.map(AssociationWriter::new),
                reads: 0,
            }),
        }
    }

    /// A staging area matching this sink's outputs.
    pub fn local(&self) -> LocalOutput {
        let writers = self.writers.lock();
        LocalOutput {
            associations: LocalOutput::staging(),
            mate1: writers.mate1.as_ref().map(|_| LocalOutput::staging()),
            mate2: writers.mate2.as_ref().map(|_| LocalOutput::staging()),
            last_id: None,
            reads: 0,
        }
    }

    /// Drain `local` into the sink.
    pub fn commit(&self, local: &mut LocalOutput) -> Result<()> {
        let mut writers = self.writers.lock();
        writers.associations.ingest(&mut local.associations)?;
        if let (Some(out), Some(staged)) = (&mut writers.mate1, &mut local.mate1) {
            out.ingest(staged)?;
        }
        if let (Some(out), Some(staged)) = (&mut writers.mate2, &mut local.mate2) {
            out.ingest(staged)?;
        }
        writers.reads += local.reads;
        local.reads = 0;
        Ok(())
    }

    /// Number of association lines written.
    pub fn associations(&self) -> u64 {
        self.writers.lock().associations.records_written()
    }

    /// Number of fragments with at least one association.
    pub fn reads(&self) -> u64 {
        self.writers.lock().reads
    }

    pub fn finish(&self) -> Result<()> {
        let mut writers = self.writers.lock();
        writers.associations.finish()?;
        if let Some(out) = &mut writers.mate1 {
            out.finish()?;
        }
        if let Some(out) = &mut writers.mate2 {
            out.finish()?;
        }
        Ok(())
    }
}
