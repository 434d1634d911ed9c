//! Sequence sources.
//!
//! Everything the pipeline consumes goes through [`SequenceSource`]: a
//! pull-based stream that yields one item at a time and `None` at its end.
//! [`FastxReader`] decodes FASTA or FASTQ (optionally compressed),
//! [`PairedSource`] zips two read files into [`Fragment`]s and
//! [`VecSource`] serves records already in memory.

use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

use seq_io::fasta::{self, Record as FastaRecord};
use seq_io::fastq::{self, Record as FastqRecord};

use crate::{Fragment, Result, SeqRecord, SharkError};

pub type BoxedReader = Box<dyn Read + Send>;

const END_OF_STREAM: &str = "<end of stream>";

/// A stream of sequencing records.
pub trait SequenceSource {
    type Item: Send;

    /// The next item, `Ok(None)` once the stream is exhausted.
    fn next_item(&mut self) -> Result<Option<Self::Item>>;
}

enum Format<R: Read> {
    Fasta(fasta::Reader<R>),
    Fastq(fastq::Reader<R>),
    Empty,
}

/// Streaming FASTA/FASTQ reader.
///
/// The format is picked from the first byte of the stream (`>` for FASTA,
/// `@` for FASTQ). Multi-line FASTA sequences are joined. An empty stream
/// yields no records.
///
/// # Examples
///
/// ```rust
/// use shark::FastxReader;
/// use std::io::Cursor;
///
/// # fn main() -> shark::Result<()> {
/// let data = ">tx1 some description\nACGT\nACGT\n>tx2\nTTTT\n";
/// let reader = FastxReader::new(Cursor::new(data))?;
/// let records = reader.collect::<shark::Result<Vec<_>>>()?;
///
/// assert_eq!(records.len(), 2);
/// assert_eq!(records[0].id, "tx1");
/// assert_eq!(records[0].seq, b"ACGTACGT");
/// assert!(records[0].qual.is_none());
/// # Ok(())
/// # }
/// ```
pub struct FastxReader<R: Read> {
    inner: Format<BufReader<R>>,
    records_read: u64,
}

impl<R: Read> FastxReader<R> {
    pub fn new(inner: R) -> Result<Self> {
        let mut buffered = BufReader::new(inner);
        let first = buffered.fill_buf()?.first().copied();
        let inner = match first {
            Some(b'>') => Format::Fasta(fasta::Reader::new(buffered)),
            Some(b'@') => Format::Fastq(fastq::Reader::new(buffered)),
            None => Format::Empty,
            Some(other) => return Err(SharkError::UnrecognizedFormat(other)),
        };
        Ok(Self {
            inner,
            records_read: 0,
        })
    }

    /// Number of records yielded so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    pub fn is_fastq(&self) -> bool {
        matches!(self.inner, Format::Fastq(_))
    }
}

impl<R: Read> SequenceSource for FastxReader<R> {
    type Item = SeqRecord;

    fn next_item(&mut self) -> Result<Option<SeqRecord>> {
        let record = match &mut self.inner {
            Format::Fasta(reader) => match reader.next() {
                None => return Ok(None),
                Some(record) => {
                    let record = record?;
                    SeqRecord::new(record.id()?, record.full_seq().into_owned())
                }
            },
            Format::Fastq(reader) => match reader.next() {
                None => return Ok(None),
                Some(record) => {
                    let record = record?;
                    SeqRecord::new(record.id()?, record.seq()).with_qual(record.qual())
                }
            },
            Format::Empty => return Ok(None),
        };
        self.records_read += 1;
        Ok(Some(record))
    }
}

impl<R: Read> Iterator for FastxReader<R> {
    type Item = Result<SeqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_item().transpose()
    }
}

impl FastxReader<BoxedReader> {
    /// Open a (possibly compressed) FASTA/FASTQ file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let rdr = File::open(path).map(BufReader::new)?;

        #[cfg(feature = "niffler")]
        {
            let (pt, _format) = niffler::send::get_reader(Box::new(rdr))?;
            Self::new(pt)
        }
        #[cfg(not(feature = "niffler"))]
        {
            Self::new(Box::new(rdr))
        }
    }

    pub fn from_stdin() -> Result<Self> {
        let rdr = Box::new(std::io::stdin());

        #[cfg(feature = "niffler")]
        {
            let (pt, _format) = niffler::send::get_reader(rdr)?;
            Self::new(pt)
        }
        #[cfg(not(feature = "niffler"))]
        {
            Self::new(rdr)
        }
    }

    /// Read from `path`, or from stdin when there is none.
    pub fn from_optional_path<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::from_stdin(),
        }
    }
}

/// Serves items that are already in memory.
#[derive(Debug, Clone)]
pub struct VecSource<T> {
    items: std::vec::IntoIter<T>,
}

impl<T> VecSource<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

impl<T: Send> SequenceSource for VecSource<T> {
    type Item = T;

    fn next_item(&mut self) -> Result<Option<T>> {
        Ok(self.items.next())
    }
}

impl<T> FromIterator<T> for VecSource<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Turns one or two record streams into [`Fragment`]s.
///
/// With a second stream the mates are pulled in lockstep; one stream
/// ending before the other is reported as [`SharkError::UnpairedMates`].
pub struct PairedSource<S> {
    mate1: S,
    mate2: Option<S>,
}

impl<S> PairedSource<S>
where
    S: SequenceSource<Item = SeqRecord>,
{
    pub fn single(mate1: S) -> Self {
        Self { mate1, mate2: None }
    }

    pub fn paired(mate1: S, mate2: S) -> Self {
        Self {
            mate1,
            mate2: Some(mate2),
        }
    }

    pub fn new(mate1: S, mate2: Option<S>) -> Self {
        Self { mate1, mate2 }
    }
}

impl<S> SequenceSource for PairedSource<S>
where
    S: SequenceSource<Item = SeqRecord>,
{
    type Item = Fragment;

    fn next_item(&mut self) -> Result<Option<Fragment>> {
        let first = self.mate1.next_item()?;
        let Some(mate2) = &mut self.mate2 else {
            return Ok(first.map(Fragment::single));
        };
        match (first, mate2.next_item()?) {
            (Some(a), Some(b)) => Ok(Some(Fragment::paired(a, b))),
            (None, None) => Ok(None),
            (Some(a), None) => Err(SharkError::UnpairedMates {
                mate1: a.id,
                mate2: END_OF_STREAM.to_string(),
            }),
            (None, Some(b)) => Err(SharkError::UnpairedMates {
                mate1: END_OF_STREAM.to_string(),
                mate2: b.id,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn reader(data: &str) -> FastxReader<Cursor<Vec<u8>>> {
        FastxReader::new(Cursor::new(data.as_bytes().to_vec())).unwrap()
    }

    fn drain<S: SequenceSource>(mut source: S) -> Result<Vec<S::Item>> {
        let mut items = Vec::new();
        while let Some(item) = source.next_item()? {
            items.push(item);
        }
        Ok(items)
    }

    #[test]
    fn test_fasta_records() {
        let rdr = reader(">g1 gene=1\nACGT\nAC\n>g3\nNNAC\n");
        assert!(!rdr.is_fastq());
        let records = drain(rdr).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], SeqRecord::new("g1", "ACGTAC"));
        assert_eq!(records[1].seq, b"NNAC");
    }

    #[test]
    fn test_fastq_records() {
        let mut rdr = reader("@r1 extra\nACGT\n+\nIIII\n@r2\nGG\n+\n#I\n");
        assert!(rdr.is_fastq());
        let first = rdr.next_item().unwrap().unwrap();
        assert_eq!(first.id, "r1");
        assert_eq!(first.qual.as_deref(), Some(&b"IIII"[..]));
        let second = rdr.next_item().unwrap().unwrap();
        assert_eq!(second, SeqRecord::new("r2", "GG").with_qual("#I"));
        assert!(rdr.next_item().unwrap().is_none());
        assert_eq!(rdr.records_read(), 2);
    }

    #[test]
    fn test_empty_input() {
        let mut rdr = reader("");
        assert!(rdr.next_item().unwrap().is_none());
        assert!(rdr.next().is_none());
    }

    #[test]
    fn test_unrecognized_format() {
        let result = FastxReader::new(Cursor::new(b"ACGT\n".to_vec()));
        assert!(matches!(result, Err(SharkError::UnrecognizedFormat(b'A'))));
    }

    #[test]
    fn test_malformed_fastq() {
        let rdr = reader("@r1\nACGT\nIIII\n");
        assert!(drain(rdr).is_err());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, ">a\nACGT\n>b\nGGCC\n").unwrap();
        file.flush().unwrap();

        let rdr = FastxReader::from_path(file.path()).unwrap();
        let ids: Vec<String> = rdr.map(|r| r.unwrap().id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let missing = FastxReader::from_path(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(SharkError::Io(_))));
    }

    #[test]
    fn test_paired_lockstep() {
        let source = PairedSource::paired(
            reader("@a/1\nAAAA\n+\nIIII\n@b/1\nCC\n+\nII\n"),
            reader("@a/2\nTTTT\n+\nIIII\n@b/2\nGG\n+\nII\n"),
        );
        let fragments = drain(source).unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].id(), "a/1");
        assert_eq!(&*fragments[1].query_sequence(0), b"CCNGG");
    }

    #[test]
    fn test_unpaired_mates() {
        let source = PairedSource::paired(
            reader("@a/1\nAAAA\n+\nIIII\n@b/1\nCC\n+\nII\n"),
            reader("@a/2\nTTTT\n+\nIIII\n"),
        );
        match drain(source) {
            Err(SharkError::UnpairedMates { mate1, mate2 }) => {
                assert_eq!(mate1, "b/1");
                assert_eq!(mate2, END_OF_STREAM);
            }
            other => panic!("expected unpaired mates, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_single_and_vec_source() {
        let source = PairedSource::single(VecSource::new(vec![
            SeqRecord::new("x", "ACGT"),
            SeqRecord::new("y", "TTTT"),
        ]));
        let fragments = drain(source).unwrap();
        assert_eq!(fragments.len(), 2);
        assert!(fragments.iter().all(|f| !f.is_paired()));
    }
}
