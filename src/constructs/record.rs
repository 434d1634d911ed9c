use std::borrow::Cow;
use std::io::Write;

/// Phred quality offset of FASTQ files.
pub const PHRED_OFFSET: u8 = 33;

/// Quality character written for records that carry none.
const FALLBACK_QUAL: u8 = b'I';

/// Stands in for masked bases and separates the two mates of a fragment.
const AMBIGUOUS: u8 = b'N';

/// A single FASTA or FASTQ record.
///
/// `id` holds the first whitespace-delimited token of the header line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeqRecord {
    pub id: String,
    pub seq: Vec<u8>,
    pub qual: Option<Vec<u8>>,
}

impl SeqRecord {
    pub fn new<I: Into<String>, S: Into<Vec<u8>>>(id: I, seq: S) -> Self {
        Self {
            id: id.into(),
            seq: seq.into(),
            qual: None,
        }
    }

    pub fn with_qual<Q: Into<Vec<u8>>>(mut self, qual: Q) -> Self {
        self.qual = Some(qual.into());
        self
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// The sequence with every base whose Phred score is below
    /// `min_quality` replaced by `N`.
    ///
    /// Borrowed when nothing needs masking (no cutoff, no qualities, or no
    /// low-quality base).
    ///
    /// ```rust
    /// use shark::SeqRecord;
    ///
    /// let record = SeqRecord::new("r1", "ACGT").with_qual("I#I#");
    /// assert_eq!(&*record.masked_seq(20), b"ANGN");
    /// assert_eq!(&*record.masked_seq(0), b"ACGT");
    /// ```
    pub fn masked_seq(&self, min_quality: u8) -> Cow<'_, [u8]> {
        let Some(qual) = self.qual.as_deref() else {
            return Cow::Borrowed(&self.seq);
        };
        let cutoff = min_quality.saturating_add(PHRED_OFFSET);
        if min_quality == 0 || qual.iter().all(|&q| q >= cutoff) {
            return Cow::Borrowed(&self.seq);
        }
        Cow::Owned(
            self.seq
                .iter()
                .zip(qual.iter().chain(std::iter::repeat(&u8::MAX)))
                .map(|(&b, &q)| if q < cutoff { AMBIGUOUS } else { b })
                .collect(),
        )
    }

    /// Write the record as a four-line FASTQ entry.
    pub fn write_fastq<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(b"@")?;
        writer.write_all(self.id.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.write_all(&self.seq)?;
        writer.write_all(b"\n+\n")?;
        match &self.qual {
            Some(qual) => writer.write_all(qual)?,
            None => {
                for _ in 0..self.seq.len() {
                    writer.write_all(&[FALLBACK_QUAL])?;
                }
            }
        }
        writer.write_all(b"\n")
    }
}

/// One unit of classification: a single read or a mate pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub mate1: SeqRecord,
    pub mate2: Option<SeqRecord>,
}

impl Fragment {
    pub fn single(mate1: SeqRecord) -> Self {
        Self { mate1, mate2: None }
    }

    pub fn paired(mate1: SeqRecord, mate2: SeqRecord) -> Self {
        Self {
            mate1,
            mate2: Some(mate2),
        }
    }

    /// Identifier used on association lines.
    pub fn id(&self) -> &str {
        &self.mate1.id
    }

    pub fn is_paired(&self) -> bool {
        self.mate2.is_some()
    }

    /// The sequence that is classified: the masked first mate, or both
    /// masked mates joined by a single `N` so that no k-mer spans the two.
    pub fn query_sequence(&self, min_quality: u8) -> Cow<'_, [u8]> {
        let first = self.mate1.masked_seq(min_quality);
        let Some(mate2) = &self.mate2 else {
            return first;
        };
        let second = mate2.masked_seq(min_quality);
        let mut joined = Vec::with_capacity(first.len() + 1 + second.len());
        joined.extend_from_slice(&first);
        joined.push(AMBIGUOUS);
        joined.extend_from_slice(&second);
        Cow::Owned(joined)
    }
}

impl From<SeqRecord> for Fragment {
    fn from(record: SeqRecord) -> Self {
        Self::single(record)
    }
}
