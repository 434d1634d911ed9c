//! Read classification against a [`ReferenceIndex`].
//!
//! Each read's k-mers are looked up in order. For every group touched, the
//! classifier keeps a hit count and a covered length: the first k-mer adds
//! `k` bases, every later one adds `min(k, pos - last_pos)`, so overlapping
//! k-mers are not counted twice. The groups with the greatest
//! `(coverage, hits)` pair win, provided the coverage reaches the configured
//! share of the read's valid bases.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::build::ReferenceIndex;
use crate::filter::GroupId;
use crate::io::{LocalOutput, OutputSink};
use crate::kmer::valid_bases;
use crate::parallel::{BatchInfo, ParallelProcessor};
use crate::{Config, Fragment, GroupList, Legend, Result};

#[derive(Debug, Clone, Copy, Default)]
struct Evidence {
    coverage: usize,
    hits: usize,
    last_pos: Option<usize>,
}

impl Evidence {
    fn touch(&mut self, pos: usize, k: usize) {
        self.coverage += match self.last_pos {
            Some(last) => (pos - last).min(k),
            None => k,
        };
        self.hits += 1;
        self.last_pos = Some(pos);
    }

    fn score(&self) -> (usize, usize) {
        (self.coverage, self.hits)
    }
}

/// The groups chosen for one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Every group tied for the best score, ascending.
    pub groups: GroupList,
    pub coverage: usize,
    pub hits: usize,
    /// ACGT bases of the (masked) read.
    pub valid_bases: usize,
}

impl Classification {
    /// Legend names of the chosen groups, each name once.
    pub fn names<'a>(&self, legend: &'a Legend) -> Vec<&'a str> {
        let mut names: Vec<&str> = Vec::with_capacity(self.groups.len());
        for &group in self.groups.iter() {
            if let Some(name) = legend.name(group) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

/// Scores reads against an index.
///
/// # Examples
///
/// ```rust
/// use shark::{Classifier, Config, IndexBuilder, SeqRecord};
///
/// # fn main() -> shark::Result<()> {
/// let config = Config::default()
///     .with_k(4)
///     .with_filter_size(1 << 16)
///     .with_confidence(0.5);
/// let index = IndexBuilder::new(config.clone())?.build_from_records(vec![
///     SeqRecord::new("g1", "ACGTACGTACGT"),
///     SeqRecord::new("g2", "TTTTAAAACCCC"),
/// ])?;
///
/// let mut classifier = Classifier::new(&index, &config);
/// let hit = classifier.classify(b"ACGTACGT")?.expect("read should be assigned");
/// assert_eq!(hit.names(index.legend()), vec!["g1"]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Classifier<'a> {
    index: &'a ReferenceIndex,
    confidence: f64,
    single: bool,
    evidence: BTreeMap<GroupId, Evidence>,
}

impl<'a> Classifier<'a> {
    pub fn new(index: &'a ReferenceIndex, config: &Config) -> Self {
        Self {
            index,
            confidence: config.confidence(),
            single: config.single(),
            evidence: BTreeMap::new(),
        }
    }

    pub fn index(&self) -> &'a ReferenceIndex {
        self.index
    }

    /// Classify one sequence. `None` when no group qualifies.
    pub fn classify(&mut self, seq: &[u8]) -> Result<Option<Classification>> {
        let encoder = self.index.encoder();
        let k = encoder.k();
        let valid = valid_bases(seq);
        if valid < k {
            return Ok(None);
        }

        self.evidence.clear();
        let groups = self.index.legend().len();
        for kmer in encoder.kmers(seq) {
            for &group in self.index.groups(kmer.code)? {
                if group as usize >= groups {
                    continue;
                }
                self.evidence.entry(group).or_default().touch(kmer.pos, k);
            }
        }

        let mut best = (0, 0);
        let mut tied = GroupList::new();
        for (&group, evidence) in &self.evidence {
            match evidence.score().cmp(&best) {
                Ordering::Greater => {
                    best = evidence.score();
                    tied.clear();
                    tied.push(group);
                }
                Ordering::Equal => tied.push(group),
                Ordering::Less => {}
            }
        }

        let (coverage, hits) = best;
        if tied.is_empty()
            || (coverage as f64) < self.confidence * valid as f64
            || (self.single && tied.len() != 1)
        {
            return Ok(None);
        }
        Ok(Some(Classification {
            groups: tied,
            coverage,
            hits,
            valid_bases: valid,
        }))
    }
}

/// Classification worker: stages accepted reads locally and commits them
/// to the shared sink after every batch.
pub struct ClassifyProcessor<'a> {
    classifier: Classifier<'a>,
    min_quality: u8,
    sink: &'a OutputSink,
    local: LocalOutput,
}

impl<'a> ClassifyProcessor<'a> {
    pub fn new(index: &'a ReferenceIndex, config: &Config, sink: &'a OutputSink) -> Self {
        Self {
            classifier: Classifier::new(index, config),
            min_quality: config.min_quality(),
            sink,
            local: sink.local(),
        }
    }
}

impl Clone for ClassifyProcessor<'_> {
    fn clone(&self) -> Self {
        Self {
            classifier: self.classifier.clone(),
            min_quality: self.min_quality,
            sink: self.sink,
            local: self.sink.local(),
        }
    }
}

impl ParallelProcessor<Fragment> for ClassifyProcessor<'_> {
    fn process_record(&mut self, fragment: Fragment) -> Result<()> {
        let seq = fragment.query_sequence(self.min_quality);
        if let Some(hit) = self.classifier.classify(&seq)? {
            let names = hit.names(self.classifier.index().legend());
            self.local.record(&fragment, &names)?;
        }
        Ok(())
    }

    fn on_batch_complete(&mut self, _batch: BatchInfo) -> Result<()> {
        self.sink.commit(&mut self.local)
    }
}
