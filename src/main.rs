use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, info};
use shark::{
    init_logger, run, BoxedWriter, Config, FastxReader, OutputSink, PairedSource, DEFAULT_BATCH_SIZE,
    DEFAULT_CONFIDENCE, DEFAULT_K, GIB_BITS,
};

/// Associate RNA-seq reads to the reference sequences they come from,
/// without mapping.
///
/// One `read_id<TAB>group` line per association is written to stdout
/// (or --associations).
#[derive(Parser, Debug)]
#[command(name = "shark", version, about, long_about = None)]
struct Cli {
    /// Reference sequences (FASTA, optionally compressed)
    #[arg(short, long)]
    reference: PathBuf,

    /// First (or only) sample file; stdin when omitted
    #[arg(short = '1', long)]
    sample1: Option<PathBuf>,

    /// Second sample file for paired-end reads
    #[arg(short = '2', long)]
    sample2: Option<PathBuf>,

    /// Write associated first mates as FASTQ here
    #[arg(short = 'o', long)]
    out1: Option<PathBuf>,

    /// Write associated second mates as FASTQ here
    #[arg(short = 'p', long, requires = "out1")]
    out2: Option<PathBuf>,

    /// Association output; stdout when omitted
    #[arg(short, long)]
    associations: Option<PathBuf>,

    /// K-mer length (1 to 31)
    #[arg(short, long = "kmer-size", default_value_t = DEFAULT_K)]
    k: usize,

    /// Share of a read's valid bases that must be covered
    #[arg(short, long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f64,

    /// Bloom filter size in GiB
    #[arg(short, long = "bf-size", default_value_t = 1.0)]
    bf_size: f64,

    /// Mask bases below this Phred quality
    #[arg(short = 'q', long = "min-base-quality", default_value_t = 0)]
    min_quality: u8,

    /// Only report reads associated to exactly one group
    #[arg(short, long)]
    single: bool,

    /// Worker threads (0 uses every core)
    #[arg(short, long, default_value_t = 1)]
    threads: usize,

    /// Records per worker batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Seed of the k-mer hash
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Log progress
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> Result<Config> {
        if self.bf_size.is_nan() || self.bf_size <= 0.0 {
            bail!("--bf-size must be positive, got {}", self.bf_size);
        }
        let bits = ((self.bf_size * GIB_BITS as f64) as u64).max(1);
        let config = Config::default()
            .with_k(self.k)
            .with_filter_size(bits)
            .with_confidence(self.confidence)
            .with_single(self.single)
            .with_threads(self.threads)
            .with_min_quality(self.min_quality)
            .with_batch_size(self.batch_size)
            .with_seed(self.seed);
        config.validate()?;
        Ok(config)
    }
}

fn create(path: &Path) -> Result<BoxedWriter> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    Ok(Box::new(file))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    debug!("{cli:?}");
    let config = cli.config()?;

    let associations: BoxedWriter = match &cli.associations {
        Some(path) => create(path)?,
        None => Box::new(std::io::stdout()),
    };
    let out1 = cli.out1.as_deref().map(create).transpose()?;
    let out2 = cli.out2.as_deref().map(create).transpose()?;
    let sink = OutputSink::with_fastq(associations, out1, out2);

    let mate1 = FastxReader::from_optional_path(cli.sample1.as_ref())
        .context("Failed to open first sample")?;
    let mate2 = cli
        .sample2
        .as_ref()
        .map(FastxReader::from_path)
        .transpose()
        .context("Failed to open second sample")?;
    let reads = PairedSource::new(mate1, mate2);

    info!("Building index over {}", cli.reference.display());
    let stats = run(
        &config,
        || FastxReader::from_path(&cli.reference),
        reads,
        &sink,
    )?;
    info!(
        "{} groups, {} reads, {} associated, {} associations",
        stats.groups, stats.reads, stats.associated_reads, stats.associations
    );
    Ok(())
}
