use std::time::Instant;

use rand::{rngs::StdRng, Rng, SeedableRng};
use shark::{run, Config, Fragment, OutputSink, SeqRecord, VecSource};

fn random_seq(rng: &mut StdRng, len: usize) -> Vec<u8> {
    (0..len).map(|_| b"ACGT"[rng.random_range(0..4)]).collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration
    let num_transcripts = 2_000;
    let transcript_len = 1_500;
    let num_reads = 500_000;
    let read_len = 100;

    println!("shark in-memory classification");
    println!("==============================");
    println!("Transcripts: {num_transcripts} x {transcript_len} bp");
    println!("Reads: {num_reads} x {read_len} bp (one in ten random)\n");

    let mut rng = StdRng::seed_from_u64(42);
    let reference: Vec<SeqRecord> = (0..num_transcripts)
        .map(|i| SeqRecord::new(format!("tx{i}"), random_seq(&mut rng, transcript_len)))
        .collect();

    let mut expected = 0u64;
    let reads: VecSource<Fragment> = (0..num_reads)
        .map(|i| {
            let seq = if i % 10 == 0 {
                random_seq(&mut rng, read_len)
            } else {
                expected += 1;
                let tx = &reference[rng.random_range(0..num_transcripts)].seq;
                let start = rng.random_range(0..=transcript_len - read_len);
                tx[start..start + read_len].to_vec()
            };
            Fragment::single(SeqRecord::new(format!("read{i}"), seq))
        })
        .collect();

    let config = Config::default()
        .with_k(19)
        .with_filter_size(1 << 26)
        .with_confidence(0.6)
        .with_threads(0);
    let sink = OutputSink::new(Box::new(std::io::sink()));

    let start = Instant::now();
    let stats = run(
        &config,
        || Ok(VecSource::new(reference.clone())),
        reads,
        &sink,
    )?;
    let elapsed = start.elapsed().as_secs_f64();

    println!("Index:");
    println!("  Groups: {}", stats.groups);
    println!("  Marked slots: {}", stats.marked_slots);
    println!("  Postings: {}\n", stats.postings);

    println!("Classification:");
    println!("  Duration: {elapsed:.2}s");
    println!("  Rate: {:.2} M reads/s", stats.reads as f64 / elapsed / 1_000_000.0);
    println!(
        "  Associated: {} of {} ({} drawn from transcripts)",
        stats.associated_reads, stats.reads, expected
    );
    println!("  Associations: {}", stats.associations);

    assert_eq!(stats.reads, num_reads as u64);
    Ok(())
}
