//! Stderr logging with elapsed-time prefixes.

use std::io::Write;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

static START_TIME: OnceLock<Instant> = OnceLock::new();

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

/// Install the global logger.
///
/// Lines look like `[HH:MM:SS] LEVEL: message`, timed from the first call,
/// and go to stderr. The level is `Info` when `verbose` and `Warn`
/// otherwise; `RUST_LOG` overrides either. Calling this again is a no-op.
pub fn init_logger(verbose: bool) {
    let start = *START_TIME.get_or_init(Instant::now);

    let level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(move |buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                format_elapsed(start.elapsed()),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(3725)), "01:02:05");
        assert_eq!(format_elapsed(Duration::from_millis(59_999)), "00:00:59");
    }

    #[test]
    fn test_init_twice() {
        init_logger(false);
        init_logger(true);
        log::warn!("logger initialized");
    }
}
