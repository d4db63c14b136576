use log::{info, LevelFilter};
use std::time::{Duration, Instant};

use crate::audio::Direction;

/// Environment variable that selects the log level
pub const LOG_LEVEL_ENV: &str = "WAVESTREAM_LOG_LEVEL";

/// Initialize logging system with appropriate log level
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    // Set log level based on environment variable or default to Info
    let log_level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string());

    let mut builder = env_logger::Builder::new();

    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "{} [{}] [{}:{}] {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.args()
        )
    });
    builder.filter_level(parse_level(&log_level));
    builder.try_init()?;

    info!("Logging initialized with level: {}", log_level);
    Ok(())
}

/// Map a level name to a filter, falling back to Info
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" | "warning" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Outcome of one `play` or `record` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamSummary {
    /// Chunks that completed at the device and were handed on
    pub chunks: usize,
    pub bytes: usize,
    /// Completion waits that ran into the timeout before the slot finished
    pub wait_timeouts: usize,
    pub elapsed: Duration,
}

/// Per-session counters kept by the engines
#[derive(Debug, Clone)]
pub struct SessionStats {
    direction: Direction,
    chunks: usize,
    bytes: usize,
    wait_timeouts: usize,
    started: Instant,
}

impl SessionStats {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            chunks: 0,
            bytes: 0,
            wait_timeouts: 0,
            started: Instant::now(),
        }
    }

    pub fn record_chunk(&mut self, bytes: usize) {
        self.chunks += 1;
        self.bytes += bytes;
    }

    pub fn record_timeout(&mut self) {
        self.wait_timeouts += 1;
    }

    pub fn wait_timeouts(&self) -> usize {
        self.wait_timeouts
    }

    /// Close the session and log a one-line summary
    pub fn finish(self) -> StreamSummary {
        let summary = StreamSummary {
            chunks: self.chunks,
            bytes: self.bytes,
            wait_timeouts: self.wait_timeouts,
            elapsed: self.started.elapsed(),
        };

        info!(
            "{} finished: {} chunk(s), {} bytes in {:.2}s ({} wait timeout(s))",
            self.direction.as_str(),
            summary.chunks,
            summary.bytes,
            summary.elapsed.as_secs_f64(),
            summary.wait_timeouts
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), LevelFilter::Trace);
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level(" warn "), LevelFilter::Warn);
        assert_eq!(parse_level("warning"), LevelFilter::Warn);
        assert_eq!(parse_level("error"), LevelFilter::Error);
        assert_eq!(parse_level("off"), LevelFilter::Off);
        assert_eq!(parse_level("verbose"), LevelFilter::Info);
    }

    #[test]
    fn test_session_stats_summary() {
        let mut stats = SessionStats::new(Direction::Recording);
        stats.record_chunk(100);
        stats.record_chunk(50);
        stats.record_timeout();

        assert_eq!(stats.wait_timeouts(), 1);

        let summary = stats.finish();
        assert_eq!(summary.chunks, 2);
        assert_eq!(summary.bytes, 150);
        assert_eq!(summary.wait_timeouts, 1);
    }

    #[test]
    fn test_init_twice_fails_gracefully() {
        // The first call may already have happened in another test
        let _ = init();
        assert!(init().is_err());
    }
}
