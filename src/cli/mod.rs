use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::DeviceId;
use crate::config::RecordingSettings;

pub mod status;
pub use status::StatusDisplay;

/// Waveform audio streaming CLI
#[derive(Parser)]
#[command(name = "wavestream")]
#[command(about = "Play and record WAV files through double-buffered waveform audio devices")]
#[command(version = "0.1.0")]
pub struct CliApp {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List playback and recording devices
    Devices,
    /// Play a WAV file
    Play {
        /// WAV file to play
        file: PathBuf,
        /// Output device number, or "default"
        #[arg(short, long)]
        device: Option<DeviceId>,
        /// Length of each queued chunk in milliseconds
        #[arg(long)]
        chunk_ms: Option<u64>,
    },
    /// Record into a WAV file until silence, a time limit, or Ctrl-C
    Record(RecordArgs),
    /// Measure background noise to use as the quiet threshold
    Threshold {
        /// Input device number, or "default"
        #[arg(short, long)]
        device: Option<DeviceId>,
        /// Sample rate in Hz
        #[arg(long)]
        rate: Option<u32>,
        /// Bits per sample (8 or 16)
        #[arg(long)]
        bits: Option<u16>,
        /// Store the measured level in the config file
        #[arg(long)]
        save: bool,
    },
}

/// Options for the record command; unset values come from the config file
#[derive(Debug, Args)]
pub struct RecordArgs {
    /// WAV file to create
    pub file: PathBuf,
    /// Input device number, or "default"
    #[arg(short, long)]
    pub device: Option<DeviceId>,
    /// Stop after this many seconds (0 for no limit)
    #[arg(short, long)]
    pub seconds: Option<f64>,
    /// Stop after this many seconds of silence (0 to disable)
    #[arg(long)]
    pub quiet_seconds: Option<f64>,
    /// RMS level below which audio counts as silence
    #[arg(long)]
    pub threshold: Option<f64>,
    /// Number of channels
    #[arg(long)]
    pub channels: Option<u16>,
    /// Sample rate in Hz
    #[arg(long)]
    pub rate: Option<u32>,
    /// Bits per sample (8 or 16)
    #[arg(long)]
    pub bits: Option<u16>,
    /// Seconds of audio in each recorded chunk
    #[arg(long)]
    pub chunk_seconds: Option<f64>,
    /// Keep leading silence instead of waiting for sound
    #[arg(long)]
    pub no_wait: bool,
}

impl RecordArgs {
    /// Overlay the command-line options on the configured defaults
    pub fn apply(&self, base: &RecordingSettings) -> RecordingSettings {
        RecordingSettings {
            channels: self.channels.unwrap_or(base.channels),
            sample_rate: self.rate.unwrap_or(base.sample_rate),
            bits_per_sample: self.bits.unwrap_or(base.bits_per_sample),
            max_seconds: self.seconds.or(base.max_seconds),
            quiet_seconds: self.quiet_seconds.unwrap_or(base.quiet_seconds),
            quiet_threshold: self.threshold.unwrap_or(base.quiet_threshold),
            seconds_per_chunk: self.chunk_seconds.unwrap_or(base.seconds_per_chunk),
            wait_for_sound: base.wait_for_sound && !self.no_wait,
        }
    }
}

impl CliApp {
    /// Parse command line arguments
    pub fn parse() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Expand tilde (~) in path to home directory
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home_dir) = dirs::home_dir() {
                return home_dir.join(rest);
            }
        } else if path == "~" {
            return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
        }
        PathBuf::from(path)
    }

    /// Format duration for display
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        format!("{:02}:{:02}", minutes, seconds)
    }
}


#[cfg(test)]
mod path_tests {
    use super::*;

    #[test]
    fn test_expand_path_tilde_home() {
        let expanded = CliApp::expand_path("~/Music/take.wav");

        if dirs::home_dir().is_some() {
            assert!(!expanded.to_string_lossy().starts_with('~'));
        }
        assert!(expanded.to_string_lossy().ends_with("Music/take.wav"));
    }

    #[test]
    fn test_expand_path_no_tilde() {
        let path = "/absolute/path/to/file.wav";
        assert_eq!(CliApp::expand_path(path).to_string_lossy(), path);

        let path = "relative/file.wav";
        assert_eq!(CliApp::expand_path(path).to_string_lossy(), path);
    }
}
