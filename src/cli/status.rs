use std::path::Path;

use super::CliApp;
use crate::audio::{PlaybackDeviceInfo, RecordingDeviceInfo, WaveFormat, WavRecording};
use crate::error::{AppError, ErrorSeverity};
use crate::logging::StreamSummary;

/// Output formatter for the CLI
pub struct StatusDisplay;

impl StatusDisplay {
    /// Display both device lists, default entries first
    pub fn display_devices(playback: &[PlaybackDeviceInfo], recording: &[RecordingDeviceInfo]) {
        println!("┌─ Playback Devices ──────────────────────────────────────┐");
        for device in playback {
            println!("│ {:>8}  {}", device.id.to_string(), Self::truncate(&device.name, 44));
        }
        println!("├─ Recording Devices ─────────────────────────────────────┤");
        for device in recording {
            println!(
                "│ {:>8}  {} ({} ch)",
                device.id.to_string(),
                Self::truncate(&device.name, 36),
                device.channels
            );
        }
        println!("└─────────────────────────────────────────────────────────┘");
    }

    /// One-line summary after playing a file
    pub fn display_playback(path: &Path, format: &WaveFormat, summary: &StreamSummary) {
        println!(
            "Played {} | {} | {} chunk(s) in {}",
            Self::file_name(path),
            format.format_description(),
            summary.chunks,
            CliApp::format_duration(summary.elapsed)
        );
        Self::display_timeouts(summary);
    }

    /// One-line summary after recording a file
    pub fn display_recording(path: &Path, format: &WaveFormat, recording: &WavRecording) {
        println!(
            "Saved {} | {} | {:.1}s kept of {} chunk(s)",
            Self::file_name(path),
            format.format_description(),
            recording.seconds,
            recording.summary.chunks
        );
        Self::display_timeouts(&recording.summary);
    }

    pub fn display_threshold(level: f64, saved: bool) {
        println!("Background level: {:.5}", level);
        if saved {
            println!("Saved as the quiet threshold for future recordings");
        } else {
            println!("Use --threshold {:.5} or --save to keep it", level);
        }
    }

    fn display_timeouts(summary: &StreamSummary) {
        if summary.wait_timeouts > 0 {
            println!(
                "Note: the device was slow to complete buffers {} time(s)",
                summary.wait_timeouts
            );
        }
    }

    /// Display error message with severity, explanation and suggestions
    pub fn display_error(error: &AppError) {
        let severity = error.severity();
        let severity_icon = match severity {
            ErrorSeverity::Info => "ℹ",
            ErrorSeverity::Warning => "⚠",
            ErrorSeverity::Error => "✗",
            ErrorSeverity::Critical => "🔥",
        };

        eprintln!("┌─ {} {} ─────────────────────────────────────────────────┐",
            severity_icon, severity.as_str());

        for line in Self::wrap_text(&error.user_message(), 55) {
            eprintln!("│ {}", line);
        }

        if let AppError::Stream(stream_err) = error {
            let cleanup = stream_err.cleanup_failures();
            if !cleanup.is_empty() {
                eprintln!("│");
                eprintln!("│ Cleanup afterwards also failed:");
                for failure in cleanup {
                    eprintln!("│   • {}", failure);
                }
            }
        }

        let suggestions = error.recovery_suggestions();
        if !suggestions.is_empty() {
            eprintln!("│");
            eprintln!("│ Suggestions:");
            for suggestion in suggestions.iter().take(3) {
                for (i, line) in Self::wrap_text(suggestion, 51).iter().enumerate() {
                    let bullet = if i == 0 { "•" } else { " " };
                    eprintln!("│   {} {}", bullet, line);
                }
            }
        }

        if error.is_recoverable() {
            eprintln!("│");
            eprintln!("│ Trying again may succeed.");
        }

        eprintln!("└─────────────────────────────────────────────────────────┘");
        log::log!(severity.log_level(), "{}", error);
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string())
    }

    /// Truncate string to fit display width
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{}...", kept)
        }
    }

    fn wrap_text(text: &str, width: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current_line = String::new();

        for word in text.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.len() + word.len() < width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(current_line);
                current_line = word.to_string();
            }
        }

        if !current_line.is_empty() {
            lines.push(current_line);
        }
        lines
    }
}
