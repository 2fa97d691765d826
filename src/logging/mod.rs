//! Enhanced logging and output control.
//!
//! This module provides the [`Logger`] for controlling output verbosity,
//! formatting progress, and implementing the core's [`ProgressSink`]
//! interface so the fetcher and tar writer never call `println!`
//! directly.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crate::progress::{ProgressSink, ProgressStage};

/// Logger responsible for all user-visible output.
///
/// `verbosity` follows the CLI's repeated `-v` flag: `0` = plain
/// progress/info, `1` = info (the default already shows info, so this
/// mostly gates `detail`), `>=2` = debug.
#[derive(Debug, Clone)]
pub struct Logger {
    pub verbosity: u8,
    pub quiet: bool,
    pub start_time: Option<Instant>,
}

impl Logger {
    pub fn new(verbosity: u8) -> Self {
        Self {
            verbosity,
            quiet: false,
            start_time: Some(Instant::now()),
        }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbosity: 0,
            quiet: true,
            start_time: Some(Instant::now()),
        }
    }

    fn debug_enabled(&self) -> bool {
        self.verbosity >= 2
    }

    fn info_enabled(&self) -> bool {
        self.verbosity >= 1
    }

    pub fn section(&self, title: &str) {
        if !self.quiet {
            println!("\n=== {} ===", title);
        }
    }

    pub fn debug(&self, message: &str) {
        if self.debug_enabled() && !self.quiet {
            println!("🐛 DEBUG: {}", message);
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("ℹ️  {}", message);
        }
    }

    pub fn detail(&self, message: &str) {
        if self.info_enabled() && !self.quiet {
            println!("   {}", message);
        }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("✅ {}", message);
        }
    }

    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("⚠️  WARNING: {}", message);
        }
    }

    pub fn error(&self, message: &str) {
        eprintln!("❌ ERROR: {}", message);
    }

    pub fn step(&self, message: &str) {
        if !self.quiet {
            println!("▶️  {}", message);
        }
    }

    /// Progress information, overwriting the current line.
    pub fn progress_line(&self, message: &str) {
        if !self.quiet {
            print!("\r⏳ {}", message);
            let _ = io::stdout().flush();
        }
    }

    pub fn progress_done(&self) {
        if !self.quiet {
            println!(" done");
        }
    }

    pub fn format_size(&self, bytes: u64) -> String {
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else if bytes < 1024 * 1024 * 1024 {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        } else {
            format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
        }
    }

    pub fn format_duration(&self, duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m{}s", secs / 60, secs % 60)
        } else {
            format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }
}

impl ProgressSink for Logger {
    fn on_progress(&self, stage: ProgressStage, layer: &str, done: u64, total: u64) {
        if self.quiet {
            return;
        }
        let verb = match stage {
            ProgressStage::Download => "downloading",
            ProgressStage::Extract => "extracting",
        };
        let short = &layer[..layer.len().min(12)];
        if total > 0 {
            self.progress_line(&format!(
                "{verb} {short}: {} / {}",
                self.format_size(done),
                self.format_size(total)
            ));
        } else {
            self.progress_line(&format!("{verb} {short}: {}", self.format_size(done)));
        }
    }

    fn on_layer_done(&self, layer: &str, message: &str) {
        if self.quiet {
            return;
        }
        let short = &layer[..layer.len().min(12)];
        self.progress_done();
        self.detail(&format!("{short}: {message}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_requires_double_verbose() {
        let logger = Logger::new(1);
        assert!(!logger.debug_enabled());
        let logger = Logger::new(2);
        assert!(logger.debug_enabled());
    }

    #[test]
    fn format_size_thresholds() {
        let logger = Logger::new(0);
        assert_eq!(logger.format_size(500), "500 B");
        assert_eq!(logger.format_size(2048), "2.0 KB");
    }
}
