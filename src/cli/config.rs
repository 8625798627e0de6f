// CLI configuration
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::output::OutputFormat;

/// chunkio - inspect chunked binary containers
#[derive(Parser, Debug)]
#[command(name = "chunkio")]
#[command(about = "Inspect PNG, OGG and WAV containers chunk by chunk", long_about = None)]
#[command(version)]
#[command(author = "xwsjjctz <xwsjjctz@icloud.com>")]
pub struct Config {
    /// Output format
    #[arg(short, long, value_enum, global = true, default_value = "pretty")]
    pub format: OutputFormat,

    /// Quiet mode (suppress progress messages, log errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

impl Config {
    /// Log filter directive implied by the verbosity flags
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect container format
    Detect {
        /// File path(s)
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
    /// List PNG chunks, OGG pages or the WAV layout
    Chunks {
        /// File path(s)
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Include base64 payloads
        #[arg(short, long)]
        payload: bool,
    },
    /// Recompute PNG chunk CRCs
    Verify {
        /// PNG file path(s)
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
    /// Print decoded WAV frames
    Samples {
        /// WAV file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Number of frames to print
        #[arg(short = 'n', long, default_value_t = 16)]
        count: usize,
    },
    /// Show file information
    Info {
        /// File path(s)
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Show format-specific details
        #[arg(short, long)]
        detailed: bool,
    },
    /// Run an operation over every file matching a pattern
    Batch {
        /// Directory to search
        #[arg(short, long)]
        directory: PathBuf,

        /// File pattern (e.g. "*.png")
        #[arg(short, long, default_value = "*")]
        pattern: String,

        /// Operation to perform
        #[arg(value_enum)]
        operation: BatchOperation,
    },
}

/// Batch operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BatchOperation {
    /// Detect the format of each file
    Detect,
    /// Verify CRCs of each PNG file
    Verify,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chunks() {
        let config = Config::try_parse_from(["chunkio", "-f", "json", "chunks", "a.png", "--payload"]).unwrap();
        assert_eq!(config.format, OutputFormat::Json);
        match config.command {
            Commands::Chunks { files, payload } => {
                assert_eq!(files, vec![PathBuf::from("a.png")]);
                assert!(payload);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_log_level() {
        let config = Config::try_parse_from(["chunkio", "detect", "x", "--verbose"]).unwrap();
        assert_eq!(config.log_level(), "debug");
        let config = Config::try_parse_from(["chunkio", "--quiet", "detect", "x"]).unwrap();
        assert_eq!(config.log_level(), "error");
        assert!(Config::try_parse_from(["chunkio", "-q", "-v", "detect", "x"]).is_err());
    }

    #[test]
    fn test_batch_operation() {
        let config =
            Config::try_parse_from(["chunkio", "batch", "-d", "media", "-p", "*.png", "verify"]).unwrap();
        assert!(matches!(
            config.command,
            Commands::Batch { operation: BatchOperation::Verify, .. }
        ));
    }

    #[test]
    fn test_detect_requires_files() {
        assert!(Config::try_parse_from(["chunkio", "detect"]).is_err());
    }
}
