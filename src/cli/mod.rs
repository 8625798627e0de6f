// CLI module for chunkio
//
// Command-line front end over the library. Only compiled into the binary.

pub mod commands;
pub mod config;
pub mod output;

pub use commands::run;
pub use config::{BatchOperation, Commands, Config};

// Error type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub enum CliError {
    FileNotFound(String),
    InvalidFormat(String),
    IoError(std::io::Error),
    ParseError(String),
    Library(chunkio::Error),
    /// Some PNG chunks failed CRC verification
    CrcMismatch(usize),
    Other(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::FileNotFound(path) => write!(f, "File not found: {}", path),
            CliError::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
            CliError::IoError(e) => write!(f, "I/O error: {}", e),
            CliError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            CliError::Library(e) => write!(f, "{}", e),
            CliError::CrcMismatch(count) => write!(f, "{} chunk(s) failed CRC verification", count),
            CliError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::IoError(e) => Some(e),
            CliError::Library(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::IoError(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::ParseError(e.to_string())
    }
}

impl From<chunkio::Error> for CliError {
    fn from(e: chunkio::Error) -> Self {
        match e {
            chunkio::Error::Io(io) => CliError::IoError(io),
            chunkio::Error::FormatMismatch(msg) => CliError::InvalidFormat(msg),
            other => CliError::Library(other),
        }
    }
}
