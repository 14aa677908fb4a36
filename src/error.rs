use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort the whole run before any host is contacted.
#[derive(Error, Debug)]
pub enum FanoutError {
    #[error("Failed read hosts file {path}: {source}")]
    HostsFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("HOME is not set and no private key path was given")]
    MissingHome,
    #[error("Unable to read private key {path}: {source}")]
    KeyRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Unable to parse private key {path}: {reason}")]
    KeyParse { path: PathBuf, reason: String },
    #[error("Failed to write results: {0}")]
    Output(#[from] std::io::Error),
}

/// Why running the command on one host failed.
///
/// These never leave the batch. They end up in an `ExecutionResult` and get
/// printed as one `ERROR` line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("create connection: {0}")]
    Connect(String),
    #[error("create session: {0}")]
    Channel(String),
    #[error("run command: {0}")]
    Command(String),
}
