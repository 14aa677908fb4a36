//! Configuration for Fanout.
//!
//! `Cli` holds the clap structs for command line arguments and flags.
//! `Options` is the resolved configuration the rest of the crate runs on.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::FanoutError;

pub const DEFAULT_USER: &str = "root";
pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10;

#[derive(Parser, Debug)]
#[command(version, author, about)]
pub struct Cli {
    /// Command to run on every host
    pub command: String,

    /// File with one hostname per line
    pub hosts_file: PathBuf,

    /// Remote login name
    #[arg(long, short, default_value = DEFAULT_USER)]
    pub user: String,

    /// Target TCP port
    #[arg(long, short, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Private key to authenticate with. Defaults to `$HOME/.ssh/id_rsa`
    #[arg(long = "key", short = 'i')]
    pub key_path: Option<PathBuf>,

    /// Seconds to wait for the whole batch before giving up
    #[arg(long, short, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Don't verify host identity against known hosts
    #[arg(long)]
    pub insecure: bool,

    /// How many results may be buffered before executor tasks block
    #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    /// Abort commands that are still running when the deadline fires
    #[arg(long)]
    pub abort_on_timeout: bool,

    /// Print captured stdout below each OK line
    #[arg(long)]
    pub print_output: bool,
}

impl Cli {
    /// Resolves flags into `Options`, falling back to `$HOME` for the key.
    pub fn options(&self) -> Result<Options, FanoutError> {
        let key_path = match &self.key_path {
            Some(path) => path.clone(),
            None => default_key_path(std::env::var_os("HOME").map(PathBuf::from))?,
        };
        Ok(Options {
            key_path,
            user: self.user.clone(),
            port: self.port,
            timeout: Duration::from_secs(self.timeout),
            verify_host_identity: !self.insecure,
            channel_capacity: self.channel_capacity.max(1),
            abort_on_timeout: self.abort_on_timeout,
            print_output: self.print_output,
        })
    }
}

fn default_key_path(home: Option<PathBuf>) -> Result<PathBuf, FanoutError> {
    let home = home.ok_or(FanoutError::MissingHome)?;
    Ok(home.join(".ssh").join("id_rsa"))
}

#[derive(Debug, Clone)]
pub struct Options {
    /// Location of the private key.
    pub key_path: PathBuf,
    /// Remote login name.
    pub user: String,
    /// Target TCP port.
    pub port: u16,
    /// Batch-wide deadline, measured from the start of collection.
    pub timeout: Duration,
    /// Check the server's host key against known hosts.
    pub verify_host_identity: bool,
    pub channel_capacity: usize,
    pub abort_on_timeout: bool,
    pub print_output: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            key_path: PathBuf::from(".ssh/id_rsa"),
            user: DEFAULT_USER.to_string(),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            verify_host_identity: true,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            abort_on_timeout: false,
            print_output: false,
        }
    }
}
