//! SSH Hosts.
//!
//! The host file holds one hostname per line. Each host gets its own SSH
//! connection, run in its own tokio task.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::FanoutError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Host {
    /// SSH hostname to connect to.
    pub hostname: String,
}

impl Host {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.hostname)
    }
}

/// Reads hosts from any line source.
///
/// Lines are taken verbatim except for their terminator. Empty lines are
/// skipped, everything else (including duplicates and whitespace) is kept in
/// order. Invalid UTF-8 is replaced rather than rejected, so a bad line only
/// fails its own host at connect time.
pub fn parse_hosts<R: BufRead>(reader: R) -> std::io::Result<Vec<Host>> {
    let mut hosts = vec![];
    for line in reader.split(b'\n') {
        let mut line = line?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if !line.is_empty() {
            hosts.push(Host::new(String::from_utf8_lossy(&line)));
        }
    }
    Ok(hosts)
}

pub fn get_hosts(hosts_file: impl AsRef<Path>) -> Result<Vec<Host>, FanoutError> {
    let path = hosts_file.as_ref();
    let to_error = |source| FanoutError::HostsFile {
        path: path.to_path_buf(),
        source,
    };
    let hosts_fd = File::open(path).map_err(to_error)?;
    let hosts = parse_hosts(BufReader::new(hosts_fd)).map_err(to_error)?;
    tracing::debug!(count = hosts.len(), file = %path.display(), "hosts loaded");
    Ok(hosts)
}
