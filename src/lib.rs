//! Fanout: run one command on many hosts over SSH within a single deadline.

// Command line arguments and configuration.
pub mod config;
// Private key loading.
pub mod credential;
// Fan-out and collection of per-host results.
pub mod dispatch;
// Error handling.
pub mod error;
// Running the command on one host.
pub mod executor;
// How to parse and represent hosts.
pub mod host;
// SSH transport.
pub mod session;

pub use config::{Cli, Options};
pub use credential::Credential;
pub use dispatch::{Dispatcher, Outcome, Report};
pub use error::{ExecError, FanoutError};
pub use executor::{execute, ExecutionResult};
pub use host::{get_hosts, parse_hosts, Host};
pub use session::{Channel, Connection, OpenSshTransport, Transport};

use std::io::Write;

/// Loads hosts and the key, then runs the batch described by `cli`, writing
/// outcome lines to `out`.
///
/// Startup errors are returned before anything is written.
pub async fn run<W: Write>(cli: &Cli, out: &mut W) -> Result<Report, FanoutError> {
    // Hosts first, so a bad host file is reported before any key problem.
    let hosts = get_hosts(&cli.hosts_file)?;
    let options = cli.options()?;
    let credential = Credential::load(&options)?;

    let transport = OpenSshTransport::new(&options);
    let dispatcher = Dispatcher::new(transport, credential, options);
    let report = dispatcher.run(&cli.command, hosts, out).await?;
    tracing::info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        timed_out = report.timed_out(),
        "batch finished"
    );
    Ok(report)
}
