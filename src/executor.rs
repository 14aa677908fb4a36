//! Running one command on one host.

use crate::credential::Credential;
use crate::error::ExecError;
use crate::host::Host;
use crate::session::{Connection, Transport};

/// Outcome of running the command on a single host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub host: Host,
    /// Captured stdout on success.
    pub outcome: Result<String, ExecError>,
}

/// Connects to `host`, runs `command`, and captures its stdout.
///
/// Never fails as a whole: every error is folded into the returned result.
/// Whatever was acquired (connection, channel) is closed before returning,
/// on every path.
pub async fn execute<T: Transport + ?Sized>(
    transport: &T,
    command: &str,
    host: &Host,
    credential: &Credential,
) -> ExecutionResult {
    let outcome = match transport.connect(host, credential).await {
        Ok(connection) => {
            let outcome = run_on(&*connection, command).await;
            connection.close().await;
            outcome
        }
        Err(e) => Err(e),
    };
    if let Err(e) = &outcome {
        tracing::debug!(%host, error = %e, "command failed");
    }
    ExecutionResult {
        host: host.clone(),
        outcome,
    }
}

async fn run_on(connection: &dyn Connection, command: &str) -> Result<String, ExecError> {
    let mut channel = connection.open_channel(command).await?;
    let output = channel.run().await;
    channel.close().await;
    output
}
