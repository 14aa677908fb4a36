//! SSH transport.
//!
//! The executor only talks to the three traits below, so tests can swap in a
//! fake transport. `OpenSshTransport` is the real one, driving the system
//! `ssh` client through `openssh` with native multiplexing.

use std::process::ExitStatus;

use async_trait::async_trait;
use openssh::{KnownHosts, RemoteChild, Session as SSHSession, SessionBuilder, Stdio};
use tokio::io::AsyncReadExt;

use crate::config::Options;
use crate::credential::Credential;
use crate::error::ExecError;
use crate::host::Host;

/// Dials hosts.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(
        &self,
        host: &Host,
        credential: &Credential,
    ) -> Result<Box<dyn Connection>, ExecError>;
}

/// An established, authenticated connection to one host.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Starts `command` on the remote side.
    async fn open_channel<'a>(&'a self, command: &str)
        -> Result<Box<dyn Channel + 'a>, ExecError>;

    async fn close(self: Box<Self>);
}

/// One running remote command.
#[async_trait]
pub trait Channel: Send {
    /// Waits for the command and returns everything it wrote to stdout.
    async fn run(&mut self) -> Result<String, ExecError>;

    async fn close(self: Box<Self>);
}

pub struct OpenSshTransport {
    port: u16,
    verify_host_identity: bool,
}

impl OpenSshTransport {
    pub fn new(options: &Options) -> Self {
        if !options.verify_host_identity {
            tracing::warn!("host identity verification is disabled");
        }
        Self {
            port: options.port,
            verify_host_identity: options.verify_host_identity,
        }
    }
}

#[async_trait]
impl Transport for OpenSshTransport {
    async fn connect(
        &self,
        host: &Host,
        credential: &Credential,
    ) -> Result<Box<dyn Connection>, ExecError> {
        let known_hosts = if self.verify_host_identity {
            KnownHosts::Strict
        } else {
            KnownHosts::Accept
        };
        let mut builder = SessionBuilder::default();
        builder
            .user(credential.user.clone())
            .port(self.port)
            .keyfile(&credential.key_path)
            .known_hosts_check(known_hosts);
        let session = builder
            .connect_mux(&host.hostname)
            .await
            .map_err(|e| ExecError::Connect(e.to_string()))?;
        tracing::debug!(%host, "connected");
        Ok(Box::new(OpenSshConnection {
            host: host.clone(),
            session,
        }))
    }
}

struct OpenSshConnection {
    host: Host,
    session: SSHSession,
}

#[async_trait]
impl Connection for OpenSshConnection {
    async fn open_channel<'a>(
        &'a self,
        command: &str,
    ) -> Result<Box<dyn Channel + 'a>, ExecError> {
        // The command goes to the remote shell as is, without escaping.
        let child = self
            .session
            .raw_command(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .await
            .map_err(|e| ExecError::Channel(e.to_string()))?;
        Ok(Box::new(OpenSshChannel { child: Some(child) }))
    }

    async fn close(self: Box<Self>) {
        let OpenSshConnection { host, session } = *self;
        if let Err(e) = session.close().await {
            tracing::debug!(%host, error = %e, "error while terminating connection");
        } else {
            tracing::debug!(%host, "connection closed");
        }
    }
}

struct OpenSshChannel<'s> {
    /// `None` once the child has been waited on.
    child: Option<RemoteChild<'s>>,
}

#[async_trait]
impl<'s> Channel for OpenSshChannel<'s> {
    async fn run(&mut self) -> Result<String, ExecError> {
        let mut child = self
            .child
            .take()
            .ok_or_else(|| ExecError::Command("command already ran".to_string()))?;

        let mut output = Vec::new();
        if let Some(mut stdout) = child.stdout().take() {
            if let Err(e) = stdout.read_to_end(&mut output).await {
                // Keep the child around so `close` can release it.
                self.child = Some(child);
                return Err(ExecError::Command(e.to_string()));
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ExecError::Command(e.to_string()))?;
        check_status(status)?;
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    async fn close(self: Box<Self>) {
        if let Some(child) = self.child {
            if let Err(e) = child.disconnect().await {
                tracing::debug!(error = %e, "error while releasing remote command");
            }
        }
    }
}

fn check_status(status: ExitStatus) -> Result<(), ExecError> {
    if status.success() {
        return Ok(());
    }
    Err(ExecError::Command(match status.code() {
        Some(code) => format!("Process exited with status {}", code),
        None => "Process terminated without an exit status".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_check_status() {
        use std::os::unix::process::ExitStatusExt;

        assert!(check_status(ExitStatus::from_raw(0)).is_ok());
        assert_eq!(
            check_status(ExitStatus::from_raw(2 << 8)),
            Err(ExecError::Command(
                "Process exited with status 2".to_string()
            ))
        );
    }
}
