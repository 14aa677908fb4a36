//! Fan-out and collection.
//!
//! One tokio task per host runs the executor and pushes its result into a
//! bounded channel. The collector drains that channel in arrival order until
//! every host reported or the batch deadline fires.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

use crate::config::Options;
use crate::credential::Credential;
use crate::error::ExecError;
use crate::executor::{execute, ExecutionResult};
use crate::host::Host;
use crate::session::Transport;

/// One reported line of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok { host: Host, output: String },
    Failed { host: Host, error: ExecError },
    TimedOut { host: Host },
}

impl Outcome {
    /// Writes the outcome line, followed by the captured output if asked to.
    fn write_to<W: Write>(&self, out: &mut W, print_output: bool) -> std::io::Result<()> {
        writeln!(out, "{}", self)?;
        if let Outcome::Ok { host, output } = self {
            if print_output {
                for line in output.lines() {
                    writeln!(out, "{}: {}", host, line)?;
                }
            }
        }
        out.flush()
    }
}

impl From<ExecutionResult> for Outcome {
    fn from(result: ExecutionResult) -> Self {
        let host = result.host;
        match result.outcome {
            Ok(output) => Outcome::Ok { host, output },
            Err(error) => Outcome::Failed { host, error },
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::Ok { host, .. } => write!(f, "{} OK", host),
            Outcome::Failed { host, error } => write!(
                f,
                "ERROR: Failed running cmd on host {} with error: {}",
                host, error
            ),
            Outcome::TimedOut { host } => write!(f, "{} Timed out!", host),
        }
    }
}

/// Everything a batch reported, in the order it was printed.
#[derive(Debug, Default)]
pub struct Report {
    pub outcomes: Vec<Outcome>,
}

impl Report {
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Ok { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    pub fn timed_out(&self) -> bool {
        self.outcomes
            .last()
            .map_or(false, |o| matches!(o, Outcome::TimedOut { .. }))
    }

    fn count(&self, predicate: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(o)).count()
    }
}

pub struct Dispatcher<T> {
    transport: Arc<T>,
    credential: Arc<Credential>,
    options: Options,
}

impl<T: Transport + 'static> Dispatcher<T> {
    pub fn new(transport: T, credential: Credential, options: Options) -> Self {
        Self {
            transport: Arc::new(transport),
            credential: Arc::new(credential),
            options,
        }
    }

    /// Runs `command` on every host and writes one line per outcome to `out`.
    ///
    /// Returns once every host reported or the deadline fired, whichever is
    /// first. Only errors writing to `out` are returned.
    pub async fn run<W: Write>(
        &self,
        command: &str,
        hosts: Vec<Host>,
        out: &mut W,
    ) -> std::io::Result<Report> {
        let num_hosts = hosts.len();
        tracing::info!(hosts = num_hosts, timeout = ?self.options.timeout, "dispatching");

        // MPMC channel (used as MPSC) for executor tasks to hand back results.
        let (result_tx, result_rx) =
            flume::bounded::<ExecutionResult>(self.options.channel_capacity);

        let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(num_hosts);
        for host in hosts.iter().cloned() {
            let transport = Arc::clone(&self.transport);
            let credential = Arc::clone(&self.credential);
            let command = command.to_string();
            let result_tx = result_tx.clone();
            tasks.push(tokio::spawn(async move {
                let result = execute(transport.as_ref(), &command, &host, &credential).await;
                // The collector may have stopped listening already.
                let _ = result_tx.send_async(result).await;
            }));
        }
        drop(result_tx);

        // Hosts that have not reported yet, in launch order.
        let mut pending = hosts;
        let mut report = Report::default();
        let deadline = Instant::now() + self.options.timeout;

        for _ in 0..num_hosts {
            match timeout_at(deadline, result_rx.recv_async()).await {
                Ok(Ok(result)) => {
                    if let Some(index) = pending.iter().position(|h| *h == result.host) {
                        pending.remove(index);
                    }
                    let outcome = Outcome::from(result);
                    outcome.write_to(out, self.options.print_output)?;
                    report.outcomes.push(outcome);
                }
                Ok(Err(_)) => {
                    // Every executor task is gone without sending, i.e. some panicked.
                    tracing::warn!(unreported = pending.len(), "executor tasks exited early");
                    break;
                }
                Err(_) => {
                    tracing::warn!(unreported = pending.len(), "batch deadline reached");
                    if let Some(host) = pending.first() {
                        let outcome = Outcome::TimedOut { host: host.clone() };
                        outcome.write_to(out, false)?;
                        report.outcomes.push(outcome);
                    }
                    if self.options.abort_on_timeout {
                        abort_unfinished(&tasks);
                    }
                    break;
                }
            }
        }

        Ok(report)
    }
}

fn abort_unfinished(tasks: &[JoinHandle<()>]) {
    let mut aborted = 0;
    for task in tasks.iter().filter(|task| !task.is_finished()) {
        task.abort();
        aborted += 1;
    }
    tracing::info!(aborted, "aborted unfinished executor tasks");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(host: &str, output: &str) -> Outcome {
        Outcome::Ok {
            host: Host::new(host),
            output: output.to_string(),
        }
    }

    #[test]
    fn test_outcome_lines() {
        assert_eq!(ok("a", "").to_string(), "a OK");
        assert_eq!(
            Outcome::Failed {
                host: Host::new("b"),
                error: ExecError::Connect("connection refused".to_string()),
            }
            .to_string(),
            "ERROR: Failed running cmd on host b with error: create connection: connection refused"
        );
        assert_eq!(
            Outcome::TimedOut {
                host: Host::new("c")
            }
            .to_string(),
            "c Timed out!"
        );
    }

    #[test]
    fn test_write_with_output() {
        let mut buf = Vec::new();
        ok("a", "one\ntwo\n").write_to(&mut buf, true).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "a OK\na: one\na: two\n");

        let mut buf = Vec::new();
        ok("a", "one\ntwo\n").write_to(&mut buf, false).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "a OK\n");
    }

    #[test]
    fn test_report_counts() {
        let report = Report {
            outcomes: vec![
                ok("a", ""),
                Outcome::Failed {
                    host: Host::new("b"),
                    error: ExecError::Command("Process exited with status 1".to_string()),
                },
                Outcome::TimedOut {
                    host: Host::new("c"),
                },
            ],
        };
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert!(report.timed_out());
        assert!(!Report::default().timed_out());
    }
}
