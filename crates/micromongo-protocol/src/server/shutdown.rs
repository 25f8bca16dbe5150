//! Shutdown coordination
//!
//! A single [`CancellationToken`] is shared by the accept loop and every
//! connection (through child tokens). Triggering it stops accepting; draining
//! waits for each connection task to observe the cancellation.

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use micromongo_common::error::Result;
use micromongo_common::metrics;

use super::connection::{ConnectionOutcome, ConnectionReport};

/// Counts gathered while draining connection tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Tasks that stopped because of the cancellation
    pub cancelled: usize,
    /// Tasks whose peer had already closed
    pub completed: usize,
    /// Tasks that ended with an error or panicked
    pub failed: usize,
}

impl ShutdownReport {
    pub fn total(&self) -> usize {
        self.cancelled + self.completed + self.failed
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Token for one connection; cancelled together with the coordinator
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Request shutdown. Later calls are ignored.
    pub fn trigger(&self, reason: &str) {
        if self.token.is_cancelled() {
            debug!("Shutdown already in progress, ignoring {}", reason);
            return;
        }
        warn!("Stopping due to {}...", reason);
        self.token.cancel();
    }

    /// Resolves once shutdown has been requested
    pub async fn triggered(&self) {
        self.token.cancelled().await;
    }

    /// Wait for a termination signal, then trigger shutdown
    pub async fn listen_for_signals(&self) -> std::io::Result<()> {
        let name = wait_for_signal().await?;
        self.trigger(name);
        Ok(())
    }

    /// Cancel every connection task and wait for all of them.
    ///
    /// Tasks that report cancellation, or were aborted, count as cancelled.
    pub async fn drain(&self, mut tasks: JoinSet<Result<ConnectionReport>>) -> ShutdownReport {
        self.token.cancel();

        let mut report = ShutdownReport::default();
        while let Some(joined) = tasks.join_next().await {
            record_joined(&mut report, joined);
        }

        info!("Cancelled {} tasks.", report.cancelled);
        metrics::record_tasks_cancelled(report.cancelled as u64);
        report
    }
}

fn record_joined(report: &mut ShutdownReport, joined: std::result::Result<Result<ConnectionReport>, JoinError>) {
    match joined {
        Ok(Ok(conn)) => match conn.outcome {
            ConnectionOutcome::Cancelled => report.cancelled += 1,
            ConnectionOutcome::Closed => report.completed += 1,
        },
        Ok(Err(e)) => {
            warn!(error = %e, "Connection ended with error during shutdown");
            report.failed += 1;
        }
        Err(e) if e.is_cancelled() => report.cancelled += 1,
        Err(e) => {
            error!(error = %e, "Connection task panicked");
            report.failed += 1;
        }
    }
}

/// Wait for SIGINT, SIGTERM or SIGHUP and return its name
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = hangup.recv() => "SIGHUP",
    };
    Ok(name)
}

/// Wait for Ctrl+C
#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("CTRL_C")
}
