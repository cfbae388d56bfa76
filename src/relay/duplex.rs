//! Duplex relay between two connected streams.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::net::connection::SessionId;
use crate::observability::metrics;
use crate::relay::{
    classify_io_error, CloseReason, CopyOutcome, Direction, RelayConfig, RelayReport, RelayState,
    RelayStream, Teardown,
};

/// Copies bytes both ways between two streams until both directions finish
/// or the teardown bound expires.
#[derive(Debug, Clone)]
pub struct DuplexRelay {
    config: RelayConfig,
    span: tracing::Span,
}

impl DuplexRelay {
    /// Create a relay that logs under `span`.
    pub fn new(config: RelayConfig, span: tracing::Span) -> Self {
        Self { config, span }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Relay until the session ends. Both streams are closed on return.
    pub async fn run<C, S>(&self, client: C, server: S, session_id: &SessionId) -> RelayReport
    where
        C: RelayStream,
        S: RelayStream,
    {
        let span = tracing::info_span!(parent: &self.span, "relay", session_id = %session_id);
        self.run_inner(client, server).instrument(span).await
    }

    async fn run_inner<C, S>(&self, client: C, server: S) -> RelayReport
    where
        C: RelayStream,
        S: RelayStream,
    {
        let (client_read, client_write) = tokio::io::split(client);
        let (server_read, server_write) = tokio::io::split(server);

        // One slot per direction, so try_send never finds the channel full.
        let (done_tx, mut done_rx) = mpsc::channel::<CopyOutcome>(2);

        // Aborted on drop, so a cancelled relay does not leave the copy tasks
        // holding either stream.
        let mut tasks = CopyTasks([
            self.spawn_copy(Direction::ClientToServer, client_read, server_write, done_tx.clone()),
            self.spawn_copy(Direction::ServerToClient, server_read, client_write, done_tx),
        ]);

        let mut state = RelayState::Running;
        tracing::debug!(state = ?state, "Relay started");

        let first = match done_rx.recv().await {
            Some(outcome) => outcome,
            None => {
                tracing::error!("Both copy tasks exited without reporting");
                tasks.abort_and_join().await;
                return RelayReport {
                    first: None,
                    second: None,
                    teardown: Teardown::Completed,
                    state: RelayState::TornDown,
                };
            }
        };

        state = RelayState::FirstClosed;
        tracing::info!(
            closed_side = %first.direction.source(),
            direction = %first.direction,
            teardown_secs = self.config.teardown.as_secs_f64(),
            state = ?state,
            "First side closed, waiting for the other direction"
        );

        let (second, teardown) = match tokio::time::timeout(self.config.teardown, done_rx.recv()).await {
            Ok(second) => (second, Teardown::Completed),
            Err(_) => (None, Teardown::TimedOut),
        };

        // Joins finished tasks; cancels and drops the halves of a stuck one.
        tasks.abort_and_join().await;
        state = RelayState::TornDown;

        match teardown {
            Teardown::Completed => {
                tracing::info!(state = ?state, "Teardown completed");
            }
            Teardown::TimedOut => {
                metrics::teardown_timed_out();
                tracing::warn!(
                    state = ?state,
                    teardown_secs = self.config.teardown.as_secs_f64(),
                    "Teardown timed out, forcing session closed"
                );
            }
        }

        RelayReport {
            first: Some(first),
            second,
            teardown,
            state,
        }
    }

    fn spawn_copy<R, W>(
        &self,
        direction: Direction,
        reader: R,
        writer: W,
        done: mpsc::Sender<CopyOutcome>,
    ) -> JoinHandle<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let buffer_size = self.config.buffer_size;
        let span = tracing::debug_span!("copy", direction = %direction);
        tokio::spawn(
            async move {
                let outcome = copy_direction(direction, reader, writer, buffer_size).await;
                log_outcome(&outcome);
                metrics::bytes_relayed(direction, outcome.bytes);
                if done.try_send(outcome).is_err() {
                    tracing::debug!("Relay no longer waiting for completion report");
                }
            }
            .instrument(span),
        )
    }
}

/// Copy `reader` into `writer` until end of stream or an error, then
/// half-close `writer`.
async fn copy_direction<R, W>(direction: Direction, mut reader: R, mut writer: W, buffer_size: usize) -> CopyOutcome
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut bytes = 0u64;

    let reason = loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break CloseReason::Eof,
            Ok(n) => n,
            Err(e) => break classify_io_error(e),
        };
        if let Err(e) = writer.write_all(&buf[..n]).await {
            break classify_io_error(e);
        }
        bytes += n as u64;
    };

    // Signal "no more data from this direction"; the destination's read half
    // stays open so the opposite direction can keep draining.
    if let Err(e) = writer.shutdown().await {
        tracing::debug!(
            side = %direction.destination(),
            error = %e,
            "Half-close failed"
        );
    }

    CopyOutcome {
        direction,
        bytes,
        reason,
    }
}

fn log_outcome(outcome: &CopyOutcome) {
    match &outcome.reason {
        CloseReason::Failed(e) => tracing::warn!(
            direction = %outcome.direction,
            bytes = outcome.bytes,
            error = %e,
            "Copy failed"
        ),
        reason => tracing::info!(
            direction = %outcome.direction,
            bytes = outcome.bytes,
            reason = %reason,
            "Copy finished"
        ),
    }
}

/// The two copy tasks of one relay.
struct CopyTasks([JoinHandle<()>; 2]);

impl CopyTasks {
    async fn abort_and_join(&mut self) {
        for task in self.0.iter() {
            task.abort();
        }
        for task in self.0.iter_mut() {
            // Cancelled or finished; either way the task's halves are dropped.
            let _ = task.await;
        }
    }
}

impl Drop for CopyTasks {
    fn drop(&mut self) {
        for task in self.0.iter() {
            task.abort();
        }
    }
}
