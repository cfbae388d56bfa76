//! Proxy server: accept loop and session dispatch.
//!
//! # Responsibilities
//! - Accept inbound connections under the connection limit
//! - Spawn one task per session with the current session settings
//! - Apply reloaded configuration to sessions accepted afterwards
//! - Back off on accept errors; give up after a sustained error storm
//! - Stop accepting on shutdown and drain in-flight sessions

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tracing::Instrument;

use crate::config::{AcceptConfig, ProxyConfig};
use crate::net::{Listener, ListenerError, SessionTracker};
use crate::observability::metrics;
use crate::relay::Teardown;
use crate::resilience::backoff::accept_backoff;
use crate::session::{ProxySession, SessionSettings};

/// Fatal server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("giving up after {count} consecutive accept errors: {last}")]
    AcceptStorm {
        count: u32,
        #[source]
        last: ListenerError,
    },
}

/// The metadata-injecting TCP proxy.
pub struct ProxyServer {
    config: ProxyConfig,
    settings: Arc<ArcSwap<SessionSettings>>,
    tracker: SessionTracker,
}

impl ProxyServer {
    /// Create a server from a validated configuration.
    pub fn new(config: ProxyConfig) -> Self {
        let settings = Arc::new(ArcSwap::from_pointee(config.session_settings()));
        Self {
            config,
            settings,
            tracker: SessionTracker::new(),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Settings the next accepted session will use.
    pub fn current_settings(&self) -> Arc<SessionSettings> {
        self.settings.load_full()
    }

    pub fn active_sessions(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Run until `shutdown` fires or accepting fails persistently.
    ///
    /// Configs received on `config_updates` replace the session settings for
    /// new sessions. Listener-level settings (bind address, connection cap)
    /// are fixed at startup.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let listener = Listener::from_tcp(listener, self.config.listener.max_connections);
        let accept_config = self.config.accept.clone();
        let mut consecutive_errors = 0u32;
        let mut updates_open = true;

        let initial = self.settings.load_full();
        tracing::info!(
            destination = %initial.destination,
            entries = initial.header.len(),
            "Proxy server starting"
        );

        let result = loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break Ok(());
                }
                update = config_updates.recv(), if updates_open => match update {
                    Some(config) => self.apply_config(&config),
                    None => updates_open = false,
                },
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr, permit)) => {
                        consecutive_errors = 0;
                        if let Err(e) = stream.set_nodelay(true) {
                            tracing::debug!(error = %e, "Failed to set TCP_NODELAY on inbound");
                        }

                        let guard = self.tracker.track();
                        let span = tracing::info_span!("conn", peer = %peer_addr);
                        let session = ProxySession::new((*self.settings.load_full()).clone(), span.clone());

                        tokio::spawn(async move {
                            let _permit = permit;
                            let outcome = match session.handle(stream, guard.id()).await {
                                Ok(report) => match report.teardown {
                                    Teardown::Completed => "completed",
                                    Teardown::TimedOut => "teardown_timeout",
                                },
                                Err(e) => {
                                    tracing::warn!(session_id = %guard.id(), error = %e, "Session aborted");
                                    e.kind()
                                }
                            };
                            metrics::record_session(outcome);
                        }.instrument(span));
                    }
                    Err(ListenerError::Closed) => break Err(ListenerError::Closed.into()),
                    Err(e) => {
                        consecutive_errors += 1;
                        metrics::accept_failed();
                        let delay = match self.on_accept_error(e, consecutive_errors, &accept_config) {
                            Ok(delay) => delay,
                            Err(fatal) => break Err(fatal),
                        };
                        if back_off(delay, &mut shutdown).await {
                            tracing::info!("Shutdown signal received during accept backoff");
                            break Ok(());
                        }
                    }
                },
            }
        };

        let drain = Duration::from_secs(self.config.timeouts.drain_secs);
        tracing::info!(
            active_sessions = self.tracker.active_count(),
            drain_secs = drain.as_secs(),
            "Draining sessions"
        );
        if listener.drain(drain).await {
            tracing::info!("All sessions finished");
        } else {
            tracing::warn!(
                active_sessions = self.tracker.active_count(),
                "Drain deadline passed with sessions still running"
            );
        }

        result
    }

    fn apply_config(&self, config: &ProxyConfig) {
        let settings = config.session_settings();
        tracing::info!(
            destination = %settings.destination,
            entries = settings.header.len(),
            teardown_secs = settings.relay.teardown.as_secs(),
            "Applying reloaded configuration to new sessions"
        );
        self.settings.store(Arc::new(settings));
    }

    /// Decide how long to wait after a failed accept. Returns the fatal
    /// error once the failure streak reaches the configured limit.
    fn on_accept_error(
        &self,
        error: ListenerError,
        consecutive_errors: u32,
        config: &AcceptConfig,
    ) -> Result<Duration, ServerError> {
        if consecutive_errors >= config.max_consecutive_errors {
            tracing::error!(
                error = %error,
                consecutive_errors,
                "Accept keeps failing, stopping server"
            );
            return Err(ServerError::AcceptStorm {
                count: consecutive_errors,
                last: error,
            });
        }

        let delay = accept_backoff(consecutive_errors, config);
        tracing::warn!(
            error = %error,
            consecutive_errors,
            delay = ?delay,
            "Failed to accept connection, backing off"
        );
        Ok(delay)
    }
}

/// Sleep for `delay` unless shutdown fires first. Returns `true` on shutdown.
async fn back_off(delay: Duration, shutdown: &mut broadcast::Receiver<()>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown.recv() => true,
    }
}
