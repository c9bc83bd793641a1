/// Graceful shutdown coordination
///
/// The server moves through three phases, published on a watch channel:
///
/// ```text
/// Running --signal--> Draining --requests done, background drained--> Stopped
/// ```
///
/// On the signal the listener is closed so new connections are refused.
/// In-flight requests get the grace period to finish, and then the
/// coordinator waits for every background task, however long that takes.
/// [`Coordinator::serve`] only returns `Ok` if all of that completed cleanly.
///
/// The trigger is any future, so tests can drive a shutdown without sending
/// the process a signal.
///
/// # Example
///
/// ```no_run
/// use greenlight_api::background::BackgroundTasks;
/// use greenlight_api::shutdown::{shutdown_signal, Coordinator};
/// use std::time::Duration;
///
/// # async fn example(router: axum::Router) -> anyhow::Result<()> {
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:4000").await?;
/// let coordinator = Coordinator::new(Duration::from_secs(20), BackgroundTasks::new());
///
/// coordinator.serve(listener, router, shutdown_signal()).await?;
/// # Ok(())
/// # }
/// ```

use axum::Router;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::background::BackgroundTasks;

/// Default grace period for in-flight requests
pub const DEFAULT_GRACE: Duration = Duration::from_secs(20);

/// Server lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accepting connections
    Running,

    /// Listener closed, waiting for requests and background work
    Draining,

    /// Everything finished
    Stopped,
}

/// Why the server did not stop cleanly
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    /// The listener or connection handling failed
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),

    /// In-flight requests outlived the grace period
    #[error("in-flight requests did not complete within {0:?}")]
    GraceExceeded(Duration),

    /// The server task panicked or was cancelled
    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Owns the server lifetime from first accept to final drain
#[derive(Debug)]
pub struct Coordinator {
    grace: Duration,
    tasks: BackgroundTasks,
    phase: watch::Sender<Phase>,
}

impl Coordinator {
    pub fn new(grace: Duration, tasks: BackgroundTasks) -> Self {
        let (phase, _) = watch::channel(Phase::Running);
        Self { grace, tasks, phase }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Receiver that observes every phase change
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Serves `router` on `listener` until `signal` resolves, then drains
    ///
    /// # Errors
    ///
    /// - `ShutdownError::Server` if the server failed
    /// - `ShutdownError::GraceExceeded` if requests were still running when
    ///   the grace period ran out
    ///
    /// Background tasks are drained in every case before this returns.
    pub async fn serve<F>(self, listener: TcpListener, router: Router, signal: F) -> Result<(), ShutdownError>
    where
        F: Future<Output = ()> + Send,
    {
        let stop_accepting = CancellationToken::new();
        let server_stop = stop_accepting.clone();

        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "starting server");
        }

        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(server_stop.cancelled_owned())
                .await
        });

        tokio::select! {
            _ = signal => {
                info!("shutting down server");
            }
            result = &mut server => {
                error!("server exited before a shutdown signal");
                let outcome = flatten(result);
                self.finish().await;
                return outcome;
            }
        }

        self.phase.send_replace(Phase::Draining);
        stop_accepting.cancel();

        let outcome = match tokio::time::timeout(self.grace, &mut server).await {
            Ok(result) => flatten(result),
            Err(_) => {
                error!(grace = ?self.grace, "in-flight requests outlived the grace period");
                server.abort();
                Err(ShutdownError::GraceExceeded(self.grace))
            }
        };

        self.finish().await;
        outcome
    }

    async fn finish(&self) {
        self.phase.send_replace(Phase::Draining);

        info!(in_flight = self.tasks.in_flight(), "completing background tasks");
        self.tasks.wait().await;

        self.phase.send_replace(Phase::Stopped);
        info!("stopped server");
    }
}

fn flatten(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), ShutdownError> {
    Ok(result??)
}

/// Resolves on Ctrl+C or SIGTERM
///
/// If a handler cannot be installed the error is logged and that source
/// never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "SIGINT", "caught signal"),
        _ = terminate => info!(signal = "SIGTERM", "caught signal"),
    }
}
