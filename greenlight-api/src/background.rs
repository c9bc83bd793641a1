/// Supervised fire-and-forget tasks
///
/// Handlers hand follow-up work (sending mail, mostly) to
/// [`BackgroundTasks::spawn`] and respond without waiting for it. Each task
/// is counted while it runs, so shutdown can wait for all of them. A task
/// that returns an error or panics is logged and dropped; it never takes the
/// server down with it.
///
/// # Example
///
/// ```no_run
/// use greenlight_api::background::BackgroundTasks;
///
/// # async fn example() {
/// let tasks = BackgroundTasks::new();
///
/// tasks.spawn("welcome email", async {
///     // deliver the message
///     Ok(())
/// });
///
/// // On shutdown
/// tasks.wait().await;
/// assert_eq!(tasks.in_flight(), 0);
/// # }
/// ```

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio_util::task::TaskTracker;

/// Tracker for background work
///
/// Cheap to clone; clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }

    /// Runs `task` detached from the caller
    ///
    /// The in-flight count is raised before this returns and lowered when the
    /// task finishes, whether it succeeded, failed or panicked.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.tracker.spawn(async move {
            match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(())) => tracing::debug!(task = name, "background task completed"),
                Ok(Err(e)) => tracing::error!(task = name, error = ?e, "background task failed"),
                Err(panic) => tracing::error!(
                    task = name,
                    panic = panic_message(panic.as_ref()),
                    "background task panicked"
                ),
            }
        });
    }

    /// Number of tasks that have not finished yet
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Whether [`BackgroundTasks::wait`] has been called
    pub fn is_closed(&self) -> bool {
        self.tracker.is_closed()
    }

    /// Waits until every task has finished
    ///
    /// Tasks spawned while waiting are waited for too.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
