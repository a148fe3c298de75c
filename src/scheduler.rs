use log::debug;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// A repeating task owned by the process lifecycle.
///
/// The task is either `scheduled` or `stopped`, nothing else: errors inside
/// the task are the task's own business (it is expected to catch and log
/// them), the schedule always re-arms. A slow invocation delays the next tick
/// instead of stacking new ones, since the timer only re-arms after the task
/// returns.
pub struct PeriodicTask {
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Starts invoking `task` every `interval`, forever.
    ///
    /// A zero interval means the feature is disabled by configuration: the
    /// returned handle is already stopped and the task is never invoked.
    pub fn spawn<F, Fut>(interval: Duration, mut task: F) -> PeriodicTask
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        if interval.is_zero() {
            debug!("Periodic task disabled by configuration");
            return PeriodicTask { handle: None };
        }

        let handle = tokio::spawn(async move {
            loop {
                sleep(interval).await;
                task().await;
            }
        });

        PeriodicTask {
            handle: Some(handle),
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.handle.is_some()
    }

    /// Stops the schedule. An in-flight invocation is not interruptible from
    /// the task's point of view, but no further ticks happen.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}
