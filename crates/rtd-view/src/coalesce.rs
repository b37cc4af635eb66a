use std::time::Duration;
use tokio::task::JoinHandle;

/// Trailing-edge debounce: `schedule` cancels any pending run and arms a
/// fresh timer, so a burst of calls executes once, `delay` after the
/// last call. Dropping the coalescer cancels the pending run.
#[derive(Debug, Default)]
pub struct Coalescer {
    pending: Option<JoinHandle<()>>,
}

impl Coalescer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F>(&mut self, delay: Duration, run: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            run();
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Coalescer {
    fn drop(&mut self) {
        self.cancel();
    }
}
