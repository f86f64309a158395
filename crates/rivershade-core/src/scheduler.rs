// ABOUTME: Debounced preview writes: only the last patch scheduled within the delay is written.
// ABOUTME: Disposal aborts and joins the timer task so no preview write can land afterwards.

use crate::error::Result;
use crate::mapper::ColorKeyMap;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_PREVIEW_DELAY: Duration = Duration::from_millis(120);

/// Destination of preview writes.
#[async_trait]
pub trait PreviewSink: Send + Sync {
    async fn write_preview(&self, patch: &ColorKeyMap) -> Result<()>;
}

#[derive(Default)]
struct SchedulerState {
    pending: Option<ColorKeyMap>,
    timer: Option<JoinHandle<()>>,
    disposed: bool,
}

fn lock(state: &Mutex<SchedulerState>) -> MutexGuard<'_, SchedulerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct PreviewScheduler {
    sink: Arc<dyn PreviewSink>,
    delay: Duration,
    state: Arc<Mutex<SchedulerState>>,
}

impl PreviewScheduler {
    pub fn new(sink: Arc<dyn PreviewSink>, delay: Duration) -> Self {
        Self {
            sink,
            delay,
            state: Arc::new(Mutex::new(SchedulerState::default())),
        }
    }

    pub fn with_default_delay(sink: Arc<dyn PreviewSink>) -> Self {
        Self::new(sink, DEFAULT_PREVIEW_DELAY)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn has_pending(&self) -> bool {
        lock(&self.state).pending.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        lock(&self.state).disposed
    }

    /// Replace the pending patch and restart the timer. Must be called inside a tokio runtime.
    pub fn schedule(&self, patch: ColorKeyMap) {
        let mut state = lock(&self.state);
        if state.disposed {
            debug!("preview ignored, scheduler disposed");
            return;
        }
        state.pending = Some(patch);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        let shared = self.state.clone();
        let sink = self.sink.clone();
        let delay = self.delay;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let patch = {
                let state = lock(&shared);
                if state.disposed {
                    None
                } else {
                    state.pending.clone()
                }
            };
            let Some(patch) = patch else {
                return;
            };
            match sink.write_preview(&patch).await {
                Ok(()) => {
                    let mut state = lock(&shared);
                    if state.pending.as_ref() == Some(&patch) {
                        state.pending = None;
                    }
                }
                Err(e) => warn!(error = %e, "preview write failed"),
            }
        }));
    }

    /// Cancel the timer and write the pending patch now.
    pub async fn flush(&self) -> Result<()> {
        self.cancel_timer().await;
        let patch = {
            let mut state = lock(&self.state);
            if state.disposed {
                None
            } else {
                state.pending.take()
            }
        };
        match patch {
            Some(patch) => self.sink.write_preview(&patch).await,
            None => Ok(()),
        }
    }

    /// Drop the pending patch and stop the timer. Later calls to `schedule` are ignored.
    pub async fn dispose(&self) {
        {
            let mut state = lock(&self.state);
            state.disposed = true;
            state.pending = None;
        }
        self.cancel_timer().await;
    }

    async fn cancel_timer(&self) {
        let timer = lock(&self.state).timer.take();
        if let Some(timer) = timer {
            timer.abort();
            // Joining guarantees an aborted write is no longer running.
            let _ = timer.await;
        }
    }
}

impl Drop for PreviewScheduler {
    fn drop(&mut self) {
        if let Some(timer) = lock(&self.state).timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RiverShadeError;

    #[derive(Default)]
    struct RecordingSink {
        writes: Mutex<Vec<ColorKeyMap>>,
        fail: bool,
    }

    impl RecordingSink {
        fn writes(&self) -> Vec<ColorKeyMap> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PreviewSink for RecordingSink {
        async fn write_preview(&self, patch: &ColorKeyMap) -> Result<()> {
            if self.fail {
                return Err(RiverShadeError::State("sink down".to_string()));
            }
            self.writes.lock().unwrap().push(patch.clone());
            Ok(())
        }
    }

    fn patch(color: &str) -> ColorKeyMap {
        let mut map = ColorKeyMap::new();
        map.insert("titleBar.activeBackground".to_string(), color.to_string());
        map
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_previews_coalesce_to_last() {
        let sink = Arc::new(RecordingSink::default());
        let scheduler = PreviewScheduler::with_default_delay(sink.clone());

        scheduler.schedule(patch("#111111"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.schedule(patch("#222222"));
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(sink.writes(), vec![patch("#222222")]);
        assert!(!scheduler.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_written_before_delay() {
        let sink = Arc::new(RecordingSink::default());
        let scheduler = PreviewScheduler::new(sink.clone(), Duration::from_millis(200));
        scheduler.schedule(patch("#111111"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(sink.writes().is_empty());
        assert!(scheduler.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_immediately_once() {
        let sink = Arc::new(RecordingSink::default());
        let scheduler = PreviewScheduler::with_default_delay(sink.clone());
        scheduler.schedule(patch("#333333"));
        scheduler.flush().await.unwrap();
        assert_eq!(sink.writes(), vec![patch("#333333")]);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(sink.writes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_without_pending_is_noop() {
        let sink = Arc::new(RecordingSink::default());
        let scheduler = PreviewScheduler::with_default_delay(sink.clone());
        scheduler.flush().await.unwrap();
        assert!(sink.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_drops_pending_and_ignores_later_schedules() {
        let sink = Arc::new(RecordingSink::default());
        let scheduler = PreviewScheduler::with_default_delay(sink.clone());
        scheduler.schedule(patch("#444444"));
        scheduler.dispose().await;
        scheduler.schedule(patch("#555555"));
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(sink.writes().is_empty());
        assert!(scheduler.is_disposed());
        scheduler.flush().await.unwrap();
        assert!(sink.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_keeps_patch_for_flush() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let scheduler = PreviewScheduler::with_default_delay(sink.clone());
        scheduler.schedule(patch("#666666"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(scheduler.has_pending());
        assert!(scheduler.flush().await.is_err());
    }
}
