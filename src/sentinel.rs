//! Infinite-scroll trigger.
//!
//! The sentinel watches where the trailing marker sits relative to the
//! viewport. Once the marker comes within `margin` of the bottom edge it waits
//! `settle` and asks its target for the next page. The target decides what
//! happens next through [`Rearm`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

pub const DEFAULT_MARGIN: f64 = 500.0;
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub marker_top: f64,
}

impl Viewport {
    pub fn marker_within(&self, margin: f64) -> bool {
        self.marker_top <= self.scroll_top + self.viewport_height + margin
    }
}

/// What the sentinel should wait for after a fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rearm {
    /// Check proximity again right away.
    Now,
    /// Stay quiet until the viewport or the marker moves.
    OnViewportChange,
}

#[async_trait]
pub trait LoadNext: Send + Sync {
    async fn load_next(&self) -> Rearm;
}

#[derive(Debug, Clone, Copy)]
pub struct ScrollSentinel {
    margin: f64,
    settle: Duration,
}

impl Default for ScrollSentinel {
    fn default() -> Self {
        Self::new(DEFAULT_MARGIN, DEFAULT_SETTLE)
    }
}

impl ScrollSentinel {
    pub fn new(margin: f64, settle: Duration) -> Self {
        Self { margin, settle }
    }

    /// Start watching. The returned handle stops the sentinel when disarmed or dropped.
    pub fn arm<T>(&self, target: Arc<T>, viewport: watch::Receiver<Viewport>) -> SentinelHandle
    where
        T: LoadNext + ?Sized + 'static,
    {
        let task = tokio::spawn(watch_marker(self.margin, self.settle, target, viewport));
        SentinelHandle { task }
    }
}

async fn watch_marker<T>(
    margin: f64,
    settle: Duration,
    target: Arc<T>,
    mut viewport: watch::Receiver<Viewport>,
) where
    T: LoadNext + ?Sized,
{
    loop {
        while !viewport.borrow_and_update().marker_within(margin) {
            if viewport.changed().await.is_err() {
                debug!("Viewport source closed, sentinel stopping");
                return;
            }
        }

        tokio::time::sleep(settle).await;
        match target.load_next().await {
            Rearm::Now => {}
            Rearm::OnViewportChange => {
                if viewport.changed().await.is_err() {
                    debug!("Viewport source closed, sentinel stopping");
                    return;
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct SentinelHandle {
    task: JoinHandle<()>,
}

impl SentinelHandle {
    pub fn is_armed(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn disarm(self) {
        drop(self);
    }
}

impl Drop for SentinelHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
