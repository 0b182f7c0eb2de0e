//! Self-rescheduling frame loop run inside the worker context.
//!
//! One frame, then a short timer, then the next frame. The timer hands control back to the
//! worker's event loop so bridge messages are still served while rendering. The loop only ends
//! when its cancellation token fires or a frame fails.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;

/// Pause between two frames.
pub const FRAME_YIELD_DELAY: Duration = Duration::from_millis(1);

/// Anything that can compute one frame synchronously.
pub trait FrameSource {
    type Error: fmt::Display;

    fn render_frame(&mut self) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Idle,
    Rendering,
    Scheduled,
    Stopped(StopReason),
}

impl LoopState {
    pub fn is_stopped(self) -> bool {
        matches!(self, LoopState::Stopped(_))
    }
}

pub struct RenderLoop {
    delay: Duration,
    frames: Arc<AtomicU64>,
    state: watch::Sender<LoopState>,
}

impl RenderLoop {
    pub fn new() -> (Self, RenderLoopMonitor) {
        Self::with_delay(FRAME_YIELD_DELAY)
    }

    pub fn with_delay(delay: Duration) -> (Self, RenderLoopMonitor) {
        let frames = Arc::new(AtomicU64::new(0));
        let (state, state_rx) = watch::channel(LoopState::Idle);
        let monitor = RenderLoopMonitor {
            frames: Arc::clone(&frames),
            state: state_rx,
        };
        (
            Self {
                delay,
                frames,
                state,
            },
            monitor,
        )
    }

    /// Drive `source` until `cancel` fires or a frame fails.
    ///
    /// The outcome of the first frame is sent on `first_frame`. A failure after that is only
    /// logged. Cancellation is checked before every re-arm of the timer and raced against it.
    pub async fn run<S: FrameSource>(
        self,
        mut source: S,
        first_frame: oneshot::Sender<Result<(), S::Error>>,
        cancel: CancellationToken,
    ) -> StopReason {
        let mut first_frame = Some(first_frame);

        let reason = loop {
            self.state.send_replace(LoopState::Rendering);
            match source.render_frame() {
                Ok(()) => {
                    let frame = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::trace!(frame, "frame rendered");
                    if let Some(reply) = first_frame.take() {
                        let _ = reply.send(Ok(()));
                    }
                }
                Err(err) => {
                    match first_frame.take() {
                        Some(reply) => {
                            let _ = reply.send(Err(err));
                        }
                        None => tracing::error!(
                            frames = self.frames.load(Ordering::Relaxed),
                            "frame failed, stopping render loop: {err}"
                        ),
                    }
                    break StopReason::Failed;
                }
            }

            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            self.state.send_replace(LoopState::Scheduled);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break StopReason::Cancelled,
                _ = tokio::time::sleep(self.delay) => {}
            }
        };

        self.state.send_replace(LoopState::Stopped(reason));
        tracing::debug!(
            ?reason,
            frames = self.frames.load(Ordering::Relaxed),
            "render loop stopped"
        );
        reason
    }
}

/// Read-only view of a [`RenderLoop`], usable from any thread.
#[derive(Clone, Debug)]
pub struct RenderLoopMonitor {
    frames: Arc<AtomicU64>,
    state: watch::Receiver<LoopState>,
}

impl RenderLoopMonitor {
    /// Frames completed so far.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Wait until at least `count` frames were rendered. Returns `false` if the loop stopped first.
    pub async fn wait_for_frames(&mut self, count: u64) -> bool {
        loop {
            if self.frames() >= count {
                return true;
            }
            if self.state.borrow_and_update().is_stopped() {
                return self.frames() >= count;
            }
            if self.state.changed().await.is_err() {
                return self.frames() >= count;
            }
        }
    }

    /// Wait for the loop to stop. `None` if it was dropped without ever running.
    pub async fn stopped(&mut self) -> Option<StopReason> {
        loop {
            if let LoopState::Stopped(reason) = *self.state.borrow_and_update() {
                return Some(reason);
            }
            if self.state.changed().await.is_err() {
                return match *self.state.borrow() {
                    LoopState::Stopped(reason) => Some(reason),
                    _ => None,
                };
            }
        }
    }
}
