//! The worker context: a dedicated OS thread with its own single-threaded event loop.
//!
//! Requests are served one at a time, in arrival order. The render loop runs as a local task on
//! the same event loop and yields between frames, so requests are still answered while it runs.

use core::fmt;
use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::rc::Rc;
use std::thread::JoinHandle;
use std::time::Duration;

use raylink_engine::{hardware_concurrency, thread_count, SharedMemoryHandle};
use tokio::sync::{mpsc, oneshot};
use tokio::task::LocalSet;
use tokio_util::sync::CancellationToken;

use crate::client::BridgeClient;
use crate::phase::Phase;
use crate::protocol::{BridgeError, Call, Envelope};
use crate::render_loop::{FrameSource, RenderLoop, RenderLoopMonitor, FRAME_YIELD_DELAY};

/// What the worker context executes for each remote call.
///
/// Implementations live entirely on the worker thread and need not be `Send`.
pub trait WorkerRuntime: 'static {
    type Error: fmt::Display;

    /// Instantiate the module bound to `memory`.
    fn init(&mut self, memory: SharedMemoryHandle) -> Result<(), Self::Error>;

    /// Start `threads` pool threads.
    fn init_thread_pool(&mut self, threads: NonZeroUsize) -> Result<(), Self::Error>;

    /// Compute one frame.
    fn render_frame(&mut self) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Overrides the reported hardware parallelism when set.
    pub parallelism: Option<usize>,
    pub frame_delay: Duration,
    pub name: String,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            parallelism: None,
            frame_delay: FRAME_YIELD_DELAY,
            name: "raylink-worker".to_string(),
        }
    }
}

impl WorkerOptions {
    fn pool_size(&self) -> NonZeroUsize {
        thread_count(self.parallelism.or_else(hardware_concurrency))
    }
}

/// Handle to a running worker context. Dropping it cancels the render loop without waiting.
pub struct Worker {
    cancel: CancellationToken,
    monitor: RenderLoopMonitor,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start the worker thread. `factory` runs on that thread to build its runtime.
    pub fn spawn<R, F>(
        options: WorkerOptions,
        factory: F,
    ) -> Result<(Self, BridgeClient), BridgeError>
    where
        R: WorkerRuntime,
        F: FnOnce() -> R + Send + 'static,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|err| BridgeError::Spawn(err.to_string()))?;

        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (render_loop, monitor) = RenderLoop::with_delay(options.frame_delay);
        let cancel = CancellationToken::new();
        let pool_size = options.pool_size();

        let thread = std::thread::Builder::new()
            .name(options.name.clone())
            .spawn({
                let cancel = cancel.clone();
                let name = options.name;
                move || {
                    let span = tracing::info_span!("worker", name = %name);
                    let _guard = span.enter();

                    let local = LocalSet::new();
                    local.block_on(
                        &runtime,
                        serve(factory(), requests_rx, render_loop, pool_size, cancel),
                    );
                    tracing::debug!("worker context exited");
                }
            })
            .map_err(|err| BridgeError::Spawn(err.to_string()))?;

        let worker = Self {
            cancel,
            monitor,
            thread: Some(thread),
        };
        Ok((worker, BridgeClient::new(requests_tx)))
    }

    pub fn monitor(&self) -> RenderLoopMonitor {
        self.monitor.clone()
    }

    /// Destroy the worker context: stop the render loop and join the thread.
    pub async fn terminate(mut self) -> Result<(), BridgeError> {
        self.cancel.cancel();
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || thread.join())
            .await
            .map_err(|_| BridgeError::WorkerPanicked)?
            .map_err(|_| BridgeError::WorkerPanicked)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("state", &self.monitor.state())
            .finish()
    }
}

struct SharedRuntime<R>(Rc<RefCell<R>>);

impl<R: WorkerRuntime> FrameSource for SharedRuntime<R> {
    type Error = R::Error;

    fn render_frame(&mut self) -> Result<(), R::Error> {
        self.0.borrow_mut().render_frame()
    }
}

async fn serve<R: WorkerRuntime>(
    runtime: R,
    mut requests: mpsc::UnboundedReceiver<Envelope>,
    render_loop: RenderLoop,
    pool_size: NonZeroUsize,
    cancel: CancellationToken,
) {
    let runtime = Rc::new(RefCell::new(runtime));
    let mut render_loop = Some(render_loop);
    let mut loop_task = None;
    let mut phase = Phase::default();

    loop {
        let envelope = tokio::select! {
            _ = cancel.cancelled() => break,
            envelope = requests.recv() => match envelope {
                Some(envelope) => envelope,
                // No client left; keep rendering until terminated.
                None => {
                    cancel.cancelled().await;
                    break;
                }
            },
        };

        let Envelope { id, call, reply } = envelope;
        let kind = call.kind();
        tracing::debug!(id, call = %kind, %phase, "request");

        let result = match phase.check(kind) {
            Err(err) => Err(err),
            Ok(()) => match call {
                Call::Init { memory } => runtime
                    .borrow_mut()
                    .init(memory)
                    .map_err(|err| BridgeError::remote(kind, err)),
                Call::InitThreadPool => runtime
                    .borrow_mut()
                    .init_thread_pool(pool_size)
                    .map_err(|err| BridgeError::remote(kind, err)),
                Call::RenderImage => match render_loop.take() {
                    Some(render_loop) => {
                        let (first_tx, first_rx) = oneshot::channel();
                        let source = SharedRuntime(Rc::clone(&runtime));
                        loop_task = Some(tokio::task::spawn_local(render_loop.run(
                            source,
                            first_tx,
                            cancel.clone(),
                        )));
                        match first_rx.await {
                            Ok(Ok(())) => Ok(()),
                            Ok(Err(err)) => Err(BridgeError::remote(kind, err)),
                            Err(_) => Err(BridgeError::Disconnected),
                        }
                    }
                    // A failed first frame consumed the loop; the phase stays at pool-ready.
                    None => Err(BridgeError::remote(kind, "render loop already stopped")),
                },
            },
        };

        match &result {
            Ok(()) => {
                phase = Phase::after(kind);
                tracing::info!(id, call = %kind, %phase, "call completed");
            }
            Err(err) => tracing::warn!(id, call = %kind, "call rejected: {err}"),
        }
        let _ = reply.send(result);
    }

    if let Some(task) = loop_task {
        if let Err(err) = task.await {
            tracing::error!("render loop task failed: {err}");
        }
    }
}
