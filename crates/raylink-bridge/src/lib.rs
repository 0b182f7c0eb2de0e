//! Orchestration bridge between the orchestrating context and the worker context.
//!
//! The worker context is an OS thread with a single-threaded tokio event loop. The orchestrating
//! side talks to it only through [`BridgeClient`]: `init(memory)`, then `init_thread_pool()`,
//! then `render_image()`. After the last call the worker keeps rendering frames on its own until
//! it is terminated.

mod client;
mod engine_worker;
mod phase;
mod protocol;
pub mod render_loop;
mod session;
mod worker;

pub use client::BridgeClient;
pub use engine_worker::EngineWorker;
pub use phase::Phase;
pub use protocol::{BridgeError, Call, CallKind};
pub use render_loop::{
    FrameSource, LoopState, RenderLoop, RenderLoopMonitor, StopReason, FRAME_YIELD_DELAY,
};
pub use session::{Session, SessionConfig, SessionError};
pub use worker::{Worker, WorkerOptions, WorkerRuntime};
