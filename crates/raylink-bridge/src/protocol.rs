//! Messages carried between the two contexts.

use core::fmt;

use raylink_engine::SharedMemoryHandle;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::phase::Phase;

/// The three remote operations, in the order they must be issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Init,
    InitThreadPool,
    RenderImage,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CallKind::Init => "init",
            CallKind::InitThreadPool => "initThreadPool",
            CallKind::RenderImage => "renderImage",
        })
    }
}

#[derive(Debug)]
pub enum Call {
    /// Instantiate the module in the worker, bound to `memory`.
    Init { memory: SharedMemoryHandle },
    /// Start the worker-side thread pool.
    InitThreadPool,
    /// Start the render loop; answered after the first frame.
    RenderImage,
}

impl Call {
    pub fn kind(&self) -> CallKind {
        match self {
            Call::Init { .. } => CallKind::Init,
            Call::InitThreadPool => CallKind::InitThreadPool,
            Call::RenderImage => CallKind::RenderImage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Rejected by the worker's phase machine; nothing was executed.
    #[error("`{call}` issued out of order: worker is {phase}")]
    OutOfOrder { call: CallKind, phase: Phase },

    /// The worker executed the call and it failed.
    #[error("`{call}` failed in the worker: {message}")]
    Remote { call: CallKind, message: String },

    /// The worker context is gone (terminated, or its thread died).
    #[error("worker context is disconnected")]
    Disconnected,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),

    #[error("worker thread panicked")]
    WorkerPanicked,
}

impl BridgeError {
    pub(crate) fn remote(call: CallKind, err: impl fmt::Display) -> Self {
        Self::Remote {
            call,
            message: err.to_string(),
        }
    }
}

pub(crate) type Reply = Result<(), BridgeError>;

/// One request in flight. `id` only correlates log lines; replies travel on `reply`.
pub(crate) struct Envelope {
    pub(crate) id: u64,
    pub(crate) call: Call,
    pub(crate) reply: oneshot::Sender<Reply>,
}
