use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use raylink_engine::SharedMemoryHandle;
use tokio::sync::{mpsc, oneshot};

use crate::protocol::{BridgeError, Call, Envelope};

/// Orchestrating-side proxy for the worker context.
///
/// Each method suspends the caller until the worker answers. Calls must be issued as
/// `init` → `init_thread_pool` → `render_image`; the worker rejects anything else.
#[derive(Clone, Debug)]
pub struct BridgeClient {
    requests: mpsc::UnboundedSender<Envelope>,
    next_id: Arc<AtomicU64>,
}

impl BridgeClient {
    pub(crate) fn new(requests: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            requests,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Hand the shared memory to the worker and have it instantiate the module against it.
    pub async fn init(&self, memory: SharedMemoryHandle) -> Result<(), BridgeError> {
        self.call(Call::Init { memory }).await
    }

    /// Size and start the worker's thread pool.
    pub async fn init_thread_pool(&self) -> Result<(), BridgeError> {
        self.call(Call::InitThreadPool).await
    }

    /// Start the render loop. Resolves with the outcome of the first frame only.
    pub async fn render_image(&self) -> Result<(), BridgeError> {
        self.call(Call::RenderImage).await
    }

    async fn call(&self, call: Call) -> Result<(), BridgeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Envelope { id, call, reply })
            .map_err(|_| BridgeError::Disconnected)?;
        response.await.map_err(|_| BridgeError::Disconnected)?
    }
}
