//! End-to-end bootstrap from the orchestrating side.

use std::sync::Arc;

use raylink_engine::{
    EngineError, LoadedModule, ModuleLoader, ModuleSource, OptionsError, RenderOptions,
    SharedMemoryHandle,
};
use thiserror::Error;

use crate::engine_worker::EngineWorker;
use crate::protocol::BridgeError;
use crate::render_loop::RenderLoopMonitor;
use crate::worker::{Worker, WorkerOptions};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub module: ModuleSource,
    pub options: RenderOptions,
    pub worker: WorkerOptions,
}

/// A bootstrapped render session: primary instance, worker context and its render loop.
pub struct Session {
    primary: LoadedModule,
    worker: Worker,
}

impl Session {
    /// Load the module locally, spawn the worker and drive `init` → `initThreadPool` →
    /// `renderImage` in order. Finally calls the module's optional `start` export on the
    /// orchestrating instance.
    ///
    /// Any failure is fatal for the session; the worker is torn down when the error is returned.
    pub async fn bootstrap(config: SessionConfig) -> Result<Self, SessionError> {
        config.options.validate()?;
        let options: Arc<str> = config.options.to_json()?.into();

        let bytes = config.module.load()?;
        let mut primary = ModuleLoader::new(bytes, Arc::clone(&options)).load(None)?;
        let memory = primary.memory().clone();

        let source = config.module;
        let (worker, client) =
            Worker::spawn(config.worker, move || EngineWorker::new(source, options))?;

        client.init(memory).await?;
        client.init_thread_pool().await?;
        client.render_image().await?;

        if primary.start()? {
            tracing::debug!("called start on the orchestrating instance");
        }
        tracing::info!(
            pages = primary.memory().pages(),
            "render session running"
        );

        // Nothing else is sent after bootstrap; the worker keeps rendering until terminated.
        drop(client);
        Ok(Self { primary, worker })
    }

    pub fn monitor(&self) -> RenderLoopMonitor {
        self.worker.monitor()
    }

    pub fn memory(&self) -> &SharedMemoryHandle {
        self.primary.memory()
    }

    /// Terminate the worker context. The render loop stops before this returns.
    pub async fn shutdown(self) -> Result<(), BridgeError> {
        self.worker.terminate().await
    }
}
