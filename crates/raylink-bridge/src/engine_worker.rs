use std::num::NonZeroUsize;
use std::sync::Arc;

use raylink_engine::{EngineError, LoadedModule, ModuleLoader, ModuleSource, SharedMemoryHandle};

use crate::worker::WorkerRuntime;

/// Worker runtime backed by the wasm module.
///
/// The module bytes are obtained again from `source` on `init`, independently of the
/// orchestrating side; the loader then checks they match the module that created the memory.
pub struct EngineWorker {
    source: ModuleSource,
    options: Arc<str>,
    loaded: Option<LoadedModule>,
}

impl EngineWorker {
    pub fn new(source: ModuleSource, options: Arc<str>) -> Self {
        Self {
            source,
            options,
            loaded: None,
        }
    }

    fn loaded(&mut self) -> Result<&mut LoadedModule, EngineError> {
        self.loaded.as_mut().ok_or(EngineError::NotInstantiated)
    }
}

impl WorkerRuntime for EngineWorker {
    type Error = EngineError;

    fn init(&mut self, memory: SharedMemoryHandle) -> Result<(), EngineError> {
        let bytes = self.source.load()?;
        let loaded = ModuleLoader::new(bytes, Arc::clone(&self.options)).load(Some(&memory))?;
        tracing::info!(digest = %memory.module_digest(), "module instantiated in worker");
        self.loaded = Some(loaded);
        Ok(())
    }

    fn init_thread_pool(&mut self, threads: NonZeroUsize) -> Result<(), EngineError> {
        self.loaded()?.init_thread_pool(threads)?;
        Ok(())
    }

    fn render_frame(&mut self) -> Result<(), EngineError> {
        self.loaded()?.render_image()
    }
}
