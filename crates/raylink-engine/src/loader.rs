//! Module loading for both sides of the bridge.
//!
//! [`ModuleLoader::load`] mirrors the module's own `default(bytes?, memory?)` entry point: without
//! a memory handle it creates the session's region (orchestrating side), with one it verifies that
//! the handle belongs to the same module and binds to it (worker side).

use std::num::NonZeroUsize;
use std::sync::Arc;

use wasmtime::{Engine, ExternType, Instance, Module, Store, TypedFunc, WasmParams, WasmResults};

use crate::abi::{
    EXPORT_INIT_THREAD_POOL, EXPORT_POOL_WORKER, EXPORT_RENDER_IMAGE, EXPORT_START,
    IMPORT_MEMORY, IMPORT_MODULE,
};
use crate::host::{self, HostState, InstanceRole};
use crate::memory::{MemoryGeometry, SharedMemoryHandle};
use crate::module::{ModuleBytes, ModuleDigest};
use crate::pool::ThreadPool;
use crate::EngineError;

/// A module compiled for a specific Wasmtime engine.
#[derive(Clone)]
pub(crate) struct CompiledModule {
    module: Module,
    digest: ModuleDigest,
    geometry: MemoryGeometry,
}

impl CompiledModule {
    fn compile(engine: &Engine, bytes: &ModuleBytes) -> Result<Self, EngineError> {
        let module = Module::new(engine, bytes.wasm())
            .map_err(|err| EngineError::Compile(format!("{err:#}")))?;
        let geometry = memory_import(&module)?;
        Ok(Self {
            module,
            digest: bytes.digest().clone(),
            geometry,
        })
    }

    /// Identical module bytes and identical memory geometry, or the handle is unusable here.
    fn verify_against(&self, memory: &SharedMemoryHandle) -> Result<(), EngineError> {
        if memory.geometry() != self.geometry {
            return Err(EngineError::MemoryMismatch {
                module: self.geometry,
                region: memory.geometry(),
            });
        }
        if memory.module_digest() != &self.digest {
            return Err(EngineError::ModuleMismatch {
                expected: memory.module_digest().to_string(),
                actual: self.digest.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn instantiate(
        &self,
        memory: &SharedMemoryHandle,
        options: Arc<str>,
        role: InstanceRole,
    ) -> Result<EngineInstance, EngineError> {
        let mut store = host::new_store(memory, options, role);
        let linker = host::linker(&mut store, memory)?;
        let instance = linker
            .instantiate(&mut store, &self.module)
            .map_err(|err| EngineError::Instantiate(format!("{err:#}")))?;

        let mut instance = EngineInstance { store, instance };
        instance.check_exports()?;
        tracing::debug!(%role, "module instantiated");
        Ok(instance)
    }
}

fn memory_import(module: &Module) -> Result<MemoryGeometry, EngineError> {
    let import = module
        .imports()
        .find(|import| import.module() == IMPORT_MODULE && import.name() == IMPORT_MEMORY)
        .ok_or(EngineError::MissingMemoryImport)?;
    match import.ty() {
        ExternType::Memory(ty) => MemoryGeometry::from_import(&ty),
        _ => Err(EngineError::MissingMemoryImport),
    }
}

/// One instantiation of the module in one store.
pub struct EngineInstance {
    store: Store<HostState>,
    instance: Instance,
}

impl EngineInstance {
    pub fn role(&self) -> InstanceRole {
        self.store.data().role
    }

    fn typed<P, R>(&mut self, name: &'static str) -> Result<TypedFunc<P, R>, EngineError>
    where
        P: WasmParams,
        R: WasmResults,
    {
        self.instance
            .get_typed_func::<P, R>(&mut self.store, name)
            .map_err(|err| EngineError::MissingExport {
                name,
                reason: format!("{err:#}"),
            })
    }

    /// Fail at instantiation rather than at the first call.
    fn check_exports(&mut self) -> Result<(), EngineError> {
        match self.role() {
            InstanceRole::Primary => {}
            InstanceRole::Worker => {
                self.typed::<i32, ()>(EXPORT_INIT_THREAD_POOL)?;
                self.typed::<(), ()>(EXPORT_RENDER_IMAGE)?;
                self.typed::<i32, ()>(EXPORT_POOL_WORKER)?;
            }
            InstanceRole::Pool(_) => {
                self.typed::<i32, ()>(EXPORT_POOL_WORKER)?;
            }
        }
        Ok(())
    }

    /// Compute a single frame.
    pub fn render_image(&mut self) -> Result<(), EngineError> {
        let render = self.typed::<(), ()>(EXPORT_RENDER_IMAGE)?;
        render
            .call(&mut self.store, ())
            .map_err(|err| trap(EXPORT_RENDER_IMAGE, err))
    }

    pub(crate) fn init_thread_pool(&mut self, threads: NonZeroUsize) -> Result<(), EngineError> {
        let threads = i32::try_from(threads.get()).unwrap_or(i32::MAX);
        let init = self.typed::<i32, ()>(EXPORT_INIT_THREAD_POOL)?;
        init.call(&mut self.store, threads)
            .map_err(|err| trap(EXPORT_INIT_THREAD_POOL, err))
    }

    pub(crate) fn pool_worker(&mut self, index: usize) -> Result<(), EngineError> {
        let index = i32::try_from(index).unwrap_or(i32::MAX);
        let worker = self.typed::<i32, ()>(EXPORT_POOL_WORKER)?;
        worker
            .call(&mut self.store, index)
            .map_err(|err| trap(EXPORT_POOL_WORKER, err))
    }

    /// Call the optional `start` export. Returns `false` if the module does not export it.
    pub fn start(&mut self) -> Result<bool, EngineError> {
        if self.instance.get_func(&mut self.store, EXPORT_START).is_none() {
            return Ok(false);
        }
        let start = self.typed::<(), ()>(EXPORT_START)?;
        start
            .call(&mut self.store, ())
            .map_err(|err| trap(EXPORT_START, err))?;
        Ok(true)
    }
}

fn trap(export: &'static str, err: wasmtime::Error) -> EngineError {
    EngineError::Trap {
        export,
        reason: format!("{err:#}"),
    }
}

/// Module Loader: instantiates the module in the calling context.
#[derive(Clone, Debug)]
pub struct ModuleLoader {
    bytes: ModuleBytes,
    options: Arc<str>,
}

impl ModuleLoader {
    /// `options` is the serialized render configuration every instance may read through the
    /// `render_options_*` imports.
    pub fn new(bytes: ModuleBytes, options: Arc<str>) -> Self {
        Self { bytes, options }
    }

    /// Instantiate the module.
    ///
    /// - `None`: create the session's shared memory from the module's import type and bind the
    ///   orchestrating-side instance to it.
    /// - `Some(memory)`: bind a worker-side instance to an existing region. The module must be
    ///   byte-identical to the one that created the region.
    pub fn load(&self, memory: Option<&SharedMemoryHandle>) -> Result<LoadedModule, EngineError> {
        match memory {
            None => {
                let engine = host::shared_engine()?;
                let compiled = CompiledModule::compile(&engine, &self.bytes)?;
                let memory = SharedMemoryHandle::create(
                    &engine,
                    compiled.geometry,
                    compiled.digest.clone(),
                )?;
                let instance =
                    compiled.instantiate(&memory, self.options.clone(), InstanceRole::Primary)?;
                tracing::info!(
                    digest = %compiled.digest,
                    geometry = %compiled.geometry,
                    "created shared memory"
                );
                Ok(LoadedModule::new(compiled, instance, memory, self.options.clone()))
            }
            Some(memory) => {
                let compiled = CompiledModule::compile(memory.engine(), &self.bytes)?;
                compiled.verify_against(memory)?;
                let instance =
                    compiled.instantiate(memory, self.options.clone(), InstanceRole::Worker)?;
                Ok(LoadedModule::new(
                    compiled,
                    instance,
                    memory.clone(),
                    self.options.clone(),
                ))
            }
        }
    }
}

/// An instantiated module together with the region it is bound to.
pub struct LoadedModule {
    compiled: CompiledModule,
    instance: EngineInstance,
    memory: SharedMemoryHandle,
    options: Arc<str>,
    pool: Option<ThreadPool>,
    /// The module was told to expect a pool that never came up; it cannot be offered another.
    pool_failed: bool,
}

impl LoadedModule {
    fn new(
        compiled: CompiledModule,
        instance: EngineInstance,
        memory: SharedMemoryHandle,
        options: Arc<str>,
    ) -> Self {
        Self {
            compiled,
            instance,
            memory,
            options,
            pool: None,
            pool_failed: false,
        }
    }

    pub fn memory(&self) -> &SharedMemoryHandle {
        &self.memory
    }

    pub fn instance(&mut self) -> &mut EngineInstance {
        &mut self.instance
    }

    pub fn pool(&self) -> Option<&ThreadPool> {
        self.pool.as_ref()
    }

    /// Thread Pool Initializer: `init_thread_pool(threads)` on this instance, then `threads` pool
    /// threads bound to the same memory. Resolves once every thread has instantiated.
    ///
    /// A failure is final for this instance: later calls return [`EngineError::PoolFailed`].
    pub fn init_thread_pool(&mut self, threads: NonZeroUsize) -> Result<&ThreadPool, EngineError> {
        if self.pool.is_some() {
            return Err(EngineError::PoolAlreadyStarted);
        }
        if self.pool_failed {
            return Err(EngineError::PoolFailed);
        }

        self.pool_failed = true;
        self.instance.init_thread_pool(threads)?;
        let pool = ThreadPool::start(&self.compiled, &self.memory, &self.options, threads)?;
        self.pool_failed = false;
        Ok(self.pool.insert(pool))
    }

    pub fn render_image(&mut self) -> Result<(), EngineError> {
        self.instance.render_image()
    }

    pub fn start(&mut self) -> Result<bool, EngineError> {
        self.instance.start()
    }
}
