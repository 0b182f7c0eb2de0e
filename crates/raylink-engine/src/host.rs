use std::fmt;
use std::sync::Arc;

use wasmtime::{Caller, Config, Engine, Linker, Store};

use crate::abi::{
    IMPORT_MEMORY, IMPORT_MODULE, IMPORT_RENDER_OPTIONS_LEN, IMPORT_RENDER_OPTIONS_READ,
};
use crate::memory::SharedMemoryHandle;
use crate::EngineError;

/// Which context an instance lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceRole {
    /// Orchestrating side; only used to obtain the memory handle and to call `start`.
    Primary,
    /// Worker context; runs `init_thread_pool` and `render_image`.
    Worker,
    /// Pool thread `n`; runs `pool_worker(n)`.
    Pool(usize),
}

impl fmt::Display for InstanceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Worker => f.write_str("worker"),
            Self::Pool(index) => write!(f, "pool-{index}"),
        }
    }
}

/// Per-store host data.
pub(crate) struct HostState {
    pub(crate) role: InstanceRole,
    options: Arc<str>,
    memory: SharedMemoryHandle,
}

/// Wasmtime engine with wasm threads and shared memories enabled.
pub fn shared_engine() -> Result<Engine, EngineError> {
    let mut config = Config::new();
    config.wasm_threads(true);
    config.shared_memory(true);
    Engine::new(&config).map_err(|err| EngineError::Runtime(format!("{err:#}")))
}

pub(crate) fn new_store(
    memory: &SharedMemoryHandle,
    options: Arc<str>,
    role: InstanceRole,
) -> Store<HostState> {
    Store::new(
        memory.engine(),
        HostState {
            role,
            options,
            memory: memory.clone(),
        },
    )
}

/// Linker with the full host import set bound to `memory`.
pub(crate) fn linker(
    store: &mut Store<HostState>,
    memory: &SharedMemoryHandle,
) -> Result<Linker<HostState>, EngineError> {
    let link_err = |err: wasmtime::Error| EngineError::Instantiate(format!("{err:#}"));

    let mut linker = Linker::new(memory.engine());
    linker
        .define(&mut *store, IMPORT_MODULE, IMPORT_MEMORY, memory.memory().clone())
        .map_err(link_err)?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            IMPORT_RENDER_OPTIONS_LEN,
            |caller: Caller<'_, HostState>| -> i32 {
                i32::try_from(caller.data().options.len()).unwrap_or(i32::MAX)
            },
        )
        .map_err(link_err)?;

    linker
        .func_wrap(
            IMPORT_MODULE,
            IMPORT_RENDER_OPTIONS_READ,
            |caller: Caller<'_, HostState>, ptr: i32, len: i32| -> i32 {
                let state = caller.data();
                let (Ok(ptr), Ok(len)) = (usize::try_from(ptr), usize::try_from(len)) else {
                    return -1;
                };
                let options = state.options.as_bytes();
                let options = &options[..len.min(options.len())];
                match state.memory.write(ptr, options) {
                    Some(written) => i32::try_from(written).unwrap_or(i32::MAX),
                    None => {
                        tracing::warn!(
                            role = %state.role,
                            ptr,
                            len,
                            "render options destination out of bounds"
                        );
                        -1
                    }
                }
            },
        )
        .map_err(link_err)?;

    Ok(linker)
}
