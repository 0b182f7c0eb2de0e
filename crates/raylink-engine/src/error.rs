use std::path::PathBuf;

use thiserror::Error;

use crate::memory::MemoryGeometry;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to read module {}: {source}", path.display())]
    ReadModule {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unrecognized module format (expected wasm or wat)")]
    UnrecognizedFormat,

    #[error("failed to parse WAT: {0}")]
    Wat(#[from] wat::Error),

    #[error("failed to configure wasm runtime: {0}")]
    Runtime(String),

    #[error("failed to compile module: {0}")]
    Compile(String),

    #[error("module does not import `env.memory`")]
    MissingMemoryImport,

    #[error("`env.memory` must be a shared memory with a declared maximum")]
    UnsharedMemory,

    #[error("module digest {actual} does not match the module that created the shared memory ({expected})")]
    ModuleMismatch { expected: String, actual: String },

    #[error("module declares memory {module}, but the shared region is {region}")]
    MemoryMismatch {
        module: MemoryGeometry,
        region: MemoryGeometry,
    },

    #[error("failed to create shared memory: {0}")]
    Memory(String),

    #[error("failed to instantiate module: {0}")]
    Instantiate(String),

    #[error("module export `{name}` is missing or has the wrong signature: {reason}")]
    MissingExport { name: &'static str, reason: String },

    #[error("`{export}` trapped: {reason}")]
    Trap { export: &'static str, reason: String },

    #[error("module has not been instantiated in this context")]
    NotInstantiated,

    #[error("thread pool already started")]
    PoolAlreadyStarted,

    #[error("thread pool failed to start earlier; the worker context must be recreated")]
    PoolFailed,

    #[error("failed to spawn pool thread: {0}")]
    SpawnThread(#[source] std::io::Error),

    #[error("pool thread exited before reporting readiness ({ready} of {expected} ready)")]
    PoolThreadLost { ready: usize, expected: usize },
}
