//! Host side of the render module.
//!
//! The module is an opaque wasm binary with a narrow ABI (see [`abi`]). This crate loads it into
//! Wasmtime against a single shared linear memory, sizes and starts its thread pool, and exposes
//! the per-frame entry point. What the module computes is none of its business.

pub mod abi;
mod error;
mod host;
mod loader;
pub mod memory;
pub mod module;
pub mod options;
pub mod pool;

pub use error::EngineError;
pub use host::{shared_engine, InstanceRole};
pub use loader::{EngineInstance, LoadedModule, ModuleLoader};
pub use memory::{MemoryGeometry, SharedMemoryHandle, WASM_PAGE_SIZE};
pub use module::{ModuleBytes, ModuleDigest, ModuleFormat, ModuleSource};
pub use options::{OptionsError, RenderOptions};
pub use pool::{hardware_concurrency, thread_count, ThreadPool};
