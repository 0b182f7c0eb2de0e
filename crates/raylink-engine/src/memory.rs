//! The shared linear memory region.
//!
//! Exactly one region exists per session. It is created by the orchestrating side from the
//! module's `env.memory` import type and then handed (by reference) to the worker context, which
//! binds its own instance and every pool thread to it.

use std::fmt;

use wasmtime::{Engine, MemoryType, SharedMemory};

use crate::module::ModuleDigest;
use crate::EngineError;

/// Size of a wasm page in bytes.
pub const WASM_PAGE_SIZE: u64 = 64 * 1024;

/// Initial/maximum page counts of a shared memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryGeometry {
    pub minimum_pages: u64,
    pub maximum_pages: u64,
}

impl MemoryGeometry {
    /// Geometry declared by a module import. Non-shared or unbounded memories cannot cross
    /// into another context.
    pub(crate) fn from_import(ty: &MemoryType) -> Result<Self, EngineError> {
        if !ty.is_shared() {
            return Err(EngineError::UnsharedMemory);
        }
        let maximum_pages = ty.maximum().ok_or(EngineError::UnsharedMemory)?;
        Ok(Self {
            minimum_pages: ty.minimum(),
            maximum_pages,
        })
    }

    fn memory_type(&self) -> Result<MemoryType, EngineError> {
        let minimum = u32::try_from(self.minimum_pages)
            .map_err(|_| EngineError::Memory(format!("minimum of {self} is out of range")))?;
        let maximum = u32::try_from(self.maximum_pages)
            .map_err(|_| EngineError::Memory(format!("maximum of {self} is out of range")))?;
        Ok(MemoryType::shared(minimum, maximum))
    }
}

impl fmt::Display for MemoryGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..={} pages",
            self.minimum_pages, self.maximum_pages
        )
    }
}

/// Handle to the session's shared memory.
///
/// Cloning the handle shares the region; it never copies it. The handle also carries the Wasmtime
/// engine the region belongs to (stores from a different engine cannot import it) and the digest
/// of the module whose import declared it.
#[derive(Clone)]
pub struct SharedMemoryHandle {
    engine: Engine,
    memory: SharedMemory,
    geometry: MemoryGeometry,
    digest: ModuleDigest,
}

impl SharedMemoryHandle {
    pub(crate) fn create(
        engine: &Engine,
        geometry: MemoryGeometry,
        digest: ModuleDigest,
    ) -> Result<Self, EngineError> {
        let memory = SharedMemory::new(engine, geometry.memory_type()?)
            .map_err(|err| EngineError::Memory(format!("{err:#}")))?;
        Ok(Self {
            engine: engine.clone(),
            memory,
            geometry,
            digest,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub(crate) fn memory(&self) -> &SharedMemory {
        &self.memory
    }

    pub fn geometry(&self) -> MemoryGeometry {
        self.geometry
    }

    pub fn module_digest(&self) -> &ModuleDigest {
        &self.digest
    }

    /// Current size in bytes. Grows only if the module executes `memory.grow`.
    pub fn size_bytes(&self) -> usize {
        self.memory.data_size()
    }

    /// Current size in pages.
    pub fn pages(&self) -> u64 {
        self.memory.size()
    }

    /// Whether both handles refer to the same region.
    pub fn same_region(&self, other: &Self) -> bool {
        std::ptr::eq(self.memory.data().as_ptr(), other.memory.data().as_ptr())
    }

    /// Copy `bytes` into the region at `offset`. Returns `None` if the range is out of bounds.
    pub(crate) fn write(&self, offset: usize, bytes: &[u8]) -> Option<usize> {
        let end = offset.checked_add(bytes.len())?;
        let dst = self.memory.data().get(offset..end)?;
        for (cell, byte) in dst.iter().zip(bytes) {
            // SAFETY: the cell lies within the region's current bounds and shared memories are
            // never moved or shrunk. Concurrent access is unsynchronized exactly like a plain
            // (non-atomic) wasm store; the module is responsible for ordering.
            unsafe { cell.get().write(*byte) };
        }
        Some(bytes.len())
    }
}

impl fmt::Debug for SharedMemoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMemoryHandle")
            .field("geometry", &self.geometry)
            .field("size_bytes", &self.size_bytes())
            .field("module_digest", &self.digest)
            .finish()
    }
}
