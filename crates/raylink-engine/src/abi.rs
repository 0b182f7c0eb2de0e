//! Import/export names of the render module ABI.
//!
//! The module is built elsewhere and treated as a fixed, version-pinned binary. Every instance
//! (orchestrating side, worker side and each pool thread) is linked against the same import set.

/// Import module name for everything the host provides.
pub const IMPORT_MODULE: &str = "env";

/// Shared linear memory. Must be declared `shared` with an explicit maximum.
pub const IMPORT_MEMORY: &str = "memory";

/// `() -> i32`: byte length of the serialized render options.
pub const IMPORT_RENDER_OPTIONS_LEN: &str = "render_options_len";

/// `(ptr: i32, len: i32) -> i32`: copy up to `len` bytes of the serialized render options into
/// linear memory at `ptr`. Returns the number of bytes written, or `-1` if the destination range
/// is out of bounds.
pub const IMPORT_RENDER_OPTIONS_READ: &str = "render_options_read";

/// `(threads: i32)`: prepare the module-side work queue for `threads` pool workers.
pub const EXPORT_INIT_THREAD_POOL: &str = "init_thread_pool";

/// `()`: compute a single frame.
pub const EXPORT_RENDER_IMAGE: &str = "render_image";

/// `(index: i32)`: body of pool thread `index`. May run for the lifetime of the process.
pub const EXPORT_POOL_WORKER: &str = "pool_worker";

/// `()`: optional; invoked on the orchestrating-side instance once rendering has begun.
pub const EXPORT_START: &str = "start";
