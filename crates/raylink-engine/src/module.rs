//! Module bytes: format sniffing, WAT conversion and content digests.
//!
//! The orchestrating side and the worker side each obtain the module bytes independently (the
//! worker re-reads its [`ModuleSource`]), so the digest is what proves both sides run the same
//! binary.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::EngineError;

/// What kind of module the loader inferred from the bytes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ModuleFormat {
    Wasm,
    Wat,
}

/// SHA-256 of the (normalized) wasm bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ModuleDigest([u8; 32]);

impl ModuleDigest {
    fn of(wasm: &[u8]) -> Self {
        Self(Sha256::digest(wasm).into())
    }
}

impl fmt::Display for ModuleDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ModuleDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleDigest({self})")
    }
}

/// Validated module bytes, always in binary wasm form.
#[derive(Clone, Debug)]
pub struct ModuleBytes {
    wasm: Arc<[u8]>,
    format: ModuleFormat,
    digest: ModuleDigest,
}

impl ModuleBytes {
    /// Detect format and normalize to wasm bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
        let format = detect_format(bytes).ok_or(EngineError::UnrecognizedFormat)?;
        let wasm: Arc<[u8]> = match format {
            ModuleFormat::Wasm => Arc::from(bytes),
            ModuleFormat::Wat => Arc::from(wat::parse_bytes(bytes)?.into_owned()),
        };
        let digest = ModuleDigest::of(&wasm);
        Ok(Self {
            wasm,
            format,
            digest,
        })
    }

    pub fn read(path: &Path) -> Result<Self, EngineError> {
        let bytes = std::fs::read(path).map_err(|source| EngineError::ReadModule {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn wasm(&self) -> &[u8] {
        &self.wasm
    }

    pub fn format(&self) -> ModuleFormat {
        self.format
    }

    pub fn digest(&self) -> &ModuleDigest {
        &self.digest
    }
}

/// Where a context obtains the module bytes from.
#[derive(Clone, Debug)]
pub enum ModuleSource {
    /// Read from disk every time the module is loaded.
    Path(PathBuf),
    /// Already in memory (tests, embedded modules).
    Bytes(ModuleBytes),
}

impl ModuleSource {
    pub fn load(&self) -> Result<ModuleBytes, EngineError> {
        match self {
            Self::Path(path) => ModuleBytes::read(path),
            Self::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

/// Best-effort detection.
///
/// - `\0asm` magic: wasm.
/// - first byte after an optional UTF-8 BOM and leading whitespace is `(`: WAT.
pub fn detect_format(bytes: &[u8]) -> Option<ModuleFormat> {
    if bytes.starts_with(b"\0asm") {
        return Some(ModuleFormat::Wasm);
    }

    let rest = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let first = rest
        .iter()
        .copied()
        .find(|b| !matches!(b, b' ' | b'\t' | b'\r' | b'\n'));
    (first == Some(b'(')).then_some(ModuleFormat::Wat)
}
