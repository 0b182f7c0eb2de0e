//! Static asset server for the render page.
//!
//! Serves files from a web root with the cross-origin isolation headers the browser requires
//! before it will hand a shared memory to a worker. Plain HTTP always; HTTPS on the next port
//! when key material is available.

pub mod config;
pub mod files;
pub mod headers;
mod observability;
pub mod server;
pub mod tls;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{middleware, Router};

pub use config::ServeArgs;
pub use server::{start, AssetServerConfig, RunningAssetServer};

/// Plain HTTP port when none is configured. HTTPS uses the next one.
pub const DEFAULT_PORT: u16 = 8080;

/// Body of every 404 response.
pub const NOT_FOUND_BODY: &str = "404 Not Found\n";

#[derive(Clone, Debug)]
pub struct AppState {
    root: Arc<PathBuf>,
}

impl AppState {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .fallback(files::serve)
        .with_state(state)
        .layer(middleware::map_response(headers::cross_origin_isolation))
        .layer(middleware::from_fn(observability::middleware))
}
