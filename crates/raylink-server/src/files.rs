//! Static file responses.
//!
//! Every failure to produce a file (traversal attempt, missing file, directory, I/O error) is
//! answered with the same 404 response so the server reveals nothing about the filesystem.

use std::path::{Component, Path, PathBuf};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::response::Response;

use crate::{AppState, NOT_FOUND_BODY};

/// The document served for `/`.
pub const INDEX_DOCUMENT: &str = "index.html";

pub(crate) async fn serve(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return method_not_allowed();
    }

    let Some(relative) = relative_path(uri.path()) else {
        tracing::debug!(path = uri.path(), "rejected request path");
        return not_found();
    };
    let Some(path) = contained(state.root(), &relative).await else {
        return not_found();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => file_response(&path, bytes, method == Method::HEAD),
        Err(err) => {
            tracing::debug!(path = %path.display(), "read failed: {err}");
            not_found()
        }
    }
}

/// Map a request path onto a path relative to the web root.
///
/// `/` becomes the index document. Returns `None` for anything that could step outside the root:
/// `..`, an absolute component after the leading slash, or a drive/UNC prefix.
pub fn relative_path(request_path: &str) -> Option<PathBuf> {
    let trimmed = request_path.strip_prefix('/').unwrap_or(request_path);
    if trimmed.is_empty() {
        return Some(PathBuf::from(INDEX_DOCUMENT));
    }

    let mut relative = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!relative.as_os_str().is_empty()).then_some(relative)
}

/// Resolve `relative` under `root`, following symlinks, and make sure the result is still inside
/// the root.
async fn contained(root: &Path, relative: &Path) -> Option<PathBuf> {
    let root = tokio::fs::canonicalize(root).await.ok()?;
    let path = tokio::fs::canonicalize(root.join(relative)).await.ok()?;
    if path.starts_with(&root) {
        Some(path)
    } else {
        tracing::warn!(path = %path.display(), "path escapes web root");
        None
    }
}

/// Content type inferred from the extension. Unknown extensions get no header at all.
pub fn content_type(path: &Path) -> Option<&'static str> {
    mime_guess::from_path(path).first_raw()
}

fn file_response(path: &Path, bytes: Vec<u8>, head: bool) -> Response {
    let len = bytes.len();
    let mut res = Response::new(if head {
        Body::empty()
    } else {
        Body::from(bytes)
    });

    let headers = res.headers_mut();
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    if let Some(content_type) = content_type(path) {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    res
}

/// `404` with a fixed plain body and deliberately no `Content-Type`.
pub(crate) fn not_found() -> Response {
    let mut res = Response::new(Body::from(NOT_FOUND_BODY));
    *res.status_mut() = StatusCode::NOT_FOUND;
    res
}

fn method_not_allowed() -> Response {
    let mut res = Response::new(Body::empty());
    *res.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
    res.headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_maps_to_the_index_document() {
        assert_eq!(relative_path("/"), Some(PathBuf::from("index.html")));
        assert_eq!(relative_path(""), Some(PathBuf::from("index.html")));
    }

    #[test]
    fn nested_paths_stay_relative() {
        assert_eq!(
            relative_path("/pkg/engine_bg.wasm"),
            Some(PathBuf::from("pkg/engine_bg.wasm"))
        );
        assert_eq!(
            relative_path("/./pkg/./index.js"),
            Some(PathBuf::from("pkg/index.js"))
        );
    }

    #[test]
    fn escaping_paths_are_rejected() {
        assert_eq!(relative_path("/../secrets.json"), None);
        assert_eq!(relative_path("/pkg/../../etc/passwd"), None);
        assert_eq!(relative_path("//etc/passwd"), None);
        assert_eq!(relative_path("/."), None);
    }

    #[test]
    fn content_types_follow_the_extension() {
        assert_eq!(content_type(Path::new("index.html")), Some("text/html"));
        assert_eq!(
            content_type(Path::new("pkg/engine_bg.wasm")),
            Some("application/wasm")
        );
        assert_eq!(content_type(Path::new("style.css")), Some("text/css"));
        assert_eq!(content_type(Path::new("LICENSE")), None);
    }
}
