use axum::http::header::{HeaderName, HeaderValue};
use axum::response::Response;

pub const CROSS_ORIGIN_EMBEDDER_POLICY: &str = "cross-origin-embedder-policy";
pub const CROSS_ORIGIN_OPENER_POLICY: &str = "cross-origin-opener-policy";

/// Required for the page to be cross-origin isolated, which in turn is required for the worker
/// to receive a shared memory.
pub const REQUIRE_CORP: &str = "require-corp";
pub const SAME_ORIGIN: &str = "same-origin";

/// Stamp the isolation policy on a response, whatever its status.
pub(crate) async fn cross_origin_isolation(mut res: Response) -> Response {
    let headers = res.headers_mut();
    headers.insert(
        HeaderName::from_static(CROSS_ORIGIN_EMBEDDER_POLICY),
        HeaderValue::from_static(REQUIRE_CORP),
    );
    headers.insert(
        HeaderName::from_static(CROSS_ORIGIN_OPENER_POLICY),
        HeaderValue::from_static(SAME_ORIGIN),
    );
    res
}
