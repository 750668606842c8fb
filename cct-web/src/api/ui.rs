//! Dashboard page and script
//!
//! Both are compiled into the binary. They change only with a new build, so
//! responses carry a build-derived ETag and revalidating browsers get a 304.

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

const INDEX_HTML: &str = include_str!("../ui/index.html");
const APP_JS: &str = include_str!("../ui/app.js");
const ASSET_ETAG: &str = env!("ASSET_ETAG");

fn matches_etag(headers: &HeaderMap) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|tags| tags.split(',').any(|tag| tag.trim() == ASSET_ETAG || tag.trim() == "*"))
}

fn asset(headers: &HeaderMap, content_type: &'static str, body: &'static str) -> Response {
    let cache_headers = [(header::ETAG, ASSET_ETAG), (header::CACHE_CONTROL, "no-cache")];
    if matches_etag(headers) {
        return (StatusCode::NOT_MODIFIED, cache_headers).into_response();
    }
    (
        StatusCode::OK,
        cache_headers,
        [(header::CONTENT_TYPE, content_type)],
        body,
    )
        .into_response()
}

/// GET /
pub async fn serve_index(headers: HeaderMap) -> Response {
    asset(&headers, "text/html; charset=utf-8", INDEX_HTML)
}

/// GET /static/app.js
pub async fn serve_app_js(headers: HeaderMap) -> Response {
    asset(&headers, "text/javascript; charset=utf-8", APP_JS)
}
