//! Member portrait proxy with an SVG avatar fallback

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

const CACHE_CONTROL: &str = "public, max-age=3600";

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

pub(crate) const AVATAR_SVG: &str = r##"<svg width="200" height="200" viewBox="0 0 200 200" fill="none" xmlns="http://www.w3.org/2000/svg">
<circle cx="100" cy="100" r="100" fill="#6c757d"/>
<svg x="50" y="50" width="100" height="100" viewBox="0 0 24 24" fill="white">
<path d="M12 12c2.21 0 4-1.79 4-4s-1.79-4-4-4-4 1.79-4 4 1.79 4 4 4zm0 2c-2.67 0-8 1.34-8 4v2h16v-2c0-2.66-5.33-4-8-4z"/>
</svg>
</svg>"##;

fn avatar() -> Response {
    (
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, CACHE_CONTROL),
        ],
        AVATAR_SVG,
    )
        .into_response()
}

/// Bioguide IDs are alphanumeric ("A000370")
fn is_bioguide_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 16 && id.chars().all(|c| c.is_ascii_alphanumeric())
}

async fn fetch_portrait(state: &AppState, member_id: &str) -> Result<(HeaderValue, Bytes), String> {
    let url = format!(
        "{}/{}_200.jpg",
        state.image_base_url.trim_end_matches('/'),
        member_id.to_lowercase()
    );

    let response = state
        .http
        .get(&url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .header(reqwest::header::REFERER, "https://www.congress.gov/")
        .header(reqwest::header::ACCEPT, "image/webp,image/apng,image/*,*/*;q=0.8")
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if response.status() != reqwest::StatusCode::OK {
        return Err(format!("upstream returned {}", response.status()));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !content_type.contains("image") {
        return Err(format!("upstream content type '{}' is not an image", content_type));
    }

    let content_type = HeaderValue::from_str(&content_type).map_err(|e| e.to_string())?;
    let body = response.bytes().await.map_err(|e| e.to_string())?;
    Ok((content_type, body))
}

/// GET /api/member-image/:id
///
/// Always answers 200: the upstream portrait when available, otherwise a
/// generic avatar.
pub async fn get_member_image(
    State(state): State<AppState>,
    WithRejection(Path(member_id), _): WithRejection<Path<String>, ApiError>,
) -> Response {
    if !is_bioguide_id(&member_id) {
        return avatar();
    }

    match fetch_portrait(&state, &member_id).await {
        Ok((content_type, body)) => (
            [
                (header::CONTENT_TYPE, content_type),
                (header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL)),
            ],
            body,
        )
            .into_response(),
        Err(reason) => {
            debug!("Portrait for {} unavailable: {}", member_id, reason);
            avatar()
        }
    }
}
