//! Same-origin media relay
//!
//! `GET /proxy?url=...` fetches a third-party media URL server-side and
//! streams the bytes back, so the browser player only ever talks to
//! this origin. Only absolute http(s) URLs are relayed.

use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ProxyParams {
    url: String,
}

pub async fn proxy_handler(
    Query(params): Query<ProxyParams>,
    State(state): State<AppState>,
) -> Result<Response> {
    if !params.url.starts_with("http://") && !params.url.starts_with("https://") {
        tracing::warn!(url = %params.url, "Rejected proxy request for non-http URL");
        return Err(AppError::NotFound);
    }

    let upstream = state.http.get(&params.url).send().await?;
    if !upstream.status().is_success() {
        tracing::warn!(url = %params.url, status = %upstream.status(), "Proxy upstream failed");
        return Err(AppError::Telegram(format!(
            "proxy upstream returned {}",
            upstream.status()
        )));
    }

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let content_length = upstream.content_length();

    let mut response = Response::builder().header(header::CONTENT_TYPE, content_type);
    if let Some(length) = content_length {
        response = response.header(header::CONTENT_LENGTH, length);
    }

    let body = Body::from_stream(upstream.bytes_stream());
    response
        .body(body)
        .map(IntoResponse::into_response)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
}
