//! Capability streaming endpoint
//!
//! `GET /{message_id}/{token}` verifies the token statelessly: the
//! expected value is recomputed from the resolved media descriptor and
//! compared, so no token table exists to leak or expire. Mismatch and
//! unknown message ids are indistinguishable to the caller (404).

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::error::{AppError, Result};
use crate::service::MediaResolver;
use crate::AppState;

pub async fn stream_handler(
    Path((message_id, token)): Path<(i64, String)>,
    State(state): State<AppState>,
) -> Result<Response> {
    let Some(media) = state.resolver.resolve(message_id).await? else {
        tracing::debug!(message_id, "Stream request for unknown message");
        return Err(AppError::NotFound);
    };

    let expected = media
        .descriptor
        .capability_token(state.config.media.hash_length);
    if token != expected {
        tracing::warn!(message_id, "Stream request with invalid token");
        return Err(AppError::NotFound);
    }

    let download_url = state.chat.file_download_url(&media.telegram_file_id).await?;
    let upstream = state.http.get(&download_url).send().await?;

    if !upstream.status().is_success() {
        tracing::error!(
            message_id,
            status = %upstream.status(),
            "Upstream file fetch failed"
        );
        return Err(AppError::Telegram(format!(
            "file fetch returned {}",
            upstream.status()
        )));
    }

    let content_length = upstream.content_length();
    let mut response = Response::builder()
        .header(header::CONTENT_TYPE, &media.descriptor.mime_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", media.descriptor.file_name),
        );
    if let Some(length) = content_length {
        response = response.header(header::CONTENT_LENGTH, length);
    }

    let body = Body::from_stream(upstream.bytes_stream());
    response
        .body(body)
        .map(IntoResponse::into_response)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
}
