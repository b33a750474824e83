//! Media descriptors and capability addressing
//!
//! A capability token is a short URL-safe digest derived from a media
//! file's identifying attributes. It is never stored: the web layer can
//! recompute the expected token from a message's resolved media and
//! compare, so possession of the full URL stands in for a lookup table.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Metadata extracted from one inbound media event.
///
/// Ephemeral; constructed per event, never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaDescriptor {
    pub file_name: String,
    pub mime_type: String,
    pub file_size: i64,
    /// Platform-internal numeric identifier; together with the name,
    /// size and mime type it fully determines the capability token.
    pub file_id: i64,
    pub duration: i32,
    pub width: i32,
    pub height: i32,
    pub title: String,
    pub performer: String,
    pub is_voice: bool,
    pub is_animation: bool,
}

impl MediaDescriptor {
    /// Degenerate descriptor for a bare external link with no native
    /// attachment. Size is zero and the mime type is inferred from the
    /// URL path.
    pub fn from_external_link(url: &str) -> Self {
        Self {
            file_name: "external_media".to_string(),
            mime_type: mime_from_url(url),
            file_size: 0,
            ..Default::default()
        }
    }

    /// Capability token for this descriptor at the configured length.
    pub fn capability_token(&self, length: usize) -> String {
        short_hash(
            &pack(&self.file_name, self.file_size, &self.mime_type, self.file_id),
            length,
        )
    }
}

/// Canonical byte encoding of the token-relevant descriptor fields.
///
/// Each field is preceded by its u64 little-endian byte length, so no
/// two distinct field tuples can produce the same packed bytes (e.g.
/// name "ab" + mime "cd" vs name "a" + mime "bcd").
pub fn pack(file_name: &str, file_size: i64, mime_type: &str, file_id: i64) -> Vec<u8> {
    let name = file_name.as_bytes();
    let size = file_size.to_le_bytes();
    let mime = mime_type.as_bytes();
    let id = file_id.to_le_bytes();

    let mut packed = Vec::with_capacity(name.len() + mime.len() + 4 * 8 + 16);
    for field in [name, &size[..], mime, &id[..]] {
        packed.extend_from_slice(&(field.len() as u64).to_le_bytes());
        packed.extend_from_slice(field);
    }
    packed
}

/// URL-safe digest of packed bytes, truncated to `length` characters.
///
/// Deterministic for identical inputs and length across process
/// restarts. `length` is a deployment security parameter; config
/// validation bounds it to what a SHA-256 digest can provide.
pub fn short_hash(packed: &[u8], length: usize) -> String {
    let digest = Sha256::digest(packed);
    let mut encoded = URL_SAFE_NO_PAD.encode(digest);
    encoded.truncate(length);
    encoded
}

/// Fixed-shape streaming URL: `{base_url}/{message_id}/{token}`.
pub fn build_file_url(base_url: &str, message_id: i64, token: &str) -> String {
    format!("{}/{}/{}", base_url.trim_end_matches('/'), message_id, token)
}

/// Infer a mime type from a URL's path extension.
pub fn mime_from_url(raw_url: &str) -> String {
    let path = url::Url::parse(raw_url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| raw_url.to_string());

    let extension = path
        .rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    let mime = match extension.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("mov") => "video/quicktime",
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("opus") => "audio/opus",
        Some("flac") => "audio/flac",
        Some("wav") => "audio/wav",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    };
    mime.to_string()
}

/// The structured message delivered to live web sessions.
///
/// Field names are part of the wire contract with the web player and
/// must not change; numeric values are transmitted as strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub url: String,
    pub file_name: String,
    pub file_id: String,
    pub mime_type: String,
    pub duration: String,
    pub width: String,
    pub height: String,
    pub title: String,
    pub performer: String,
    pub is_voice: String,
    pub is_animation: String,
}

impl PushPayload {
    /// Build the wire payload for a descriptor and its (possibly
    /// proxy-gated) playback URL.
    pub fn new(url: String, descriptor: &MediaDescriptor) -> Self {
        Self {
            url,
            file_name: descriptor.file_name.clone(),
            file_id: descriptor.file_id.to_string(),
            mime_type: descriptor.mime_type.clone(),
            duration: descriptor.duration.to_string(),
            width: descriptor.width.to_string(),
            height: descriptor.height.to_string(),
            title: descriptor.title.clone(),
            performer: descriptor.performer.clone(),
            is_voice: descriptor.is_voice.to_string(),
            is_animation: descriptor.is_animation.to_string(),
        }
    }
}
