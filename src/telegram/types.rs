//! Bot API wire types
//!
//! Deserialization targets for the subset of the Bot API the bridge
//! consumes, plus media-descriptor extraction from inbound messages.

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::media::MediaDescriptor;

/// One long-poll update.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<TgUser>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
    #[serde(default)]
    pub document: Option<Document>,
    #[serde(default)]
    pub audio: Option<Audio>,
    #[serde(default)]
    pub video: Option<Video>,
    #[serde(default)]
    pub photo: Vec<PhotoSize>,
    #[serde(default)]
    pub voice: Option<Voice>,
    #[serde(default)]
    pub animation: Option<Animation>,
    #[serde(default)]
    pub video_note: Option<VideoNote>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Chat {
    /// The bridge only serves one-on-one chats.
    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: usize,
    pub length: usize,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
    pub file_unique_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Audio {
    pub file_id: String,
    pub file_unique_id: String,
    pub duration: i32,
    #[serde(default)]
    pub performer: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    pub file_id: String,
    pub file_unique_id: String,
    pub width: i32,
    pub height: i32,
    pub duration: i32,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub file_unique_id: String,
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Voice {
    pub file_id: String,
    pub file_unique_id: String,
    pub duration: i32,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Animation {
    pub file_id: String,
    pub file_unique_id: String,
    pub width: i32,
    pub height: i32,
    pub duration: i32,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoNote {
    pub file_id: String,
    pub file_unique_id: String,
    pub length: i32,
    pub duration: i32,
    #[serde(default)]
    pub file_size: Option<i64>,
}

/// Stable numeric identifier derived from Telegram's string
/// `file_unique_id`.
///
/// The Bot API exposes no numeric file id; the capability scheme needs
/// one that is identical every time the same file is seen. First eight
/// digest bytes, sign bit cleared.
pub fn numeric_file_id(file_unique_id: &str) -> i64 {
    let digest = Sha256::digest(file_unique_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_le_bytes(bytes) & i64::MAX
}

impl Message {
    /// Whether any native media attachment is present.
    pub fn has_media(&self) -> bool {
        self.document.is_some()
            || self.audio.is_some()
            || self.video.is_some()
            || !self.photo.is_empty()
            || self.voice.is_some()
            || self.animation.is_some()
            || self.video_note.is_some()
    }

    /// Telegram file id of the attached media, used for byte retrieval.
    pub fn media_file_id(&self) -> Option<&str> {
        if let Some(d) = &self.document {
            return Some(&d.file_id);
        }
        if let Some(a) = &self.audio {
            return Some(&a.file_id);
        }
        if let Some(v) = &self.video {
            return Some(&v.file_id);
        }
        if let Some(v) = &self.animation {
            return Some(&v.file_id);
        }
        if let Some(v) = &self.voice {
            return Some(&v.file_id);
        }
        if let Some(v) = &self.video_note {
            return Some(&v.file_id);
        }
        // Largest photo size is listed last
        self.photo.last().map(|p| p.file_id.as_str())
    }

    /// Extract a media descriptor from the message's attachment.
    ///
    /// Returns `None` when the message carries no extractable native
    /// media; the bridge then falls back to an embedded link, if any.
    pub fn media_descriptor(&self) -> Option<MediaDescriptor> {
        if let Some(doc) = &self.document {
            return Some(MediaDescriptor {
                file_name: doc
                    .file_name
                    .clone()
                    .unwrap_or_else(|| "document".to_string()),
                mime_type: doc
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                file_size: doc.file_size.unwrap_or(0),
                file_id: numeric_file_id(&doc.file_unique_id),
                ..Default::default()
            });
        }

        if let Some(audio) = &self.audio {
            return Some(MediaDescriptor {
                file_name: audio.file_name.clone().unwrap_or_else(|| "audio".to_string()),
                mime_type: audio
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| "audio/mpeg".to_string()),
                file_size: audio.file_size.unwrap_or(0),
                file_id: numeric_file_id(&audio.file_unique_id),
                duration: audio.duration,
                title: audio.title.clone().unwrap_or_default(),
                performer: audio.performer.clone().unwrap_or_default(),
                ..Default::default()
            });
        }

        if let Some(video) = &self.video {
            return Some(MediaDescriptor {
                file_name: video.file_name.clone().unwrap_or_else(|| "video".to_string()),
                mime_type: video
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| "video/mp4".to_string()),
                file_size: video.file_size.unwrap_or(0),
                file_id: numeric_file_id(&video.file_unique_id),
                duration: video.duration,
                width: video.width,
                height: video.height,
                ..Default::default()
            });
        }

        if let Some(animation) = &self.animation {
            return Some(MediaDescriptor {
                file_name: animation
                    .file_name
                    .clone()
                    .unwrap_or_else(|| "animation".to_string()),
                mime_type: animation
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| "video/mp4".to_string()),
                file_size: animation.file_size.unwrap_or(0),
                file_id: numeric_file_id(&animation.file_unique_id),
                duration: animation.duration,
                width: animation.width,
                height: animation.height,
                is_animation: true,
                ..Default::default()
            });
        }

        if let Some(voice) = &self.voice {
            return Some(MediaDescriptor {
                file_name: "voice".to_string(),
                mime_type: voice
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| "audio/ogg".to_string()),
                file_size: voice.file_size.unwrap_or(0),
                file_id: numeric_file_id(&voice.file_unique_id),
                duration: voice.duration,
                is_voice: true,
                ..Default::default()
            });
        }

        if let Some(note) = &self.video_note {
            return Some(MediaDescriptor {
                file_name: "video_note".to_string(),
                mime_type: "video/mp4".to_string(),
                file_size: note.file_size.unwrap_or(0),
                file_id: numeric_file_id(&note.file_unique_id),
                duration: note.duration,
                width: note.length,
                height: note.length,
                ..Default::default()
            });
        }

        if let Some(photo) = self.photo.last() {
            return Some(MediaDescriptor {
                file_name: "photo.jpg".to_string(),
                mime_type: "image/jpeg".to_string(),
                file_size: photo.file_size.unwrap_or(0),
                file_id: numeric_file_id(&photo.file_unique_id),
                width: photo.width,
                height: photo.height,
                ..Default::default()
            });
        }

        None
    }

    /// First http(s) URL carried by the message entities or raw text.
    pub fn embedded_url(&self) -> Option<String> {
        for entity in &self.entities {
            match entity.kind.as_str() {
                "text_link" => {
                    if let Some(url) = &entity.url {
                        return Some(url.clone());
                    }
                }
                "url" => {
                    if let Some(text) = &self.text {
                        // Entity offsets count UTF-16 code units
                        let units: Vec<u16> = text.encode_utf16().collect();
                        if entity.offset + entity.length <= units.len() {
                            if let Ok(url) = String::from_utf16(
                                &units[entity.offset..entity.offset + entity.length],
                            ) {
                                if url.starts_with("http://") || url.starts_with("https://") {
                                    return Some(url);
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        // No entity markup; fall back to scanning the text itself.
        self.text.as_deref().and_then(|text| {
            text.split_whitespace()
                .find(|word| word.starts_with("http://") || word.starts_with("https://"))
                .map(|word| word.to_string())
        })
    }

    /// Command name when the text is a `/command`, without arguments.
    pub fn command(&self) -> Option<&str> {
        let text = self.text.as_deref()?;
        if !text.starts_with('/') {
            return None;
        }
        let name = text.split_whitespace().next()?;
        // Strip an @botname suffix used in group mentions
        Some(name.split('@').next().unwrap_or(name))
    }
}
