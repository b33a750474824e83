//! Data models
//!
//! Rust structs representing database entities.
//! Users are keyed by the platform-stable Telegram user id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::MediaDescriptor;

/// A bridge user.
///
/// Created on first contact, never deleted. Authorization is soft
/// state flipped by admin commands; `is_admin` implies `is_authorized`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Telegram user id (platform-stable, unique)
    pub user_id: i64,
    /// Destination chat for pushes and notifications; for private
    /// chats this equals `user_id`, but that is not assumed anywhere.
    pub chat_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: Option<String>,
    pub is_authorized: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Display handle used in admin-facing listings.
    pub fn display_username(&self) -> String {
        match &self.username {
            Some(name) if !name.is_empty() => format!("@{}", name),
            _ => "N/A".to_string(),
        }
    }
}

/// Profile data captured from a contact event, before any
/// authorization decision has been made.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_id: i64,
    pub chat_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: Option<String>,
}

impl NewUser {
    /// Materialize a row with explicit authorization flags.
    pub fn into_user(self, is_authorized: bool, is_admin: bool) -> User {
        User {
            user_id: self.user_id,
            chat_id: self.chat_id,
            first_name: self.first_name,
            last_name: self.last_name,
            username: self.username,
            is_authorized,
            is_admin,
            created_at: Utc::now(),
        }
    }
}

/// Media routed for one message id.
///
/// Persisted so capability URLs keep resolving after a restart; the
/// token itself is still recomputed from the descriptor fields, never
/// stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MediaRecord {
    pub message_id: i64,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: i64,
    pub file_id: i64,
    pub duration: i32,
    pub width: i32,
    pub height: i32,
    pub title: String,
    pub performer: String,
    pub is_voice: bool,
    pub is_animation: bool,
    /// Telegram file id used to retrieve the bytes.
    pub telegram_file_id: String,
    pub created_at: DateTime<Utc>,
}

impl MediaRecord {
    pub fn new(message_id: i64, descriptor: &MediaDescriptor, telegram_file_id: &str) -> Self {
        Self {
            message_id,
            file_name: descriptor.file_name.clone(),
            mime_type: descriptor.mime_type.clone(),
            file_size: descriptor.file_size,
            file_id: descriptor.file_id,
            duration: descriptor.duration,
            width: descriptor.width,
            height: descriptor.height,
            title: descriptor.title.clone(),
            performer: descriptor.performer.clone(),
            is_voice: descriptor.is_voice,
            is_animation: descriptor.is_animation,
            telegram_file_id: telegram_file_id.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Rebuild the descriptor the capability token is derived from.
    pub fn descriptor(&self) -> MediaDescriptor {
        MediaDescriptor {
            file_name: self.file_name.clone(),
            mime_type: self.mime_type.clone(),
            file_size: self.file_size,
            file_id: self.file_id,
            duration: self.duration,
            width: self.width,
            height: self.height,
            title: self.title.clone(),
            performer: self.performer.clone(),
            is_voice: self.is_voice,
            is_animation: self.is_animation,
        }
    }
}
