//! Bridge orchestrator
//!
//! Receives inbound Telegram updates, consults the authorization state
//! machine, computes capability URLs and drives the fan-out registry.
//! Permission and not-found conditions are resolved here into plain
//! reply text; storage failures abort the command with a generic reply
//! and a detailed log line.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{is_local_server_domain, AppConfig};
use crate::data::{Database, MediaRecord, NewUser};
use crate::error::AppError;
use crate::media::{build_file_url, MediaDescriptor, PushPayload};
use crate::metrics::UPDATES_TOTAL;
use crate::push::SessionRegistry;
use crate::service::AuthService;
use crate::telegram::{ChatClient, Message, TgUser, Update};

const UNAUTHORIZED_REPLY: &str = "You are not authorized to use this bot yet. \
Please ask one of the administrators to authorize you and wait until you receive a confirmation.";
const PERMISSION_DENIED_REPLY: &str = "You are not authorized to perform this action.";
const UNSUPPORTED_REPLY: &str = "Unsupported media type. Send an audio, video, photo or \
document file, or a direct media link.";

const USERS_PAGE_SIZE: i64 = 10;

/// Deadline for the audit forward to the log channel.
const AUDIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Media resolved for a message id, for stateless capability URL
/// verification by the web layer.
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub descriptor: MediaDescriptor,
    /// Telegram file id used to retrieve the bytes.
    pub telegram_file_id: String,
}

/// Resolves a message id back to its media descriptor.
///
/// The web layer recomputes the expected capability token from the
/// resolved descriptor and compares, rather than keeping a token table.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, message_id: i64) -> Result<Option<ResolvedMedia>, AppError>;
}

/// SQLite-backed resolver fed by the bridge as media messages arrive.
///
/// Media records persist with the database, so previously issued
/// capability URLs keep resolving after a restart and memory use does
/// not grow with traffic.
pub struct StoredMediaResolver {
    db: Arc<Database>,
}

impl StoredMediaResolver {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record the media routed for a message id. Re-delivery of the
    /// same message id replaces the previous record.
    pub async fn record(
        &self,
        message_id: i64,
        descriptor: &MediaDescriptor,
        telegram_file_id: &str,
    ) -> Result<(), AppError> {
        self.db
            .upsert_media(&MediaRecord::new(message_id, descriptor, telegram_file_id))
            .await
    }
}

#[async_trait]
impl MediaResolver for StoredMediaResolver {
    async fn resolve(&self, message_id: i64) -> Result<Option<ResolvedMedia>, AppError> {
        Ok(self
            .db
            .get_media(message_id)
            .await?
            .map(|record| ResolvedMedia {
                descriptor: record.descriptor(),
                telegram_file_id: record.telegram_file_id,
            }))
    }
}

/// End-to-end orchestrator for inbound updates.
pub struct Bridge {
    config: Arc<AppConfig>,
    auth: Arc<AuthService>,
    registry: Arc<SessionRegistry>,
    chat: Arc<dyn ChatClient>,
    resolver: Arc<StoredMediaResolver>,
}

impl Bridge {
    pub fn new(
        config: Arc<AppConfig>,
        auth: Arc<AuthService>,
        registry: Arc<SessionRegistry>,
        chat: Arc<dyn ChatClient>,
        resolver: Arc<StoredMediaResolver>,
    ) -> Self {
        Self {
            config,
            auth,
            registry,
            chat,
            resolver,
        }
    }

    /// Handle one inbound update. Never returns an error for
    /// user-level conditions; those become chat replies.
    pub async fn handle_update(&self, update: Update) -> Result<(), AppError> {
        let Some(message) = update.message else {
            UPDATES_TOTAL.with_label_values(&["other"]).inc();
            return Ok(());
        };

        // Only one-on-one chats are bridged
        if !message.chat.is_private() {
            tracing::debug!(chat_id = message.chat.id, "Ignoring non-private chat");
            return Ok(());
        }

        let Some(from) = message.from.clone() else {
            return Ok(());
        };
        if from.is_bot {
            return Ok(());
        }

        match message.command() {
            Some("/start") => {
                UPDATES_TOTAL.with_label_values(&["start"]).inc();
                self.handle_start(&message, &from).await
            }
            Some("/authorize") => {
                UPDATES_TOTAL.with_label_values(&["command"]).inc();
                self.handle_authorize(&message, &from).await
            }
            Some("/deauthorize") => {
                UPDATES_TOTAL.with_label_values(&["command"]).inc();
                self.handle_deauthorize(&message, &from).await
            }
            Some("/listusers") => {
                UPDATES_TOTAL.with_label_values(&["command"]).inc();
                self.handle_list_users(&message, &from).await
            }
            Some("/userinfo") => {
                UPDATES_TOTAL.with_label_values(&["command"]).inc();
                self.handle_user_info(&message, &from).await
            }
            _ if message.has_media() || message.embedded_url().is_some() => {
                UPDATES_TOTAL.with_label_values(&["media"]).inc();
                self.handle_media(&message, &from).await
            }
            _ => {
                UPDATES_TOTAL.with_label_values(&["other"]).inc();
                Ok(())
            }
        }
    }

    /// `/start`: register (idempotent), welcome with the player entry
    /// URL, and an authorization notice when applicable.
    async fn handle_start(&self, message: &Message, from: &TgUser) -> Result<(), AppError> {
        let chat_id = message.chat.id;
        let profile = NewUser {
            user_id: from.id,
            chat_id,
            first_name: from.first_name.clone(),
            last_name: from.last_name.clone().unwrap_or_default(),
            username: from.username.clone(),
        };

        let (user, _created) = match self.auth.register(profile).await {
            Ok(result) => result,
            Err(error) => {
                tracing::error!(%error, user_id = from.id, "Registration failed");
                self.reply(chat_id, "Something went wrong, please try again later.")
                    .await;
                return Err(error);
            }
        };

        let entry_url = format!("{}/{}", self.base_url(), chat_id);
        let welcome = format!(
            "Hello {}, I am your bridge between Telegram and the web!\n\n\
             Forward or upload media files (audio, video, photos or documents) \
             and I will instantly generate a streaming link and play it on your web player.\n\n\
             Your player: {}",
            from.first_name, entry_url,
        );
        self.reply(chat_id, &welcome).await;

        if !user.is_authorized {
            self.reply(chat_id, UNAUTHORIZED_REPLY).await;
        }

        Ok(())
    }

    /// Media message: authorize, extract, address, reply and publish.
    async fn handle_media(&self, message: &Message, from: &TgUser) -> Result<(), AppError> {
        let chat_id = message.chat.id;

        let access = match self.auth.check_access(from.id).await {
            Ok(access) => access,
            Err(error) => {
                tracing::error!(%error, user_id = from.id, "Access check failed");
                self.reply(chat_id, "Something went wrong, please try again later.")
                    .await;
                return Err(error);
            }
        };
        if !access.authorized {
            self.reply(chat_id, UNAUTHORIZED_REPLY).await;
            return Ok(());
        }

        // Off the critical path: forward a copy to the audit channel.
        self.spawn_audit_forward(message, from);

        let (descriptor, playback_url) = match media_source(message) {
            Ok(MediaSource::Native {
                descriptor,
                telegram_file_id,
            }) => {
                let token = descriptor.capability_token(self.config.media.hash_length);
                let url = build_file_url(&self.base_url(), message.message_id, &token);

                if let Some(file_id) = telegram_file_id {
                    if let Err(error) = self
                        .resolver
                        .record(message.message_id, &descriptor, &file_id)
                        .await
                    {
                        // Streaming of this message id will 404 until
                        // the media is re-sent; the push still goes out.
                        tracing::error!(
                            %error,
                            message_id = message.message_id,
                            "Failed to persist media record"
                        );
                    }
                }
                (descriptor, url)
            }
            // No native attachment: route the embedded link itself.
            Ok(MediaSource::External(link)) => (MediaDescriptor::from_external_link(&link), link),
            Err(error) => {
                tracing::debug!(
                    message_id = message.message_id,
                    %error,
                    "Message carries no routable media"
                );
                self.reply(chat_id, UNSUPPORTED_REPLY).await;
                return Ok(());
            }
        };

        tracing::info!(
            chat_id,
            message_id = message.message_id,
            file_name = %descriptor.file_name,
            url = %playback_url,
            "Media routed"
        );

        // Loopback URLs are unreachable from the requester's browser,
        // so they are not offered as a clickable button.
        if is_local_server_domain(&playback_url_host(&playback_url)) {
            self.reply(chat_id, &playback_url).await;
        } else if let Err(error) = self
            .chat
            .send_message_with_url_button(chat_id, &playback_url, "STREAMING", &playback_url)
            .await
        {
            tracing::warn!(chat_id, %error, "Failed to send media reply");
        }

        let gated_url = self.wrap_proxy_if_needed(&playback_url);
        let payload = PushPayload::new(gated_url, &descriptor);
        self.registry.publish(chat_id, &payload);

        Ok(())
    }

    async fn handle_authorize(&self, message: &Message, from: &TgUser) -> Result<(), AppError> {
        let chat_id = message.chat.id;
        let args = command_args(message);

        let Some(target_id) = args.first().and_then(|arg| arg.parse::<i64>().ok()) else {
            self.reply(chat_id, "Usage: /authorize <user_id> [admin]").await;
            return Ok(());
        };
        let grant_admin = args.get(1).map(|a| a.as_str()) == Some("admin");

        match self.auth.authorize(from.id, target_id, grant_admin).await {
            Ok(()) => {
                let suffix = if grant_admin { " as an admin" } else { "" };
                self.reply(
                    chat_id,
                    &format!("User {} has been authorized{}.", target_id, suffix),
                )
                .await;
                Ok(())
            }
            Err(AppError::PermissionDenied) => {
                self.reply(chat_id, PERMISSION_DENIED_REPLY).await;
                Ok(())
            }
            Err(AppError::NotFound) => {
                self.reply(chat_id, &format!("User with ID {} not found.", target_id))
                    .await;
                Ok(())
            }
            Err(error) => {
                tracing::error!(%error, target_id, "Authorize failed");
                self.reply(chat_id, "Failed to authorize the user.").await;
                Err(error)
            }
        }
    }

    async fn handle_deauthorize(&self, message: &Message, from: &TgUser) -> Result<(), AppError> {
        let chat_id = message.chat.id;
        let args = command_args(message);

        let Some(target_id) = args.first().and_then(|arg| arg.parse::<i64>().ok()) else {
            self.reply(chat_id, "Usage: /deauthorize <user_id>").await;
            return Ok(());
        };

        match self.auth.deauthorize(from.id, target_id).await {
            Ok(()) => {
                self.reply(chat_id, &format!("User {} has been deauthorized.", target_id))
                    .await;
                Ok(())
            }
            Err(AppError::PermissionDenied) => {
                self.reply(chat_id, PERMISSION_DENIED_REPLY).await;
                Ok(())
            }
            Err(AppError::NotFound) => {
                self.reply(chat_id, &format!("User with ID {} not found.", target_id))
                    .await;
                Ok(())
            }
            Err(error) => {
                tracing::error!(%error, target_id, "Deauthorize failed");
                self.reply(chat_id, "Failed to deauthorize the user.").await;
                Err(error)
            }
        }
    }

    async fn handle_list_users(&self, message: &Message, from: &TgUser) -> Result<(), AppError> {
        let chat_id = message.chat.id;
        let page = command_args(message)
            .first()
            .and_then(|arg| arg.parse::<i64>().ok())
            .filter(|page| *page > 0)
            .unwrap_or(1);
        let offset = (page - 1) * USERS_PAGE_SIZE;

        match self.auth.list_users(from.id, offset, USERS_PAGE_SIZE).await {
            Ok((users, total)) => {
                if users.is_empty() {
                    self.reply(chat_id, "No users found or page is empty.").await;
                    return Ok(());
                }

                let mut text = String::from("User List\n\n");
                for (i, user) in users.iter().enumerate() {
                    let status = if user.is_authorized {
                        "Authorized"
                    } else {
                        "Not Authorized"
                    };
                    let admin = if user.is_admin { " Admin" } else { "" };
                    text.push_str(&format!(
                        "{}. ID:{} {} {} ({}) - {}{}\n",
                        offset + i as i64 + 1,
                        user.user_id,
                        user.first_name,
                        user.last_name,
                        user.display_username(),
                        status,
                        admin,
                    ));
                }
                let total_pages = (total + USERS_PAGE_SIZE - 1) / USERS_PAGE_SIZE;
                text.push_str(&format!(
                    "\nPage {} of {} ({} total users)",
                    page, total_pages, total
                ));

                self.reply(chat_id, &text).await;
                Ok(())
            }
            Err(AppError::PermissionDenied) => {
                self.reply(chat_id, PERMISSION_DENIED_REPLY).await;
                Ok(())
            }
            Err(error) => {
                tracing::error!(%error, "User listing failed");
                self.reply(chat_id, "Error retrieving user list.").await;
                Err(error)
            }
        }
    }

    async fn handle_user_info(&self, message: &Message, from: &TgUser) -> Result<(), AppError> {
        let chat_id = message.chat.id;
        let args = command_args(message);

        let Some(target_id) = args.first().and_then(|arg| arg.parse::<i64>().ok()) else {
            self.reply(chat_id, "Usage: /userinfo <user_id>").await;
            return Ok(());
        };

        match self.auth.user_info(from.id, target_id).await {
            Ok(user) => {
                let text = format!(
                    "User Details:\n\
                     ID: {}\n\
                     Chat ID: {}\n\
                     Name: {} {}\n\
                     Username: {}\n\
                     Status: {}\n\
                     Admin: {}\n\
                     Joined: {}",
                    user.user_id,
                    user.chat_id,
                    user.first_name,
                    user.last_name,
                    user.display_username(),
                    if user.is_authorized {
                        "Authorized"
                    } else {
                        "Not Authorized"
                    },
                    if user.is_admin { "Yes" } else { "No" },
                    user.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                );
                self.reply(chat_id, &text).await;
                Ok(())
            }
            Err(AppError::PermissionDenied) => {
                self.reply(chat_id, PERMISSION_DENIED_REPLY).await;
                Ok(())
            }
            Err(AppError::NotFound) => {
                self.reply(chat_id, &format!("User with ID {} not found.", target_id))
                    .await;
                Ok(())
            }
            Err(error) => {
                tracing::error!(%error, target_id, "User info lookup failed");
                self.reply(chat_id, "Error retrieving user information.").await;
                Err(error)
            }
        }
    }

    /// Conditionally rewrite a URL through the same-origin relay.
    ///
    /// Third-party http(s) origins are gated behind `/proxy` so the
    /// browser fetch stays same-origin; URLs already on this service
    /// and loopback URLs pass through unchanged.
    pub fn wrap_proxy_if_needed(&self, raw_url: &str) -> String {
        if !raw_url.starts_with("http://") && !raw_url.starts_with("https://") {
            return raw_url.to_string();
        }

        if raw_url.starts_with(&self.base_url()) {
            return raw_url.to_string();
        }

        let Ok(parsed) = url::Url::parse(raw_url) else {
            return raw_url.to_string();
        };

        if let Some(host) = parsed.host_str() {
            if is_local_server_domain(host) {
                return raw_url.to_string();
            }
        }

        if parsed.port() == Some(self.config.server.port) {
            return raw_url.to_string();
        }

        format!("/proxy?url={}", urlencoding::encode(raw_url))
    }

    /// Detached audit copy of the inbound media message, with a short
    /// attribution note. Failure is logged only.
    fn spawn_audit_forward(&self, message: &Message, from: &TgUser) {
        let log_channel_id = self.config.bot.log_channel_id;
        if log_channel_id == 0 {
            return;
        }

        let chat = self.chat.clone();
        let from_chat_id = message.chat.id;
        let message_id = message.message_id;
        let attribution = format!(
            "Media from user:\nID: {}\nName: {} {}\nUsername: {}",
            from.id,
            from.first_name,
            from.last_name.clone().unwrap_or_default(),
            from.username
                .clone()
                .map(|name| format!("@{name}"))
                .unwrap_or_else(|| "N/A".to_string()),
        );

        tokio::spawn(async move {
            let forward = async {
                chat.forward_message(from_chat_id, log_channel_id, message_id)
                    .await?;
                chat.send_message(log_channel_id, &attribution).await
            };

            match tokio::time::timeout(AUDIT_TIMEOUT, forward).await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::warn!(%error, message_id, "Audit forward failed");
                }
                Err(_) => {
                    tracing::warn!(message_id, "Audit forward timed out; abandoned");
                }
            }
        });
    }

    /// Best-effort chat reply; failures are logged, never escalated.
    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(error) = self.chat.send_message(chat_id, text).await {
            tracing::warn!(chat_id, %error, "Failed to send reply");
        }
    }

    fn base_url(&self) -> String {
        self.config.server.base_url()
    }
}

/// Routable media carried by a message.
enum MediaSource {
    Native {
        descriptor: MediaDescriptor,
        telegram_file_id: Option<String>,
    },
    External(String),
}

/// Classify a message's media, failing with [`AppError::UnsupportedMedia`]
/// when neither a native attachment nor an embedded link is present.
fn media_source(message: &Message) -> Result<MediaSource, AppError> {
    if let Some(descriptor) = message.media_descriptor() {
        return Ok(MediaSource::Native {
            descriptor,
            telegram_file_id: message.media_file_id().map(str::to_string),
        });
    }
    if let Some(link) = message.embedded_url() {
        return Ok(MediaSource::External(link));
    }
    Err(AppError::UnsupportedMedia)
}

/// Arguments after the command word.
fn command_args(message: &Message) -> Vec<String> {
    message
        .text
        .as_deref()
        .unwrap_or_default()
        .split_whitespace()
        .skip(1)
        .map(|s| s.to_string())
        .collect()
}

/// Host portion of a URL, or the raw string when unparsable.
fn playback_url_host(raw_url: &str) -> String {
    url::Url::parse(raw_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| raw_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AppConfig, BotConfig, DatabaseConfig, LoggingConfig, MediaConfig, ServerConfig,
    };
    use crate::data::Database;
    use crate::push::Session;
    use crate::telegram::testing::RecordingClient;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn test_config(domain: &str, protocol: &str) -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                domain: domain.to_string(),
                protocol: protocol.to_string(),
            },
            database: DatabaseConfig {
                path: "unused.db".into(),
            },
            bot: BotConfig {
                token: "12345:test".to_string(),
                poll_timeout_seconds: 1,
                log_channel_id: 0,
                api_base: "http://bot-api.test".to_string(),
            },
            media: MediaConfig { hash_length: 8 },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    struct Harness {
        bridge: Bridge,
        client: Arc<RecordingClient>,
        registry: Arc<SessionRegistry>,
        _temp_dir: TempDir,
    }

    async fn harness_with(config: AppConfig) -> Harness {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(
            Database::connect(&temp_dir.path().join("bridge.db"))
                .await
                .unwrap(),
        );
        let client = Arc::new(RecordingClient::default());
        let registry = Arc::new(SessionRegistry::new());
        let chat: Arc<dyn ChatClient> = client.clone();
        let auth = Arc::new(AuthService::new(db.clone(), chat.clone()));
        let bridge = Bridge::new(
            Arc::new(config),
            auth,
            registry.clone(),
            chat,
            Arc::new(StoredMediaResolver::new(db)),
        );
        Harness {
            bridge,
            client,
            registry,
            _temp_dir: temp_dir,
        }
    }

    async fn harness() -> Harness {
        harness_with(test_config("bridge.example.com", "https")).await
    }

    fn start_update(user_id: i64) -> Update {
        serde_json::from_value(serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 1,
                "from": {"id": user_id, "first_name": format!("U{user_id}")},
                "chat": {"id": user_id, "type": "private"},
                "text": "/start"
            }
        }))
        .unwrap()
    }

    fn text_update(user_id: i64, text: &str) -> Update {
        serde_json::from_value(serde_json::json!({
            "update_id": 2,
            "message": {
                "message_id": 2,
                "from": {"id": user_id, "first_name": format!("U{user_id}")},
                "chat": {"id": user_id, "type": "private"},
                "text": text
            }
        }))
        .unwrap()
    }

    fn media_update(user_id: i64, message_id: i64) -> Update {
        serde_json::from_value(serde_json::json!({
            "update_id": 3,
            "message": {
                "message_id": message_id,
                "from": {"id": user_id, "first_name": format!("U{user_id}")},
                "chat": {"id": user_id, "type": "private"},
                "audio": {
                    "file_id": "f-abc",
                    "file_unique_id": "uniq-abc",
                    "duration": 60,
                    "file_name": "song.mp3",
                    "mime_type": "audio/mpeg",
                    "file_size": 2048
                }
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn start_welcomes_with_entry_url_and_notice() {
        let h = harness().await;

        // First user: bootstrap admin, no unauthorized notice
        h.bridge.handle_update(start_update(1)).await.unwrap();
        let first = h.client.sent_to(1);
        assert_eq!(first.len(), 1);
        assert!(first[0].contains("https://bridge.example.com/1"));

        // Second user: welcome plus unauthorized notice
        h.bridge.handle_update(start_update(2)).await.unwrap();
        let second = h.client.sent_to(2);
        assert_eq!(second.len(), 2);
        assert!(second[1].contains("not authorized"));
    }

    #[tokio::test]
    async fn media_flow_replies_and_publishes() {
        let h = harness().await;

        // A registers first (admin), authorizes B
        h.bridge.handle_update(start_update(1)).await.unwrap();
        h.bridge.handle_update(start_update(2)).await.unwrap();
        h.bridge
            .handle_update(text_update(1, "/authorize 2"))
            .await
            .unwrap();

        // B opens a web session
        let (tx, mut rx) = mpsc::unbounded_channel();
        h.registry.register(2, Session::new(tx));

        h.bridge.handle_update(media_update(2, 77)).await.unwrap();

        // Reply carries the capability URL as a button (public domain)
        let buttons = h.client.buttons.lock().unwrap().clone();
        assert_eq!(buttons.len(), 1);
        assert!(buttons[0].2.starts_with("https://bridge.example.com/77/"));

        // The push payload reaches the registered session
        let payload = rx.try_recv().unwrap();
        assert_eq!(payload.file_name, "song.mp3");
        assert!(payload.url.starts_with("https://bridge.example.com/77/"));
    }

    #[tokio::test]
    async fn media_from_unregistered_user_is_denied_without_push() {
        let h = harness().await;

        h.bridge.handle_update(start_update(1)).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        h.registry.register(3, Session::new(tx));

        h.bridge.handle_update(media_update(3, 5)).await.unwrap();

        let replies = h.client.sent_to(3);
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("not authorized"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn local_domain_reply_is_plain_text() {
        let h = harness_with(test_config("localhost:8080", "http")).await;

        h.bridge.handle_update(start_update(1)).await.unwrap();
        h.bridge.handle_update(media_update(1, 9)).await.unwrap();

        assert!(h.client.buttons.lock().unwrap().is_empty());
        let replies = h.client.sent_to(1);
        assert!(replies
            .iter()
            .any(|text| text.starts_with("http://localhost:8080/9/")));
    }

    #[tokio::test]
    async fn link_only_message_falls_back_to_external_descriptor() {
        let h = harness().await;

        h.bridge.handle_update(start_update(1)).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        h.registry.register(1, Session::new(tx));

        h.bridge
            .handle_update(text_update(1, "https://cdn.example.com/clip.mp4"))
            .await
            .unwrap();

        let payload = rx.try_recv().unwrap();
        assert_eq!(payload.file_name, "external_media");
        assert_eq!(payload.mime_type, "video/mp4");
        // Third-party origin is gated through the proxy
        assert!(payload.url.starts_with("/proxy?url="));
    }

    #[tokio::test]
    async fn plain_text_without_media_is_ignored() {
        let h = harness().await;

        h.bridge.handle_update(start_update(1)).await.unwrap();
        h.bridge
            .handle_update(text_update(1, "just chatting"))
            .await
            .unwrap();

        // Only the /start replies exist
        assert_eq!(h.client.sent_to(1).len(), 1);
    }

    #[tokio::test]
    async fn unauthorized_admin_commands_are_denied() {
        let h = harness().await;

        h.bridge.handle_update(start_update(1)).await.unwrap();
        h.bridge.handle_update(start_update(2)).await.unwrap();

        for command in ["/authorize 1", "/deauthorize 1", "/listusers", "/userinfo 1"] {
            h.bridge
                .handle_update(text_update(2, command))
                .await
                .unwrap();
        }

        let replies = h.client.sent_to(2);
        let denials = replies
            .iter()
            .filter(|text| *text == PERMISSION_DENIED_REPLY)
            .count();
        assert_eq!(denials, 4);
    }

    #[tokio::test]
    async fn list_users_formats_page() {
        let h = harness().await;

        h.bridge.handle_update(start_update(1)).await.unwrap();
        h.bridge.handle_update(start_update(2)).await.unwrap();
        h.bridge
            .handle_update(text_update(1, "/listusers"))
            .await
            .unwrap();

        let replies = h.client.sent_to(1);
        let listing = replies
            .iter()
            .find(|text| text.contains("User List"))
            .expect("listing reply missing");
        assert!(listing.contains("ID:1"));
        assert!(listing.contains("ID:2"));
        assert!(listing.contains("Page 1 of 1 (2 total users)"));
    }

    #[tokio::test]
    async fn proxy_gate_matrix() {
        let h = harness().await;

        // Loopback passes through
        assert_eq!(
            h.bridge.wrap_proxy_if_needed("http://localhost:9999/x.mp4"),
            "http://localhost:9999/x.mp4"
        );
        assert_eq!(
            h.bridge.wrap_proxy_if_needed("http://127.0.0.1/x.mp4"),
            "http://127.0.0.1/x.mp4"
        );
        // Own base URL passes through
        assert_eq!(
            h.bridge
                .wrap_proxy_if_needed("https://bridge.example.com/42/tok"),
            "https://bridge.example.com/42/tok"
        );
        // Own port passes through
        assert_eq!(
            h.bridge.wrap_proxy_if_needed("http://media.lan:8080/a.mp4"),
            "http://media.lan:8080/a.mp4"
        );
        // Non-http(s) passes through
        assert_eq!(h.bridge.wrap_proxy_if_needed("/relative/path"), "/relative/path");
        // Anything else is gated
        assert_eq!(
            h.bridge.wrap_proxy_if_needed("https://cdn.example.com/a.mp4"),
            "/proxy?url=https%3A%2F%2Fcdn.example.com%2Fa.mp4"
        );
    }

    #[tokio::test]
    async fn recorded_media_survives_a_restart() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("bridge.db");

        let descriptor = MediaDescriptor {
            file_name: "song.mp3".to_string(),
            mime_type: "audio/mpeg".to_string(),
            file_size: 2048,
            file_id: 4242,
            duration: 60,
            ..Default::default()
        };
        let token = descriptor.capability_token(8);

        {
            let db = Arc::new(Database::connect(&db_path).await.unwrap());
            let resolver = StoredMediaResolver::new(db);
            resolver.record(77, &descriptor, "f-abc").await.unwrap();
        }

        // Fresh pool over the same file stands in for a process restart
        let db = Arc::new(Database::connect(&db_path).await.unwrap());
        let resolver = StoredMediaResolver::new(db);
        let media = resolver.resolve(77).await.unwrap().unwrap();

        assert_eq!(media.descriptor, descriptor);
        assert_eq!(media.telegram_file_id, "f-abc");
        assert_eq!(media.descriptor.capability_token(8), token);
        assert!(resolver.resolve(78).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn message_without_media_or_link_is_unsupported() {
        let message: Message = serde_json::from_value(serde_json::json!({
            "message_id": 12,
            "chat": {"id": 10, "type": "private"},
            "text": "just words"
        }))
        .unwrap();

        assert!(matches!(
            media_source(&message),
            Err(AppError::UnsupportedMedia)
        ));
    }

    #[tokio::test]
    async fn audit_forward_copies_media_to_log_channel() {
        let mut config = test_config("bridge.example.com", "https");
        config.bot.log_channel_id = -100_500;
        let h = harness_with(config).await;

        h.bridge.handle_update(start_update(1)).await.unwrap();
        h.bridge.handle_update(media_update(1, 7)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let forwards = h.client.forwards.lock().unwrap().clone();
        assert_eq!(forwards, vec![(1, -100_500, 7)]);
        let notes = h.client.sent_to(-100_500);
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("ID: 1"));
    }
}
