//! Common test utilities for E2E tests

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::net::TcpListener;

use webbridge::error::AppError;
use webbridge::telegram::ChatClient;
use webbridge::{config, AppState};

/// Chat client stub for web-layer tests.
///
/// Replies are recorded; file downloads are redirected to a URL base
/// set by the test (usually the test server itself).
#[derive(Default)]
pub struct StubChatClient {
    pub sent: Mutex<Vec<(i64, String)>>,
    pub download_base: Mutex<String>,
}

impl StubChatClient {
    pub fn set_download_base(&self, base: &str) {
        *self.download_base.lock().unwrap() = base.to_string();
    }
}

#[async_trait]
impl ChatClient for StubChatClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), AppError> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn send_message_with_url_button(
        &self,
        chat_id: i64,
        text: &str,
        _label: &str,
        _url: &str,
    ) -> Result<(), AppError> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn forward_message(
        &self,
        _from_chat_id: i64,
        _to_chat_id: i64,
        message_id: i64,
    ) -> Result<i64, AppError> {
        Ok(message_id)
    }

    async fn file_download_url(&self, file_id: &str) -> Result<String, AppError> {
        let base = self.download_base.lock().unwrap().clone();
        Ok(format!("{}/{}", base, file_id))
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub chat: Arc<StubChatClient>,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                domain: "test.example.com".to_string(),
                protocol: "https".to_string(),
            },
            database: config::DatabaseConfig {
                path: PathBuf::from(&db_path),
            },
            bot: config::BotConfig {
                token: "12345:test-token".to_string(),
                poll_timeout_seconds: 1,
                log_channel_id: 0,
                api_base: "http://bot-api.invalid".to_string(),
            },
            media: config::MediaConfig { hash_length: 8 },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state with a stub chat client
        let chat = Arc::new(StubChatClient::default());
        let state = AppState::new(config, chat.clone()).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        // Build router
        let app = webbridge::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        // Point stub file downloads at this server by default
        chat.set_download_base(&addr_str);

        Self {
            addr: addr_str,
            state,
            chat,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Get WebSocket URL for a chat id
    pub fn ws_url(&self, chat_id: i64) -> String {
        format!("{}/ws/{}", self.addr.replace("http://", "ws://"), chat_id)
    }
}
