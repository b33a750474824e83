//! Chat client double shared by service-layer tests.

use async_trait::async_trait;
use std::sync::Mutex;

use super::client::ChatClient;
use crate::error::AppError;

/// Records every outbound send; detached notification tasks can be
/// inspected after yielding to the runtime.
#[derive(Default)]
pub struct RecordingClient {
    pub sent: Mutex<Vec<(i64, String)>>,
    pub buttons: Mutex<Vec<(i64, String, String)>>,
    pub forwards: Mutex<Vec<(i64, i64, i64)>>,
    pub fail_sends: std::sync::atomic::AtomicBool,
}

impl RecordingClient {
    pub fn sent_to(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(chat, _)| *chat == chat_id)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl ChatClient for RecordingClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), AppError> {
        if self.fail_sends.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(AppError::Telegram("send failed".to_string()));
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn send_message_with_url_button(
        &self,
        chat_id: i64,
        text: &str,
        label: &str,
        url: &str,
    ) -> Result<(), AppError> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        self.buttons
            .lock()
            .unwrap()
            .push((chat_id, label.to_string(), url.to_string()));
        Ok(())
    }

    async fn forward_message(
        &self,
        from_chat_id: i64,
        to_chat_id: i64,
        message_id: i64,
    ) -> Result<i64, AppError> {
        self.forwards
            .lock()
            .unwrap()
            .push((from_chat_id, to_chat_id, message_id));
        Ok(message_id + 1000)
    }

    async fn file_download_url(&self, file_id: &str) -> Result<String, AppError> {
        Ok(format!("http://files.test/{file_id}"))
    }
}
