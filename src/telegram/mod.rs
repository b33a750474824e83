//! Telegram chat-protocol layer
//!
//! The bridge core consumes a narrow contract ([`ChatClient`]) and an
//! inbound update model; `BotApiClient` implements that contract over
//! the HTTP Bot API. Nothing outside this module speaks Telegram wire
//! JSON.

mod client;
#[cfg(test)]
pub mod testing;
mod types;

pub use client::{BotApiClient, ChatClient};
pub use types::{Chat, Message, MessageEntity, TgUser, Update};

#[cfg(test)]
pub use client::MockChatClient;
