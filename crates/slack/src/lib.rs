//! Slack Integration - Socket Mode bot interface
//!
//! This crate provides the Slack surface of the yaruki bot:
//! - **Socket Mode** (`socket`, `transport`) - WebSocket connection to Slack (no public URL needed)
//! - **Slash Commands** (`commands`) - `/yaruki`, `/yaruki_reminder`, `/command`
//! - **Shortcuts** (`softener`, `tasks`) - modal workflows opened from shortcuts
//! - **Channel messages** (`messages`) - assistant replies to user messages
//! - **Block Kit** (`blocks`) - modal and message builders
//! - **Web API** (`web_api`) - `chat.*`, `views.*`, `conversations.history`
//!
//! # Architecture
//!
//! ```text
//! Slack → SocketModeRunner → EventDispatcher → Handlers → Dify workflows
//!                                                  ↓
//!                                 Web API (messages, modals) ← outputs
//! ```
//!
//! # Key Types
//!
//! - `SocketModeRunner` - WebSocket event loop with reconnection logic
//! - `EventDispatcher` - Routes events to handlers by command, callback or action id
//! - `BotServices` - Slack, Dify, clock and bot settings shared by every handler
//! - `MessageBuilder` / `ModalView` - Block Kit payloads

pub mod blocks;
pub mod commands;
pub mod events;
pub mod history;
pub mod messages;
pub mod socket;
pub mod softener;
pub mod tasks;
pub mod transport;
pub mod web_api;

#[cfg(test)]
mod test_support;

pub use events::{bot_dispatcher, BotServices, EventDispatcher};
pub use socket::{ConnectionStatus, ReconnectPolicy, SocketModeRunner, SocketTransport};
pub use transport::WebSocketTransport;
pub use web_api::{SlackApi, SlackApiError, SlackWebClient};
