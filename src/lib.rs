//! # webwx
//!
//! Rust client library for the WeChat web gateway.
//!
//! ## Features
//!
//! - QR scan login, hot resume from a dumped session, push login to the phone
//! - Long-poll sync loop delivering normalized messages as events
//! - Contact cache with friend / group / subscription-account views
//! - Sending text, images, videos, files and `appmsg` documents; revoke
//! - Pluggable transport and reload storage
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use webwx::{Bot, Event, JsonFileStorage, LoginOption};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bot = Bot::desktop()?;
//!     bot.add_event_handler(|evt| {
//!         if let Event::Uuid { qr_url, .. } = evt {
//!             println!("scan: {}", qr_url);
//!         }
//!     })
//!     .await;
//!     let storage = Arc::new(JsonFileStorage::new("session.json"));
//!     bot.hot_login(storage, &[LoginOption::RetryWithScan]).await?;
//!     bot.block().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod bot;
pub mod config;
pub mod contact;
pub mod error;
pub mod events;
pub mod protocol;
pub mod store;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use bot::{Bot, BotState, ErrorAction, LoginHook, LoginOption};
pub use config::BotConfig;
pub use contact::{Contact, Contacts, SelfUser};
pub use error::{Error, Result};
pub use events::Event;
pub use protocol::{DomainGroup, Mode};
pub use store::{HotReloadData, JsonFileStorage, MemoryStorage, ReloadStorage, Storage};
pub use transport::{HttpTransport, Transport};
pub use types::{ContactKind, Message, MessageId, MsgType, SentMessage, User};
