//! Login example: resume a dumped session or scan, then echo text messages.
//!
//! Run with: `cargo run --example login [session.json]`

use std::sync::Arc;
use std::time::Duration;
use webwx::{Bot, Event, JsonFileStorage, LoginOption};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::try_init().ok();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "session.json".to_string());
    let bot = Bot::desktop()?;

    bot.add_event_handler(|evt| match evt {
        Event::Uuid { qr_url, .. } => {
            println!("[Event] Open and scan with the phone: {}", qr_url);
        }
        Event::Scanned { .. } => {
            println!("[Event] Scanned, confirm on the phone.");
        }
        Event::LoggedIn { user } => {
            println!("[Event] Logged in as {}.", user.nick_name);
        }
        Event::LoggedOut { reason } => match reason {
            Some(err) => println!("[Event] Session ended: {}", err),
            None => println!("[Event] Logged out."),
        },
        _ => {}
    })
    .await;

    let echo = bot.clone();
    bot.on_message(move |msg| {
        if !msg.is_text() || msg.is_send_by_self() {
            return;
        }
        println!("[Message] {}: {}", msg.chat_user_name(), msg.content);
        let bot = echo.clone();
        tokio::spawn(async move {
            if let Err(e) = bot.reply_text(&msg, &msg.content).await {
                eprintln!("reply failed: {}", e);
            }
        });
    })
    .await;

    let storage = Arc::new(JsonFileStorage::new(path));
    bot.hot_login(
        storage,
        &[
            LoginOption::RetryWithScan,
            LoginOption::SyncReloadData(Duration::from_secs(300)),
        ],
    )
    .await?;

    let me = bot.self_user().await?;
    let friends = me.friends(false).await?;
    println!("{} friends, {} groups", friends.len(), me.groups(false).await?.len());

    bot.block().await?;
    Ok(())
}
