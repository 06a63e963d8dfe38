//! Event types emitted by the bot.

use crate::error::Error;
use crate::types::{Message, User};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Events emitted by [Bot](crate::Bot) to registered handlers.
#[derive(Clone, Debug)]
pub enum Event {
    /// Login UUID acquired; show `qr_url` to the user. Not emitted for push login.
    Uuid { uuid: String, qr_url: String },

    /// QR scanned; waiting for confirmation on the phone. `avatar` is the
    /// decoded image when the server sent one.
    Scanned { avatar: Option<Vec<u8>> },

    /// Login converged; the sync loop is running.
    LoggedIn { user: User },

    /// Result of one sync-check poll.
    SyncCheck { retcode: String, selector: String },

    /// Normalized inbound message.
    Message(Arc<Message>),

    /// Session ended. `reason` is `None` after a local logout.
    LoggedOut { reason: Option<Arc<Error>> },
}

/// Type alias for event handlers so the bot field is not overly complex and is Send + Sync.
pub type EventHandler = Box<dyn Fn(Event) + Send + Sync>;

/// Call every handler with `event`. A panicking handler is logged and skipped.
pub(crate) fn dispatch(handlers: &[EventHandler], event: &Event) {
    for (idx, handler) in handlers.iter().enumerate() {
        let evt = event.clone();
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(evt))) {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic".to_string());
            tracing::error!(handler = idx, panic = %msg, "event handler panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn panicking_handler_does_not_stop_others() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        let handlers: Vec<EventHandler> = vec![
            Box::new(|_| panic!("boom")),
            Box::new(move |evt| {
                if let Event::SyncCheck { selector, .. } = evt {
                    assert_eq!(selector, "2");
                    hits_clone.fetch_add(1, Ordering::SeqCst);
                }
            }),
        ];
        dispatch(
            &handlers,
            &Event::SyncCheck {
                retcode: "0".into(),
                selector: "2".into(),
            },
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
