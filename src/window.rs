//! Browser seams used by the sign-in flow.
//!
//! The primary application context is an [`AppWindow`]: it has an origin, a
//! registry of message listeners and a `post_message` entry point with the
//! same targeting rule as the web platform (a message addressed to a
//! different origin is dropped). Secondary contexts are created through a
//! [`PopupBackend`] and observed through [`PopupContext`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use crate::AuthError;

/// Serialized `scheme://host[:port]` of a URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin(String);

impl Origin {
    pub fn parse(input: &str) -> Result<Self, AuthError> {
        Ok(Self::of(&Url::parse(input)?))
    }

    /// Opaque origins serialize as `null` and never match a tuple origin.
    pub fn of(url: &Url) -> Self {
        Self(url.origin().ascii_serialization())
    }

    pub fn is_opaque(&self) -> bool {
        self.0 == "null"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct MessageEvent {
    /// Origin of the sending context, filled in by the platform.
    pub origin: Origin,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listeners = HashMap<ListenerId, mpsc::UnboundedSender<MessageEvent>>;

/// Primary application context. Cheap to clone; clones share listeners.
#[derive(Debug, Clone)]
pub struct AppWindow {
    inner: Arc<AppWindowInner>,
}

#[derive(Debug)]
struct AppWindowInner {
    origin: Origin,
    listeners: Mutex<Listeners>,
    next_listener: AtomicU64,
}

impl AppWindow {
    pub fn new(origin: Origin) -> Self {
        Self {
            inner: Arc::new(AppWindowInner {
                origin,
                listeners: Mutex::new(HashMap::new()),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.inner.origin
    }

    pub fn add_message_listener(&self) -> (ListenerId, mpsc::UnboundedReceiver<MessageEvent>) {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock_listeners().insert(id, tx);
        (id, rx)
    }

    /// Returns `false` when the listener was already removed.
    pub fn remove_message_listener(&self, id: ListenerId) -> bool {
        self.lock_listeners().remove(&id).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.lock_listeners().len()
    }

    /// Delivers `data` to every listener when `target_origin` is `*` or equals
    /// this window's origin. Returns the number of listeners reached.
    pub fn post_message(&self, data: Value, sender: &Origin, target_origin: &str) -> usize {
        if target_origin != "*" && target_origin != self.inner.origin.as_str() {
            tracing::debug!(
                target_origin,
                window_origin = %self.inner.origin,
                "Dropping message addressed to another origin."
            );
            return 0;
        }

        let event = MessageEvent {
            origin: sender.clone(),
            data,
        };
        let mut listeners = self.lock_listeners();
        listeners.retain(|_, tx| !tx.is_closed());
        for tx in listeners.values() {
            let _ = tx.send(event.clone());
        }
        listeners.len()
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Listeners> {
        // Listener bookkeeping never panics while holding the lock.
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Window features handed to the backend, mirroring `window.open` features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupFeatures {
    pub width: u32,
    pub height: u32,
    pub left: u32,
    pub top: u32,
    pub scrollbars: bool,
    pub resizable: bool,
}

impl fmt::Display for PopupFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let yes_no = |flag: bool| if flag { "yes" } else { "no" };
        write!(
            f,
            "width={},height={},left={},top={},scrollbars={},resizable={}",
            self.width,
            self.height,
            self.left,
            self.top,
            yes_no(self.scrollbars),
            yes_no(self.resizable)
        )
    }
}

/// Creates secondary browsing contexts.
pub trait PopupBackend: Send + Sync {
    fn screen(&self) -> ScreenSize;

    /// `None` means the platform refused to create the context.
    fn open(&self, url: &Url, name: &str, features: &PopupFeatures)
    -> Option<Arc<dyn PopupContext>>;
}

/// A secondary browsing context as seen from its opener.
pub trait PopupContext: Send + Sync {
    fn is_closed(&self) -> bool;
    fn close(&self);
}
