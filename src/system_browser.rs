use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use url::Url;

use crate::{PopupBackend, PopupContext, PopupFeatures, ScreenSize};

/// Opens the authorization page in the user's default browser.
///
/// A desktop browser tab cannot be observed from the outside, so the tab
/// reports closed only after [`PopupContext::close`]; user cancellation is
/// caught by the flow timeout instead of the watchdog.
#[derive(Debug, Clone, Default)]
pub struct SystemBrowser {
    screen: ScreenSize,
}

impl SystemBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_screen(mut self, screen: ScreenSize) -> Self {
        self.screen = screen;
        self
    }
}

impl PopupBackend for SystemBrowser {
    fn screen(&self) -> ScreenSize {
        self.screen
    }

    fn open(
        &self,
        url: &Url,
        name: &str,
        _features: &PopupFeatures,
    ) -> Option<Arc<dyn PopupContext>> {
        match webbrowser::open(url.as_str()) {
            Ok(()) => Some(Arc::new(BrowserTab::default()) as Arc<dyn PopupContext>),
            Err(err) => {
                tracing::warn!(?err, popup = name, "Failed to open the system browser.");
                None
            }
        }
    }
}

#[derive(Debug, Default)]
struct BrowserTab {
    closed: AtomicBool,
}

impl PopupContext for BrowserTab {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
