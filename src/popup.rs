use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use url::Url;

use crate::{AuthError, PopupBackend, PopupContext, PopupDimensions, PopupFeatures, ScreenSize};

/// Owns the secondary browsing context of a single flow.
///
/// Closing is idempotent and reaches the backend at most once. Dropping the
/// manager closes the popup, so it never outlives its flow.
pub struct PopupWindowManager {
    context: Arc<dyn PopupContext>,
    closed: AtomicBool,
}

impl PopupWindowManager {
    pub fn open(
        backend: &dyn PopupBackend,
        url: &Url,
        name: &str,
        dimensions: PopupDimensions,
    ) -> Result<Self, AuthError> {
        let features = centered(backend.screen(), dimensions);
        let context = backend
            .open(url, name, &features)
            .ok_or(AuthError::PopupBlocked)?;

        // Some platforms hand back a reference that is already closed.
        if context.is_closed() {
            return Err(AuthError::PopupBlocked);
        }

        tracing::debug!(popup = name, %features, "Opened sign-in popup.");
        Ok(Self {
            context,
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.context.is_closed()
    }

    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if !self.context.is_closed() {
            self.context.close();
        }
    }
}

impl Drop for PopupWindowManager {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PopupWindowManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopupWindowManager")
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn centered(screen: ScreenSize, dimensions: PopupDimensions) -> PopupFeatures {
    PopupFeatures {
        width: dimensions.width,
        height: dimensions.height,
        left: screen.width.saturating_sub(dimensions.width) / 2,
        top: screen.height.saturating_sub(dimensions.height) / 2,
        scrollbars: true,
        resizable: true,
    }
}
