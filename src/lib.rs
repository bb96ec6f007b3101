//! Popup-based third-party sign-in for the game hub client.
//!
//! The [`AuthFlowCoordinator`] opens a popup to the identity provider, waits
//! for the callback page ([`CallbackExchangeHandler`]) to exchange the
//! authorization code and post back a single outcome, and resolves the
//! caller exactly once. Browser specifics sit behind the traits in
//! [`window`], so the same flow runs against a real browser or a simulated
//! one.

mod authorize;
mod bridge;
mod callback;
mod config;
mod coordinator;
mod error;
mod flow_id;
#[cfg(feature = "local-server")]
mod local_server;
mod outcome_store;
mod popup;
mod providers;
mod session;
#[cfg(feature = "system-browser")]
mod system_browser;
mod types;
pub mod window;

pub use authorize::AuthorizationUrlBuilder;
pub use bridge::MessageBridge;
pub use callback::{CallbackContext, CallbackExchangeHandler, DEFAULT_EXCHANGE_TIMEOUT};
pub use config::{
    ENV_API_BASE, ENV_CLIENT_ID, ENV_REDIRECT_URI, FlowConfig, PopupDimensions, ProviderConfig,
};
pub use coordinator::{AuthFlowCoordinator, FlowPhase};
pub use error::{AuthError, CancelReason};
pub use flow_id::FlowId;
#[cfg(feature = "local-server")]
pub use local_server::{CallbackServer, CallbackServerConfig, RunningCallbackServer};
pub use outcome_store::{FileOutcomeStore, InMemoryOutcomeStore, OutcomeStore};
pub use popup::PopupWindowManager;
pub use providers::{GoogleProvider, OAuthProvider};
pub use session::{InMemorySessionStore, SessionStore};
#[cfg(feature = "system-browser")]
pub use system_browser::SystemBrowser;
pub use types::{AuthorizationRequest, CallbackParams, OutcomeMessage, SessionIdentity};
pub use window::{
    AppWindow, ListenerId, MessageEvent, Origin, PopupBackend, PopupContext, PopupFeatures,
    ScreenSize,
};
