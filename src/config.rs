use std::collections::BTreeSet;
use std::env;
use std::time::Duration;

use url::Url;

use crate::{AuthError, OAuthProvider, Origin};

pub const ENV_CLIENT_ID: &str = "GAMEHUB_GOOGLE_CLIENT_ID";
pub const ENV_REDIRECT_URI: &str = "GAMEHUB_GOOGLE_REDIRECT_URI";
pub const ENV_API_BASE: &str = "GAMEHUB_API_BASE";

const DEFAULT_API_BASE: &str = "http://localhost:8080/";
const DEFAULT_POPUP_WIDTH: u32 = 500;
const DEFAULT_POPUP_HEIGHT: u32 = 600;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_FLOW_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: BTreeSet<String>,
    pub authorization_endpoint: String,
}

impl ProviderConfig {
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        authorization_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scopes: BTreeSet::new(),
            authorization_endpoint: authorization_endpoint.into(),
        }
    }

    /// Endpoint and scopes come from the provider's defaults.
    pub fn for_provider(
        provider: &dyn OAuthProvider,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self::new(client_id, redirect_uri, provider.authorize_url())
            .with_scopes(provider.default_scopes().iter().copied())
    }

    /// Reads the client id and redirect uri from the environment. A missing
    /// client id is a configuration error; the redirect uri falls back to
    /// `default_redirect_uri`.
    pub fn from_env(
        provider: &dyn OAuthProvider,
        default_redirect_uri: &str,
    ) -> Result<Self, AuthError> {
        let client_id = env::var(ENV_CLIENT_ID)
            .map_err(|_| AuthError::config("client_id", format!("{ENV_CLIENT_ID} is not set")))?;
        let redirect_uri =
            env::var(ENV_REDIRECT_URI).unwrap_or_else(|_| default_redirect_uri.to_string());
        let config = Self::for_provider(provider, client_id, redirect_uri);
        config.validate()?;
        Ok(config)
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.insert(scope.into());
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.extend(scopes.into_iter().map(Into::into));
        self
    }

    pub fn scope_string(&self) -> String {
        self.scopes.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::config("client_id", "must not be empty"));
        }
        if self.scopes.iter().all(|scope| scope.trim().is_empty()) {
            return Err(AuthError::config("scopes", "at least one scope is required"));
        }
        Url::parse(&self.redirect_uri)
            .map_err(|err| AuthError::config("redirect_uri", err.to_string()))?;
        let endpoint = Url::parse(&self.authorization_endpoint)
            .map_err(|err| AuthError::config("authorization_endpoint", err.to_string()))?;
        if endpoint.cannot_be_a_base() {
            return Err(AuthError::config(
                "authorization_endpoint",
                "must be a hierarchical url",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupDimensions {
    pub width: u32,
    pub height: u32,
}

impl Default for PopupDimensions {
    fn default() -> Self {
        Self {
            width: DEFAULT_POPUP_WIDTH,
            height: DEFAULT_POPUP_HEIGHT,
        }
    }
}

/// Runtime knobs of the coordinator and the callback page.
///
/// `poll_interval` trades cancellation latency against wakeups: the popup is
/// reported closed at most one interval after the user closes it.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub app_origin: Origin,
    pub api_base: Url,
    pub popup: PopupDimensions,
    pub poll_interval: Duration,
    pub timeout: Option<Duration>,
    pub http_timeout: Option<Duration>,
}

impl FlowConfig {
    pub fn new(app_origin: Origin, api_base: Url) -> Self {
        Self {
            app_origin,
            api_base,
            popup: PopupDimensions::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: Some(DEFAULT_FLOW_TIMEOUT),
            http_timeout: None,
        }
    }

    /// The application origin is the origin of the redirect uri, since the
    /// callback page must be same-origin with the opener.
    pub fn from_env(provider_config: &ProviderConfig) -> Result<Self, AuthError> {
        let app_origin = Origin::parse(&provider_config.redirect_uri)
            .map_err(|err| AuthError::config("redirect_uri", err.to_string()))?;
        let api_base = env::var(ENV_API_BASE).unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let api_base =
            Url::parse(&api_base).map_err(|err| AuthError::config("api_base", err.to_string()))?;
        Ok(Self::new(app_origin, api_base))
    }

    pub fn with_popup(mut self, popup: PopupDimensions) -> Self {
        self.popup = popup;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    pub fn exchange_url(&self, provider: &dyn OAuthProvider) -> Result<Url, AuthError> {
        Ok(self.api_base.join(&provider.exchange_path())?)
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if self.app_origin.is_opaque() {
            return Err(AuthError::config("app_origin", "must not be an opaque origin"));
        }
        if self.poll_interval.is_zero() {
            return Err(AuthError::config("poll_interval", "must be greater than zero"));
        }
        if self.api_base.cannot_be_a_base() {
            return Err(AuthError::config("api_base", "must be a hierarchical url"));
        }
        Ok(())
    }
}
