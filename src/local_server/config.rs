use url::Url;

use crate::{AuthError, Origin};

pub(crate) const DEFAULT_SUCCESS_HTML: &str = include_str!("html/success.html");
pub(crate) const DEFAULT_ERROR_HTML: &str = include_str!("html/error.html");

/// Where the application serves the fixed callback route.
#[derive(Debug, Clone)]
pub struct CallbackServerConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub success_html: String,
    pub error_html: String,
}

impl CallbackServerConfig {
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            path: normalize_path(path.into()),
            success_html: DEFAULT_SUCCESS_HTML.to_string(),
            error_html: DEFAULT_ERROR_HTML.to_string(),
        }
    }

    /// Only plain-http loopback style redirect uris can be served locally.
    pub fn from_redirect_uri(redirect_uri: &str) -> Result<Self, AuthError> {
        let url = Url::parse(redirect_uri)?;
        if url.scheme() != "http" {
            return Err(AuthError::InvalidRedirectUri(
                "redirect uri must use http scheme".to_string(),
            ));
        }

        let host = url.host_str().ok_or_else(|| {
            AuthError::InvalidRedirectUri("redirect uri is missing host".to_string())
        })?;

        let port = url.port_or_known_default().ok_or_else(|| {
            AuthError::InvalidRedirectUri("redirect uri is missing port".to_string())
        })?;

        Ok(Self::new(host, port, url.path()))
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path)
    }

    /// Origin the callback page runs under.
    pub fn origin(&self) -> Result<Origin, AuthError> {
        Origin::parse(&self.redirect_uri())
    }

    pub fn with_success_html(mut self, html: impl Into<String>) -> Self {
        self.success_html = html.into();
        self
    }

    pub fn with_error_html(mut self, html: impl Into<String>) -> Self {
        self.error_html = html.into();
        self
    }
}

fn normalize_path(path: String) -> String {
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    }
}

#[cfg(test)]
mod tests {
    use super::CallbackServerConfig;
    use crate::AuthError;

    #[test]
    fn normalizes_path() {
        let config = CallbackServerConfig::new("localhost", 8765, "auth/google/callback");
        assert_eq!(config.path, "/auth/google/callback");
        assert_eq!(
            config.redirect_uri(),
            "http://localhost:8765/auth/google/callback"
        );
        assert_eq!(config.origin().unwrap().as_str(), "http://localhost:8765");
    }

    #[test]
    fn parses_redirect_uri() {
        let config =
            CallbackServerConfig::from_redirect_uri("http://127.0.0.1:8765/auth/google/callback")
                .unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8765);
        assert_eq!(config.path, "/auth/google/callback");

        let result = CallbackServerConfig::from_redirect_uri("https://hub.example/cb");
        assert!(matches!(result, Err(AuthError::InvalidRedirectUri(_))));
    }
}
