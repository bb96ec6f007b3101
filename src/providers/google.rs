use crate::OAuthProvider;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

const DEFAULT_REDIRECT_URI: &str = "http://localhost:8765/auth/google/callback";
const DEFAULT_SCOPES: &[&str] = &["openid", "email", "profile"];

const AUTHORIZE_PARAMS: &[(&str, &str)] = &[("access_type", "offline"), ("prompt", "consent")];

#[derive(Debug, Clone, Copy, Default)]
pub struct GoogleProvider;

impl OAuthProvider for GoogleProvider {
    fn id(&self) -> &'static str {
        "google"
    }

    fn authorize_url(&self) -> &'static str {
        AUTHORIZE_URL
    }

    fn default_scopes(&self) -> &'static [&'static str] {
        DEFAULT_SCOPES
    }

    fn authorize_params(&self) -> Vec<(String, String)> {
        AUTHORIZE_PARAMS
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect()
    }
}

impl GoogleProvider {
    pub fn default_redirect_uri() -> &'static str {
        DEFAULT_REDIRECT_URI
    }
}

#[cfg(test)]
mod tests {
    use super::GoogleProvider;
    use crate::OAuthProvider;

    #[test]
    fn routes_follow_provider_id() {
        let provider = GoogleProvider;
        assert_eq!(provider.callback_path(), "/auth/google/callback");
        assert_eq!(provider.exchange_path(), "api/auth/google/callback");
        assert!(
            GoogleProvider::default_redirect_uri().ends_with(&provider.callback_path()),
            "default redirect should land on the callback route"
        );
    }
}
