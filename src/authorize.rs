use url::Url;

use crate::{AuthError, AuthorizationRequest, FlowId, OAuthProvider, ProviderConfig};

const REQUIRED_PARAMS: &[&str] = &["response_type", "client_id", "redirect_uri", "scope", "state"];

/// Turns a validated [`ProviderConfig`] into authorization request URLs.
#[derive(Debug, Clone)]
pub struct AuthorizationUrlBuilder {
    config: ProviderConfig,
    endpoint: Url,
    extra_params: Vec<(String, String)>,
}

impl AuthorizationUrlBuilder {
    pub fn new(provider: &dyn OAuthProvider, config: ProviderConfig) -> Result<Self, AuthError> {
        config.validate()?;
        let endpoint = Url::parse(&config.authorization_endpoint)?;
        let mut extra_params = Vec::new();
        for (key, value) in provider.authorize_params() {
            if REQUIRED_PARAMS.contains(&key.as_str()) {
                continue;
            }
            set_param(&mut extra_params, &key, value);
        }
        Ok(Self {
            config,
            endpoint,
            extra_params,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if !REQUIRED_PARAMS.contains(&key.as_str()) {
            set_param(&mut self.extra_params, &key, value.into());
        }
        self
    }

    pub fn build(&self, flow_id: &FlowId) -> AuthorizationRequest {
        let scope = self.config.scope_string();
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("response_type", "code");
            pairs.append_pair("client_id", &self.config.client_id);
            pairs.append_pair("redirect_uri", &self.config.redirect_uri);
            pairs.append_pair("scope", &scope);
            pairs.append_pair("state", flow_id.as_str());
            for (key, value) in &self.extra_params {
                pairs.append_pair(key, value);
            }
        }

        AuthorizationRequest {
            authorization_url: url,
            flow_id: flow_id.clone(),
            scope,
        }
    }
}

fn set_param(params: &mut Vec<(String, String)>, key: &str, value: String) {
    if let Some((_, existing)) = params.iter_mut().find(|(param, _)| param == key) {
        *existing = value;
    } else {
        params.push((key.to_string(), value));
    }
}
