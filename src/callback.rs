use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use url::Url;

use crate::error::{REASON_EXCHANGE_FAILED, REASON_MISSING_CODE};
use crate::{
    AppWindow, AuthError, CallbackParams, FlowConfig, OAuthProvider, Origin, OutcomeMessage,
    OutcomeStore, SessionIdentity,
};

/// Request timeout for the code exchange when none is configured.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Capabilities of the secondary context the callback page runs in.
pub trait CallbackContext: Send + Sync {
    fn origin(&self) -> Origin;

    /// The window that opened this context, if it was opened programmatically.
    fn opener(&self) -> Option<AppWindow>;

    fn close(&self);

    fn fallback_store(&self) -> &dyn OutcomeStore;
}

#[derive(Debug, Serialize)]
struct ExchangeRequest<'a> {
    code: &'a str,
}

/// Runs on the callback route: turns the provider's redirect into exactly one
/// [`OutcomeMessage`] and hands it to the opener.
#[derive(Debug, Clone)]
pub struct CallbackExchangeHandler {
    http: Client,
    exchange_url: Url,
    provider_id: String,
    app_origin: Origin,
}

impl CallbackExchangeHandler {
    pub fn new(provider: &dyn OAuthProvider, config: &FlowConfig) -> Result<Self, AuthError> {
        let timeout = config.http_timeout.unwrap_or(DEFAULT_EXCHANGE_TIMEOUT);
        let http = Client::builder().timeout(timeout).build()?;
        Self::with_http_client(provider, config, http)
    }

    pub fn with_http_client(
        provider: &dyn OAuthProvider,
        config: &FlowConfig,
        http: Client,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            http,
            exchange_url: config.exchange_url(provider)?,
            provider_id: provider.id().to_string(),
            app_origin: config.app_origin.clone(),
        })
    }

    pub fn exchange_url(&self) -> &Url {
        &self.exchange_url
    }

    /// Parses the redirect, resolves it and emits the outcome.
    pub async fn handle(&self, callback_url: &Url, context: &dyn CallbackContext) -> OutcomeMessage {
        let params = CallbackParams::from_url(callback_url);
        let outcome = self.resolve(&params).await;
        self.emit(&outcome, context);
        outcome
    }

    pub async fn resolve(&self, params: &CallbackParams) -> OutcomeMessage {
        let flow_id = params.flow_id();

        if let Some(error) = &params.error {
            tracing::warn!(%flow_id, reason = %error, "Identity provider returned an error.");
            return OutcomeMessage::failure(flow_id, error.clone());
        }

        let Some(code) = params.code.as_deref() else {
            tracing::warn!(%flow_id, "Callback carried no authorization code.");
            return OutcomeMessage::failure(flow_id, REASON_MISSING_CODE);
        };

        match self.exchange(code).await {
            Ok(identity) => OutcomeMessage::Success { flow_id, identity },
            Err(err) => {
                tracing::warn!(%flow_id, ?err, "Authorization code exchange failed.");
                OutcomeMessage::failure(flow_id, REASON_EXCHANGE_FAILED)
            }
        }
    }

    /// Posts to the opener restricted to the application origin and closes
    /// this context; without an opener the outcome goes to the fallback store.
    pub fn emit(&self, outcome: &OutcomeMessage, context: &dyn CallbackContext) {
        let Some(opener) = context.opener() else {
            tracing::debug!(flow_id = %outcome.flow_id(), "No opener, storing outcome.");
            if let Err(err) = context.fallback_store().save(outcome) {
                tracing::error!(?err, "Could not store sign-in outcome.");
            }
            return;
        };

        match serde_json::to_value(outcome) {
            Ok(data) => {
                opener.post_message(data, &context.origin(), self.app_origin.as_str());
            }
            Err(err) => tracing::error!(?err, "Could not serialize sign-in outcome."),
        }
        context.close();
    }

    async fn exchange(&self, code: &str) -> Result<SessionIdentity, AuthError> {
        let response = self
            .http
            .post(self.exchange_url.clone())
            .json(&ExchangeRequest { code })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AuthError::Exchange {
                reason: format!("http status {}: {}", status.as_u16(), truncate(&body)),
            });
        }

        let identity: SessionIdentity =
            serde_json::from_str(&body).map_err(|err| AuthError::Exchange {
                reason: format!("invalid identity: {err}"),
            })?;
        Ok(identity.with_default_provider(&self.provider_id))
    }
}

fn truncate(body: &str) -> &str {
    const MAX: usize = 256;
    match body.char_indices().nth(MAX) {
        Some((index, _)) => &body[..index],
        None => body,
    }
}
