use std::sync::Arc;

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse},
};
use url::Url;

use crate::{
    AppWindow, CallbackContext, CallbackExchangeHandler, Origin, OutcomeMessage, OutcomeStore,
};

#[derive(Clone)]
pub(super) struct CallbackState {
    pub(super) handler: Arc<CallbackExchangeHandler>,
    pub(super) window: AppWindow,
    pub(super) origin: Origin,
    pub(super) callback_url: Url,
    pub(super) outcomes: Arc<dyn OutcomeStore>,
    pub(super) success_html: Arc<str>,
    pub(super) error_html: Arc<str>,
}

/// The browser tab serving the callback route. It counts as opened by the
/// application only while a flow is listening for its outcome.
struct ServedPage<'a> {
    state: &'a CallbackState,
}

impl CallbackContext for ServedPage<'_> {
    fn origin(&self) -> Origin {
        self.state.origin.clone()
    }

    fn opener(&self) -> Option<AppWindow> {
        (self.state.window.listener_count() > 0).then(|| self.state.window.clone())
    }

    // The served page closes itself from script.
    fn close(&self) {}

    fn fallback_store(&self) -> &dyn OutcomeStore {
        self.state.outcomes.as_ref()
    }
}

pub(super) async fn callback_handler(
    State(state): State<CallbackState>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let mut callback_url = state.callback_url.clone();
    callback_url.set_query(query.as_deref());

    let page = ServedPage { state: &state };
    match state.handler.handle(&callback_url, &page).await {
        OutcomeMessage::Success { .. } => {
            (StatusCode::OK, Html(state.success_html.to_string()))
        }
        OutcomeMessage::Failure { .. } => {
            (StatusCode::BAD_REQUEST, Html(state.error_html.to_string()))
        }
    }
}

pub(super) async fn fallback_handler(State(state): State<CallbackState>) -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html(state.error_html.to_string()))
}
