mod config;
mod http;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use url::Url;

use crate::{AppWindow, AuthError, CallbackExchangeHandler, InMemoryOutcomeStore, OutcomeStore};

pub use self::config::CallbackServerConfig;
use self::http::{CallbackState, callback_handler, fallback_handler};

/// Serves the callback route for native embeddings and runs the
/// [`CallbackExchangeHandler`] on every hit.
pub struct CallbackServer {
    config: CallbackServerConfig,
    handler: Arc<CallbackExchangeHandler>,
    window: AppWindow,
    outcomes: Arc<dyn OutcomeStore>,
}

impl CallbackServer {
    pub fn new(
        config: CallbackServerConfig,
        handler: CallbackExchangeHandler,
        window: AppWindow,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
            window,
            outcomes: InMemoryOutcomeStore::shared(),
        }
    }

    pub fn with_outcome_store(mut self, outcomes: Arc<dyn OutcomeStore>) -> Self {
        self.outcomes = outcomes;
        self
    }

    pub async fn spawn(self) -> Result<RunningCallbackServer, AuthError> {
        let state = CallbackState {
            handler: self.handler,
            window: self.window,
            origin: self.config.origin()?,
            callback_url: Url::parse(&self.config.redirect_uri())?,
            outcomes: self.outcomes,
            success_html: self.config.success_html.as_str().into(),
            error_html: self.config.error_html.as_str().into(),
        };

        let app = Router::new()
            .route(&self.config.path, get(callback_handler))
            .fallback(fallback_handler)
            .with_state(state);

        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        let handle = tokio::spawn(async move {
            if let Err(err) = server.await {
                tracing::error!(?err, "Callback server stopped unexpectedly.");
            }
        });

        tracing::debug!(%local_addr, path = %self.config.path, "Serving sign-in callback route.");
        Ok(RunningCallbackServer {
            local_addr,
            path: self.config.path,
            shutdown_tx,
            handle,
        })
    }
}

pub struct RunningCallbackServer {
    local_addr: SocketAddr,
    path: String,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl RunningCallbackServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Callback route on the bound address, useful when port 0 was requested.
    pub fn callback_url(&self) -> String {
        format!("http://{}{}", self.local_addr, self.path)
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}
