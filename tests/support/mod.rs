#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use gamehub_auth::{
    AppWindow, AuthFlowCoordinator, CallbackContext, CallbackExchangeHandler, FlowConfig, FlowId,
    GoogleProvider, InMemoryOutcomeStore, Origin, OutcomeStore, PopupBackend, PopupContext,
    PopupFeatures, ProviderConfig, ScreenSize, SessionIdentity, SessionStore,
};
use serde_json::Value;
use url::Url;

pub const APP: &str = "https://hub.example";
pub const UNREACHABLE_API: &str = "http://127.0.0.1:9/";

// ── Simulated browser ─────────────────────────────────────────────

pub struct FakePopup {
    pub url: Url,
    pub features: PopupFeatures,
    closed: AtomicBool,
    close_calls: AtomicUsize,
}

impl FakePopup {
    /// The user (or the page itself) closes the window.
    pub fn user_close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Closes issued by the opener through the popup handle.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn flow_id(&self) -> FlowId {
        self.url
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| FlowId::from(value.into_owned()))
            .expect("authorization url carries a state")
    }
}

impl PopupContext for FakePopup {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeBrowser {
    blocked: AtomicBool,
    opened: Mutex<Vec<Arc<FakePopup>>>,
}

impl FakeBrowser {
    pub fn block_popups(&self) {
        self.blocked.store(true, Ordering::SeqCst);
    }

    pub fn opened_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    /// Waits until the `n`-th popup (1-based) was opened.
    pub async fn wait_for_popup(&self, n: usize) -> Arc<FakePopup> {
        loop {
            if let Some(popup) = self.opened.lock().unwrap().get(n - 1) {
                return popup.clone();
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

impl PopupBackend for FakeBrowser {
    fn screen(&self) -> ScreenSize {
        ScreenSize {
            width: 1920,
            height: 1080,
        }
    }

    fn open(&self, url: &Url, _name: &str, features: &PopupFeatures) -> Option<Arc<dyn PopupContext>> {
        if self.blocked.load(Ordering::SeqCst) {
            return None;
        }
        let popup = Arc::new(FakePopup {
            url: url.clone(),
            features: *features,
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
        });
        self.opened.lock().unwrap().push(popup.clone());
        Some(popup as Arc<dyn PopupContext>)
    }
}

/// The callback page as it runs inside a popup (or a directly opened tab).
pub struct PopupPage {
    pub origin: Origin,
    pub opener: Option<AppWindow>,
    pub popup: Option<Arc<FakePopup>>,
    pub store: Arc<InMemoryOutcomeStore>,
}

impl CallbackContext for PopupPage {
    fn origin(&self) -> Origin {
        self.origin.clone()
    }

    fn opener(&self) -> Option<AppWindow> {
        self.opener.clone()
    }

    fn close(&self) {
        if let Some(popup) = &self.popup {
            popup.user_close();
        }
    }

    fn fallback_store(&self) -> &dyn OutcomeStore {
        self.store.as_ref()
    }
}

// ── Session ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSession {
    logins: Mutex<Vec<SessionIdentity>>,
    user: Mutex<Option<SessionIdentity>>,
}

impl RecordingSession {
    pub fn logins(&self) -> Vec<SessionIdentity> {
        self.logins.lock().unwrap().clone()
    }
}

impl SessionStore for RecordingSession {
    fn login(&self, identity: SessionIdentity) {
        self.logins.lock().unwrap().push(identity.clone());
        *self.user.lock().unwrap() = Some(identity);
    }

    fn logout(&self) {
        *self.user.lock().unwrap() = None;
    }

    fn is_authenticated(&self) -> bool {
        self.user.lock().unwrap().is_some()
    }

    fn user(&self) -> Option<SessionIdentity> {
        self.user.lock().unwrap().clone()
    }
}

// ── Exchange backend ──────────────────────────────────────────────

#[derive(Clone)]
struct BackendState {
    status: StatusCode,
    body: Value,
    requests: Arc<Mutex<Vec<Value>>>,
}

pub struct Backend {
    pub base: Url,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl Backend {
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

async fn exchange(State(state): State<BackendState>, Json(request): Json<Value>) -> (StatusCode, Json<Value>) {
    state.requests.lock().unwrap().push(request);
    (state.status, Json(state.body))
}

/// Serves `POST /api/auth/google/callback` with a canned response.
pub async fn spawn_backend(status: StatusCode, body: Value) -> Backend {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = BackendState {
        status,
        body,
        requests: requests.clone(),
    };
    let app = Router::new()
        .route("/api/auth/google/callback", post(exchange))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Backend {
        base: Url::parse(&format!("http://{addr}/")).unwrap(),
        requests,
    }
}

// ── Wiring ────────────────────────────────────────────────────────

pub struct Harness {
    pub coordinator: Arc<AuthFlowCoordinator<GoogleProvider>>,
    pub browser: Arc<FakeBrowser>,
    pub window: AppWindow,
    pub session: Arc<RecordingSession>,
    pub store: Arc<InMemoryOutcomeStore>,
    pub flow_config: FlowConfig,
}

impl Harness {
    pub fn new(api_base: &str, poll_interval: Duration, timeout: Option<Duration>) -> Self {
        let origin = Origin::parse(APP).unwrap();
        let flow_config = FlowConfig::new(origin.clone(), Url::parse(api_base).unwrap())
            .with_poll_interval(poll_interval)
            .with_timeout(timeout);
        let provider_config = ProviderConfig::for_provider(
            &GoogleProvider,
            "client-id",
            format!("{APP}/auth/google/callback"),
        );

        let window = AppWindow::new(origin);
        let browser = Arc::new(FakeBrowser::default());
        let session = Arc::new(RecordingSession::default());
        let store = InMemoryOutcomeStore::shared();

        let coordinator = AuthFlowCoordinator::new(
            GoogleProvider,
            provider_config,
            flow_config.clone(),
            window.clone(),
            browser.clone(),
            session.clone(),
        )
        .unwrap()
        .with_outcome_store(store.clone());

        Self {
            coordinator: Arc::new(coordinator),
            browser,
            window,
            session,
            store,
            flow_config,
        }
    }

    pub fn handler(&self) -> CallbackExchangeHandler {
        CallbackExchangeHandler::new(&GoogleProvider, &self.flow_config).unwrap()
    }

    /// Callback page loaded inside `popup`, opened by the application window.
    pub fn popup_page(&self, popup: &Arc<FakePopup>) -> PopupPage {
        PopupPage {
            origin: Origin::parse(APP).unwrap(),
            opener: Some(self.window.clone()),
            popup: Some(popup.clone()),
            store: self.store.clone(),
        }
    }

    /// Callback page opened directly by the user, without an opener.
    pub fn direct_page(&self) -> PopupPage {
        PopupPage {
            origin: Origin::parse(APP).unwrap(),
            opener: None,
            popup: None,
            store: self.store.clone(),
        }
    }

    pub fn spawn_start(
        &self,
    ) -> tokio::task::JoinHandle<Result<SessionIdentity, gamehub_auth::AuthError>> {
        let coordinator = self.coordinator.clone();
        tokio::spawn(async move { coordinator.start().await })
    }
}

pub fn callback_url(query: &str) -> Url {
    Url::parse(&format!("{APP}/auth/google/callback?{query}")).unwrap()
}
