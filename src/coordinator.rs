//! One state machine per login attempt.
//!
//! ```text
//! Idle -> Requesting -> AwaitingCallback -> {Succeeded, Failed, Cancelled} -> Idle
//! ```
//!
//! While awaiting the callback three sources race: the outcome message, the
//! popup-liveness watchdog and the overall deadline. The first one observed
//! wins; a message that is already queued when the popup is seen closed is
//! preferred, since the callback page closes itself right after posting.

use std::collections::VecDeque;
use std::future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};

use crate::{
    AppWindow, AuthError, AuthorizationUrlBuilder, CancelReason, FlowConfig, FlowId,
    InMemoryOutcomeStore, MessageBridge, OAuthProvider, OutcomeMessage, OutcomeStore,
    PopupBackend, PopupWindowManager, ProviderConfig, SessionIdentity, SessionStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    Idle,
    Requesting,
    AwaitingCallback,
    Succeeded,
    Failed,
    Cancelled,
}

impl FlowPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FlowPhase::Succeeded | FlowPhase::Failed | FlowPhase::Cancelled
        )
    }
}

#[derive(Debug)]
struct FlowInstance {
    flow_id: FlowId,
    phase: FlowPhase,
    created_at: Instant,
    popup: Option<Arc<PopupWindowManager>>,
}

/// Flow ids remembered after they end, so late outcomes for them are ignored.
const RESOLVED_FLOW_HISTORY: usize = 16;

pub struct AuthFlowCoordinator<P: OAuthProvider> {
    provider: P,
    urls: AuthorizationUrlBuilder,
    config: FlowConfig,
    window: AppWindow,
    popups: Arc<dyn PopupBackend>,
    session: Arc<dyn SessionStore>,
    outcomes: Arc<dyn OutcomeStore>,
    active: Mutex<Option<FlowInstance>>,
    resolved: Mutex<VecDeque<FlowId>>,
}

impl<P: OAuthProvider> AuthFlowCoordinator<P> {
    pub fn new(
        provider: P,
        provider_config: ProviderConfig,
        config: FlowConfig,
        window: AppWindow,
        popups: Arc<dyn PopupBackend>,
        session: Arc<dyn SessionStore>,
    ) -> Result<Self, AuthError> {
        config.validate()?;
        if window.origin() != &config.app_origin {
            return Err(AuthError::config(
                "app_origin",
                format!(
                    "window origin {} does not match {}",
                    window.origin(),
                    config.app_origin
                ),
            ));
        }
        let urls = AuthorizationUrlBuilder::new(&provider, provider_config)?;

        Ok(Self {
            provider,
            urls,
            config,
            window,
            popups,
            session,
            outcomes: InMemoryOutcomeStore::shared(),
            active: Mutex::new(None),
            resolved: Mutex::new(VecDeque::with_capacity(RESOLVED_FLOW_HISTORY)),
        })
    }

    /// Store the callback page falls back to when it has no opener.
    pub fn with_outcome_store(mut self, outcomes: Arc<dyn OutcomeStore>) -> Self {
        self.outcomes = outcomes;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn phase(&self) -> FlowPhase {
        self.lock_active()
            .as_ref()
            .map_or(FlowPhase::Idle, |flow| flow.phase)
    }

    pub fn active_flow_id(&self) -> Option<FlowId> {
        self.lock_active().as_ref().map(|flow| flow.flow_id.clone())
    }

    /// Runs one sign-in attempt and resolves once it reaches a terminal phase.
    ///
    /// Fails immediately with [`AuthError::FlowInUse`] if another attempt is
    /// active; that attempt is not affected. Every other error is the
    /// terminal outcome of this attempt.
    pub async fn start(&self) -> Result<SessionIdentity, AuthError> {
        let flow = self.begin(FlowId::generate()?)?;
        let result = self.run(&flow).await;
        self.finish(flow, result)
    }

    /// Forces the active popup closed. The watchdog then ends the flow as
    /// cancelled on its next tick. Returns `false` when no popup is open.
    pub fn close_popup(&self) -> bool {
        let popup = self
            .lock_active()
            .as_ref()
            .and_then(|flow| flow.popup.clone());
        match popup {
            Some(popup) => {
                popup.close();
                true
            }
            None => false,
        }
    }

    /// Picks up an outcome a callback page stored because it had no opener.
    ///
    /// Outcomes tagged with a flow this coordinator already ended are
    /// discarded and yield `Ok(None)`.
    pub fn resume_pending(&self) -> Result<Option<SessionIdentity>, AuthError> {
        let outcome = {
            let active = self.lock_active();
            if active.is_some() {
                return Err(AuthError::FlowInUse);
            }
            let Some(outcome) = self.outcomes.take()? else {
                return Ok(None);
            };
            if !remember_resolved(&self.resolved, outcome.flow_id()) {
                tracing::warn!(flow_id = %outcome.flow_id(), "Discarding stored outcome of an ended sign-in.");
                return Ok(None);
            }
            outcome
        };
        tracing::debug!(flow_id = %outcome.flow_id(), "Resuming stored sign-in outcome.");

        let identity = self.outcome_result(outcome)?;
        self.session.login(identity.clone());
        Ok(Some(identity))
    }

    fn begin(&self, flow_id: FlowId) -> Result<ActiveFlow<'_>, AuthError> {
        let mut active = self.lock_active();
        if let Some(flow) = active.as_ref() {
            tracing::warn!(active = %flow.flow_id, phase = ?flow.phase, "Sign-in already in progress.");
            return Err(AuthError::FlowInUse);
        }

        tracing::debug!(%flow_id, "Starting sign-in.");
        *active = Some(FlowInstance {
            flow_id: flow_id.clone(),
            phase: FlowPhase::Requesting,
            created_at: Instant::now(),
            popup: None,
        });
        Ok(ActiveFlow {
            slot: &self.active,
            resolved: &self.resolved,
            flow_id,
        })
    }

    async fn run(&self, flow: &ActiveFlow<'_>) -> Result<SessionIdentity, AuthError> {
        let request = self.urls.build(&flow.flow_id);

        // Listen before opening so a fast callback cannot be missed.
        let mut bridge = MessageBridge::register(&self.window, flow.flow_id.clone());
        let popup = Arc::new(PopupWindowManager::open(
            self.popups.as_ref(),
            &request.authorization_url,
            &format!("{}Login", self.provider.id()),
            self.config.popup,
        )?);

        flow.update(|instance| {
            instance.phase = FlowPhase::AwaitingCallback;
            instance.popup = Some(popup.clone());
        });

        let result = self.await_callback(&mut bridge, &popup).await;
        bridge.deregister();
        popup.close();
        result
    }

    async fn await_callback(
        &self,
        bridge: &mut MessageBridge,
        popup: &PopupWindowManager,
    ) -> Result<SessionIdentity, AuthError> {
        let period = self.config.poll_interval;
        let mut watchdog = time::interval_at(Instant::now() + period, period);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let deadline = deadline(self.config.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                outcome = bridge.recv() => return self.outcome_result(outcome),
                _ = watchdog.tick() => {
                    if popup.is_closed() {
                        return Err(AuthError::UserCancelled { reason: CancelReason::UserClosed });
                    }
                }
                () = &mut deadline => {
                    return Err(AuthError::UserCancelled { reason: CancelReason::Timeout });
                }
            }
        }
    }

    fn outcome_result(&self, outcome: OutcomeMessage) -> Result<SessionIdentity, AuthError> {
        match outcome {
            OutcomeMessage::Success { identity, .. } => {
                Ok(identity.with_default_provider(self.provider.id()))
            }
            OutcomeMessage::Failure { error_reason, .. } => {
                Err(AuthError::from_failure_reason(&error_reason))
            }
        }
    }

    fn finish(
        &self,
        flow: ActiveFlow<'_>,
        result: Result<SessionIdentity, AuthError>,
    ) -> Result<SessionIdentity, AuthError> {
        let phase = match &result {
            Ok(_) => FlowPhase::Succeeded,
            Err(err) if err.is_cancelled() => FlowPhase::Cancelled,
            Err(_) => FlowPhase::Failed,
        };
        let elapsed = flow.terminate(phase);

        match &result {
            Ok(identity) => {
                tracing::info!(flow_id = %flow.flow_id, ?elapsed, user = %identity.external_id, "Sign-in succeeded.");
                self.session.login(identity.clone());
            }
            Err(err) if err.is_cancelled() => {
                tracing::info!(flow_id = %flow.flow_id, ?elapsed, reason = %err.reason(), "Sign-in cancelled.");
            }
            Err(err) => {
                tracing::warn!(flow_id = %flow.flow_id, ?elapsed, reason = %err.reason(), %err, "Sign-in failed.");
            }
        }

        drop(flow);
        result
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<FlowInstance>> {
        lock(&self.active)
    }
}

/// Holds the coordinator's slot for one flow; releasing it returns to Idle,
/// including when the `start()` future is dropped midway.
struct ActiveFlow<'a> {
    slot: &'a Mutex<Option<FlowInstance>>,
    resolved: &'a Mutex<VecDeque<FlowId>>,
    flow_id: FlowId,
}

impl ActiveFlow<'_> {
    fn update(&self, apply: impl FnOnce(&mut FlowInstance)) {
        let mut slot = lock(self.slot);
        if let Some(instance) = slot.as_mut() {
            if instance.flow_id == self.flow_id && !instance.phase.is_terminal() {
                apply(instance);
            }
        }
    }

    /// Moves to a terminal phase at most once and releases the popup.
    fn terminate(&self, phase: FlowPhase) -> Option<Duration> {
        let mut slot = lock(self.slot);
        let instance = slot.as_mut()?;
        if instance.flow_id != self.flow_id || instance.phase.is_terminal() {
            return None;
        }
        instance.phase = phase;
        if let Some(popup) = instance.popup.take() {
            popup.close();
        }
        Some(instance.created_at.elapsed())
    }
}

impl Drop for ActiveFlow<'_> {
    fn drop(&mut self) {
        remember_resolved(self.resolved, &self.flow_id);
        let mut slot = lock(self.slot);
        if slot
            .as_ref()
            .is_some_and(|instance| instance.flow_id == self.flow_id)
        {
            if let Some(popup) = slot.take().and_then(|instance| instance.popup) {
                popup.close();
            }
        }
    }
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => time::sleep(timeout).await,
        None => future::pending().await,
    }
}

/// Records `flow_id` as ended. Returns `false` if it already was.
fn remember_resolved(resolved: &Mutex<VecDeque<FlowId>>, flow_id: &FlowId) -> bool {
    let mut resolved = lock(resolved);
    if resolved.contains(flow_id) {
        return false;
    }
    if resolved.len() == RESOLVED_FLOW_HISTORY {
        resolved.pop_front();
    }
    resolved.push_back(flow_id.clone());
    true
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
