use std::future;

use tokio::sync::mpsc;

use crate::{AppWindow, FlowId, ListenerId, MessageEvent, OutcomeMessage};

/// Receives the single outcome of one flow in the primary context.
///
/// A message is accepted only if it comes from the application's own origin,
/// parses as an [`OutcomeMessage`] and carries this flow's id. The listener
/// is removed as soon as one message is accepted, so duplicates never reach
/// the coordinator.
#[derive(Debug)]
pub struct MessageBridge {
    window: AppWindow,
    flow_id: FlowId,
    listener: Option<(ListenerId, mpsc::UnboundedReceiver<MessageEvent>)>,
}

impl MessageBridge {
    pub fn register(window: &AppWindow, flow_id: FlowId) -> Self {
        let listener = window.add_message_listener();
        tracing::trace!(%flow_id, "Registered outcome listener.");
        Self {
            window: window.clone(),
            flow_id,
            listener: Some(listener),
        }
    }

    pub fn flow_id(&self) -> &FlowId {
        &self.flow_id
    }

    pub fn is_registered(&self) -> bool {
        self.listener.is_some()
    }

    /// Resolves with the first valid outcome. Once an outcome was delivered,
    /// or the bridge was deregistered, the returned future never resolves.
    ///
    /// Cancel safe: dropping the future before it resolves loses no message.
    pub async fn recv(&mut self) -> OutcomeMessage {
        loop {
            let Some((_, rx)) = self.listener.as_mut() else {
                return future::pending().await;
            };
            let Some(event) = rx.recv().await else {
                self.deregister();
                continue;
            };
            if let Some(outcome) = self.accept(&event) {
                self.deregister();
                return outcome;
            }
        }
    }

    pub fn accept(&self, event: &MessageEvent) -> Option<OutcomeMessage> {
        if &event.origin != self.window.origin() {
            tracing::debug!(origin = %event.origin, "Discarding cross-origin message.");
            return None;
        }

        let outcome: OutcomeMessage = match serde_json::from_value(event.data.clone()) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::debug!(?err, "Discarding message that is not an outcome.");
                return None;
            }
        };

        if outcome.flow_id() != &self.flow_id {
            tracing::debug!(
                expected = %self.flow_id,
                received = %outcome.flow_id(),
                "Discarding outcome of another flow."
            );
            return None;
        }

        Some(outcome)
    }

    pub fn deregister(&mut self) {
        if let Some((id, _)) = self.listener.take() {
            self.window.remove_message_listener(id);
            tracing::trace!(flow_id = %self.flow_id, "Removed outcome listener.");
        }
    }
}

impl Drop for MessageBridge {
    fn drop(&mut self) {
        self.deregister();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::Origin;

    const APP: &str = "https://hub.example";

    fn failure(flow_id: &str) -> serde_json::Value {
        json!({"type": "FAILURE", "flowId": flow_id, "errorReason": "access_denied"})
    }

    #[tokio::test]
    async fn delivers_first_valid_outcome_and_deregisters() {
        let window = AppWindow::new(Origin::parse(APP).unwrap());
        let app = window.origin().clone();
        let mut bridge = MessageBridge::register(&window, FlowId::from("f1"));

        window.post_message(failure("f1"), &app, APP);
        window.post_message(failure("f1"), &app, APP);

        let outcome = bridge.recv().await;
        assert_eq!(outcome.flow_id(), &FlowId::from("f1"));
        assert!(!bridge.is_registered());
        assert_eq!(window.listener_count(), 0);

        let again = tokio::time::timeout(Duration::from_millis(20), bridge.recv()).await;
        assert!(again.is_err(), "duplicate outcome must not be delivered");
    }

    #[tokio::test]
    async fn skips_foreign_origin_garbage_and_stale_flows() {
        let window = AppWindow::new(Origin::parse(APP).unwrap());
        let app = window.origin().clone();
        let evil = Origin::parse("https://evil.example").unwrap();
        let mut bridge = MessageBridge::register(&window, FlowId::from("current"));

        window.post_message(failure("current"), &evil, APP);
        window.post_message(json!({"hello": "world"}), &app, APP);
        window.post_message(failure("stale"), &app, APP);
        window.post_message(failure("current"), &app, APP);

        match bridge.recv().await {
            OutcomeMessage::Failure { flow_id, .. } => assert_eq!(flow_id.as_str(), "current"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn drop_removes_listener() {
        let window = AppWindow::new(Origin::parse(APP).unwrap());
        let bridge = MessageBridge::register(&window, FlowId::from("f1"));
        assert_eq!(window.listener_count(), 1);
        drop(bridge);
        assert_eq!(window.listener_count(), 0);
    }
}
