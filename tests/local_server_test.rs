#![cfg(feature = "local-server")]

mod support;

use std::time::Duration;

use axum::http::StatusCode;
use gamehub_auth::{
    AppWindow, CallbackExchangeHandler, CallbackServer, CallbackServerConfig, FlowConfig, FlowId,
    GoogleProvider, InMemoryOutcomeStore, MessageBridge, OutcomeMessage, OutcomeStore,
};
use serde_json::json;

use support::{UNREACHABLE_API, spawn_backend};

fn server_config() -> CallbackServerConfig {
    CallbackServerConfig::new("127.0.0.1", 0, "/auth/google/callback")
}

fn handler(config: &CallbackServerConfig, api_base: &str) -> CallbackExchangeHandler {
    let flow_config = FlowConfig::new(
        config.origin().unwrap(),
        url::Url::parse(api_base).unwrap(),
    );
    CallbackExchangeHandler::new(&GoogleProvider, &flow_config).unwrap()
}

#[tokio::test]
async fn served_callback_reaches_listening_flow() {
    let backend = spawn_backend(StatusCode::OK, json!({"id": "u1", "name": "Ada"})).await;
    let config = server_config();
    let window = AppWindow::new(config.origin().unwrap());
    let handler = handler(&config, backend.base.as_str());
    let server = CallbackServer::new(config, handler, window.clone())
        .spawn()
        .await
        .unwrap();

    let mut bridge = MessageBridge::register(&window, FlowId::from("f1"));
    let response = reqwest::get(format!("{}?code=abc123&state=f1", server.callback_url()))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.text().await.unwrap().contains("window.close()"));

    let outcome = tokio::time::timeout(Duration::from_secs(5), bridge.recv())
        .await
        .unwrap();
    match outcome {
        OutcomeMessage::Success { identity, .. } => {
            assert_eq!(identity.external_id, "u1");
            assert_eq!(identity.provider, "google");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    server.shutdown().await;
}

#[tokio::test]
async fn served_callback_without_listener_is_stored() {
    let config = server_config();
    let window = AppWindow::new(config.origin().unwrap());
    let store = InMemoryOutcomeStore::shared();
    let server = CallbackServer::new(config.clone(), handler(&config, UNREACHABLE_API), window)
        .with_outcome_store(store.clone())
        .spawn()
        .await
        .unwrap();

    let response = reqwest::get(format!(
        "{}?error=access_denied&state=f1",
        server.callback_url()
    ))
    .await
    .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    assert_eq!(
        store.take().unwrap(),
        Some(OutcomeMessage::Failure {
            flow_id: FlowId::from("f1"),
            error_reason: "access_denied".to_string(),
        })
    );

    server.shutdown().await;
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let config = server_config();
    let window = AppWindow::new(config.origin().unwrap());
    let server = CallbackServer::new(config.clone(), handler(&config, UNREACHABLE_API), window)
        .spawn()
        .await
        .unwrap();

    let url = format!("http://{}/elsewhere", server.local_addr());
    let response = reqwest::get(url).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    server.shutdown().await;
}
