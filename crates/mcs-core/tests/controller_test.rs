#![allow(clippy::unwrap_used)]
// Integration tests for `Controller` against a wiremock device.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mcs_api::{Credentials, McsClient, TransportConfig};
use mcs_core::{
    Command, CommandResult, ConnectionState, Controller, ControllerConfig, CoreError, Method,
    PollState, PollingConfig, QueueConfig, ScheduleOptions,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn api_path(suffix: &str) -> String {
    format!("/api/5.0/{suffix}")
}

fn config(polling: PollingConfig) -> ControllerConfig {
    ControllerConfig {
        host: "127.0.0.1".into(),
        username: "operator".into(),
        password: SecretString::from("hunter2".to_string()),
        polling,
        queue: QueueConfig {
            enabled: false,
            settle: Duration::ZERO,
            ..QueueConfig::default()
        },
        ..ControllerConfig::default()
    }
}

fn no_polling() -> PollingConfig {
    PollingConfig {
        enabled: false,
        interval: Duration::from_secs(5),
    }
}

fn controller_for(server: &MockServer, config: ControllerConfig) -> Controller {
    let base_url = Url::parse(&format!("{}/api/5.0", server.uri())).unwrap();
    let http = TransportConfig::default().build_client().unwrap();
    let client = McsClient::with_client(
        http,
        base_url,
        Credentials {
            username: "operator".into(),
            password: "hunter2".to_string().into(),
        },
    );
    Controller::from_client(config, client)
}

async fn mount_login(server: &MockServer) {
    let payload = URL_SAFE_NO_PAD.encode(r#"{"exp":9999999999}"#);
    Mock::given(method("POST"))
        .and(path(api_path("auth/login")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "access_token": format!("a.{payload}.c"), "refresh_token": "r1" }
        })))
        .mount(server)
        .await;
}

async fn mount_listing(server: &MockServer, suffix: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(api_path(suffix)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn program_output() -> Value {
    json!({
        "uuid": "out-1",
        "label": "Program",
        "enabled": true,
        "input": {
            "layouts": ["lay-1"],
            "audio": [{ "index": 1, "channel": "ch-1", "audio_index": 1 }]
        }
    })
}

async fn mount_device(server: &MockServer) {
    mount_login(server).await;
    mount_listing(server, "outputs/config/", json!({ "data": [program_output()] })).await;
    mount_listing(
        server,
        "layouts/config/",
        json!([
            { "uuid": "lay-1", "label": "Quad" },
            { "uuid": "lay-2", "label": "" }
        ]),
    )
    .await;
    mount_listing(
        server,
        "channels/config/",
        json!([{ "uuid": "ch-1", "label": "Cam 1" }, { "uuid": "ch-2", "label": "Cam 2" }]),
    )
    .await;
}

async fn connected(server: &MockServer) -> Controller {
    mount_device(server).await;
    let controller = controller_for(server, config(no_polling()));
    controller.connect().await.unwrap();
    controller
}

// ── Connection lifecycle ────────────────────────────────────────────

#[tokio::test]
async fn test_connect_loads_state() {
    let server = MockServer::start().await;
    let controller = connected(&server).await;

    assert_eq!(controller.connection_state(), ConnectionState::Ok);
    assert_eq!(controller.store().output_count(), 1);
    assert_eq!(controller.store().layout_count(), 2);
    assert_eq!(controller.store().channel_count(), 2);
    assert_eq!(controller.poll_state(), PollState::Stopped);

    let choices = controller.choices();
    let layout_labels: Vec<&str> = choices.layouts.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(layout_labels, vec!["Quad", "lay-2"]);
    assert!(controller.store().is_layout_active("out-1", "lay-1"));
}

#[tokio::test]
async fn test_missing_config_reports_bad_config() {
    let server = MockServer::start().await;
    let controller = controller_for(
        &server,
        ControllerConfig {
            host: String::new(),
            ..config(no_polling())
        },
    );

    let result = controller.connect().await;

    assert!(matches!(result, Err(CoreError::BadConfig { .. })));
    assert!(matches!(
        controller.connection_state(),
        ConnectionState::BadConfig { .. }
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_login_failure_reports_connection_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("auth/login")))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let controller = controller_for(&server, config(no_polling()));
    let result = controller.connect().await;

    assert!(matches!(result, Err(CoreError::LoginFailed { .. })));
    assert!(matches!(
        controller.connection_state(),
        ConnectionState::ConnectionFailure { .. }
    ));
}

#[tokio::test]
async fn test_disconnect_rejects_commands() {
    let server = MockServer::start().await;
    let controller = connected(&server).await;

    controller.disconnect().await;

    assert_eq!(controller.connection_state(), ConnectionState::Disconnected);
    assert_eq!(controller.store().output_count(), 0);
    let result = controller
        .schedule_command(ScheduleOptions::new("late"), || async { Ok(()) })
        .await;
    assert!(matches!(result, Err(CoreError::Disconnected)));
}

// ── State refresh ───────────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_reports_choice_changes() {
    let server = MockServer::start().await;
    let controller = connected(&server).await;
    let mut choices = controller.subscribe_choices();
    choices.borrow_and_update();

    assert!(!controller.refresh_state().await.unwrap());
    assert!(!choices.has_changed().unwrap());

    server.reset().await;
    mount_device_with_extra_output(&server).await;

    assert!(controller.refresh_state().await.unwrap());
    assert!(choices.has_changed().unwrap());
    assert_eq!(choices.borrow_and_update().outputs.len(), 2);
}

async fn mount_device_with_extra_output(server: &MockServer) {
    mount_listing(
        server,
        "outputs/config/",
        json!([program_output(), { "uuid": "out-2", "label": "Preview", "input": null }]),
    )
    .await;
    mount_listing(
        server,
        "layouts/config/",
        json!([
            { "uuid": "lay-1", "label": "Quad" },
            { "uuid": "lay-2", "label": "" }
        ]),
    )
    .await;
    mount_listing(
        server,
        "channels/config/",
        json!([{ "uuid": "ch-1", "label": "Cam 1" }, { "uuid": "ch-2", "label": "Cam 2" }]),
    )
    .await;
}

#[tokio::test]
async fn test_polling_failure_halts_and_flags_connection() {
    let server = MockServer::start().await;
    mount_device(&server).await;
    let controller = controller_for(
        &server,
        config(PollingConfig {
            enabled: true,
            interval: Duration::from_millis(50),
        }),
    );
    controller.connect().await.unwrap();
    assert!(matches!(controller.poll_state(), PollState::Polling { .. }));

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let mut poll = controller.subscribe_poll_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        poll.wait_for(|s| matches!(s, PollState::Halted { .. })),
    )
    .await
    .unwrap()
    .unwrap();

    match controller.connection_state() {
        ConnectionState::ConnectionFailure { reason } => {
            assert!(reason.starts_with("Polling failed"), "unexpected reason: {reason}");
        }
        other => panic!("expected ConnectionFailure, got: {other:?}"),
    }

    // Fail-stop: no further polls after the halt.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let seen = server.received_requests().await.unwrap().len();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), seen);
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_apply_layout_rereads_and_preserves_fields() {
    let server = MockServer::start().await;
    let controller = connected(&server).await;

    // The device copy has moved on since the last poll.
    let mut live = program_output();
    live["input"]["mode"] = json!("manual");
    Mock::given(method("GET"))
        .and(path(api_path("outputs/config/out-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": live })))
        .expect(1)
        .mount(&server)
        .await;

    let mut expected = live.clone();
    expected["input"]["layouts"] = json!(["lay-2"]);
    Mock::given(method("PUT"))
        .and(path(api_path("outputs/config/out-1")))
        .and(body_json(&expected))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let result = controller
        .execute(Command::ApplyLayout {
            output: "out-1".into(),
            layout: "lay-2".into(),
        })
        .await
        .unwrap();

    match result {
        CommandResult::Output(output) => assert_eq!(output.active_layout(), Some("lay-2")),
        other => panic!("expected Output result, got: {other:?}"),
    }
    // The cache is untouched until the next refresh.
    assert!(controller.store().is_layout_active("out-1", "lay-1"));
    server.verify().await;
}

#[tokio::test]
async fn test_apply_layout_writes_back_sparse_output_verbatim() {
    let server = MockServer::start().await;
    let controller = connected(&server).await;

    Mock::given(method("GET"))
        .and(path(api_path("outputs/config/out-3")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uuid": "out-3",
            "label": null,
            "input": { "layouts": ["lay-1"] }
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(api_path("outputs/config/out-3")))
        .and(body_json(json!({
            "uuid": "out-3",
            "label": null,
            "input": { "layouts": ["lay-2"] }
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    controller
        .execute(Command::ApplyLayout {
            output: "out-3".into(),
            layout: "lay-2".into(),
        })
        .await
        .unwrap();

    server.verify().await;
}

#[tokio::test]
async fn test_set_tile_leaves_other_tiles_untouched() {
    let server = MockServer::start().await;
    let controller = connected(&server).await;

    let live = json!({
        "uuid": "lay-1",
        "tiles": [
            { "index": 0, "channel": "ch-1" },
            { "index": 1, "type": null, "text": "STUDIO A" }
        ]
    });
    Mock::given(method("GET"))
        .and(path(api_path("layouts/config/lay-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": live })))
        .mount(&server)
        .await;

    let mut expected = live.clone();
    expected["tiles"][0]["channel"] = json!("ch-2");
    Mock::given(method("PUT"))
        .and(path(api_path("layouts/config/lay-1")))
        .and(body_json(&expected))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let result = controller
        .execute(Command::SetLayoutTile {
            layout: "lay-1".into(),
            tile: 0,
            channel: "ch-2".into(),
        })
        .await
        .unwrap();

    match result {
        CommandResult::Layout(layout) => {
            assert_eq!(layout.tile(0).unwrap().channel.as_deref(), Some("ch-2"));
        }
        other => panic!("expected Layout result, got: {other:?}"),
    }
    server.verify().await;
}

#[tokio::test]
async fn test_set_audio_channel_creates_primary_route() {
    let server = MockServer::start().await;
    let controller = connected(&server).await;

    Mock::given(method("GET"))
        .and(path(api_path("outputs/config/out-2")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uuid": "out-2",
            "input": { "layouts": ["lay-1"], "audio": [] }
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(api_path("outputs/config/out-2")))
        .and(body_json(json!({
            "uuid": "out-2",
            "input": {
                "layouts": ["lay-1"],
                "audio": [{ "index": 1, "channel": "ch-2", "audio_index": 2, "pid": null }]
            }
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    controller
        .execute(Command::SetAudioChannel {
            output: "out-2".into(),
            channel: "ch-2".into(),
            audio_index: 2,
        })
        .await
        .unwrap();

    server.verify().await;
}

#[tokio::test]
async fn test_missing_tile_is_not_found_and_not_written() {
    let server = MockServer::start().await;
    let controller = connected(&server).await;

    Mock::given(method("GET"))
        .and(path(api_path("layouts/config/lay-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uuid": "lay-1",
            "tiles": [{ "index": 0, "type": "video", "channel": "ch-1" }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(api_path("layouts/config/lay-1")))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let result = controller
        .execute(Command::SetLayoutTile {
            layout: "lay-1".into(),
            tile: 3,
            channel: "ch-2".into(),
        })
        .await;

    assert!(matches!(
        result,
        Err(CoreError::NotFound { ref entity_type, .. }) if entity_type == "tile"
    ));
    server.verify().await;
}

#[tokio::test]
async fn test_unknown_output_is_not_found() {
    let server = MockServer::start().await;
    let controller = connected(&server).await;

    Mock::given(method("GET"))
        .and(path(api_path("outputs/config/out-9")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = controller
        .execute(Command::ApplyLayout {
            output: "out-9".into(),
            layout: "lay-1".into(),
        })
        .await;

    match result {
        Err(CoreError::NotFound {
            entity_type,
            identifier,
        }) => {
            assert_eq!(entity_type, "output");
            assert_eq!(identifier, "out-9");
        }
        other => panic!("expected NotFound, got: {other:?}"),
    }

    // A failed command does not wedge the queue.
    let value = controller
        .schedule_command(ScheduleOptions::new("probe").min_gap(Duration::ZERO), || async {
            Ok(42)
        })
        .await
        .unwrap();
    assert_eq!(value, 42);
}

#[tokio::test]
async fn test_request_json_passthrough() {
    let server = MockServer::start().await;
    let controller = connected(&server).await;

    Mock::given(method("GET"))
        .and(path(api_path("system/info")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "5.0.3" })))
        .mount(&server)
        .await;

    let value = controller
        .request_json(Method::GET, "system/info", None)
        .await
        .unwrap();

    assert_eq!(value, json!({ "version": "5.0.3" }));
}
