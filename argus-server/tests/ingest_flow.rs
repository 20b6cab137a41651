//! HTTP-level ingest and dashboard flow tests over the in-memory store.

use argus_contracts::frames::{DASHBOARD_ROOM, Frame};
use argus_core::store::{EventFilter, MemoryStore, StoreGateway};
use argus_model::AlertLevel;
use argus_server::config::Config;
use argus_server::fabric::Observer;
use argus_server::{AppState, routes};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;

fn test_app() -> (Router, Arc<MemoryStore>, AppState) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store.clone(), Config::for_tests());
    (routes::create_app(state.clone()), store, state)
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn typing_batch(machine_id: &str, count: usize, interval_ms: f64) -> Value {
    let events: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "kind": "typing",
                "timestamp": 1_000 + i as i64 * interval_ms as i64,
                "data": {"inserted": "a", "interval": interval_ms},
            })
        })
        .collect();
    let pattern: Vec<Value> = (0..count)
        .map(|i| json!({"timestamp": 1_000 + i as i64, "interval": interval_ms}))
        .collect();
    json!({
        "events": events,
        "typingPattern": pattern,
        "participant": {"machineId": machine_id, "sessionId": "s-1"}
    })
}

fn paste_batch(machine_id: &str, lengths: &[u64]) -> Value {
    let events: Vec<Value> = lengths
        .iter()
        .enumerate()
        .map(|(i, len)| {
            json!({
                "kind": "paste",
                "timestamp": 5_000 + i as i64,
                "data": {"length": len},
            })
        })
        .collect();
    json!({
        "events": events,
        "typingPattern": [],
        "participant": {"machineId": machine_id}
    })
}

fn watch_dashboard(state: &AppState) -> mpsc::Receiver<Frame> {
    let (tx, rx) = mpsc::channel(100);
    let observer = Arc::new(Observer::new(tx));
    let observer_id = observer.id;
    state.fabric.add_observer(observer);
    state.fabric.join_room(DASHBOARD_ROOM.to_string(), observer_id);
    rx
}

#[tokio::test]
async fn clean_typing_participant_scores_zero() {
    let (app, store, state) = test_app();
    let mut frames = watch_dashboard(&state);

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/events",
        Some(typing_batch("m-clean", 100, 150.0)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["participantScore"], 0.0);

    let participant = store
        .upsert_participant("m-clean", None, None)
        .await
        .unwrap();
    assert_eq!(participant.stats.paste_count, 0);
    assert_eq!(participant.stats.typing_anomalies, 0);
    assert_eq!(participant.suspicion_score, 0.0);
    assert_eq!(participant.total_events, 100);

    let pattern = store.get_typing_pattern(participant.id).await.unwrap().unwrap();
    assert_eq!(pattern.sample_count, 100);
    assert_eq!(pattern.mean_interval, 150.0);
    assert!((pattern.wpm_estimate - 80.0).abs() < 1e-9);

    // A participant-updated frame, but no alert for clean typing.
    let frame = frames.recv().await.unwrap();
    assert!(matches!(frame, Frame::ParticipantUpdated(_)));
    assert!(frames.try_recv().is_err());
}

#[tokio::test]
async fn large_paste_flags_event_without_immediate_alert() {
    let (app, store, state) = test_app();
    let mut frames = watch_dashboard(&state);

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/events",
        Some(paste_batch("m-flag", &[600])),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["participantScore"], 0.054);

    let participant = store.upsert_participant("m-flag", None, None).await.unwrap();
    assert_eq!(participant.stats.paste_count, 1);
    assert_eq!(participant.stats.paste_chars_total, 600);
    assert_eq!(participant.suspicion_score, 0.054);

    let events = store
        .events_for_participant(
            participant.id,
            &EventFilter {
                limit: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(events.total, 1);
    assert_eq!(events.events[0].suspicion_score, 0.9);
    assert!(events.events[0].flagged);

    // Below every alert threshold: update frame only.
    let frame = frames.recv().await.unwrap();
    assert!(matches!(frame, Frame::ParticipantUpdated(_)));
    assert!(frames.try_recv().is_err());
}

#[tokio::test]
async fn repeated_pastes_raise_an_alert() {
    let (app, store, state) = test_app();

    send_json(
        &app,
        "POST",
        "/api/events",
        Some(paste_batch("m-flag", &[600])),
        None,
    )
    .await;

    let mut frames = watch_dashboard(&state);
    let lengths = vec![400u64; 50];
    let (status, body) = send_json(
        &app,
        "POST",
        "/api/events",
        Some(paste_batch("m-flag", &lengths)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let participant = store.upsert_participant("m-flag", None, None).await.unwrap();
    assert_eq!(participant.stats.paste_count, 51);
    assert_eq!(participant.stats.paste_chars_total, 600 + 50 * 400);
    assert_eq!(body["participantScore"], participant.suspicion_score);
    assert!(participant.suspicion_score > 0.5);

    // Alert frame first, then the participant update.
    let mut saw_alert = false;
    let mut saw_update = false;
    while let Ok(frame) = frames.try_recv() {
        match frame {
            Frame::Alert(alert) => {
                saw_alert = true;
                assert!(alert.level >= AlertLevel::Warning);
                assert!(
                    alert
                        .reasons
                        .iter()
                        .any(|reason| reason.starts_with("excessive_pastes"))
                );
            }
            Frame::ParticipantUpdated(update) => {
                saw_update = true;
                assert_eq!(update.stats.paste_count, 51);
            }
            Frame::SourceAnalysisUpdated(_) => {}
        }
    }
    assert!(saw_alert);
    assert!(saw_update);
}

#[tokio::test]
async fn invalid_payload_is_rejected_before_any_write() {
    let (app, store, _state) = test_app();

    let body = json!({
        "events": [{"kind": "keylogger", "timestamp": 1_000, "data": {}}],
        "typingPattern": [],
        "participant": {"machineId": "m-bad"}
    });
    let (status, response) = send_json(&app, "POST", "/api/events", Some(body), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"]["fields"][0]["field"], "events[0].kind");

    // Rejected before the upsert: no participant exists.
    let page = store
        .list_participants(Default::default(), Default::default(), 10, 0)
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn per_participant_rate_limit_trips_on_the_101st_request() {
    let (app, _store, _state) = test_app();
    let body = typing_batch("m-rl", 1, 150.0);

    for i in 1..=100 {
        let (status, _) = send_json(&app, "POST", "/api/events", Some(body.clone()), None).await;
        assert_eq!(status, StatusCode::OK, "request {i} should pass");
    }
    let (status, response) = send_json(&app, "POST", "/api/events", Some(body), None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response["error"]["status"], 429);
}

#[tokio::test]
async fn dashboard_surface_requires_bearer_token() {
    let (app, _store, _state) = test_app();

    let (status, _) = send_json(&app, "GET", "/api/participants", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, login) = send_json(
        &app,
        "POST",
        "/api/auth/login",
        Some(json!({"username": "admin", "password": "admin"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = login["token"].as_str().unwrap().to_string();

    let (status, body) = send_json(&app, "GET", "/api/participants", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let (app, _store, _state) = test_app();
    let (status, _) = send_json(
        &app,
        "POST",
        "/api/auth/login",
        Some(json!({"username": "admin", "password": "wrong"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn participant_detail_includes_breakdown_and_pattern() {
    let (app, store, _state) = test_app();

    send_json(
        &app,
        "POST",
        "/api/events",
        Some(paste_batch("m-detail", &[600, 50])),
        None,
    )
    .await;
    send_json(
        &app,
        "POST",
        "/api/events",
        Some(typing_batch("m-detail", 5, 150.0)),
        None,
    )
    .await;

    let participant = store
        .upsert_participant("m-detail", None, None)
        .await
        .unwrap();
    let (status, login) = send_json(
        &app,
        "POST",
        "/api/auth/login",
        Some(json!({"username": "admin", "password": "admin"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = login["token"].as_str().unwrap().to_string();

    let (status, body) = send_json(
        &app,
        "GET",
        &format!("/api/participant/{}", participant.id),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["eventCount"], 7);
    assert_eq!(body["typingPattern"]["sampleCount"], 5);
    let breakdown = body["suspicionBreakdown"].as_array().unwrap();
    assert!(breakdown.len() >= 2);

    let (status, filtered) = send_json(
        &app,
        "GET",
        &format!(
            "/api/participant/{}?eventKind=paste&flaggedOnly=true",
            participant.id
        ),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(filtered["eventCount"], 1);

    let (status, _) = send_json(
        &app,
        "GET",
        &format!("/api/participant/{}", uuid::Uuid::new_v4()),
        None,
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn alert_egress_reports_every_channel() {
    let (app, _store, state) = test_app();
    let mut frames = watch_dashboard(&state);

    let (status, login) = send_json(
        &app,
        "POST",
        "/api/auth/login",
        Some(json!({"username": "admin", "password": "admin"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = login["token"].as_str().unwrap().to_string();

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/alerts",
        Some(json!({
            "participantId": uuid::Uuid::new_v4(),
            "machineId": "m-alert",
            "displayName": "m-alert",
            "level": "critical",
            "reasons": ["excessive_pastes (12)"],
            "score": 0.8,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    // Echoed to the dashboard room.
    let frame = frames.recv().await.unwrap();
    assert!(matches!(frame, Frame::Alert(_)));

    // Per-channel results: dashboard delivered, webhook and email both
    // unconfigured in this deployment.
    let channels = body["channels"].as_array().unwrap();
    let find = |name: &str| {
        channels
            .iter()
            .find(|c| c["channel"] == name)
            .unwrap_or_else(|| panic!("missing {name} channel result"))
    };
    assert_eq!(find("dashboard")["delivered"], true);
    assert_eq!(find("webhook")["delivered"], false);
    assert_eq!(find("webhook")["detail"], "not configured");
    assert_eq!(find("email")["delivered"], false);
    assert_eq!(find("email")["detail"], "not configured");
}

#[tokio::test]
async fn health_reports_uptime() {
    let (app, _store, _state) = test_app();
    let (status, body) = send_json(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["uptimeSec"].is_number());
}

#[tokio::test]
async fn source_routes_are_unavailable_without_a_token() {
    let (app, store, _state) = test_app();
    let participant = store.upsert_participant("m-src", None, None).await.unwrap();

    let (status, login) = send_json(
        &app,
        "POST",
        "/api/auth/login",
        Some(json!({"username": "admin", "password": "admin"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = login["token"].as_str().unwrap().to_string();

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/source/register",
        Some(json!({
            "participantId": participant.id,
            "owner": "octo",
            "repo": "solution"
        })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
