//! Integration tests for the public callback endpoints and the command
//! webhook, driving the axum router directly with tower's oneshot.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use tower::util::ServiceExt;

use houston::adapters::{router, AppState, CommandAdapter, ModalSessions};
use houston::chat::{Delivery, Notifier, RecordingNotifier};
use houston::workflow::{Draft, DraftKey, Step, StatusVocabulary, WorkflowEvent, WorkflowStore};

const ROOM: &str = "r1";

struct Api {
    harness: common::Harness,
    notifier: Arc<RecordingNotifier>,
    app: axum::Router,
}

async fn api() -> Api {
    let harness = common::harness().await;
    common::mount_services(&harness.server).await;

    let notifier = harness.notifier.clone();
    let notifier_dyn: Arc<dyn Notifier> = notifier.clone();
    let modals = Arc::new(ModalSessions::new(
        harness.backend.clone(),
        notifier_dyn.clone(),
        StatusVocabulary::default(),
        "Houston Control",
    ));
    let commands = Arc::new(CommandAdapter::new(
        harness.engine.clone(),
        modals,
        notifier_dyn.clone(),
        ROOM,
        "rocket.cat",
        "Houston Control",
    ));

    let app = router(AppState {
        engine: harness.engine.clone(),
        commands,
        notifier: notifier_dyn,
    });

    Api {
        harness,
        notifier,
        app,
    }
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

async fn post_command(app: &axum::Router, payload: serde_json::Value) -> StatusCode {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/command")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    response.status()
}

fn command_payload(text: &str) -> serde_json::Value {
    serde_json::json!({
        "userId": "u1",
        "username": "alice",
        "roomId": ROOM,
        "roomMembers": ["alice", "rocket.cat"],
        "text": text
    })
}

#[tokio::test]
async fn callbacks_always_answer_the_auto_closing_page() {
    let api = api().await;

    for uri in [
        "/incident?userId=ghost&roomId=r1&status=Investigating",
        "/service?userId=ghost&roomId=r1&service=checkout",
        "/status?userId=ghost&roomId=r1&service=checkout&status=Outage",
        "/update?userId=ghost&roomId=r1&status=Monitoring",
        "/process?userId=ghost&roomId=r1&step=review",
        "/process?userId=ghost&roomId=r1",
    ] {
        let (status, body) = get(&api.app, uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert!(body.contains("window.close()"), "{uri}");
    }
}

#[tokio::test]
async fn service_callback_mutates_the_draft() {
    let api = api().await;
    let key = DraftKey::incident("u1", ROOM);

    api.harness
        .engine
        .handle(
            &key,
            WorkflowEvent::Begin {
                title: "API down".to_string(),
            },
        )
        .await
        .unwrap();

    get(&api.app, "/service?userId=u1&roomId=r1&service=checkout").await;

    let stored = api.harness.store.get(&key).await.unwrap().unwrap();
    match &stored.draft {
        Draft::Incident(draft) => assert_eq!(draft.services()[0].name, "checkout"),
        other => panic!("unexpected draft: {other:?}"),
    }
}

#[tokio::test]
async fn mismatched_tags_leave_the_draft_alone() {
    let api = api().await;
    let key = DraftKey::incident("u1", ROOM);

    api.harness
        .engine
        .handle(
            &key,
            WorkflowEvent::Begin {
                title: "API down".to_string(),
            },
        )
        .await
        .unwrap();

    // Same room, different actor: resolves to a different key, no draft
    get(&api.app, "/service?userId=mallory&roomId=r1&service=checkout").await;
    // Payload values that fail the draft's guards are equally inert
    get(&api.app, "/incident?userId=u1&roomId=r1&status=Exploded").await;

    let stored = api.harness.store.get(&key).await.unwrap().unwrap();
    match &stored.draft {
        Draft::Incident(draft) => {
            assert!(draft.services().is_empty());
            assert_eq!(stored.draft.step(), Step::Creation);
        }
        other => panic!("unexpected draft: {other:?}"),
    }
}

#[tokio::test]
async fn process_callback_with_update_discriminator_routes_to_the_update_draft() {
    let api = api().await;

    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/api/v1/incidents/42"))
        .respond_with(
            wiremock::ResponseTemplate::new(200)
                .set_body_json(common::incident_json(42, "API down", "Investigating")),
        )
        .mount(&api.harness.server)
        .await;

    let key = DraftKey::update("u1", ROOM);
    api.harness
        .engine
        .handle(
            &key,
            WorkflowEvent::BeginUpdate {
                incident_id: 42,
                actor_name: None,
            },
        )
        .await
        .unwrap();

    get(&api.app, "/update?userId=u1&roomId=r1&status=Monitoring").await;
    let (status, _) = get(
        &api.app,
        "/process?userId=u1&roomId=r1&step=describe&which=update",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The explain prompt went to the room
    let posted = api.notifier.posted();
    assert!(posted
        .iter()
        .any(|m| m.text.contains("/incident explain")));
}

#[tokio::test]
async fn command_webhook_enforces_the_expected_room() {
    let api = api().await;

    let status = post_command(
        &api.app,
        serde_json::json!({
            "userId": "u1",
            "roomId": "wrong-room",
            "roomMembers": ["rocket.cat"],
            "text": "create API down"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let notices = api.notifier.notices_for("u1");
    assert!(notices[0].text.contains("Unexpected room"));
}

#[tokio::test]
async fn command_webhook_requires_the_system_participant() {
    let api = api().await;

    let status = post_command(
        &api.app,
        serde_json::json!({
            "userId": "u1",
            "roomId": ROOM,
            "roomMembers": ["alice"],
            "text": "create API down"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let notices = api.notifier.notices_for("u1");
    assert!(notices[0].text.contains("invite"));
}

#[tokio::test]
async fn command_webhook_drives_the_creation_flow() {
    let api = api().await;

    post_command(&api.app, command_payload("create API down")).await;

    let key = DraftKey::incident("u1", ROOM);
    let stored = api.harness.store.get(&key).await.unwrap().unwrap();
    assert_eq!(stored.draft.step(), Step::Creation);

    // Unknown keywords and empty commands answer with usage
    post_command(&api.app, command_payload("frobnicate")).await;
    let notices = api.notifier.notices_for("u1");
    assert!(notices
        .iter()
        .any(|m| m.text.contains("Invalid syntax")));
}

#[tokio::test]
async fn bare_create_with_a_trigger_opens_the_modal_front_end() {
    let api = api().await;

    let mut payload = command_payload("create");
    payload["triggerId"] = serde_json::json!("t1");
    post_command(&api.app, payload).await;

    let modals = api.notifier.opened_modals();
    assert_eq!(modals.len(), 1);
    assert_eq!(modals[0].id, "incident_create_view");

    // No chat draft was opened; the form is its own front end
    let key = DraftKey::incident("u1", ROOM);
    assert!(api.harness.store.get(&key).await.unwrap().is_none());

    // Without a trigger the same command is a usage hint
    post_command(&api.app, command_payload("create")).await;
    let notices = api.notifier.notices_for("u1");
    assert!(notices
        .iter()
        .any(|m| m.text.contains("/incident create <title of incident>")));
}

#[tokio::test]
async fn abort_command_tears_down_whatever_is_open() {
    let api = api().await;

    post_command(&api.app, command_payload("create API down")).await;
    post_command(&api.app, command_payload("abort")).await;

    let key = DraftKey::incident("u1", ROOM);
    assert!(api.harness.store.get(&key).await.unwrap().is_none());

    let posted = api.notifier.posted();
    assert!(posted
        .iter()
        .any(|m| m.text.contains("@alice has stopped")));

    // Aborting again reports instead of failing
    post_command(&api.app, command_payload("abort")).await;
    let notices = api.notifier.notices_for("u1");
    assert!(notices
        .iter()
        .any(|m| m.text.contains("not creating an incident to abort")));

    let deliveries = api.notifier.deliveries();
    assert!(!deliveries.is_empty());
    assert!(deliveries
        .iter()
        .all(|d| !matches!(d, Delivery::ModalOpened { .. })));
}
