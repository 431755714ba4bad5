//! Integration tests for the interactive-form front end: keyed sessions,
//! incremental re-rendering and the funnel into the backend calls.

mod common;

use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use houston::adapters::{ModalInteraction, ModalSessions};
use houston::chat::{Block, Notifier, RecordingNotifier};
use houston::workflow::StatusVocabulary;

struct Forms {
    server: MockServer,
    modals: ModalSessions,
    notifier: Arc<RecordingNotifier>,
}

async fn forms() -> Forms {
    let server = MockServer::start().await;
    common::mount_services(&server).await;

    let notifier = Arc::new(RecordingNotifier::new());
    let modals = ModalSessions::new(
        common::backend_client(&server),
        notifier.clone() as Arc<dyn Notifier>,
        StatusVocabulary::default(),
        "Houston Control",
    );

    Forms {
        server,
        modals,
        notifier,
    }
}

#[tokio::test]
async fn concurrent_sessions_do_not_observe_each_other() {
    let f = forms().await;

    let (alice, bob) = futures::join!(
        f.modals
            .open_create("u1", Some("alice"), "r1", vec!["alice".to_string()]),
        f.modals
            .open_create("u2", Some("bob"), "r1", vec!["bob".to_string()])
    );
    let (alice, bob) = (alice.unwrap(), bob.unwrap());

    assert_ne!(alice.session_id, bob.session_id);
    assert_eq!(f.modals.open_sessions().await, 2);

    let alice_view = f
        .modals
        .update(
            &alice.session_id,
            ModalInteraction::SetTitle("API down".to_string()),
        )
        .await
        .unwrap();
    let bob_view = f
        .modals
        .update(
            &bob.session_id,
            ModalInteraction::SetStatus("Investigating".to_string()),
        )
        .await
        .unwrap();

    // Alice's title never leaks into Bob's form and vice versa
    assert!(alice_view.blocks.iter().any(|b| matches!(
        b,
        Block::Input { initial_value: Some(v), .. } if v == "API down"
    )));
    assert!(!bob_view.blocks.iter().any(|b| matches!(
        b,
        Block::Input { initial_value: Some(v), .. } if v == "API down"
    )));
}

#[tokio::test]
async fn interactions_on_unknown_sessions_are_rejected() {
    let f = forms().await;
    let err = f
        .modals
        .update("no-such-session", ModalInteraction::SetTitle("x".to_string()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no open modal session"));
}

#[tokio::test]
async fn submit_funnels_into_the_backend_create() {
    let f = forms().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/incidents"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(common::incident_json(11, "API down", "Investigating")),
        )
        .expect(1)
        .mount(&f.server)
        .await;

    let view = f
        .modals
        .open_create("u1", Some("alice"), "r1", vec!["alice".to_string()])
        .await
        .unwrap();
    let sid = view.session_id;

    f.modals
        .update(&sid, ModalInteraction::SetTitle("API down".to_string()))
        .await
        .unwrap();
    f.modals
        .update(&sid, ModalInteraction::SetStatus("Investigating".to_string()))
        .await
        .unwrap();
    f.modals
        .update(&sid, ModalInteraction::SetServices(vec![1]))
        .await
        .unwrap();
    f.modals
        .update(
            &sid,
            ModalInteraction::SetServiceStatus {
                service_id: 1,
                status: "Outage".to_string(),
            },
        )
        .await
        .unwrap();

    f.modals.submit(&sid).await.unwrap();

    // The session is gone and the room heard about the new incident
    assert_eq!(f.modals.open_sessions().await, 0);
    let posted = f.notifier.posted();
    assert!(posted
        .iter()
        .any(|m| m.text.contains("new incident with ID *11*")));

    let requests = f.server.received_requests().await.unwrap();
    let create = requests
        .iter()
        .find(|r| r.url.path() == "/api/v1/incidents")
        .unwrap();
    let body: serde_json::Value = create.body_json().unwrap();
    assert_eq!(body["services"][0]["name"], "checkout");
    assert_eq!(body["services"][0]["status"], "Outage");
}

#[tokio::test]
async fn incomplete_forms_do_not_reach_the_backend() {
    let f = forms().await;

    let view = f
        .modals
        .open_create("u1", None, "r1", vec![])
        .await
        .unwrap();

    let err = f.modals.submit(&view.session_id).await.unwrap_err();
    assert!(err.to_string().contains("title"));

    // The session survives a failed submit for another attempt
    assert_eq!(f.modals.open_sessions().await, 1);
    assert!(f.server.received_requests().await.unwrap().iter().all(|r| {
        r.url.path() != "/api/v1/incidents"
    }));
}

#[tokio::test]
async fn close_form_publishes_a_resolving_update() {
    let f = forms().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/incidents/42"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::incident_json(42, "API down", "Investigating")),
        )
        .mount(&f.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/incidents/42/updates"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(common::incident_json(42, "API down", "Resolved")),
        )
        .expect(1)
        .mount(&f.server)
        .await;

    let view = f
        .modals
        .open_close("u1", Some("alice"), "r1", 42)
        .await
        .unwrap();

    f.modals
        .update(
            &view.session_id,
            ModalInteraction::SetCloseField {
                field: houston::adapters::CloseField::Summary,
                value: "deploy gone wrong".to_string(),
            },
        )
        .await
        .unwrap();

    f.modals.submit(&view.session_id).await.unwrap();

    let requests = f.server.received_requests().await.unwrap();
    let update = requests
        .iter()
        .find(|r| r.url.path() == "/api/v1/incidents/42/updates")
        .unwrap();
    let body: serde_json::Value = update.body_json().unwrap();
    assert_eq!(body["status"], "Resolved");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("operational"));

    let posted = f.notifier.posted();
    assert!(posted
        .iter()
        .any(|m| m.text.contains("was solved") && m.text.contains("deploy gone wrong")));
}
