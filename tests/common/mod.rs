#![allow(dead_code)]

use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use houston::chat::RecordingNotifier;
use houston::config::BackendConfig;
use houston::workflow::{
    CallbackLinks, InMemoryWorkflowStore, MessageRenderer, StatusVocabulary, WorkflowEngine,
    WorkflowStore,
};
use houston::StatusClient;

pub const API_KEY: &str = "test-key";

/// Everything a workflow test needs wired together against a mock backend
pub struct Harness {
    pub server: MockServer,
    pub store: Arc<InMemoryWorkflowStore>,
    pub engine: Arc<WorkflowEngine>,
    pub notifier: Arc<RecordingNotifier>,
    pub backend: StatusClient,
}

pub async fn harness() -> Harness {
    let server = MockServer::start().await;
    let backend = backend_client(&server);

    let store = Arc::new(InMemoryWorkflowStore::new());
    let renderer = MessageRenderer::new(
        "Houston Control",
        CallbackLinks::new("http://localhost:3000"),
        &server.uri(),
    );
    let engine = Arc::new(WorkflowEngine::new(
        store.clone() as Arc<dyn WorkflowStore>,
        backend.clone(),
        StatusVocabulary::default(),
        renderer,
    ));

    Harness {
        server,
        store,
        engine,
        notifier: Arc::new(RecordingNotifier::new()),
        backend,
    }
}

pub fn backend_client(server: &MockServer) -> StatusClient {
    let config = BackendConfig {
        api_key: Some(API_KEY.to_string()),
        ..BackendConfig::default()
    };
    StatusClient::new(server.uri(), &config).expect("backend client should build")
}

pub fn service_json(id: u64, name: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "status": "Operational",
        "description": "",
        "group": "",
        "link": "",
        "tags": [],
        "enabled": true
    })
}

pub fn incident_json(id: u64, title: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "time": "2024-03-01T12:00:00Z",
        "title": title,
        "status": status,
        "services": [{"name": "checkout", "status": "Degraded"}],
        "updates": []
    })
}

/// GET /api/v1/services answering with a small catalog
pub async fn mount_services(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/services"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(vec![service_json(1, "checkout"), service_json(2, "search")]),
        )
        .mount(server)
        .await;
}
