use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, warn};

use crate::chat::Notifier;
use crate::workflow::{effects, DraftKey, Step, WorkflowEngine, WorkflowEvent};

use super::command::{CommandAdapter, CommandContext};

/// The page every callback answers with, whatever happened. The links
/// are opened in throwaway browser tabs; the tab closes itself and the
/// outcome shows up in the chat room instead.
const AUTO_CLOSING_PAGE: &str =
    "<html><body> <script type=\"text/javascript\">window.close();</script> </body></html>";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub commands: Arc<CommandAdapter>,
    pub notifier: Arc<dyn Notifier>,
}

/// Shared query shape for all callback endpoints. Everything is optional
/// because the links are plain GETs anyone can mangle; missing pieces
/// degrade to a logged no-op, never an error page.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
    #[serde(rename = "roomId")]
    room_id: Option<String>,
    status: Option<String>,
    service: Option<String>,
    step: Option<String>,
    which: Option<String>,
}

impl CallbackQuery {
    /// The key tags are untrusted lookup input; they select a draft and
    /// nothing else. Kind comes from the endpoint or the which parameter.
    fn key(&self, update_kind: bool) -> Option<DraftKey> {
        let user_id = self.user_id.as_deref()?;
        let room_id = self.room_id.as_deref()?;
        Some(if update_kind {
            DraftKey::update(user_id, room_id)
        } else {
            DraftKey::incident(user_id, room_id)
        })
    }

    fn wants_update(&self) -> bool {
        self.which.as_deref() == Some("update")
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/incident", get(incident_status))
        .route("/service", get(select_service))
        .route("/status", get(service_status))
        .route("/update", get(update_status))
        .route("/process", get(process_step))
        .route("/command", post(command))
        .with_state(state)
}

/// GET /incident?userId=&roomId=&status=
async fn incident_status(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Html<&'static str> {
    match (query.key(false), query.status.clone()) {
        (Some(key), Some(status)) => {
            dispatch(&state, &key, WorkflowEvent::SetStatus { status }).await;
        }
        _ => warn!(?query, "Incident status callback missing parameters"),
    }
    Html(AUTO_CLOSING_PAGE)
}

/// GET /service?userId=&roomId=&service=
async fn select_service(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Html<&'static str> {
    match (query.key(false), query.service.clone()) {
        (Some(key), Some(name)) => {
            dispatch(&state, &key, WorkflowEvent::SelectService { name }).await;
        }
        _ => warn!(?query, "Service selection callback missing parameters"),
    }
    Html(AUTO_CLOSING_PAGE)
}

/// GET /status?userId=&roomId=&service=&status=
async fn service_status(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Html<&'static str> {
    match (query.key(false), query.service.clone(), query.status.clone()) {
        (Some(key), Some(name), Some(status)) => {
            dispatch(&state, &key, WorkflowEvent::SetServiceStatus { name, status }).await;
        }
        _ => warn!(?query, "Service status callback missing parameters"),
    }
    Html(AUTO_CLOSING_PAGE)
}

/// GET /update?userId=&roomId=&status=
async fn update_status(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Html<&'static str> {
    match (query.key(true), query.status.clone()) {
        (Some(key), Some(status)) => {
            dispatch(&state, &key, WorkflowEvent::SetStatus { status }).await;
        }
        _ => warn!(?query, "Update status callback missing parameters"),
    }
    Html(AUTO_CLOSING_PAGE)
}

/// GET /process?userId=&roomId=&step=&which=
async fn process_step(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Html<&'static str> {
    let key = query.key(query.wants_update());
    let step = query.step.as_deref().and_then(Step::parse);

    match (key, step) {
        (Some(key), Some(Step::Publish)) => {
            dispatch(&state, &key, WorkflowEvent::Publish).await;
        }
        (Some(key), Some(step)) => {
            dispatch(&state, &key, WorkflowEvent::Advance { step }).await;
        }
        _ => warn!(?query, "Process callback missing or unknown step"),
    }
    Html(AUTO_CLOSING_PAGE)
}

/// POST /command, the chat platform's outgoing slash-command webhook
async fn command(
    State(state): State<AppState>,
    Json(context): Json<CommandContext>,
) -> StatusCode {
    match state.commands.dispatch(context).await {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            error!(%err, "Command dispatch failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Run the event and deliver whatever chat output it produced. Callback
/// responses never carry the outcome, so failures only land in the log.
async fn dispatch(state: &AppState, key: &DraftKey, event: WorkflowEvent) {
    match state.engine.handle(key, event).await {
        Ok(effects) => {
            if let Err(err) = effects::deliver(effects, &state.notifier).await {
                error!(key = %key, %err, "Effect delivery failed");
            }
        }
        Err(err) => error!(key = %key, %err, "Workflow event failed"),
    }
}
