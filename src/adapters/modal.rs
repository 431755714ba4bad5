use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::models::{
    Incident, MaintenanceWindow, NewIncident, NewIncidentUpdate, Service, ServicePatch,
};
use crate::backend::{BackendError, StatusClient};
use crate::chat::{Block, ChatMessage, ModalView, Notifier, NotifyError, SelectOption};
use crate::workflow::StatusVocabulary;

pub const CREATE_VIEW_ID: &str = "incident_create_view";
pub const CLOSE_VIEW_ID: &str = "incident_close_view";

#[derive(Debug, Error)]
pub enum ModalError {
    #[error("no open modal session {0}")]
    UnknownSession(String),

    #[error("form is incomplete: {reason}")]
    IncompleteForm { reason: String },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// One partial interaction inside an open form
#[derive(Debug, Clone, PartialEq)]
pub enum ModalInteraction {
    SetTitle(String),
    SetStatus(String),
    SetSupporters(Vec<String>),
    SetServices(Vec<u64>),
    SetServiceStatus { service_id: u64, status: String },
    SetMaintenanceStart(i64),
    SetMaintenanceEnd(i64),
    SetCloseField { field: CloseField, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseField {
    Summary,
    Impact,
    Causes,
    Resolution,
    Detection,
}

/// State of one open create form
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub user_id: String,
    pub username: Option<String>,
    pub room_id: String,
    pub room_members: Vec<String>,
    /// Reference data snapshot taken when the form opened
    pub services: Vec<Service>,
    pub form: CreateForm,
}

#[derive(Debug, Clone, Default)]
pub struct CreateForm {
    pub title: String,
    pub status: Option<String>,
    pub supporters: Vec<String>,
    pub selected_services: Vec<u64>,
    pub service_statuses: HashMap<u64, String>,
    /// Unix timestamps, the way the form collects them
    pub maintenance_start: Option<i64>,
    pub maintenance_end: Option<i64>,
}

/// State of one open close form
#[derive(Debug, Clone)]
pub struct CloseSession {
    pub user_id: String,
    pub username: Option<String>,
    pub room_id: String,
    pub incident: Incident,
    pub form: CloseForm,
}

#[derive(Debug, Clone, Default)]
pub struct CloseForm {
    pub summary: String,
    pub impact: String,
    pub causes: String,
    pub resolution: String,
    pub detection: String,
}

#[derive(Debug, Clone)]
enum ModalSession {
    Create(CreateSession),
    Close(CloseSession),
}

/// Interactive-form front end. Sessions are keyed per open view instance
/// so any number of actors can have forms open at once; the only shared
/// thing is the map itself.
pub struct ModalSessions {
    backend: StatusClient,
    notifier: Arc<dyn Notifier>,
    vocabulary: StatusVocabulary,
    alias: String,
    sessions: Mutex<HashMap<String, ModalSession>>,
}

impl ModalSessions {
    pub fn new(
        backend: StatusClient,
        notifier: Arc<dyn Notifier>,
        vocabulary: StatusVocabulary,
        alias: &str,
    ) -> Self {
        Self {
            backend,
            notifier,
            vocabulary,
            alias: alias.to_string(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn open_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Open a create form for one actor. Fetches the reference data the
    /// form needs, registers the session and pushes the rendered view.
    pub async fn open_create(
        &self,
        user_id: &str,
        username: Option<&str>,
        room_id: &str,
        room_members: Vec<String>,
    ) -> Result<ModalView, ModalError> {
        let services = self.backend.services().await?;

        let session = CreateSession {
            user_id: user_id.to_string(),
            username: username.map(str::to_string),
            room_id: room_id.to_string(),
            room_members,
            services,
            form: CreateForm::default(),
        };

        let session_id = Uuid::new_v4().to_string();
        let view = render_create(&session_id, &session, &self.vocabulary);

        self.sessions
            .lock()
            .await
            .insert(session_id.clone(), ModalSession::Create(session));
        info!(session_id = %session_id, user_id = %user_id, "Opened incident create form");

        self.notifier.open_modal(user_id, view.clone()).await?;
        Ok(view)
    }

    /// Open a close form for an existing incident
    pub async fn open_close(
        &self,
        user_id: &str,
        username: Option<&str>,
        room_id: &str,
        incident_id: u64,
    ) -> Result<ModalView, ModalError> {
        let incident = self.backend.incident(incident_id).await?;

        let session = CloseSession {
            user_id: user_id.to_string(),
            username: username.map(str::to_string),
            room_id: room_id.to_string(),
            incident,
            form: CloseForm::default(),
        };

        let session_id = Uuid::new_v4().to_string();
        let view = render_close(&session_id, &session);

        self.sessions
            .lock()
            .await
            .insert(session_id.clone(), ModalSession::Close(session));
        info!(session_id = %session_id, user_id = %user_id, incident_id, "Opened incident close form");

        self.notifier.open_modal(user_id, view.clone()).await?;
        Ok(view)
    }

    /// Apply one partial interaction and hand back the re-rendered view
    pub async fn update(
        &self,
        session_id: &str,
        interaction: ModalInteraction,
    ) -> Result<ModalView, ModalError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| ModalError::UnknownSession(session_id.to_string()))?;

        match (session, interaction) {
            (ModalSession::Create(create), interaction) => {
                apply_create_interaction(&mut create.form, interaction)?;
                Ok(render_create(session_id, create, &self.vocabulary))
            }
            (ModalSession::Close(close), ModalInteraction::SetCloseField { field, value }) => {
                apply_close_field(&mut close.form, field, value);
                Ok(render_close(session_id, close))
            }
            (ModalSession::Close(_), other) => {
                warn!(session_id = %session_id, ?other, "Interaction does not fit the close form");
                Err(ModalError::IncompleteForm {
                    reason: "interaction does not belong to this form".to_string(),
                })
            }
        }
    }

    /// Final submission. Funnels into the same backend create and update
    /// calls as the chat-driven flow and announces the result to the room.
    pub async fn submit(&self, session_id: &str) -> Result<(), ModalError> {
        let session = {
            let sessions = self.sessions.lock().await;
            sessions
                .get(session_id)
                .cloned()
                .ok_or_else(|| ModalError::UnknownSession(session_id.to_string()))?
        };

        let result = match &session {
            ModalSession::Create(create) => self.submit_create(create).await,
            ModalSession::Close(close) => self.submit_close(close).await,
        };

        // The session only closes on success; a failed submit leaves the
        // form open for another attempt.
        if result.is_ok() {
            self.sessions.lock().await.remove(session_id);
        }

        result
    }

    async fn submit_create(&self, session: &CreateSession) -> Result<(), ModalError> {
        let form = &session.form;

        if form.title.trim().is_empty() {
            return Err(ModalError::IncompleteForm {
                reason: "the incident needs a title".to_string(),
            });
        }
        let status = form.status.clone().ok_or_else(|| ModalError::IncompleteForm {
            reason: "the incident needs a status".to_string(),
        })?;

        let selected: Vec<&Service> = session
            .services
            .iter()
            .filter(|s| form.selected_services.contains(&s.id))
            .collect();

        let is_maintenance = self.vocabulary.is_maintenance(&status);

        let (services, maintenance) = if is_maintenance {
            let start = form.maintenance_start.ok_or_else(|| ModalError::IncompleteForm {
                reason: "the maintenance window needs a start time".to_string(),
            })?;
            let end = form.maintenance_end.ok_or_else(|| ModalError::IncompleteForm {
                reason: "the maintenance window needs an end time".to_string(),
            })?;

            let services = selected
                .iter()
                .map(|s| ServicePatch {
                    name: s.name.clone(),
                    status: None,
                })
                .collect();

            (
                services,
                Some(MaintenanceWindow {
                    start: timestamp(start),
                    end: timestamp(end),
                }),
            )
        } else {
            if selected.is_empty() {
                return Err(ModalError::IncompleteForm {
                    reason: "select at least one affected service".to_string(),
                });
            }

            let services = selected
                .iter()
                .map(|s| ServicePatch {
                    name: s.name.clone(),
                    status: form
                        .service_statuses
                        .get(&s.id)
                        .cloned()
                        .map(|raw| self.vocabulary.service_status(&raw)),
                })
                .collect();

            (services, None)
        };

        let payload = NewIncident {
            time: Utc::now(),
            title: form.title.clone(),
            status,
            services,
            updates: Vec::new(),
            maintenance,
        };

        let incident = match self.backend.create_incident(&payload).await {
            Ok(incident) => incident,
            Err(error) => {
                self.notifier
                    .post(ChatMessage::new(
                        &session.room_id,
                        &self.alias,
                        "An error occured during the incident creation. Please, try again later",
                    ))
                    .await?;
                return Err(error.into());
            }
        };

        info!(incident_id = incident.id, "Incident created from modal form");

        let owner = session.username.as_deref().unwrap_or(&session.user_id);
        let supporters = if form.supporters.is_empty() {
            "none requested".to_string()
        } else {
            form.supporters
                .iter()
                .map(|u| format!("@{u}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let service_lines = incident
            .services
            .iter()
            .map(|s| {
                format!(
                    "- *{}*: _{}_",
                    s.name,
                    s.status.as_deref().unwrap_or("Unknown")
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let text = format!(
            "We have a new incident with ID *{}*: *{}*\n\n\
             *Created at*: {}\n*Owner*: @{}\n*Support requested from*: {}\n\
             *Description*: _*{}*_\n*Services affected*:\n{}",
            incident.id,
            incident.status.to_uppercase(),
            incident.time.to_rfc2822(),
            owner,
            supporters,
            incident.title,
            service_lines,
        );

        self.notifier
            .post(ChatMessage::new(&session.room_id, &self.alias, text))
            .await?;
        Ok(())
    }

    async fn submit_close(&self, session: &CloseSession) -> Result<(), ModalError> {
        let resolved = self
            .vocabulary
            .incident_status("Resolved")
            .unwrap_or_else(|| {
                self.vocabulary
                    .incident_statuses()
                    .last()
                    .cloned()
                    .unwrap_or_else(|| "Resolved".to_string())
            });

        let payload = NewIncidentUpdate {
            time: Utc::now(),
            status: resolved,
            message: "Incident solved. Affected services are operational.".to_string(),
            services: session.incident.services.clone(),
        };

        if let Err(error) = self.backend.create_update(session.incident.id, &payload).await {
            self.notifier
                .post(ChatMessage::new(
                    &session.room_id,
                    &self.alias,
                    "An error occured during the incident update in statuscentral. Please, try again later",
                ))
                .await?;
            return Err(error.into());
        }

        info!(incident_id = session.incident.id, "Incident closed from modal form");

        let form = &session.form;
        let services = session
            .incident
            .services
            .iter()
            .map(|s| format!("_{}_", s.name))
            .collect::<Vec<_>>()
            .join(", ");
        let timeline = session
            .incident
            .updates
            .iter()
            .map(|u| format!("- {}: {}", u.time.to_rfc2822(), u.message))
            .collect::<Vec<_>>()
            .join("\n");

        let text = format!(
            "The incident *{}* was solved 🚀\n\n\
             *Created at*: {}\n*Solved at*: {}\n*Description*: {}\n*Status*: _{}_\n\
             *Services*: {}\n*Summary*: {}\n*Impact*: {}\n*Causes*: {}\n\
             *Resolution*: {}\n*Detection*: {}\n*Timeline*:\n{}",
            session.incident.id,
            session.incident.time.to_rfc2822(),
            Utc::now().to_rfc2822(),
            session.incident.title,
            session.incident.status,
            services,
            form.summary,
            form.impact,
            form.causes,
            form.resolution,
            form.detection,
            timeline,
        );

        self.notifier
            .post(ChatMessage::new(&session.room_id, &self.alias, text))
            .await?;
        Ok(())
    }
}

fn apply_create_interaction(
    form: &mut CreateForm,
    interaction: ModalInteraction,
) -> Result<(), ModalError> {
    match interaction {
        ModalInteraction::SetTitle(title) => form.title = title,
        ModalInteraction::SetStatus(status) => form.status = Some(status),
        ModalInteraction::SetSupporters(supporters) => form.supporters = supporters,
        ModalInteraction::SetServices(ids) => {
            form.service_statuses.retain(|id, _| ids.contains(id));
            form.selected_services = ids;
        }
        ModalInteraction::SetServiceStatus { service_id, status } => {
            form.service_statuses.insert(service_id, status);
        }
        ModalInteraction::SetMaintenanceStart(ts) => form.maintenance_start = Some(ts),
        ModalInteraction::SetMaintenanceEnd(ts) => form.maintenance_end = Some(ts),
        ModalInteraction::SetCloseField { .. } => {
            return Err(ModalError::IncompleteForm {
                reason: "interaction does not belong to this form".to_string(),
            });
        }
    }
    Ok(())
}

fn apply_close_field(form: &mut CloseForm, field: CloseField, value: String) {
    match field {
        CloseField::Summary => form.summary = value,
        CloseField::Impact => form.impact = value,
        CloseField::Causes => form.causes = value,
        CloseField::Resolution => form.resolution = value,
        CloseField::Detection => form.detection = value,
    }
}

fn timestamp(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).single().unwrap_or_else(Utc::now)
}

/// Pure render of the create form. Selecting a status or services grows
/// the view with the dependent sub-fields, which is why interactions
/// re-render instead of mutating blocks in place.
pub fn render_create(
    session_id: &str,
    session: &CreateSession,
    vocabulary: &StatusVocabulary,
) -> ModalView {
    let form = &session.form;
    let mut blocks = vec![
        Block::Input {
            block_id: "vinc_title_input".to_string(),
            label: "Inform the incident description".to_string(),
            initial_value: (!form.title.is_empty()).then(|| form.title.clone()),
            multiline: false,
        },
        Block::Section {
            text: "Inform the incident status".to_string(),
        },
        Block::Select {
            block_id: "vinc_status_static".to_string(),
            placeholder: "Select the incident status".to_string(),
            options: status_options(vocabulary),
            selected: form.status.clone(),
        },
    ];

    let maintenance_selected = form
        .status
        .as_deref()
        .map(|s| vocabulary.is_maintenance(s))
        .unwrap_or(false);

    if maintenance_selected {
        blocks.push(Block::Divider);
        blocks.push(Block::Input {
            block_id: "vinc_schedule_start_input".to_string(),
            label: "Inform the maintenance start time (Unix timestamp)".to_string(),
            initial_value: form.maintenance_start.map(|ts| ts.to_string()),
            multiline: false,
        });
        blocks.push(Block::Input {
            block_id: "vinc_schedule_end_input".to_string(),
            label: "Inform the maintenance predicted end time (Unix timestamp)".to_string(),
            initial_value: form.maintenance_end.map(|ts| ts.to_string()),
            multiline: false,
        });
    }

    blocks.push(Block::Divider);
    blocks.push(Block::Section {
        text: "Inform the users that may support you with the resolution".to_string(),
    });
    blocks.push(Block::MultiSelect {
        block_id: "vinc_users_multi".to_string(),
        placeholder: "Select the users".to_string(),
        options: session
            .room_members
            .iter()
            .map(|member| SelectOption {
                label: member.clone(),
                value: member.clone(),
            })
            .collect(),
        selected: form.supporters.clone(),
    });
    blocks.push(Block::Divider);
    blocks.push(Block::Section {
        text: "Inform the affected services".to_string(),
    });
    blocks.push(Block::MultiSelect {
        block_id: "vinc_services_multi".to_string(),
        placeholder: "Select the affected services".to_string(),
        options: session
            .services
            .iter()
            .map(|service| SelectOption {
                label: service.name.clone(),
                value: service.id.to_string(),
            })
            .collect(),
        selected: form
            .selected_services
            .iter()
            .map(|id| id.to_string())
            .collect(),
    });
    blocks.push(Block::Divider);

    if !form.selected_services.is_empty() && form.status.is_some() && !maintenance_selected {
        for id in &form.selected_services {
            let Some(service) = session.services.iter().find(|s| s.id == *id) else {
                continue;
            };
            blocks.push(Block::Section {
                text: format!("Inform the {} status", service.name),
            });
            blocks.push(Block::Select {
                block_id: format!("vinc_services_{id}_status_static"),
                placeholder: "Select the status".to_string(),
                options: vocabulary
                    .service_statuses()
                    .iter()
                    .map(|status| SelectOption {
                        label: status.clone(),
                        value: status.clone(),
                    })
                    .collect(),
                selected: form.service_statuses.get(id).cloned(),
            });
        }
    }

    ModalView {
        id: CREATE_VIEW_ID.to_string(),
        session_id: session_id.to_string(),
        title: "Create an incident".to_string(),
        submit_label: "Create".to_string(),
        blocks,
    }
}

/// Incident status choices for the form. The maintenance status is
/// offered even when the incident vocabulary does not list it, since it
/// routes the form down the maintenance-window branch.
fn status_options(vocabulary: &StatusVocabulary) -> Vec<SelectOption> {
    let mut statuses: Vec<String> = vocabulary.incident_statuses().to_vec();
    if !statuses.iter().any(|s| vocabulary.is_maintenance(s)) {
        statuses.push(
            vocabulary
                .service_statuses()
                .iter()
                .find(|s| vocabulary.is_maintenance(s))
                .cloned()
                .unwrap_or_else(|| "Scheduled Maintenance".to_string()),
        );
    }
    statuses
        .into_iter()
        .map(|status| SelectOption {
            label: status.clone(),
            value: status,
        })
        .collect()
}

/// Pure render of the close form's post-mortem fields
pub fn render_close(session_id: &str, session: &CloseSession) -> ModalView {
    let form = &session.form;
    let field = |block_id: &str, label: &str, value: &str| Block::Input {
        block_id: block_id.to_string(),
        label: label.to_string(),
        initial_value: (!value.is_empty()).then(|| value.to_string()),
        multiline: true,
    };

    ModalView {
        id: CLOSE_VIEW_ID.to_string(),
        session_id: session_id.to_string(),
        title: format!("Close incident {}", session.incident.id),
        submit_label: "Close".to_string(),
        blocks: vec![
            Block::Section {
                text: format!("*{}*: {}", session.incident.id, session.incident.title),
            },
            field("vinc_summary_input", "Inform the incident summary", &form.summary),
            field("vinc_impact_input", "Inform the incident impact", &form.impact),
            field("vinc_causes_input", "Inform the incident causes", &form.causes),
            field(
                "vinc_resolution_input",
                "Inform the incident resolution",
                &form.resolution,
            ),
            field(
                "vinc_detection_input",
                "Inform how the incident was detected",
                &form.detection,
            ),
        ],
    }
}
