use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn, Instrument};

use crate::backend::models::MaintenanceWindow;
use crate::backend::StatusClient;
use crate::telemetry::create_workflow_span;

use super::draft::{Draft, GuardViolation, IncidentDraft, Step, UpdateDraft};
use super::effects::Effect;
use super::events::WorkflowEvent;
use super::key::DraftKey;
use super::render::MessageRenderer;
use super::store::{StoreError, WorkflowStore};
use super::vocabulary::StatusVocabulary;

/// Failures the engine cannot absorb. Everything user-facing is emitted
/// as an effect instead, so this only carries storage trouble.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow store failure: {0}")]
    Store(#[from] StoreError),
}

/// Drives drafts through their steps. Each call handles one trigger:
/// load the draft, apply the pure transition, persist, and return the
/// chat effects. Backend writes happen only on the publish path because
/// their outcome decides whether the draft survives.
pub struct WorkflowEngine {
    store: Arc<dyn WorkflowStore>,
    backend: StatusClient,
    vocabulary: StatusVocabulary,
    renderer: MessageRenderer,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        backend: StatusClient,
        vocabulary: StatusVocabulary,
        renderer: MessageRenderer,
    ) -> Self {
        Self {
            store,
            backend,
            vocabulary,
            renderer,
        }
    }

    /// Handle one event for one draft key
    pub async fn handle(
        &self,
        key: &DraftKey,
        event: WorkflowEvent,
    ) -> Result<Vec<Effect>, WorkflowError> {
        let span = create_workflow_span(event.name(), &key.user_id, &key.room_id, None);

        async move {
            match event {
                WorkflowEvent::Begin { title } => self.begin(key, title).await,
                WorkflowEvent::BeginUpdate {
                    incident_id,
                    actor_name,
                } => self.begin_update(key, incident_id, actor_name).await,
                WorkflowEvent::Publish
                | WorkflowEvent::Advance {
                    step: Step::Publish,
                } => self.publish(key).await,
                WorkflowEvent::Advance {
                    step: Step::Describe,
                } => self.prompt_explain(key).await,
                other => self.apply(key, other).await,
            }
        }
        .instrument(span)
        .await
    }

    /// Tear down whichever drafts the actor has open in this room.
    /// Always safe; reports when there was nothing to do.
    pub async fn abort(
        &self,
        user_id: &str,
        room_id: &str,
        actor_name: Option<&str>,
    ) -> Result<Vec<Effect>, WorkflowError> {
        let mut effects = Vec::new();

        for key in [
            DraftKey::incident(user_id, room_id),
            DraftKey::update(user_id, room_id),
        ] {
            if self.store.delete(&key).await? {
                info!(key = %key, "Draft aborted");
                effects.push(Effect::Post(
                    self.renderer.abort_confirmation(&key, actor_name),
                ));
            }
        }

        if effects.is_empty() {
            effects.push(Effect::Notify {
                user_id: user_id.to_string(),
                message: self.renderer.nothing_to_abort_notice(room_id),
            });
        }

        Ok(effects)
    }

    async fn begin(&self, key: &DraftKey, title: String) -> Result<Vec<Effect>, WorkflowError> {
        if self.store.get(key).await?.is_some() {
            info!(key = %key, "Draft already open, refusing to start another");
            return Ok(vec![self.notify(key, self.renderer.conflict_notice(key))]);
        }

        // Prompt rendering needs the service catalog. Fetch it before the
        // draft exists so a dead backend does not leave an orphan.
        let catalog = match self.backend.services().await {
            Ok(catalog) => catalog,
            Err(error) => {
                warn!(key = %key, %error, "Service catalog unavailable, not opening a draft");
                return Ok(vec![self.notify(
                    key,
                    self.renderer.backend_down_notice(&key.room_id, &error),
                )]);
            }
        };

        info!(key = %key, title = %title, "Starting incident creation");
        let draft = Draft::Incident(IncidentDraft::begin(title, Utc::now()));

        match self.store.put_if_version(key.clone(), draft, None).await {
            Ok(()) => {}
            Err(StoreError::VersionConflict { .. }) => {
                return Ok(vec![self.notify(key, self.renderer.conflict_notice(key))]);
            }
            Err(error) => return Err(error.into()),
        }

        Ok(vec![Effect::Post(self.renderer.begin_prompt(
            key,
            &catalog,
            &self.vocabulary,
        ))])
    }

    async fn begin_update(
        &self,
        key: &DraftKey,
        incident_id: u64,
        actor_name: Option<String>,
    ) -> Result<Vec<Effect>, WorkflowError> {
        if self.store.get(key).await?.is_some() {
            info!(key = %key, "Update draft already open, refusing to start another");
            return Ok(vec![self.notify(key, self.renderer.conflict_notice(key))]);
        }

        info!(key = %key, incident_id, "Starting incident update");

        let incident = match self.backend.incident(incident_id).await {
            Ok(incident) => incident,
            Err(error) if matches!(error, crate::backend::BackendError::IncidentNotFound { .. }) => {
                info!(key = %key, incident_id, "Incident not found, no draft created");
                return Ok(vec![self.notify(
                    key,
                    self.renderer.not_found_notice(&key.room_id, incident_id),
                )]);
            }
            Err(error) => {
                warn!(key = %key, %error, "Incident lookup failed, no draft created");
                return Ok(vec![self.notify(
                    key,
                    self.renderer.backend_down_notice(&key.room_id, &error),
                )]);
            }
        };

        let draft = Draft::Update(UpdateDraft::begin(incident, Utc::now()));

        match self.store.put_if_version(key.clone(), draft, None).await {
            Ok(()) => {}
            Err(StoreError::VersionConflict { .. }) => {
                return Ok(vec![self.notify(key, self.renderer.conflict_notice(key))]);
            }
            Err(error) => return Err(error.into()),
        }

        Ok(vec![Effect::Post(self.renderer.update_begin_prompt(
            key,
            actor_name.as_deref(),
            &self.vocabulary,
        ))])
    }

    /// Load, transition, persist. Guard rejections and version races are
    /// both dropped silently: the trigger was stale, the draft is intact.
    async fn apply(
        &self,
        key: &DraftKey,
        event: WorkflowEvent,
    ) -> Result<Vec<Effect>, WorkflowError> {
        let Some(stored) = self.store.get(key).await? else {
            warn!(key = %key, event = event.name(), "No draft for event, dropping");
            return Ok(vec![]);
        };

        let next = match Self::transition(stored.draft, &event, &self.vocabulary) {
            Ok(next) => next,
            Err(violation) => {
                warn!(key = %key, %violation, "Guard rejected event, dropping");
                return Ok(vec![]);
            }
        };

        match self
            .store
            .put_if_version(key.clone(), next.clone(), Some(stored.version))
            .await
        {
            Ok(()) => {}
            Err(StoreError::VersionConflict { .. }) => {
                warn!(key = %key, event = event.name(), "Draft changed mid-flight, dropping event");
                return Ok(vec![]);
            }
            Err(error) => return Err(error.into()),
        }

        info!(key = %key, event = event.name(), step = %next.step(), "Draft advanced");
        self.effects_for(key, &event, &next).await
    }

    /// The pure core: what the event does to the draft, with every
    /// precondition rechecked against the state that was actually loaded
    fn transition(
        draft: Draft,
        event: &WorkflowEvent,
        vocabulary: &StatusVocabulary,
    ) -> Result<Draft, GuardViolation> {
        let now = Utc::now();

        match (draft, event) {
            (Draft::Incident(d), WorkflowEvent::SetStatus { status }) => {
                d.set_status(vocabulary, status).map(Draft::Incident)
            }
            (Draft::Update(d), WorkflowEvent::SetStatus { status }) => {
                d.set_status(vocabulary, status).map(Draft::Update)
            }
            (Draft::Incident(d), WorkflowEvent::SetMaintenance { start, end }) => d
                .set_maintenance(MaintenanceWindow {
                    start: *start,
                    end: *end,
                })
                .map(Draft::Incident),
            (Draft::Incident(d), WorkflowEvent::Describe { message }) => {
                d.describe(message.clone(), now).map(Draft::Incident)
            }
            (Draft::Update(d), WorkflowEvent::Explain { message }) => {
                d.explain(message.clone(), now).map(Draft::Update)
            }
            (Draft::Incident(d), WorkflowEvent::SelectService { name }) => {
                d.select_service(name.clone()).map(Draft::Incident)
            }
            (Draft::Update(d), WorkflowEvent::SelectService { name }) => {
                d.select_service(name.clone()).map(Draft::Update)
            }
            (Draft::Incident(d), WorkflowEvent::SetServiceStatus { name, status }) => d
                .set_service_status(vocabulary, name, status)
                .map(Draft::Incident),
            (Draft::Update(d), WorkflowEvent::SetServiceStatus { name, status }) => d
                .set_service_status(vocabulary, name, status)
                .map(Draft::Update),
            (
                Draft::Incident(d),
                WorkflowEvent::Advance {
                    step: Step::Services,
                },
            ) => d.advance_to_services().map(Draft::Incident),
            (
                Draft::Incident(d),
                WorkflowEvent::Advance {
                    step: Step::Status,
                },
            ) => d.advance_to_status().map(Draft::Incident),
            (
                Draft::Incident(d),
                WorkflowEvent::Advance {
                    step: Step::Review,
                },
            ) => d.advance_to_review().map(Draft::Incident),
            (draft, event) => Err(GuardViolation::new(
                event.name(),
                format!(
                    "event does not apply to a {} draft at {}",
                    draft.kind().as_str(),
                    draft.step()
                ),
            )),
        }
    }

    /// Chat output owed after a successful transition. Button clicks that
    /// only record data produce none; step changes produce the next prompt.
    async fn effects_for(
        &self,
        key: &DraftKey,
        event: &WorkflowEvent,
        draft: &Draft,
    ) -> Result<Vec<Effect>, WorkflowError> {
        match (event, draft) {
            (WorkflowEvent::Describe { .. }, Draft::Incident(_))
            | (
                WorkflowEvent::Advance {
                    step: Step::Services,
                },
                Draft::Incident(_),
            ) => match self.backend.services().await {
                Ok(catalog) => Ok(vec![Effect::Post(
                    self.renderer.service_selection_prompt(key, &catalog),
                )]),
                Err(error) => {
                    warn!(key = %key, %error, "Service catalog unavailable for prompt");
                    Ok(vec![self.notify(
                        key,
                        self.renderer.backend_down_notice(&key.room_id, &error),
                    )])
                }
            },
            (
                WorkflowEvent::Advance {
                    step: Step::Status,
                },
                Draft::Incident(d),
            ) => Ok(vec![Effect::Post(self.renderer.status_selection_prompt(
                key,
                d,
                &self.vocabulary,
            ))]),
            (
                WorkflowEvent::Advance {
                    step: Step::Review,
                },
                Draft::Incident(d),
            ) => Ok(vec![Effect::Post(self.renderer.review_prompt(key, d))]),
            (WorkflowEvent::Explain { .. }, Draft::Update(d)) => {
                Ok(vec![Effect::Post(self.renderer.update_review_prompt(key, d))])
            }
            _ => Ok(vec![]),
        }
    }

    /// Update-kind describe step: no state change, just the pointer to the
    /// explain command. Dropped unless the update status is already set.
    async fn prompt_explain(&self, key: &DraftKey) -> Result<Vec<Effect>, WorkflowError> {
        let Some(stored) = self.store.get(key).await? else {
            warn!(key = %key, "No draft to prompt an explanation for, dropping");
            return Ok(vec![]);
        };

        match &stored.draft {
            Draft::Update(UpdateDraft::Creation {
                status: Some(_), ..
            }) => Ok(vec![Effect::Post(
                self.renderer.explain_prompt(&key.room_id),
            )]),
            other => {
                warn!(
                    key = %key,
                    step = %other.step(),
                    "Explain prompt does not apply, dropping"
                );
                Ok(vec![])
            }
        }
    }

    /// Terminal commit. Success deletes the draft; any backend failure
    /// leaves it at Review so the publish link can simply be clicked again.
    async fn publish(&self, key: &DraftKey) -> Result<Vec<Effect>, WorkflowError> {
        let Some(stored) = self.store.get(key).await? else {
            info!(key = %key, "Publish with no draft, nothing to do");
            return Ok(vec![]);
        };

        match stored.draft {
            Draft::Incident(draft) => {
                let payload = match draft.publish_payload() {
                    Ok(payload) => payload,
                    Err(violation) => {
                        warn!(key = %key, %violation, "Publish rejected, dropping");
                        return Ok(vec![]);
                    }
                };

                match self.backend.create_incident(&payload).await {
                    Ok(incident) => {
                        self.store.delete(key).await?;
                        info!(key = %key, incident_id = incident.id, "Incident published");
                        Ok(vec![Effect::Post(
                            self.renderer.published_message(&key.room_id, incident.id),
                        )])
                    }
                    Err(error) => {
                        warn!(key = %key, %error, "Incident publish failed, draft kept at review");
                        Ok(vec![self.notify(
                            key,
                            self.renderer.publish_failed_notice(&key.room_id, &error),
                        )])
                    }
                }
            }
            Draft::Update(draft) => {
                let (incident_id, payload) = match draft.publish_payload() {
                    Ok(pair) => pair,
                    Err(violation) => {
                        warn!(key = %key, %violation, "Update publish rejected, dropping");
                        return Ok(vec![]);
                    }
                };

                match self.backend.create_update(incident_id, &payload).await {
                    Ok(incident) => {
                        self.store.delete(key).await?;
                        info!(key = %key, incident_id = incident.id, "Incident update published");
                        Ok(vec![Effect::Post(
                            self.renderer
                                .update_published_message(&key.room_id, incident.id),
                        )])
                    }
                    Err(error) => {
                        warn!(key = %key, %error, "Update publish failed, draft kept at review");
                        Ok(vec![self.notify(
                            key,
                            self.renderer.publish_failed_notice(&key.room_id, &error),
                        )])
                    }
                }
            }
        }
    }

    fn notify(&self, key: &DraftKey, message: crate::chat::ChatMessage) -> Effect {
        Effect::Notify {
            user_id: key.user_id.clone(),
            message,
        }
    }
}
