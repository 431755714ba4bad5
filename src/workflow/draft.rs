use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::models::{
    Incident, MaintenanceWindow, NewIncident, NewIncidentUpdate, ServicePatch, UpdateEntry,
};

use super::key::DraftKind;
use super::vocabulary::StatusVocabulary;

/// The stages a draft walks through. Order matters: a draft never moves
/// to an earlier step, only Abort leaves the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    Creation,
    Describe,
    Services,
    Status,
    Review,
    Publish,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Creation => "creation",
            Step::Describe => "describe",
            Step::Services => "services",
            Step::Status => "status",
            Step::Review => "review",
            Step::Publish => "publish",
        }
    }

    pub fn parse(raw: &str) -> Option<Step> {
        match raw.to_ascii_lowercase().as_str() {
            "creation" => Some(Step::Creation),
            "describe" => Some(Step::Describe),
            "services" => Some(Step::Services),
            "status" => Some(Step::Status),
            "review" => Some(Step::Review),
            "publish" => Some(Step::Publish),
            _ => None,
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A precondition that did not hold. These are logged and dropped, never
/// surfaced to the user: callback links are retriable GETs and a stale or
/// double click must not corrupt the draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardViolation {
    pub operation: &'static str,
    pub reason: String,
}

impl GuardViolation {
    pub(crate) fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for GuardViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} rejected: {}", self.operation, self.reason)
    }
}

/// Payload shared by every incident draft step past Creation. Once the
/// status is set it is no longer optional, so later steps cannot lose it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentBody {
    pub opened_at: DateTime<Utc>,
    pub title: String,
    pub status: String,
    pub updates: Vec<UpdateEntry>,
    pub services: Vec<ServicePatch>,
    pub maintenance: Option<MaintenanceWindow>,
}

/// Incident creation draft. One variant per step keeps illegal states out
/// of the store: a Review draft always has a status, and its service list
/// or maintenance window was checked on the way in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IncidentDraft {
    Creation {
        opened_at: DateTime<Utc>,
        title: String,
        status: Option<String>,
        services: Vec<ServicePatch>,
        maintenance: Option<MaintenanceWindow>,
    },
    Describe {
        body: IncidentBody,
    },
    Services {
        body: IncidentBody,
    },
    Status {
        body: IncidentBody,
    },
    Review {
        body: IncidentBody,
    },
}

impl IncidentDraft {
    pub fn begin(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        IncidentDraft::Creation {
            opened_at: now,
            title: title.into(),
            status: None,
            services: Vec::new(),
            maintenance: None,
        }
    }

    pub fn step(&self) -> Step {
        match self {
            IncidentDraft::Creation { .. } => Step::Creation,
            IncidentDraft::Describe { .. } => Step::Describe,
            IncidentDraft::Services { .. } => Step::Services,
            IncidentDraft::Status { .. } => Step::Status,
            IncidentDraft::Review { .. } => Step::Review,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            IncidentDraft::Creation { title, .. } => title,
            IncidentDraft::Describe { body }
            | IncidentDraft::Services { body }
            | IncidentDraft::Status { body }
            | IncidentDraft::Review { body } => &body.title,
        }
    }

    pub fn services(&self) -> &[ServicePatch] {
        match self {
            IncidentDraft::Creation { services, .. } => services,
            IncidentDraft::Describe { body }
            | IncidentDraft::Services { body }
            | IncidentDraft::Status { body }
            | IncidentDraft::Review { body } => &body.services,
        }
    }

    /// Set the incident status. Only valid while the draft is still in
    /// Creation; the value must come from the configured vocabulary.
    pub fn set_status(
        self,
        vocabulary: &StatusVocabulary,
        raw: &str,
    ) -> Result<Self, GuardViolation> {
        match self {
            IncidentDraft::Creation {
                opened_at,
                title,
                services,
                maintenance,
                ..
            } => {
                let status = vocabulary.incident_status(raw).ok_or_else(|| {
                    GuardViolation::new("set_status", format!("unknown incident status '{raw}'"))
                })?;
                Ok(IncidentDraft::Creation {
                    opened_at,
                    title,
                    status: Some(status),
                    services,
                    maintenance,
                })
            }
            other => Err(GuardViolation::new(
                "set_status",
                format!("draft is at {}, status is fixed after creation", other.step()),
            )),
        }
    }

    /// Record a maintenance window. Only valid at Creation.
    pub fn set_maintenance(self, window: MaintenanceWindow) -> Result<Self, GuardViolation> {
        match self {
            IncidentDraft::Creation {
                opened_at,
                title,
                status,
                services,
                ..
            } => Ok(IncidentDraft::Creation {
                opened_at,
                title,
                status,
                services,
                maintenance: Some(window),
            }),
            other => Err(GuardViolation::new(
                "set_maintenance",
                format!("draft is at {}", other.step()),
            )),
        }
    }

    /// Append the first narrative entry and advance to Describe. Requires
    /// the status to be set so the entry can carry it.
    pub fn describe(
        self,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, GuardViolation> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(GuardViolation::new("describe", "empty message"));
        }

        match self {
            IncidentDraft::Creation {
                opened_at,
                title,
                status: Some(status),
                services,
                maintenance,
            } => {
                let updates = vec![UpdateEntry {
                    time: now,
                    status: status.clone(),
                    message,
                }];
                Ok(IncidentDraft::Describe {
                    body: IncidentBody {
                        opened_at,
                        title,
                        status,
                        updates,
                        services,
                        maintenance,
                    },
                })
            }
            IncidentDraft::Creation { status: None, .. } => Err(GuardViolation::new(
                "describe",
                "incident status has not been set yet",
            )),
            other => Err(GuardViolation::new(
                "describe",
                format!("draft is already at {}", other.step()),
            )),
        }
    }

    /// Idempotent set-insert of an affected service. Never changes the
    /// step; rejected once status selection has started.
    pub fn select_service(self, name: impl Into<String>) -> Result<Self, GuardViolation> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(GuardViolation::new("select_service", "empty service name"));
        }

        fn insert(services: &mut Vec<ServicePatch>, name: String) {
            if !services.iter().any(|s| s.name == name) {
                services.push(ServicePatch { name, status: None });
            }
        }

        match self {
            IncidentDraft::Creation {
                opened_at,
                title,
                status,
                mut services,
                maintenance,
            } => {
                insert(&mut services, name);
                Ok(IncidentDraft::Creation {
                    opened_at,
                    title,
                    status,
                    services,
                    maintenance,
                })
            }
            IncidentDraft::Describe { mut body } => {
                insert(&mut body.services, name);
                Ok(IncidentDraft::Describe { body })
            }
            IncidentDraft::Services { mut body } => {
                insert(&mut body.services, name);
                Ok(IncidentDraft::Services { body })
            }
            other => Err(GuardViolation::new(
                "select_service",
                format!("selection is closed at {}", other.step()),
            )),
        }
    }

    /// Set the status of an already-selected service. Unknown status
    /// values degrade to the vocabulary's fallback.
    pub fn set_service_status(
        self,
        vocabulary: &StatusVocabulary,
        name: &str,
        raw: &str,
    ) -> Result<Self, GuardViolation> {
        let status = vocabulary.service_status(raw);

        fn apply(
            services: &mut [ServicePatch],
            name: &str,
            status: String,
        ) -> Result<(), GuardViolation> {
            match services.iter_mut().find(|s| s.name == name) {
                Some(service) => {
                    service.status = Some(status);
                    Ok(())
                }
                None => Err(GuardViolation::new(
                    "set_service_status",
                    format!("service '{name}' is not part of the draft"),
                )),
            }
        }

        match self {
            IncidentDraft::Creation {
                opened_at,
                title,
                status: incident_status,
                mut services,
                maintenance,
            } => {
                apply(&mut services, name, status)?;
                Ok(IncidentDraft::Creation {
                    opened_at,
                    title,
                    status: incident_status,
                    services,
                    maintenance,
                })
            }
            IncidentDraft::Describe { mut body } => {
                apply(&mut body.services, name, status)?;
                Ok(IncidentDraft::Describe { body })
            }
            IncidentDraft::Services { mut body } => {
                apply(&mut body.services, name, status)?;
                Ok(IncidentDraft::Services { body })
            }
            IncidentDraft::Status { mut body } => {
                apply(&mut body.services, name, status)?;
                Ok(IncidentDraft::Status { body })
            }
            other => Err(GuardViolation::new(
                "set_service_status",
                format!("statuses are frozen at {}", other.step()),
            )),
        }
    }

    /// Enter (or re-enter) the service selection step
    pub fn advance_to_services(self) -> Result<Self, GuardViolation> {
        match self {
            IncidentDraft::Describe { body } | IncidentDraft::Services { body } => {
                Ok(IncidentDraft::Services { body })
            }
            other => Err(GuardViolation::new(
                "advance_to_services",
                format!("cannot reach service selection from {}", other.step()),
            )),
        }
    }

    /// Enter status selection. Requires at least one selected service,
    /// unless a maintenance window stands in for the service list.
    pub fn advance_to_status(self) -> Result<Self, GuardViolation> {
        match self {
            IncidentDraft::Describe { body } | IncidentDraft::Services { body } => {
                if body.services.is_empty() && body.maintenance.is_none() {
                    return Err(GuardViolation::new(
                        "advance_to_status",
                        "no services selected",
                    ));
                }
                Ok(IncidentDraft::Status { body })
            }
            other => Err(GuardViolation::new(
                "advance_to_status",
                format!("cannot reach status selection from {}", other.step()),
            )),
        }
    }

    /// Enter review. The full precondition chain is rechecked here even
    /// though earlier guards already held, because the triggering link may
    /// be a replay.
    pub fn advance_to_review(self) -> Result<Self, GuardViolation> {
        match self {
            IncidentDraft::Status { body } => {
                if body.services.is_empty() && body.maintenance.is_none() {
                    return Err(GuardViolation::new(
                        "advance_to_review",
                        "neither services nor a maintenance window are set",
                    ));
                }
                Ok(IncidentDraft::Review { body })
            }
            other => Err(GuardViolation::new(
                "advance_to_review",
                format!("cannot reach review from {}", other.step()),
            )),
        }
    }

    /// Backend payload for the terminal publish. Only a Review draft with
    /// populated services or a maintenance window may produce one.
    pub fn publish_payload(&self) -> Result<NewIncident, GuardViolation> {
        match self {
            IncidentDraft::Review { body } => {
                if body.services.is_empty() && body.maintenance.is_none() {
                    return Err(GuardViolation::new(
                        "publish",
                        "review draft has neither services nor a maintenance window",
                    ));
                }
                Ok(NewIncident {
                    time: body.opened_at,
                    title: body.title.clone(),
                    status: body.status.clone(),
                    services: body.services.clone(),
                    updates: body.updates.clone(),
                    maintenance: body.maintenance,
                })
            }
            other => Err(GuardViolation::new(
                "publish",
                format!("draft is at {}, not review", other.step()),
            )),
        }
    }
}

/// Draft for an update to an already-published incident. The explain
/// operation records the message and lands directly at Review, so only
/// two shapes are ever persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpdateDraft {
    Creation {
        incident: Incident,
        opened_at: DateTime<Utc>,
        status: Option<String>,
        services: Vec<ServicePatch>,
    },
    Review {
        incident: Incident,
        opened_at: DateTime<Utc>,
        status: String,
        message: String,
        services: Vec<ServicePatch>,
    },
}

impl UpdateDraft {
    pub fn begin(incident: Incident, now: DateTime<Utc>) -> Self {
        UpdateDraft::Creation {
            incident,
            opened_at: now,
            status: None,
            services: Vec::new(),
        }
    }

    pub fn step(&self) -> Step {
        match self {
            UpdateDraft::Creation { .. } => Step::Creation,
            UpdateDraft::Review { .. } => Step::Review,
        }
    }

    pub fn incident(&self) -> &Incident {
        match self {
            UpdateDraft::Creation { incident, .. } | UpdateDraft::Review { incident, .. } => {
                incident
            }
        }
    }

    pub fn set_status(
        self,
        vocabulary: &StatusVocabulary,
        raw: &str,
    ) -> Result<Self, GuardViolation> {
        match self {
            UpdateDraft::Creation {
                incident,
                opened_at,
                services,
                ..
            } => {
                let status = vocabulary.incident_status(raw).ok_or_else(|| {
                    GuardViolation::new("set_status", format!("unknown update status '{raw}'"))
                })?;
                Ok(UpdateDraft::Creation {
                    incident,
                    opened_at,
                    status: Some(status),
                    services,
                })
            }
            other => Err(GuardViolation::new(
                "set_status",
                format!("update draft is at {}", other.step()),
            )),
        }
    }

    /// Touched services ride along on the update
    pub fn select_service(self, name: impl Into<String>) -> Result<Self, GuardViolation> {
        let name = name.into();
        match self {
            UpdateDraft::Creation {
                incident,
                opened_at,
                status,
                mut services,
            } => {
                if !services.iter().any(|s| s.name == name) {
                    services.push(ServicePatch { name, status: None });
                }
                Ok(UpdateDraft::Creation {
                    incident,
                    opened_at,
                    status,
                    services,
                })
            }
            other => Err(GuardViolation::new(
                "select_service",
                format!("update draft is at {}", other.step()),
            )),
        }
    }

    pub fn set_service_status(
        self,
        vocabulary: &StatusVocabulary,
        name: &str,
        raw: &str,
    ) -> Result<Self, GuardViolation> {
        let status = vocabulary.service_status(raw);
        match self {
            UpdateDraft::Creation {
                incident,
                opened_at,
                status: update_status,
                mut services,
            } => match services.iter_mut().find(|s| s.name == name) {
                Some(service) => {
                    service.status = Some(status);
                    Ok(UpdateDraft::Creation {
                        incident,
                        opened_at,
                        status: update_status,
                        services,
                    })
                }
                None => Err(GuardViolation::new(
                    "set_service_status",
                    format!("service '{name}' is not part of the update"),
                )),
            },
            other => Err(GuardViolation::new(
                "set_service_status",
                format!("update draft is at {}", other.step()),
            )),
        }
    }

    /// Record the update message. Requires a status, and lands the draft
    /// at Review in one move.
    pub fn explain(
        self,
        message: impl Into<String>,
        _now: DateTime<Utc>,
    ) -> Result<Self, GuardViolation> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(GuardViolation::new("explain", "empty message"));
        }

        match self {
            UpdateDraft::Creation {
                incident,
                opened_at,
                status: Some(status),
                services,
            } => Ok(UpdateDraft::Review {
                incident,
                opened_at,
                status,
                message,
                services,
            }),
            UpdateDraft::Creation { status: None, .. } => Err(GuardViolation::new(
                "explain",
                "update status has not been set yet",
            )),
            other => Err(GuardViolation::new(
                "explain",
                format!("update draft is already at {}", other.step()),
            )),
        }
    }

    pub fn publish_payload(&self) -> Result<(u64, NewIncidentUpdate), GuardViolation> {
        match self {
            UpdateDraft::Review {
                incident,
                opened_at,
                status,
                message,
                services,
            } => Ok((
                incident.id,
                NewIncidentUpdate {
                    time: *opened_at,
                    status: status.clone(),
                    message: message.clone(),
                    services: services.clone(),
                },
            )),
            other => Err(GuardViolation::new(
                "publish",
                format!("update draft is at {}, not review", other.step()),
            )),
        }
    }
}

/// Any draft the store can hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Draft {
    Incident(IncidentDraft),
    Update(UpdateDraft),
}

impl Draft {
    pub fn step(&self) -> Step {
        match self {
            Draft::Incident(draft) => draft.step(),
            Draft::Update(draft) => draft.step(),
        }
    }

    pub fn kind(&self) -> DraftKind {
        match self {
            Draft::Incident(_) => DraftKind::Incident,
            Draft::Update(_) => DraftKind::Update,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn vocab() -> StatusVocabulary {
        StatusVocabulary::default()
    }

    #[test]
    fn begin_starts_at_creation_with_title() {
        let draft = IncidentDraft::begin("API down", Utc::now());
        assert_eq!(draft.step(), Step::Creation);
        assert_eq!(draft.title(), "API down");
    }

    #[test]
    fn describe_requires_status() {
        let draft = IncidentDraft::begin("API down", Utc::now());
        let err = draft.describe("checking logs", Utc::now()).unwrap_err();
        assert_eq!(err.operation, "describe");
    }

    #[test]
    fn describe_appends_update_entry() {
        let draft = IncidentDraft::begin("API down", Utc::now())
            .set_status(&vocab(), "Investigating")
            .unwrap()
            .describe("checking logs", Utc::now())
            .unwrap();

        assert_eq!(draft.step(), Step::Describe);
        match &draft {
            IncidentDraft::Describe { body } => {
                assert_eq!(body.updates.len(), 1);
                assert_eq!(body.updates[0].status, "Investigating");
                assert_eq!(body.updates[0].message, "checking logs");
            }
            other => panic!("unexpected draft shape: {other:?}"),
        }
    }

    #[test]
    fn select_service_is_idempotent() {
        let draft = IncidentDraft::begin("API down", Utc::now())
            .select_service("checkout")
            .unwrap()
            .select_service("checkout")
            .unwrap();

        assert_eq!(draft.services().len(), 1);
        assert_eq!(draft.services()[0].name, "checkout");
    }

    #[test]
    fn service_status_requires_selection() {
        let draft = IncidentDraft::begin("API down", Utc::now());
        let err = draft
            .set_service_status(&vocab(), "checkout", "Degraded")
            .unwrap_err();
        assert_eq!(err.operation, "set_service_status");
    }

    #[test]
    fn status_step_requires_services() {
        let draft = IncidentDraft::begin("API down", Utc::now())
            .set_status(&vocab(), "Investigating")
            .unwrap()
            .describe("looking into it", Utc::now())
            .unwrap();

        let err = draft.advance_to_status().unwrap_err();
        assert_eq!(err.operation, "advance_to_status");
    }

    #[test]
    fn review_preserves_payload() {
        let draft = IncidentDraft::begin("API down", Utc::now())
            .set_status(&vocab(), "Investigating")
            .unwrap()
            .select_service("checkout")
            .unwrap()
            .describe("looking into it", Utc::now())
            .unwrap()
            .advance_to_status()
            .unwrap()
            .set_service_status(&vocab(), "checkout", "Outage")
            .unwrap()
            .advance_to_review()
            .unwrap();

        assert_eq!(draft.step(), Step::Review);
        let payload = draft.publish_payload().unwrap();
        assert_eq!(payload.title, "API down");
        assert_eq!(payload.services[0].status.as_deref(), Some("Outage"));
        assert_eq!(payload.updates.len(), 1);
    }

    #[test]
    fn steps_never_regress() {
        let draft = IncidentDraft::begin("API down", Utc::now())
            .set_status(&vocab(), "Investigating")
            .unwrap()
            .select_service("checkout")
            .unwrap()
            .describe("looking", Utc::now())
            .unwrap()
            .advance_to_status()
            .unwrap();

        // Late attempts to change the incident status or grow the service
        // set are replays and must bounce.
        let err = draft.clone().set_status(&vocab(), "Resolved").unwrap_err();
        assert_eq!(err.operation, "set_status");
        let err = draft.select_service("search").unwrap_err();
        assert_eq!(err.operation, "select_service");
    }

    #[test]
    fn update_explain_lands_at_review() {
        let incident = Incident {
            id: 42,
            time: Utc::now(),
            title: "API down".to_string(),
            status: "Investigating".to_string(),
            services: Vec::new(),
            updates: Vec::new(),
            updated_at: None,
        };

        let draft = UpdateDraft::begin(incident, Utc::now())
            .set_status(&vocab(), "Monitoring")
            .unwrap()
            .explain("deploy rolled back", Utc::now())
            .unwrap();

        assert_eq!(draft.step(), Step::Review);
        let (id, payload) = draft.publish_payload().unwrap();
        assert_eq!(id, 42);
        assert_eq!(payload.status, "Monitoring");
        assert_eq!(payload.message, "deploy rolled back");
    }
}
