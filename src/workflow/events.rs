use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::draft::Step;

/// Everything that can happen to a draft, regardless of whether it arrived
/// as a slash command or a clicked callback link. Adapters build these;
/// the engine only ever sees events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkflowEvent {
    /// Open a creation draft
    Begin { title: String },
    /// Open an update draft for an existing incident
    BeginUpdate {
        incident_id: u64,
        actor_name: Option<String>,
    },
    /// Set the incident (or update) status
    SetStatus { status: String },
    /// Record a maintenance window on a creation draft
    SetMaintenance {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// First narrative entry for a creation draft
    Describe { message: String },
    /// Update message for an update draft
    Explain { message: String },
    /// Toggle a service into the draft
    SelectService { name: String },
    /// Set one selected service's status
    SetServiceStatus { name: String, status: String },
    /// Generic step advance from a process link
    Advance { step: Step },
    /// Terminal commit to the status backend
    Publish,
}

impl WorkflowEvent {
    /// Short name used in logs and spans
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::Begin { .. } => "begin",
            WorkflowEvent::BeginUpdate { .. } => "begin_update",
            WorkflowEvent::SetStatus { .. } => "set_status",
            WorkflowEvent::SetMaintenance { .. } => "set_maintenance",
            WorkflowEvent::Describe { .. } => "describe",
            WorkflowEvent::Explain { .. } => "explain",
            WorkflowEvent::SelectService { .. } => "select_service",
            WorkflowEvent::SetServiceStatus { .. } => "set_service_status",
            WorkflowEvent::Advance { .. } => "advance",
            WorkflowEvent::Publish => "publish",
        }
    }
}
