// Houston - chat-driven incident control for a status page backend
// This exposes the core components for testing and integration

pub mod adapters;
pub mod backend;
pub mod chat;
pub mod config;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use adapters::{AppState, CommandAdapter, CommandContext, ModalSessions};
pub use backend::{BackendError, Incident, Service, StatusClient};
pub use chat::{ChatMessage, LoggingNotifier, Notifier, RecordingNotifier};
pub use config::HoustonConfig;
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry};
pub use workflow::{
    Draft, DraftKey, DraftKind, Effect, InMemoryWorkflowStore, IncidentDraft, Step,
    StatusVocabulary, UpdateDraft, WorkflowEngine, WorkflowError, WorkflowEvent, WorkflowStore,
};
