pub mod draft;
pub mod effects;
pub mod engine;
pub mod events;
pub mod key;
pub mod render;
pub mod store;
pub mod vocabulary;

pub use draft::{Draft, GuardViolation, IncidentDraft, Step, UpdateDraft};
pub use effects::Effect;
pub use engine::{WorkflowEngine, WorkflowError};
pub use events::WorkflowEvent;
pub use key::{DraftKey, DraftKind};
pub use render::{CallbackLinks, MessageRenderer};
pub use store::{InMemoryWorkflowStore, StoreError, StoredDraft, WorkflowStore};
pub use vocabulary::StatusVocabulary;
