pub mod callback;
pub mod command;
pub mod modal;

pub use callback::{router, AppState};
pub use command::{CommandAdapter, CommandContext, CommandError};
pub use modal::{CloseField, ModalError, ModalInteraction, ModalSessions};
