use std::sync::Arc;

use crate::chat::{ChatMessage, Notifier, NotifyError};

/// What a handled event asks the outside world to do. Backend writes are
/// performed inside the engine because their outcome decides the
/// transition; chat output is returned as data so adapters stay thin.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Post a message visible to the whole room
    Post(ChatMessage),
    /// Send a private notice to one user
    Notify { user_id: String, message: ChatMessage },
}

/// Deliver a batch of effects through the configured notifier
pub async fn deliver(effects: Vec<Effect>, notifier: &Arc<dyn Notifier>) -> Result<(), NotifyError> {
    for effect in effects {
        match effect {
            Effect::Post(message) => notifier.post(message).await?,
            Effect::Notify { user_id, message } => notifier.notify(&user_id, message).await?,
        }
    }
    Ok(())
}
