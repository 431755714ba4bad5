use serde::{Deserialize, Serialize};

/// Which flavor of draft a key addresses. A creation draft and an update
/// draft may coexist for the same actor and room, so the kind is part of
/// the key, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DraftKind {
    Incident,
    Update,
}

impl DraftKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftKind::Incident => "incident",
            DraftKind::Update => "update",
        }
    }
}

/// Identity of exactly one draft: actor, conversation, kind.
/// Every trigger resolves its draft through this key and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DraftKey {
    pub user_id: String,
    pub room_id: String,
    pub kind: DraftKind,
}

impl DraftKey {
    pub fn incident(user_id: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            room_id: room_id.into(),
            kind: DraftKind::Incident,
        }
    }

    pub fn update(user_id: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            room_id: room_id.into(),
            kind: DraftKind::Update,
        }
    }
}

impl std::fmt::Display for DraftKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.user_id,
            self.room_id,
            self.kind.as_str()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_keep_keys_apart() {
        let creation = DraftKey::incident("u1", "r1");
        let update = DraftKey::update("u1", "r1");
        assert_ne!(creation, update);
    }

    #[test]
    fn display_is_log_friendly() {
        let key = DraftKey::update("u1", "r1");
        assert_eq!(key.to_string(), "u1:r1:update");
    }
}
