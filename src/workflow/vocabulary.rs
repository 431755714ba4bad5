use crate::config::VocabularyConfig;

/// Accepted status values, loaded from configuration. Incident statuses
/// gate transitions, so unknown values are rejected; service statuses
/// degrade to the configured fallback the way the backend itself does.
#[derive(Debug, Clone)]
pub struct StatusVocabulary {
    incident: Vec<String>,
    service: Vec<String>,
    maintenance: String,
    unknown_service: String,
}

impl StatusVocabulary {
    pub fn incident_statuses(&self) -> &[String] {
        &self.incident
    }

    pub fn service_statuses(&self) -> &[String] {
        &self.service
    }

    /// Canonical incident status for a raw value, or None if the value is
    /// not in the vocabulary. Matching is case-insensitive.
    pub fn incident_status(&self, raw: &str) -> Option<String> {
        self.incident
            .iter()
            .find(|s| s.eq_ignore_ascii_case(raw))
            .cloned()
    }

    /// Canonical service status for a raw value, falling back to the
    /// configured unknown status
    pub fn service_status(&self, raw: &str) -> String {
        self.service
            .iter()
            .find(|s| s.eq_ignore_ascii_case(raw))
            .cloned()
            .unwrap_or_else(|| self.unknown_service.clone())
    }

    /// Whether the given incident status opens a maintenance window
    pub fn is_maintenance(&self, status: &str) -> bool {
        status.eq_ignore_ascii_case(&self.maintenance)
    }
}

impl From<&VocabularyConfig> for StatusVocabulary {
    fn from(config: &VocabularyConfig) -> Self {
        Self {
            incident: config.incident_statuses.clone(),
            service: config.service_statuses.clone(),
            maintenance: config.maintenance_status.clone(),
            unknown_service: config.unknown_service_status.clone(),
        }
    }
}

impl Default for StatusVocabulary {
    fn default() -> Self {
        Self::from(&VocabularyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incident_status_is_case_insensitive() {
        let vocab = StatusVocabulary::default();
        assert_eq!(
            vocab.incident_status("investigating"),
            Some("Investigating".to_string())
        );
        assert_eq!(vocab.incident_status("Exploded"), None);
    }

    #[test]
    fn unknown_service_status_falls_back() {
        let vocab = StatusVocabulary::default();
        assert_eq!(vocab.service_status("Degraded"), "Degraded");
        assert_eq!(vocab.service_status("on fire"), "Unknown");
    }
}
