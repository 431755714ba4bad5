use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical incident record as the status backend returns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: u64,
    pub time: DateTime<Utc>,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub services: Vec<ServicePatch>,
    #[serde(default)]
    pub updates: Vec<IncidentUpdate>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One published update in an incident's timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentUpdate {
    #[serde(default)]
    pub id: u64,
    pub time: DateTime<Utc>,
    pub status: String,
    pub message: String,
}

/// Service reference record from the backend catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Name and status pair sent when creating or updating an incident.
/// The backend matches services by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePatch {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Update entry carried by a draft before it has a backend id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEntry {
    pub time: DateTime<Utc>,
    pub status: String,
    pub message: String,
}

/// Payload for POST /api/v1/incidents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIncident {
    pub time: DateTime<Utc>,
    pub title: String,
    pub status: String,
    pub services: Vec<ServicePatch>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub updates: Vec<UpdateEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<MaintenanceWindow>,
}

/// Payload for POST /api/v1/incidents/{id}/updates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIncidentUpdate {
    pub time: DateTime<Utc>,
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub services: Vec<ServicePatch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incident_deserializes_backend_shape() {
        let raw = r#"{
            "id": 7,
            "time": "2024-03-01T12:00:00Z",
            "title": "API latency",
            "status": "Investigating",
            "services": [{"name": "checkout", "status": "Degraded"}],
            "updates": [],
            "updatedAt": "2024-03-01T12:05:00Z"
        }"#;

        let incident: Incident = serde_json::from_str(raw).unwrap();
        assert_eq!(incident.id, 7);
        assert_eq!(incident.services[0].name, "checkout");
        assert_eq!(incident.services[0].status.as_deref(), Some("Degraded"));
        assert!(incident.updated_at.is_some());
    }

    #[test]
    fn new_incident_omits_empty_maintenance() {
        let payload = NewIncident {
            time: Utc::now(),
            title: "API down".to_string(),
            status: "Investigating".to_string(),
            services: vec![ServicePatch {
                name: "api".to_string(),
                status: Some("Outage".to_string()),
            }],
            updates: Vec::new(),
            maintenance: None,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("maintenance").is_none());
        assert_eq!(json["services"][0]["name"], "api");
    }
}
