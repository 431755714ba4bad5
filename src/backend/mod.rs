pub mod client;
pub mod errors;
pub mod models;

pub use client::StatusClient;
pub use errors::BackendError;
pub use models::{
    Incident, IncidentUpdate, MaintenanceWindow, NewIncident, NewIncidentUpdate, Service,
    ServicePatch, UpdateEntry,
};
