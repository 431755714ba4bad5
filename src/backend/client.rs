use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use moka::future::Cache;
use reqwest::StatusCode;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::BackendConfig;

use super::errors::BackendError;
use super::models::{Incident, NewIncident, NewIncidentUpdate, Service};

const SERVICES_CACHE_KEY: &str = "services";

/// Rate-limited client for the status page backend. Every request carries
/// the API credential in the Authorization header; the service reference
/// list is cached briefly because it backs every selection prompt.
#[derive(Debug, Clone)]
pub struct StatusClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    services_cache: Cache<&'static str, Arc<Vec<Service>>>,
}

impl StatusClient {
    pub fn new(base_url: String, config: &BackendConfig) -> Result<Self, BackendError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(BackendError::MissingApiKey)?;

        let per_second = NonZeroU32::new(config.rate_limit.requests_per_second.max(1))
            .unwrap_or(NonZeroU32::MIN);
        let burst =
            NonZeroU32::new(config.rate_limit.burst_capacity.max(1)).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(per_second).allow_burst(burst);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|source| BackendError::Unreachable { source })?;

        let services_cache = Cache::builder()
            .max_capacity(4)
            .time_to_live(Duration::from_secs(config.services_cache_seconds.max(1)))
            .build();

        Ok(Self {
            http,
            base_url,
            api_key,
            rate_limiter,
            services_cache,
        })
    }

    /// Connectivity check against GET /api/v1/config. Used at startup and
    /// whenever credentials change.
    pub async fn check(&self) -> Result<(), BackendError> {
        let response = self.get("/api/v1/config").await?;
        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(BackendError::UnexpectedStatus {
                status: status.as_u16(),
                message: Self::error_message(response).await,
            }),
        }
    }

    /// Service reference list, served from cache when fresh
    pub async fn services(&self) -> Result<Vec<Service>, BackendError> {
        if let Some(cached) = self.services_cache.get(&SERVICES_CACHE_KEY).await {
            debug!("Serving service catalog from cache");
            return Ok(cached.as_ref().clone());
        }

        let response = self.get("/api/v1/services").await?;
        if response.status() != StatusCode::OK {
            return Err(BackendError::UnexpectedStatus {
                status: response.status().as_u16(),
                message: Self::error_message(response).await,
            });
        }

        let services: Vec<Service> = response
            .json()
            .await
            .map_err(|e| BackendError::MalformedResponse {
                reason: e.to_string(),
            })?;

        self.services_cache
            .insert(SERVICES_CACHE_KEY, Arc::new(services.clone()))
            .await;

        Ok(services)
    }

    /// Fetch one incident. A 404 maps to IncidentNotFound so the update
    /// flow can refuse to open a draft for a bad id.
    pub async fn incident(&self, id: u64) -> Result<Incident, BackendError> {
        let response = self.get(&format!("/api/v1/incidents/{id}")).await?;
        match response.status() {
            StatusCode::OK => response
                .json()
                .await
                .map_err(|e| BackendError::MalformedResponse {
                    reason: e.to_string(),
                }),
            StatusCode::NOT_FOUND => Err(BackendError::IncidentNotFound { id }),
            status => Err(BackendError::UnexpectedStatus {
                status: status.as_u16(),
                message: Self::error_message(response).await,
            }),
        }
    }

    /// Create an incident. The backend answers 201 with the stored record.
    pub async fn create_incident(&self, incident: &NewIncident) -> Result<Incident, BackendError> {
        let response = self.post("/api/v1/incidents", incident).await?;
        Self::expect_created(response).await
    }

    /// Append an update to an existing incident, expecting 201
    pub async fn create_update(
        &self,
        incident_id: u64,
        update: &NewIncidentUpdate,
    ) -> Result<Incident, BackendError> {
        let response = self
            .post(&format!("/api/v1/incidents/{incident_id}/updates"), update)
            .await?;
        Self::expect_created(response).await
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, BackendError> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;

        self.http
            .get(format!("{}{}", self.base_url, path))
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .send()
            .await
            .map_err(|source| BackendError::Unreachable { source })
    }

    async fn post<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, BackendError> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;

        self.http
            .post(format!("{}{}", self.base_url, path))
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|source| BackendError::Unreachable { source })
    }

    async fn expect_created(response: reqwest::Response) -> Result<Incident, BackendError> {
        match response.status() {
            StatusCode::CREATED => response
                .json()
                .await
                .map_err(|e| BackendError::MalformedResponse {
                    reason: e.to_string(),
                }),
            status => {
                let message = Self::error_message(response).await;
                warn!(status = status.as_u16(), %message, "Backend rejected the write");
                Err(BackendError::UnexpectedStatus {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    /// Best-effort extraction of the backend's error message. The backend
    /// answers either {"message": "..."} or a plain text body.
    async fn error_message(response: reqwest::Response) -> String {
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(value) => value
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or(body),
            Err(_) => body,
        }
    }
}
