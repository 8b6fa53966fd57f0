//! Footprint engine interface
//!
//! The engine owns orbit propagation and sensor geometry. The planner only
//! describes what to compute ([`FootprintRequest`]) and consumes the regions
//! it returns.

use crate::{AreaBounds, PlannerError, Region, Result, SensorSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// One satellite group's footprint request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootprintRequest {
    pub satellite_id: String,
    pub satellite_name: String,
    pub tle_line1: String,
    pub tle_line2: String,
    pub sensors: Vec<SensorSpec>,
    pub start_epoch_seconds: i64,
    pub end_epoch_seconds: i64,
    pub area: AreaBounds,
}

#[async_trait]
pub trait FootprintEngine: Send + Sync {
    /// Whether the engine can accept requests
    fn is_ready(&self) -> bool;

    async fn compute_footprints(&self, request: &FootprintRequest) -> Result<Vec<Region>>;
}

#[async_trait]
impl<T: FootprintEngine + ?Sized> FootprintEngine for Arc<T> {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    async fn compute_footprints(&self, request: &FootprintRequest) -> Result<Vec<Region>> {
        (**self).compute_footprints(request).await
    }
}

/// Engine reached over HTTP.
///
/// `GET {base}/health` answers readiness, `POST {base}/footprints` takes a
/// [`FootprintRequest`] and returns a JSON array of regions. A failed
/// footprint call clears readiness until the health endpoint answers again.
pub struct HttpFootprintEngine {
    client: reqwest::Client,
    base_url: String,
    ready: AtomicBool,
}

impl HttpFootprintEngine {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            ready: AtomicBool::new(false),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Query the health endpoint and record the answer
    pub async fn probe(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        let ready = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("Footprint engine health check returned {}", response.status());
                false
            }
            Err(e) => {
                debug!("Footprint engine unreachable at {}: {}", url, e);
                false
            }
        };

        let was_ready = self.ready.swap(ready, Ordering::SeqCst);
        if ready && !was_ready {
            info!("Footprint engine ready at {}", self.base_url);
        } else if was_ready && !ready {
            warn!("Footprint engine at {} is no longer ready", self.base_url);
        }
        ready
    }

    /// Re-check readiness every `every` for as long as the task runs
    pub fn spawn_health_checks(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                self.probe().await;
            }
        })
    }
}

#[async_trait]
impl FootprintEngine for HttpFootprintEngine {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn compute_footprints(&self, request: &FootprintRequest) -> Result<Vec<Region>> {
        let url = format!("{}/footprints", self.base_url);
        debug!(
            "Requesting footprints for {} ({} sensors)",
            request.satellite_id,
            request.sensors.len()
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("Footprint engine unreachable at {}: {}", url, e);
                self.ready.store(false, Ordering::SeqCst);
                PlannerError::EngineFailed(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            // a healthy engine rejecting this request stays ready
            self.probe().await;
            return Err(PlannerError::EngineFailed(format!(
                "{} returned {}",
                url, status
            )));
        }

        response
            .json::<Vec<Region>>()
            .await
            .map_err(|e| PlannerError::EngineFailed(e.to_string()))
    }
}
