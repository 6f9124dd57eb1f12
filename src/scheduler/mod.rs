//! Periodic polling of the monitoring source.
//!
//! The classifier keeps no state between calls; the scheduler re-fetches and
//! re-evaluates every configured window on each tick and publishes the
//! result to a [`VerdictBoard`] read by the API.

pub mod engine;

pub use self::engine::run_poll_loop;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::detect::{self, EntityVerdict, MonitoringWindow, PolicyTable};
use crate::source::MonitoringSource;

/// Message shown to dashboard users when a window could not be loaded.
pub const LOAD_FAILURE_MESSAGE: &str = "Failed to load monitoring data";

/// Result of one poll of one window.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub run_id: Uuid,
    pub window: MonitoringWindow,
    pub evaluated_at: DateTime<Utc>,
    pub entities: usize,
    pub abnormal: usize,
    pub verdicts: Vec<EntityVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Snapshot {
    pub fn from_verdicts(run_id: Uuid, window: MonitoringWindow, verdicts: Vec<EntityVerdict>) -> Self {
        let abnormal = verdicts.iter().filter(|v| !v.is_normal).count();
        Self {
            run_id,
            window,
            evaluated_at: Utc::now(),
            entities: verdicts.len(),
            abnormal,
            verdicts,
            error: None,
        }
    }

    pub fn failed(run_id: Uuid, window: MonitoringWindow) -> Self {
        Self {
            error: Some(LOAD_FAILURE_MESSAGE.to_string()),
            ..Self::from_verdicts(run_id, window, Vec::new())
        }
    }
}

/// Latest snapshot per window, shared between the poller and the API.
#[derive(Clone, Default)]
pub struct VerdictBoard {
    inner: Arc<RwLock<HashMap<MonitoringWindow, Snapshot>>>,
}

impl VerdictBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn publish(&self, snapshot: Snapshot) {
        self.inner.write().await.insert(snapshot.window, snapshot);
    }

    pub async fn latest(&self, window: MonitoringWindow) -> Option<Snapshot> {
        self.inner.read().await.get(&window).cloned()
    }

    /// All snapshots, in fixed window order.
    pub async fn all(&self) -> Vec<Snapshot> {
        let map = self.inner.read().await;
        MonitoringWindow::ALL
            .iter()
            .filter_map(|w| map.get(w).cloned())
            .collect()
    }
}

/// Fetch-and-evaluate driver for the configured windows.
#[derive(Clone)]
pub struct Poller {
    source: Arc<dyn MonitoringSource>,
    policy: PolicyTable,
    windows: Vec<MonitoringWindow>,
    board: VerdictBoard,
}

impl Poller {
    pub fn new(
        source: Arc<dyn MonitoringSource>,
        policy: PolicyTable,
        windows: Vec<MonitoringWindow>,
        board: VerdictBoard,
    ) -> Self {
        Self {
            source,
            policy,
            windows,
            board,
        }
    }

    pub fn board(&self) -> &VerdictBoard {
        &self.board
    }

    /// Poll one window and return its snapshot. Fetch failures yield an
    /// empty snapshot carrying [`LOAD_FAILURE_MESSAGE`].
    pub async fn poll_window(&self, window: MonitoringWindow) -> Snapshot {
        let run_id = Uuid::new_v4();
        match self.source.fetch(window, Utc::now()).await {
            Ok(series) => {
                let policy = self.policy.for_window(window);
                let verdicts = detect::evaluate(&series, &policy);
                let snapshot = Snapshot::from_verdicts(run_id, window, verdicts);

                for v in snapshot.verdicts.iter().filter(|v| !v.is_normal) {
                    for (category, reason) in v.reasons.iter() {
                        warn!(
                            %window,
                            merchant = %v.merchant_name,
                            payment_method = %v.key.payment_method,
                            %category,
                            reason,
                            "transaction anomaly"
                        );
                    }
                }
                info!(
                    %window,
                    %run_id,
                    entities = snapshot.entities,
                    abnormal = snapshot.abnormal,
                    "poll evaluated"
                );
                snapshot
            }
            Err(e) => {
                error!(%window, %run_id, error = %e, "monitoring fetch failed");
                Snapshot::failed(run_id, window)
            }
        }
    }

    /// Poll every configured window and publish the results.
    pub async fn poll_once(&self) {
        for &window in &self.windows {
            let snapshot = self.poll_window(window).await;
            self.board.publish(snapshot).await;
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::source::{ApiSeries, ApiSeriesPoint, SourceError};

    /// In-memory source returning the same series for every window.
    pub struct StaticSource {
        pub series: Option<Vec<ApiSeries>>,
    }

    #[async_trait::async_trait]
    impl MonitoringSource for StaticSource {
        async fn fetch(&self, _window: MonitoringWindow, _end: DateTime<Utc>) -> Result<Vec<ApiSeries>, SourceError> {
            match &self.series {
                Some(s) => Ok(s.clone()),
                None => Err(SourceError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                }),
            }
        }
    }

    /// Six flat intervals, then `last` (the latest complete interval), then an
    /// in-progress interval.
    pub fn entity(name: &str, method: &str, last: (i64, i64, i64)) -> ApiSeries {
        let mut rows = vec![(10, 0, 10); 6];
        rows.push(last);
        rows.push((1, 0, 0));
        ApiSeries {
            client_uid: format!("uid-{}", name),
            merchant_name: name.to_string(),
            payment_method: method.to_string(),
            data: rows
                .into_iter()
                .map(|(s, p, f)| ApiSeriesPoint {
                    success: Some(s),
                    pending: Some(p),
                    failed: Some(f),
                    ..Default::default()
                })
                .collect(),
        }
    }
}
