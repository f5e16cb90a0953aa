//! One collection cycle: fetch, correlate, map.
//!
//! Each scrape drives exactly one cycle. The cycle either succeeds with a
//! full set of observations or fails with none; a failed fetch of either
//! channel resource short-circuits the cycle so the exposed metric set is
//! never assembled from half the data.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{info, warn};

use crate::client::ChannelApi;
use crate::metrics::{
    CHANNEL_STATUS, MESSAGES_ERRORED, MESSAGES_FILTERED, MESSAGES_QUEUED, MESSAGES_RECEIVED,
    MESSAGES_SENT, UNDEPLOYED_REVISIONS,
};
use crate::protocol::{ChannelStatistics, ChannelStatus};

/// Label value of `mirth_info` when the version fetch fails. Version
/// retrieval is best-effort and never fails the cycle.
pub const VERSION_ERROR_LABEL: &str = "error";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
    Untyped,
}

/// A single metric data point, consumed immediately by the exposition sink.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub name: &'static str,
    pub kind: MetricKind,
    pub value: f64,
    /// Ordered label pairs; the order matches the metric's label schema.
    pub labels: Vec<(&'static str, String)>,
}

impl Observation {
    fn gauge(name: &'static str, value: f64, labels: Vec<(&'static str, String)>) -> Self {
        Observation {
            name,
            kind: MetricKind::Gauge,
            value,
            labels,
        }
    }
}

/// The sole artifact of a cycle. `available == false` carries zero
/// observations; the sink then exposes nothing but `mirth_up 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionResult {
    pub available: bool,
    pub observations: Vec<Observation>,
    pub version_label: String,
    pub duration_seconds: f64,
}

impl CollectionResult {
    fn unavailable(duration_seconds: f64) -> Self {
        CollectionResult {
            available: false,
            observations: Vec::new(),
            version_label: VERSION_ERROR_LABEL.to_string(),
            duration_seconds,
        }
    }
}

/// Maps the engine's per-status vocabulary to metric names. Unknown labels
/// map to no metric at all, so new engine vocabulary is ignored rather than
/// fatal. QUEUED is deliberately absent: the per-status list carries no true
/// queue depth, which comes from the statistics endpoint instead.
fn status_metric(status: &str) -> Option<&'static str> {
    match status {
        "RECEIVED" => Some(MESSAGES_RECEIVED),
        "FILTERED" => Some(MESSAGES_FILTERED),
        "SENT" => Some(MESSAGES_SENT),
        "ERROR" => Some(MESSAGES_ERRORED),
        _ => None,
    }
}

/// Joins status and statistics records by channel id and flattens them into
/// observations. Pure; the status list is authoritative for channel identity,
/// statistics rows without a matching status record are dropped.
pub fn assemble(
    statuses: &[ChannelStatus],
    statistics: &[ChannelStatistics],
) -> Vec<Observation> {
    // Last write wins on duplicate ids; the engine does not produce them.
    let by_id: HashMap<&str, &ChannelStatistics> = statistics
        .iter()
        .map(|row| (row.channel_id.as_str(), row))
        .collect();

    let mut observations = Vec::with_capacity(statuses.len() * 7);
    for channel in statuses {
        observations.push(Observation::gauge(
            CHANNEL_STATUS,
            1.0,
            vec![
                ("channel", channel.name.clone()),
                ("status", channel.state.clone()),
            ],
        ));
        observations.push(Observation::gauge(
            UNDEPLOYED_REVISIONS,
            channel.deployed_revision_delta,
            vec![("channel", channel.name.clone())],
        ));

        for entry in &channel.statistics.entries {
            if let Some(name) = status_metric(&entry.status) {
                observations.push(Observation::gauge(
                    name,
                    entry.count,
                    vec![("channel", channel.name.clone())],
                ));
            }
        }

        let queued = by_id
            .get(channel.channel_id.as_str())
            .map(|row| row.queued)
            .unwrap_or(0.0);
        observations.push(Observation::gauge(
            MESSAGES_QUEUED,
            queued,
            vec![("channel", channel.name.clone())],
        ));
    }
    observations
}

/// Drives one cycle per scrape against the engine API.
pub struct Collector<A> {
    api: A,
}

impl<A: ChannelApi> Collector<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Runs one best-effort cycle. Fetch and decode failures are logged and
    /// contained here; the caller always gets a result. The duration spans
    /// from the first fetch to correlator completion (or to the failure),
    /// excluding the trailing version fetch.
    pub async fn collect(&self) -> CollectionResult {
        let start = Instant::now();

        let statuses = match self.api.channel_statuses().await {
            Ok(statuses) => statuses,
            Err(err) => {
                warn!(error = %err, "failed to fetch channel statuses");
                return CollectionResult::unavailable(start.elapsed().as_secs_f64());
            }
        };

        let statistics = match self.api.channel_statistics().await {
            Ok(statistics) => statistics,
            Err(err) => {
                warn!(error = %err, "failed to fetch channel statistics");
                return CollectionResult::unavailable(start.elapsed().as_secs_f64());
            }
        };

        let observations = assemble(&statuses, &statistics);
        let duration_seconds = start.elapsed().as_secs_f64();

        let version_label = match self.api.server_version().await {
            Ok(version) => version,
            Err(err) => {
                warn!(error = %err, "failed to fetch server version");
                VERSION_ERROR_LABEL.to_string()
            }
        };

        info!(
            channels = statuses.len(),
            duration_seconds, "endpoint scraped"
        );

        CollectionResult {
            available: true,
            observations,
            version_label,
            duration_seconds,
        }
    }
}
