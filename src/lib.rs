//! Prometheus exporter for Mirth Connect.
//!
//! Every scrape of the telemetry path performs one fresh round-trip to the
//! engine's management API: channel statuses, channel statistics and the
//! server version. Statuses and statistics are correlated by channel id and
//! flattened into the exposed metric set; any fetch or decode failure
//! collapses the scrape to `mirth_up 0` without corrupting it.

/// HTTP client for the management API.
pub mod client;
/// The collection cycle: orchestrator, correlator and mapper.
pub mod collect;
/// Runtime configuration.
pub mod config;
/// Metric schema and text exposition.
pub mod metrics;
/// Typed decoding of the API's XML and plain-text responses.
pub mod protocol;
/// The exposed HTTP surface.
pub mod server;
