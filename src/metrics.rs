//! Prometheus exposition for collection results.
//!
//! All channel series are rebuilt from scratch on every scrape so channels
//! that disappear from the engine disappear from the exposition immediately.
//! Only the request-duration histogram outlives a scrape: it accumulates in
//! a process-lifetime registry created once at startup.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use prometheus::{
    linear_buckets, CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};

use crate::collect::{CollectionResult, MetricKind};

pub const NAMESPACE: &str = "mirth";

pub const UP: &str = "up";
pub const INFO: &str = "info";
pub const CHANNEL_STATUS: &str = "channel_status";
pub const UNDEPLOYED_REVISIONS: &str = "undeployed_revisions";
pub const MESSAGES_RECEIVED: &str = "messages_received_total";
pub const MESSAGES_FILTERED: &str = "messages_filtered_total";
pub const MESSAGES_SENT: &str = "messages_sent_total";
pub const MESSAGES_ERRORED: &str = "messages_errored_total";
pub const MESSAGES_QUEUED: &str = "messages_queued";
pub const REQUEST_DURATION: &str = "request_duration";

/// Name, help text and label schema of one exposed metric.
pub struct Descriptor {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

/// The full metric schema, fixed at compile time. Observations referencing a
/// name outside this table are a programming error and fail the render.
const DESCRIPTORS: &[Descriptor] = &[
    Descriptor {
        name: CHANNEL_STATUS,
        help: "Status of all deployed channels",
        labels: &["channel", "status"],
    },
    Descriptor {
        name: UNDEPLOYED_REVISIONS,
        help: "How many deployed revisions the channel is behind (per channel).",
        labels: &["channel"],
    },
    Descriptor {
        name: MESSAGES_RECEIVED,
        help: "How many messages have been received (per channel).",
        labels: &["channel"],
    },
    Descriptor {
        name: MESSAGES_FILTERED,
        help: "How many messages have been filtered (per channel).",
        labels: &["channel"],
    },
    Descriptor {
        name: MESSAGES_SENT,
        help: "How many messages have been sent (per channel).",
        labels: &["channel"],
    },
    Descriptor {
        name: MESSAGES_ERRORED,
        help: "How many messages have errored (per channel).",
        labels: &["channel"],
    },
    Descriptor {
        name: MESSAGES_QUEUED,
        help: "How many messages are currently queued (per channel).",
        labels: &["channel"],
    },
];

fn descriptor(name: &str) -> Result<&'static Descriptor, prometheus::Error> {
    DESCRIPTORS
        .iter()
        .find(|d| d.name == name)
        .ok_or_else(|| prometheus::Error::Msg(format!("no descriptor for metric '{name}'")))
}

/// Process-lifetime metric state, created once at startup and shared by all
/// concurrent scrapes.
pub struct ExporterMetrics {
    /// Wall-clock time of the metric pull from Mirth, across all scrapes.
    pub request_duration: Histogram,
    registry: Registry,
}

impl ExporterMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let request_duration = Histogram::with_opts(
            HistogramOpts::new(
                REQUEST_DURATION,
                "Histogram for the runtime of the metric pull from Mirth.",
            )
            .namespace(NAMESPACE)
            .buckets(linear_buckets(0.1, 0.1, 20).expect("static bucket layout")),
        )
        .expect("static histogram options");
        registry
            .register(Box::new(request_duration.clone()))
            .expect("fresh registry");

        Self {
            request_duration,
            registry,
        }
    }

    /// Renders one collection result in the text exposition format. A failed
    /// cycle exposes `mirth_up 0` and the histogram, nothing else.
    pub fn render(&self, result: &CollectionResult) -> Result<String, prometheus::Error> {
        let scrape = Registry::new();

        let up = Gauge::with_opts(
            Opts::new(UP, "Was the last Mirth query successful.").namespace(NAMESPACE),
        )?;
        scrape.register(Box::new(up.clone()))?;
        up.set(if result.available { 1.0 } else { 0.0 });

        if result.available {
            let info = GaugeVec::new(
                Opts::new(INFO, "Version of the Mirth server.").namespace(NAMESPACE),
                &["version"],
            )?;
            scrape.register(Box::new(info.clone()))?;
            info.with_label_values(&[&result.version_label]).set(1.0);

            record(&scrape, result)?;
        }

        let mut families = scrape.gather();
        families.extend(self.registry.gather());

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}

impl Default for ExporterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Registers every observation into the per-scrape registry, creating one
/// vector per metric name on first use.
fn record(scrape: &Registry, result: &CollectionResult) -> Result<(), prometheus::Error> {
    let mut gauges: HashMap<&'static str, GaugeVec> = HashMap::new();
    let mut counters: HashMap<&'static str, CounterVec> = HashMap::new();

    for observation in &result.observations {
        let values: Vec<&str> = observation
            .labels
            .iter()
            .map(|(_, value)| value.as_str())
            .collect();

        match observation.kind {
            MetricKind::Gauge | MetricKind::Untyped => {
                let vector = match gauges.entry(observation.name) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        let d = descriptor(observation.name)?;
                        let vector =
                            GaugeVec::new(Opts::new(d.name, d.help).namespace(NAMESPACE), d.labels)?;
                        scrape.register(Box::new(vector.clone()))?;
                        entry.insert(vector)
                    }
                };
                vector.with_label_values(&values).set(observation.value);
            }
            // The registry is fresh each scrape, so incrementing from zero
            // is equivalent to setting.
            MetricKind::Counter => {
                let vector = match counters.entry(observation.name) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        let d = descriptor(observation.name)?;
                        let vector = CounterVec::new(
                            Opts::new(d.name, d.help).namespace(NAMESPACE),
                            d.labels,
                        )?;
                        scrape.register(Box::new(vector.clone()))?;
                        entry.insert(vector)
                    }
                };
                vector.with_label_values(&values).inc_by(observation.value);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::Observation;

    fn result_with(observations: Vec<Observation>) -> CollectionResult {
        CollectionResult {
            available: true,
            observations,
            version_label: "3.9.0".to_string(),
            duration_seconds: 0.25,
        }
    }

    #[test]
    fn renders_a_successful_cycle() {
        let metrics = ExporterMetrics::new();
        metrics.request_duration.observe(0.25);

        let result = result_with(vec![
            Observation {
                name: CHANNEL_STATUS,
                kind: MetricKind::Gauge,
                value: 1.0,
                labels: vec![
                    ("channel", "Foo".to_string()),
                    ("status", "STARTED".to_string()),
                ],
            },
            Observation {
                name: MESSAGES_QUEUED,
                kind: MetricKind::Gauge,
                value: 2.0,
                labels: vec![("channel", "Foo".to_string())],
            },
        ]);

        let text = metrics.render(&result).unwrap();
        assert!(text.contains("mirth_up 1"), "{text}");
        assert!(
            text.contains(r#"mirth_channel_status{channel="Foo",status="STARTED"} 1"#),
            "{text}"
        );
        assert!(text.contains(r#"mirth_messages_queued{channel="Foo"} 2"#), "{text}");
        assert!(text.contains(r#"mirth_info{version="3.9.0"} 1"#), "{text}");
        assert!(text.contains("# TYPE mirth_up gauge"), "{text}");
        assert!(text.contains("mirth_request_duration_count 1"), "{text}");
    }

    #[test]
    fn a_failed_cycle_exposes_only_availability_and_the_histogram() {
        let metrics = ExporterMetrics::new();
        let result = CollectionResult {
            available: false,
            observations: Vec::new(),
            version_label: "error".to_string(),
            duration_seconds: 0.1,
        };

        let text = metrics.render(&result).unwrap();
        assert!(text.contains("mirth_up 0"), "{text}");
        assert!(!text.contains("mirth_info"), "{text}");
        assert!(!text.contains("mirth_channel_status"), "{text}");
        assert!(text.contains("mirth_request_duration_bucket"), "{text}");
    }

    #[test]
    fn version_error_label_is_exposed_on_a_degraded_cycle() {
        let metrics = ExporterMetrics::new();
        let mut result = result_with(Vec::new());
        result.version_label = "error".to_string();

        let text = metrics.render(&result).unwrap();
        assert!(text.contains(r#"mirth_info{version="error"} 1"#), "{text}");
    }

    #[test]
    fn histogram_accumulates_across_renders() {
        let metrics = ExporterMetrics::new();
        metrics.request_duration.observe(0.2);
        metrics.request_duration.observe(0.4);

        let text = metrics.render(&result_with(Vec::new())).unwrap();
        assert!(text.contains("mirth_request_duration_count 2"), "{text}");
    }

    #[test]
    fn observations_outside_the_schema_fail_the_render() {
        let metrics = ExporterMetrics::new();
        let result = result_with(vec![Observation {
            name: "not_in_the_table",
            kind: MetricKind::Gauge,
            value: 1.0,
            labels: vec![],
        }]);

        assert!(metrics.render(&result).is_err());
    }
}
