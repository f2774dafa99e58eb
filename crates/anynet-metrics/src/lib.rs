//! Metric declarations for the AnyNet modem engine.
//!
//! Recording sites in `anynet-modem` name their metric through a constant in
//! [`metric_defs`] so names, units and label keys live in one place. The
//! `metrics` facade is re-exported so the engine and whatever recorder the
//! application installs agree on its version.
//!
//! ```rust,ignore
//! anynet_metrics::describe_metrics();
//! metrics::counter!(metric_defs::COMMANDS_ISSUED.name, "command" => "AWSVER").increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_histogram, Unit};

/// How a metric is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Histogram,
}

/// Name and metadata of one recorded metric.
#[derive(Debug, Clone)]
pub struct Metric {
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    pub unit: Option<Unit>,
    /// Label keys attached at the recording site.
    pub labels: &'static [&'static str],
}

impl Metric {
    pub const fn counter(name: &'static str) -> Self {
        Metric { name, kind: MetricKind::Counter, description: "", unit: None, labels: &[] }
    }

    pub const fn histogram(name: &'static str) -> Self {
        Metric { name, kind: MetricKind::Histogram, description: "", unit: None, labels: &[] }
    }

    pub const fn with_description(self, description: &'static str) -> Self {
        Metric { description, ..self }
    }

    pub const fn with_unit(self, unit: Unit) -> Self {
        Metric { unit: Some(unit), ..self }
    }

    pub const fn with_labels(self, labels: &'static [&'static str]) -> Self {
        Metric { labels, ..self }
    }

    /// Register the description and unit with the installed recorder.
    pub fn describe(&self) {
        let (name, description) = (self.name, self.description);
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => describe_counter!(name, unit, description),
            (MetricKind::Counter, None) => describe_counter!(name, description),
            (MetricKind::Histogram, Some(unit)) => describe_histogram!(name, unit, description),
            (MetricKind::Histogram, None) => describe_histogram!(name, description),
        }
    }
}

/// All metric definitions for the engine.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Command Exchanges
    // ========================================================================

    /// Commands written to the modem.
    ///
    /// Labels: command
    pub const COMMANDS_ISSUED: Metric = Metric::counter("anynet.command.issued")
        .with_description("Commands written to the modem")
        .with_unit(Unit::Count)
        .with_labels(&["command"]);

    /// Commands completed with `ERROR` or `SEND FAIL`.
    ///
    /// Labels: command
    pub const COMMANDS_FAILED: Metric = Metric::counter("anynet.command.failed")
        .with_description("Commands completed with a failure code")
        .with_unit(Unit::Count)
        .with_labels(&["command"]);

    /// Commands abandoned after the configured timeout.
    ///
    /// Labels: command
    pub const COMMANDS_TIMED_OUT: Metric = Metric::counter("anynet.command.timed_out")
        .with_description("Commands abandoned after the configured timeout")
        .with_unit(Unit::Count)
        .with_labels(&["command"]);

    /// Time from writing a command to its completion code.
    ///
    /// Labels: command
    pub const COMMAND_LATENCY: Metric = Metric::histogram("anynet.command.latency_ms")
        .with_description("Time from writing a command to its completion code")
        .with_unit(Unit::Milliseconds)
        .with_labels(&["command"]);

    // ========================================================================
    // Reader
    // ========================================================================

    /// Frames read from the modem.
    ///
    /// Labels: category (empty, echo, success, failure, prefixed, prompt, line)
    pub const FRAMES_RECEIVED: Metric = Metric::counter("anynet.reader.frames")
        .with_description("Frames read from the modem")
        .with_unit(Unit::Count)
        .with_labels(&["category"]);

    /// Frames that matched no waiting caller and were dropped.
    ///
    /// Labels: category
    pub const FRAMES_DROPPED: Metric = Metric::counter("anynet.reader.frames_dropped")
        .with_description("Frames dropped because nothing was waiting for them")
        .with_unit(Unit::Count)
        .with_labels(&["category"]);

    // ========================================================================
    // Payloads
    // ========================================================================

    /// Payloads handed to subscription callbacks.
    ///
    /// Labels: slot
    pub const DELIVERIES: Metric = Metric::counter("anynet.subscribe.deliveries")
        .with_description("Payloads handed to subscription callbacks")
        .with_unit(Unit::Count)
        .with_labels(&["slot"]);

    /// Payload bytes delivered to subscription callbacks.
    pub const DELIVERED_BYTES: Metric = Metric::counter("anynet.subscribe.bytes")
        .with_description("Payload bytes delivered to subscription callbacks")
        .with_unit(Unit::Bytes);

    /// Payload bytes written after a publish prompt.
    pub const PUBLISHED_BYTES: Metric = Metric::counter("anynet.publish.bytes")
        .with_description("Payload bytes written after a publish prompt")
        .with_unit(Unit::Bytes);

    /// Every metric declared above.
    pub const ALL: &[Metric] = &[
        COMMANDS_ISSUED,
        COMMANDS_FAILED,
        COMMANDS_TIMED_OUT,
        COMMAND_LATENCY,
        FRAMES_RECEIVED,
        FRAMES_DROPPED,
        DELIVERIES,
        DELIVERED_BYTES,
        PUBLISHED_BYTES,
    ];
}

/// Describes all metrics used by the engine.
///
/// Call once at startup, after the recorder is installed.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
