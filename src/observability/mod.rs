//! Observability core: structured logging, running-sum metrics and span tracing.
//!
//! A single [`Observability`] instance is built at startup and shared by handle
//! with the registry, dispatcher and request middleware. Nothing in here can
//! fail the caller: logging and metric recording are best-effort.

mod setup;
mod span;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

pub use setup::{init_prometheus, init_tracing};
pub use span::{FinishedSpan, Span, SpanStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Metric identity: name plus an ordered tag set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct MetricKey {
    name: String,
    tags: BTreeMap<String, String>,
}

impl MetricKey {
    fn new(name: &str, tags: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Renders as `name` or `name{k=v,k2=v2}`.
impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.tags.is_empty() {
            return Ok(());
        }
        f.write_str("{")?;
        for (i, (k, v)) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}

#[derive(Debug, Default)]
pub struct Observability {
    metrics: DashMap<MetricKey, f64>,
}

impl Observability {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a structured log record under a fresh trace id.
    pub fn log(&self, level: LogLevel, message: &str, attributes: serde_json::Value) {
        emit(level, &new_trace_id(), message, &attributes);
    }

    /// Add `value` to the running sum for `name` + `tags`.
    ///
    /// The sum is also mirrored to the `metrics` facade, which is a no-op unless a
    /// recorder (e.g. Prometheus) was installed.
    pub fn record_metric(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        *self.metrics.entry(MetricKey::new(name, tags)).or_insert(0.0) += value;

        let labels: Vec<metrics::Label> = tags
            .iter()
            .map(|(k, v)| metrics::Label::new(k.to_string(), v.to_string()))
            .collect();
        metrics::gauge!(name.to_string(), labels).increment(value);
    }

    /// Current value of a single metric series.
    pub fn metric(&self, name: &str, tags: &[(&str, &str)]) -> Option<f64> {
        self.metrics
            .get(&MetricKey::new(name, tags))
            .map(|v| *v.value())
    }

    /// Point-in-time copy of every series, keyed by `name{tags}`.
    ///
    /// Concurrent writers may or may not be reflected.
    pub fn metrics_snapshot(&self) -> BTreeMap<String, f64> {
        self.metrics
            .iter()
            .map(|entry| (entry.key().to_string(), *entry.value()))
            .collect()
    }

    pub fn start_span(&self, operation: &str, attributes: &[(&str, &str)]) -> Span {
        Span {
            trace_id: new_trace_id(),
            operation: operation.to_string(),
            started_at: Utc::now(),
            start: Instant::now(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            tags: BTreeMap::new(),
        }
    }

    /// Close `span`, recording `span.<op>.duration` (ms) and `span.<op>.count`,
    /// both tagged by status, and log the outcome.
    pub fn finish_span(
        &self,
        span: Span,
        status: SpanStatus,
        error: Option<String>,
    ) -> FinishedSpan {
        let duration = span.start.elapsed();
        let finished = FinishedSpan {
            trace_id: span.trace_id,
            operation: span.operation,
            started_at: span.started_at,
            ended_at: Utc::now(),
            duration,
            status,
            error,
            attributes: span.attributes,
            tags: span.tags,
        };

        let tags = [("status", status.as_str())];
        self.record_metric(
            &format!("span.{}.duration", finished.operation),
            finished.duration_ms(),
            &tags,
        );
        self.record_metric(&format!("span.{}.count", finished.operation), 1.0, &tags);

        let attributes = serde_json::json!({
            "operation": finished.operation,
            "status": status.as_str(),
            "duration_ms": finished.duration_ms(),
            "attributes": finished.attributes,
            "tags": finished.tags,
            "error": finished.error,
        });
        match status {
            SpanStatus::Success => emit(
                LogLevel::Debug,
                &finished.trace_id,
                "span finished",
                &attributes,
            ),
            SpanStatus::Error => emit(
                LogLevel::Warn,
                &finished.trace_id,
                "span failed",
                &attributes,
            ),
        }

        finished
    }

    /// Run `fut` inside a span, finishing it with the result's status on every path.
    pub async fn in_span<T, E, F>(
        &self,
        operation: &str,
        attributes: &[(&str, &str)],
        fut: F,
    ) -> Result<T, E>
    where
        E: fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        let span = self.start_span(operation, attributes);
        let result = fut.await;
        match &result {
            Ok(_) => self.finish_span(span, SpanStatus::Success, None),
            Err(err) => self.finish_span(span, SpanStatus::Error, Some(err.to_string())),
        };
        result
    }
}

fn new_trace_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn emit(level: LogLevel, trace_id: &str, message: &str, attributes: &serde_json::Value) {
    match level {
        LogLevel::Debug => tracing::debug!(trace_id, attributes = %attributes, "{message}"),
        LogLevel::Info => tracing::info!(trace_id, attributes = %attributes, "{message}"),
        LogLevel::Warn => tracing::warn!(trace_id, attributes = %attributes, "{message}"),
        LogLevel::Error => tracing::error!(trace_id, attributes = %attributes, "{message}"),
    }
}
