//! Span types for explicit start/finish tracing.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Outcome recorded when a span is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStatus {
    Success,
    Error,
}

impl SpanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanStatus::Success => "success",
            SpanStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An in-flight unit of work.
///
/// Created by [`super::Observability::start_span`] and consumed by
/// [`super::Observability::finish_span`], so a span cannot be finished twice.
#[derive(Debug)]
#[must_use = "a span must be passed to finish_span on every exit path"]
pub struct Span {
    pub(super) trace_id: String,
    pub(super) operation: String,
    pub(super) started_at: DateTime<Utc>,
    pub(super) start: Instant,
    pub(super) attributes: BTreeMap<String, String>,
    pub(super) tags: BTreeMap<String, f64>,
}

impl Span {
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn set_tag(&mut self, key: impl Into<String>, value: f64) {
        self.tags.insert(key.into(), value);
    }
}

/// A span after `finish_span`; the only place a duration exists.
#[derive(Debug, Clone)]
pub struct FinishedSpan {
    pub trace_id: String,
    pub operation: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration: Duration,
    pub status: SpanStatus,
    pub error: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub tags: BTreeMap<String, f64>,
}

impl FinishedSpan {
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}
