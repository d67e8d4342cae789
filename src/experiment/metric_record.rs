//! Metric Record - named scalar result of a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metric Record represents a single named scalar logged to a run.
///
/// A run holds at most one value per key; logging the same key again
/// replaces the earlier record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    run_id: String,
    key: String,
    value: f64,
    timestamp: DateTime<Utc>,
}

impl MetricRecord {
    /// Create a new metric record with the current timestamp.
    ///
    /// # Arguments
    ///
    /// * `run_id` - ID of the parent run
    /// * `key` - Metric name (e.g., "mae", "r2")
    /// * `value` - Metric value
    #[must_use]
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, value: f64) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            value,
            timestamp: Utc::now(),
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the metric key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the metric value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Get the timestamp when the value was logged.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_record_new() {
        let metric = MetricRecord::new("run-1", "mae", 0.42);
        assert_eq!(metric.run_id(), "run-1");
        assert_eq!(metric.key(), "mae");
        assert_eq!(metric.value(), 0.42);
    }

    #[test]
    fn test_metric_record_serialization() {
        let metric = MetricRecord::new("run-1", "rmse", 0.731_234_567_890_123);
        let json = serde_json::to_string(&metric).unwrap();
        let back: MetricRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(metric, back);
    }
}
