//! Per-stage timing collection
//!
//! Each session owns its own collector; the statistics end up in the
//! session summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Upper bound on retained measurements before the oldest half is dropped
const MAX_MEASUREMENTS: usize = 10_000;

/// Individual performance measurement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMeasurement {
    pub operation: String,
    pub duration_ms: f64,
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<Uuid>,
}

/// Statistical summary of performance measurements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub operation: String,
    pub count: usize,
    pub total_ms: f64,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub std_dev_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p95_ms: f64,
}

/// Thread-safe metrics collector
#[derive(Debug)]
pub struct MetricsCollector {
    measurements: Mutex<Vec<PerformanceMeasurement>>,
    enabled: bool,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MetricsCollector {
    pub fn new(enabled: bool) -> Self {
        Self {
            measurements: Mutex::new(Vec::new()),
            enabled,
        }
    }

    /// Record a performance measurement
    pub fn record(&self, operation: &str, duration: Duration, session_id: Option<Uuid>) {
        if !self.enabled {
            return;
        }

        let measurement = PerformanceMeasurement {
            operation: operation.to_string(),
            duration_ms: duration.as_secs_f64() * 1000.0,
            timestamp: Utc::now(),
            session_id,
        };

        if let Ok(mut measurements) = self.measurements.lock() {
            measurements.push(measurement);

            if measurements.len() > MAX_MEASUREMENTS {
                measurements.drain(0..MAX_MEASUREMENTS / 2);
            }
        }
    }

    /// Get all measurements for a specific operation
    pub fn get_measurements(&self, operation: &str) -> Vec<PerformanceMeasurement> {
        match self.measurements.lock() {
            Ok(measurements) => measurements
                .iter()
                .filter(|m| m.operation == operation)
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Calculate performance statistics for an operation
    pub fn calculate_stats(&self, operation: &str) -> Option<PerformanceStats> {
        let mut durations: Vec<f64> = self
            .get_measurements(operation)
            .iter()
            .map(|m| m.duration_ms)
            .collect();
        if durations.is_empty() {
            return None;
        }

        durations.sort_by(|a, b| a.total_cmp(b));

        let count = durations.len();
        let total: f64 = durations.iter().sum();
        let mean = total / count as f64;

        let variance = durations
            .iter()
            .map(|d| {
                let diff = d - mean;
                diff * diff
            })
            .sum::<f64>()
            / count as f64;

        let median = if count % 2 == 0 {
            (durations[count / 2 - 1] + durations[count / 2]) / 2.0
        } else {
            durations[count / 2]
        };

        let p95_index = ((count as f64) * 0.95) as usize;

        Some(PerformanceStats {
            operation: operation.to_string(),
            count,
            total_ms: total,
            mean_ms: mean,
            median_ms: median,
            std_dev_ms: variance.sqrt(),
            min_ms: durations[0],
            max_ms: durations[count - 1],
            p95_ms: durations[p95_index.min(count - 1)],
        })
    }

    /// Statistics for every recorded operation, ordered by name
    pub fn all_stats(&self) -> Vec<PerformanceStats> {
        let operations: BTreeMap<String, ()> = match self.measurements.lock() {
            Ok(measurements) => measurements.iter().map(|m| (m.operation.clone(), ())).collect(),
            Err(_) => BTreeMap::new(),
        };

        operations
            .keys()
            .filter_map(|operation| self.calculate_stats(operation))
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut measurements) = self.measurements.lock() {
            measurements.clear();
        }
    }

    pub fn measurement_count(&self) -> usize {
        self.measurements.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Export measurements to JSON
    pub fn export_to_json(&self) -> Result<String, serde_json::Error> {
        match self.measurements.lock() {
            Ok(measurements) => serde_json::to_string_pretty(&*measurements),
            Err(_) => Ok("[]".to_string()),
        }
    }
}

/// Measures one operation and reports it to a collector when stopped
pub struct Timer {
    start: Instant,
    operation: &'static str,
    session_id: Option<Uuid>,
    collector: Option<Arc<MetricsCollector>>,
}

impl Timer {
    pub fn start(operation: &'static str, session_id: Option<Uuid>) -> Self {
        Self {
            start: Instant::now(),
            operation,
            session_id,
            collector: None,
        }
    }

    pub fn start_with_collector(
        operation: &'static str,
        session_id: Option<Uuid>,
        collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            start: Instant::now(),
            operation,
            session_id,
            collector: Some(collector),
        }
    }

    /// Stop the timer and record the measurement
    pub fn stop(self) -> Duration {
        let duration = self.start.elapsed();

        if let Some(collector) = &self.collector {
            collector.record(self.operation, duration, self.session_id);
        }

        tracing::trace!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Timer completed"
        );

        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_collector() {
        let collector = MetricsCollector::new(true);
        let session_id = Uuid::new_v4();

        collector.record("align", Duration::from_millis(100), Some(session_id));
        collector.record("align", Duration::from_millis(150), Some(session_id));
        collector.record("align", Duration::from_millis(200), None);
        collector.record("assemble", Duration::from_millis(5), None);

        assert_eq!(collector.get_measurements("align").len(), 3);

        let stats = collector.calculate_stats("align").unwrap();
        assert_eq!(stats.count, 3);
        assert!((stats.mean_ms - 150.0).abs() < 1.0);
        assert!((stats.median_ms - 150.0).abs() < 1.0);
        assert!((stats.total_ms - 450.0).abs() < 1.0);

        let all = collector.all_stats();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].operation, "align");
        assert_eq!(all[1].operation, "assemble");
    }

    #[test]
    fn test_timer() {
        let collector = Arc::new(MetricsCollector::new(true));

        let timer = Timer::start_with_collector("filter", None, collector.clone());
        thread::sleep(Duration::from_millis(10));
        let duration = timer.stop();

        assert!(duration >= Duration::from_millis(10));
        assert_eq!(collector.measurement_count(), 1);
    }

    #[test]
    fn test_disabled_collector() {
        let collector = MetricsCollector::new(false);
        collector.record("test", Duration::from_millis(100), None);
        assert_eq!(collector.measurement_count(), 0);
        assert!(collector.calculate_stats("test").is_none());
    }

    #[test]
    fn test_export_to_json() {
        let collector = MetricsCollector::default();
        collector.record("validate", Duration::from_micros(300), None);
        let json = collector.export_to_json().unwrap();
        assert!(json.contains("\"validate\""));
    }
}
