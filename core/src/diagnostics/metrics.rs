use std::sync::Mutex;

use serde::Serialize;

/// Counters shared between the scan and telemetry tasks.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    pub sweeps_completed: usize,
    pub steps_dropped: usize,
    pub detections: usize,
    pub telemetry_samples: usize,
    pub telemetry_errors: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_sweep(&self, detections: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.sweeps_completed += 1;
            metrics.detections += detections;
        }
    }

    pub fn record_dropped_step(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.steps_dropped += 1;
        }
    }

    pub fn record_telemetry_sample(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.telemetry_samples += 1;
        }
    }

    pub fn record_telemetry_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.telemetry_errors += 1;
        }
    }

    pub fn snapshot(&self) -> Metrics {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            Metrics::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = MetricsRecorder::new();
        metrics.record_sweep(3);
        metrics.record_sweep(2);
        metrics.record_dropped_step();
        metrics.record_telemetry_sample();
        metrics.record_telemetry_error();
        assert_eq!(
            metrics.snapshot(),
            Metrics {
                sweeps_completed: 2,
                steps_dropped: 1,
                detections: 5,
                telemetry_samples: 1,
                telemetry_errors: 1,
            }
        );
    }
}
