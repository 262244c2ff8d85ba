use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::diagnostics::{LogManager, MetricsRecorder};
use crate::interface::{SensorKind, TelemetryRecord, TelemetrySource};
use crate::prelude::{SonarError, SonarResult};
use crate::telemetry::hub::{TelemetryConfig, TelemetryHub};

/// Pull loop for one sensor stream: poll, append, yield.
pub struct TelemetryPoller<S> {
    source: S,
    kind: SensorKind,
    hub: Arc<TelemetryHub>,
    interval: Duration,
    timeout: Duration,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl<S: TelemetrySource> TelemetryPoller<S> {
    pub fn new(
        source: S,
        kind: SensorKind,
        hub: Arc<TelemetryHub>,
        config: &TelemetryConfig,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            source,
            kind,
            hub,
            interval: Duration::from_millis(config.poll_interval_ms),
            timeout: Duration::from_millis(config.poll_timeout_ms.max(1)),
            metrics,
            logger: LogManager::new("telemetry"),
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    /// One poll under the configured timeout; the sample lands in the hub on success.
    pub async fn poll_once(&mut self) -> SonarResult<TelemetryRecord> {
        let record = match time::timeout(self.timeout, self.source.poll(self.kind)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(SonarError::TelemetrySource(format!(
                    "{} poll timed out after {} ms",
                    self.kind.message_name(),
                    self.timeout.as_millis()
                )))
            }
        };
        if record.kind() != self.kind {
            return Err(SonarError::TelemetrySource(format!(
                "asked for {}, source answered with {}",
                self.kind,
                record.kind()
            )));
        }
        self.hub.ingest(record);
        Ok(record)
    }

    /// Polls until `shutdown` flips; failures are logged and the next cycle proceeds.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut ingested = 0;
        while !*shutdown.borrow() {
            match self.poll_once().await {
                Ok(_) => ingested += 1,
                Err(err) => {
                    self.metrics.record_telemetry_error();
                    self.logger
                        .warn(&format!("could not get {} data: {}", self.kind, err));
                }
            }
            if self.interval.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }
            tokio::select! {
                _ = time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        self.logger
            .record(&format!("{} poller stopped after {} samples", self.kind, ingested));
        ingested
    }
}
