use crate::gui_bridge::bridge::BridgeState;
use crate::gui_bridge::model::{CostmapView, SweepSummary};
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use sonarcore::diagnostics::{Metrics, MetricsRecorder};
use sonarcore::interface::{SensorKind, SonarDevice, TelemetrySource};
use sonarcore::processing::{DetectionEngine, FeatureMapper};
use sonarcore::scan::ScanController;
use sonarcore::telemetry::{TelemetryHub, TelemetryPoller};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub sweeps: u64,
    pub telemetry_samples: u64,
    pub latest: Option<SweepSummary>,
    pub metrics: Metrics,
}

/// Wires the scan pipeline and telemetry pollers together and runs them cooperatively.
pub struct Runner {
    config: WorkflowConfig,
    metrics: Arc<MetricsRecorder>,
    detector: Arc<DetectionEngine>,
    hub: Arc<TelemetryHub>,
    bridge: BridgeState,
    stop: Arc<watch::Sender<bool>>,
    epoch: Instant,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> anyhow::Result<Self> {
        config.validate().context("validating workflow config")?;
        let metrics = Arc::new(MetricsRecorder::new());
        let detector = Arc::new(
            DetectionEngine::new(config.cfar.clone()).context("configuring CFAR detector")?,
        );
        let hub = Arc::new(TelemetryHub::new(config.telemetry.capacity, metrics.clone()));
        let bridge = BridgeState::new(detector.clone(), hub.clone(), metrics.clone());
        let (stop, _) = watch::channel(false);
        Ok(Self {
            config,
            metrics,
            detector,
            hub,
            bridge,
            stop: Arc::new(stop),
            epoch: Instant::now(),
        })
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Sweep and telemetry timestamps are milliseconds since this instant.
    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    pub fn bridge_state(&self) -> BridgeState {
        self.bridge.clone()
    }

    /// Handle that ends a run from outside, e.g. on Ctrl+C.
    pub fn stop_handle(&self) -> Arc<watch::Sender<bool>> {
        self.stop.clone()
    }

    /// Runs until `sweep_limit` sweeps are published or the stop handle fires.
    pub async fn run<D, S>(
        &self,
        device: D,
        sources: Vec<(SensorKind, S)>,
        sweep_limit: Option<u64>,
    ) -> anyhow::Result<RunSummary>
    where
        D: SonarDevice,
        S: TelemetrySource + 'static,
    {
        self.stop.send_replace(false);

        let mapper = FeatureMapper::new(self.config.mapper.clone());
        let mut controller =
            ScanController::new(device, self.detector.clone(), mapper, self.metrics.clone())
                .with_epoch(self.epoch);
        controller
            .configure(self.config.scan.clone())
            .context("applying scan configuration")?;
        controller
            .initialize()
            .await
            .context("initializing sonar head")?;

        let pollers: Vec<_> = sources
            .into_iter()
            .map(|(kind, source)| {
                let mut poller = TelemetryPoller::new(
                    source,
                    kind,
                    self.hub.clone(),
                    &self.config.telemetry,
                    self.metrics.clone(),
                );
                let shutdown = self.stop.subscribe();
                tokio::spawn(async move { poller.run(shutdown).await })
            })
            .collect();

        let watcher = tokio::spawn(watch_sweeps(
            controller.subscribe(),
            self.hub.clone(),
            self.bridge.clone(),
            self.stop.clone(),
            sweep_limit,
        ));

        let scan_result = controller.run(self.stop.subscribe()).await;
        self.stop.send_replace(true);
        // Dropping the controller closes the report channel so the watcher drains and exits.
        drop(controller);
        let sweeps = scan_result.context("running scan loop")?;

        let mut telemetry_samples = 0;
        for poller in pollers {
            telemetry_samples += poller.await.context("joining telemetry poller")?;
        }
        let latest = watcher.await.context("joining sweep watcher")?;

        Ok(RunSummary {
            sweeps,
            telemetry_samples,
            latest,
            metrics: self.metrics.snapshot(),
        })
    }
}

async fn watch_sweeps(
    mut reports: broadcast::Receiver<Arc<sonarcore::scan::SweepReport>>,
    hub: Arc<TelemetryHub>,
    bridge: BridgeState,
    stop: Arc<watch::Sender<bool>>,
    sweep_limit: Option<u64>,
) -> Option<SweepSummary> {
    let mut seen = 0;
    let mut latest = None;
    loop {
        let report = match reports.recv().await {
            Ok(report) => report,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                log::warn!(target: "runner", "sweep watcher fell behind by {} reports", missed);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let localization = hub.localization_at(report.timestamp_ms);
        log::info!(
            target: "runner",
            "sweep {} at {} ms: {} detections, heading {}",
            report.sequence,
            report.timestamp_ms,
            report.detection_count(),
            localization
                .attitude
                .map(|att| format!("{:.1} deg", att.yaw.to_degrees()))
                .unwrap_or_else(|| "unknown".to_string())
        );
        let summary = SweepSummary::from_report(&report, localization);
        bridge.publish_sweep(summary.clone(), CostmapView::from_report(&report));
        latest = Some(summary);
        seen += 1;
        if sweep_limit.is_some_and(|limit| seen >= limit) {
            stop.send_replace(true);
        }
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{GeneratorConfig, Reflector, SyntheticSonar, SyntheticTelemetry};
    use sonarcore::processing::CfarConfig;
    use sonarcore::scan::ScanConfig;
    use sonarcore::telemetry::TelemetryConfig;

    fn small_workflow() -> WorkflowConfig {
        let mut scan = ScanConfig {
            start_step: 395,
            end_step: 14,
            settle_interval_ms: 10,
            response_timeout_ms: 50,
            ..Default::default()
        };
        scan.transmit.sample_count = 256;
        scan.transmit.sample_period = 1600;
        WorkflowConfig {
            scan,
            cfar: CfarConfig {
                ntc: 8,
                ngc: 2,
                ..Default::default()
            },
            telemetry: TelemetryConfig {
                poll_interval_ms: 20,
                sensors: vec![SensorKind::Gps, SensorKind::Attitude],
                ..Default::default()
            },
            generator: GeneratorConfig {
                seed: 3,
                reflectors: vec![Reflector {
                    bearing_deg: 0.0,
                    range_m: 3.0,
                    strength: 250,
                }],
                noise: 8,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn sources(runner: &Runner) -> Vec<(SensorKind, SyntheticTelemetry)> {
        runner
            .config()
            .telemetry
            .sensors
            .iter()
            .map(|&kind| {
                (
                    kind,
                    SyntheticTelemetry::new(runner.config().generator.clone(), kind, runner.epoch()),
                )
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn runner_stops_after_sweep_limit() {
        let cfg = small_workflow();
        let runner = Runner::new(cfg.clone()).unwrap();
        let device = SyntheticSonar::new(cfg.generator.clone(), cfg.mapper.speed_of_sound_m_s);

        let summary = runner.run(device, sources(&runner), Some(2)).await.unwrap();

        assert!(summary.sweeps >= 2);
        let latest = summary.latest.unwrap();
        assert_eq!(latest.columns, 20);
        assert_eq!(latest.range_bins, 256);
        assert!(latest.detections > 0);
        assert!(latest.localization.gps.is_some());
        assert!(latest.localization.imu.is_none());
        assert!(summary.telemetry_samples > 0);
        assert_eq!(summary.metrics.sweeps_completed as u64, summary.sweeps);
        let model = runner.bridge_state().model.read().unwrap().clone();
        assert!(model.latest_sweep.is_some());
        let costmap = model.latest_costmap.unwrap();
        assert_eq!(costmap.costmap.len(), costmap.grid_y.len());
        assert!(costmap.costmap.iter().all(|row| row.len() == costmap.grid_x.len()));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_handle_ends_the_run() {
        let cfg = small_workflow();
        let runner = Runner::new(cfg.clone()).unwrap();
        let device = SyntheticSonar::new(cfg.generator.clone(), cfg.mapper.speed_of_sound_m_s);
        let stop = runner.stop_handle();

        let (summary, _) = tokio::join!(runner.run(device, sources(&runner), None), async move {
            tokio::time::sleep(std::time::Duration::from_millis(25)).await;
            stop.send_replace(true);
        });

        let summary = summary.unwrap();
        assert_eq!(summary.sweeps, 0);
        assert!(summary.latest.is_none());
    }

    #[test]
    fn invalid_workflow_is_rejected() {
        let mut cfg = small_workflow();
        cfg.cfar.pfa = 0.0;
        assert!(Runner::new(cfg).is_err());
    }
}
