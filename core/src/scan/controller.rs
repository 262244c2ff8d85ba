use std::sync::Arc;
use std::time::Duration;

use ndarray::Array2;
use tokio::sync::{broadcast, watch};
use tokio::time::{self, Instant};

use crate::diagnostics::{LogManager, MetricsRecorder};
use crate::interface::sonar::gradians_to_degrees;
use crate::interface::{DeviceResponse, ScanCommand, SonarDevice, SonarSample};
use crate::math::stats::StatsHelper;
use crate::prelude::{SonarError, SonarResult, GRADIANS_PER_CIRCLE};
use crate::processing::cfar::DetectionEngine;
use crate::processing::features::{FeatureMap, FeatureMapper};
use crate::processing::sweep::{self, SweepAccumulator};
use crate::scan::config::ScanConfig;

const REPORT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Stepping,
    SweepComplete,
}

/// Everything published for one finished sweep.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub sequence: u64,
    /// Milliseconds since the controller epoch, for telemetry correlation.
    pub timestamp_ms: u64,
    pub matrix: Array2<u8>,
    pub angles_deg: Vec<f64>,
    pub mask: Array2<bool>,
    pub features: FeatureMap,
    pub range_resolution_m: f64,
    pub first_valid_bin: usize,
    pub dropped_steps: usize,
    pub mean_intensity: f64,
}

impl SweepReport {
    pub fn detection_count(&self) -> usize {
        self.features.points.len()
    }
}

/// Drives the scan head one step per tick and turns finished sweeps into feature maps.
pub struct ScanController<D> {
    device: D,
    config: ScanConfig,
    state: ScanState,
    initialized: bool,
    current_step: u16,
    accumulator: SweepAccumulator,
    first_valid_bin: usize,
    dropped_in_sweep: usize,
    sequence: u64,
    detector: Arc<DetectionEngine>,
    mapper: FeatureMapper,
    publisher: broadcast::Sender<Arc<SweepReport>>,
    latest: Option<Arc<SweepReport>>,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
    epoch: Instant,
}

impl<D: SonarDevice> ScanController<D> {
    pub fn new(
        device: D,
        detector: Arc<DetectionEngine>,
        mapper: FeatureMapper,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        let config = ScanConfig::default();
        let (publisher, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        Self {
            device,
            accumulator: SweepAccumulator::new(config.transmit.sample_count as usize),
            current_step: config.start_step,
            config,
            state: ScanState::Idle,
            initialized: false,
            first_valid_bin: 0,
            dropped_in_sweep: 0,
            sequence: 0,
            detector,
            mapper,
            publisher,
            latest: None,
            metrics,
            logger: LogManager::new("scan"),
            epoch: Instant::now(),
        }
    }

    /// Shares a time origin with the telemetry side so sweep and sample timestamps line up.
    pub fn with_epoch(mut self, epoch: Instant) -> Self {
        self.epoch = epoch;
        self
    }

    /// Validates and applies a new sweep configuration; the in-progress sweep is discarded.
    pub fn configure(&mut self, config: ScanConfig) -> SonarResult<()> {
        if let Err(err) = config.validate() {
            self.logger.warn(&format!("rejected scan configuration: {}", err));
            return Err(err);
        }
        self.logger.record(&format!(
            "scan configured: steps {}..={} ({} per sweep), {} samples, period {}",
            config.start_step,
            config.end_step,
            config.steps_per_sweep(),
            config.transmit.sample_count,
            config.transmit.sample_period
        ));
        self.accumulator.reset(config.transmit.sample_count as usize);
        self.current_step = config.start_step;
        self.dropped_in_sweep = 0;
        self.first_valid_bin = 0;
        if self.state != ScanState::Idle {
            self.state = ScanState::Stepping;
        }
        self.config = config;
        Ok(())
    }

    /// Brings the device up. Failure is fatal for the scan task.
    pub async fn initialize(&mut self) -> SonarResult<()> {
        match self.device.initialize().await {
            Ok(()) => {
                self.initialized = true;
                self.logger.record("scan head initialized");
                Ok(())
            }
            Err(err) => {
                self.logger.error(&format!("failed to initialize scan head: {}", err));
                Err(match err {
                    SonarError::DeviceInit(_) => err,
                    other => SonarError::DeviceInit(other.to_string()),
                })
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SweepReport>> {
        self.publisher.subscribe()
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn current_step(&self) -> u16 {
        self.current_step
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn latest_report(&self) -> Option<Arc<SweepReport>> {
        self.latest.clone()
    }

    pub fn sweeps_completed(&self) -> u64 {
        self.sequence
    }

    /// Advances the state machine by one unit of work.
    ///
    /// Returns the report when this tick finished a sweep. Missed steps are logged here and
    /// never surface as errors.
    pub async fn tick(&mut self) -> SonarResult<Option<Arc<SweepReport>>> {
        if !self.initialized {
            return Err(SonarError::DeviceInit("scan head not initialized".into()));
        }
        match self.state {
            ScanState::Idle => {
                self.current_step = self.config.start_step;
                self.state = ScanState::Stepping;
                self.step_logged().await;
                Ok(None)
            }
            ScanState::Stepping => {
                self.step_logged().await;
                Ok(None)
            }
            ScanState::SweepComplete => Ok(self.complete_sweep()),
        }
    }

    async fn step_logged(&mut self) {
        if let Err(err) = self.step().await {
            self.metrics.record_dropped_step();
            self.logger.warn(&format!("{}; step skipped", err));
        }
    }

    /// Pings once at the current step and waits for that single response.
    pub async fn step(&mut self) -> SonarResult<()> {
        let step = self.current_step;
        let command = ScanCommand::new(step, self.config.gain, self.config.transmit);
        let timeout_ms = self.config.response_timeout_ms;

        let response = time::timeout(
            Duration::from_millis(timeout_ms),
            self.device.transact(&command),
        )
        .await;

        let outcome = match response {
            Ok(Some(response)) => {
                self.absorb(response);
                Ok(())
            }
            Ok(None) | Err(_) => {
                self.dropped_in_sweep += 1;
                Err(SonarError::DeviceTimeout { step, timeout_ms })
            }
        };

        if step == self.config.end_step {
            self.state = ScanState::SweepComplete;
            self.current_step = self.config.start_step;
        } else {
            self.current_step = (step + 1) % GRADIANS_PER_CIRCLE;
        }
        outcome
    }

    fn absorb(&mut self, response: DeviceResponse) {
        let transmit = self.config.transmit;
        let mut intensities = response.data;

        if let Some(min_range) = self.config.min_range_m {
            let (cleaned, first_valid) = sweep::clean(
                intensities,
                transmit.sample_period_s(),
                self.mapper.speed_of_sound(),
                min_range,
            );
            intensities = cleaned;
            self.first_valid_bin = first_valid;
        }
        if let Some(floor) = self.config.intensity_floor {
            sweep::threshold(&mut intensities, floor);
        }

        let intact = self.accumulator.push(SonarSample {
            angle_step: response.angle_step,
            angle_deg: gradians_to_degrees(response.angle_step),
            transmit,
            intensities,
        });
        if !intact {
            self.logger.warn(&format!(
                "step {} returned a sample count other than {}; resized",
                response.angle_step, transmit.sample_count
            ));
        }
    }

    fn complete_sweep(&mut self) -> Option<Arc<SweepReport>> {
        self.state = ScanState::Stepping;
        let dropped_steps = std::mem::take(&mut self.dropped_in_sweep);
        let completed = self.accumulator.finish();
        if completed.columns() == 0 {
            self.logger
                .warn("sweep finished without a single response; nothing to publish");
            return None;
        }

        let range_resolution_m = self
            .mapper
            .range_resolution(self.config.transmit.sample_period_s());
        let mask = self.detector.detect(completed.matrix.view());
        let features = match self
            .mapper
            .project(mask.view(), &completed.angles_deg, range_resolution_m)
        {
            Ok(features) => features,
            Err(err) => {
                self.logger.error(&format!("feature projection failed: {}", err));
                return None;
            }
        };

        self.sequence += 1;
        let report = Arc::new(SweepReport {
            sequence: self.sequence,
            timestamp_ms: self.epoch.elapsed().as_millis() as u64,
            mean_intensity: StatsHelper::mean(completed.matrix.iter().map(|&value| value as f64)),
            matrix: completed.matrix,
            angles_deg: completed.angles_deg,
            mask,
            features,
            range_resolution_m,
            first_valid_bin: self.first_valid_bin,
            dropped_steps,
        });

        self.metrics.record_sweep(report.detection_count());
        self.logger.record(&format!(
            "sweep {} complete: {} columns, {} dropped, {} detections, {} occupied cells",
            report.sequence,
            report.matrix.ncols(),
            report.dropped_steps,
            report.detection_count(),
            report.features.occupied_cells()
        ));

        // No subscribers is a normal condition.
        let _ = self.publisher.send(report.clone());
        self.latest = Some(report.clone());
        Some(report)
    }

    /// Ticks until `shutdown` flips to `true`, yielding between units of work.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> SonarResult<u64> {
        let settle = Duration::from_millis(self.config.settle_interval_ms);
        while !*shutdown.borrow() {
            self.tick().await?;
            if settle.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }
            tokio::select! {
                _ = time::sleep(settle) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        self.shutdown().await;
        Ok(self.sequence)
    }

    pub async fn shutdown(&mut self) {
        self.device.motor_off().await;
        self.state = ScanState::Idle;
        self.logger.record("scan head shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::TransmitParameters;
    use crate::processing::cfar::{CfarAlgorithm, CfarConfig};
    use approx::assert_abs_diff_eq;
    use std::collections::HashSet;

    /// Echoes zeros except a fixed spike, drops or stalls on chosen steps.
    struct MockHead {
        samples: usize,
        spike: Option<(u16, usize)>,
        silent: HashSet<u16>,
        stalled: HashSet<u16>,
        fail_init: bool,
        commands: Vec<u16>,
        motor_off: bool,
    }

    impl MockHead {
        fn new(samples: usize) -> Self {
            Self {
                samples,
                spike: None,
                silent: HashSet::new(),
                stalled: HashSet::new(),
                fail_init: false,
                commands: Vec::new(),
                motor_off: false,
            }
        }
    }

    impl SonarDevice for MockHead {
        async fn initialize(&mut self) -> SonarResult<()> {
            if self.fail_init {
                Err(SonarError::DeviceInit("no link".into()))
            } else {
                Ok(())
            }
        }

        async fn transact(&mut self, command: &ScanCommand) -> Option<DeviceResponse> {
            let step = command.angle_step;
            self.commands.push(step);
            if self.stalled.contains(&step) {
                std::future::pending::<()>().await;
            }
            if self.silent.contains(&step) {
                return None;
            }
            let mut data = vec![0u8; self.samples];
            if let Some((spike_step, bin)) = self.spike {
                if spike_step == step {
                    data[bin] = 200;
                }
            }
            Some(DeviceResponse {
                angle_step: step,
                data,
            })
        }

        async fn motor_off(&mut self) {
            self.motor_off = true;
        }
    }

    fn detector() -> Arc<DetectionEngine> {
        Arc::new(
            DetectionEngine::new(CfarConfig {
                ntc: 4,
                ngc: 2,
                algorithm: CfarAlgorithm::Ca,
                scale_factor: Some(3.0),
                ..Default::default()
            })
            .unwrap(),
        )
    }

    fn scan_config(start_step: u16, end_step: u16, samples: u16) -> ScanConfig {
        ScanConfig {
            start_step,
            end_step,
            transmit: TransmitParameters {
                sample_count: samples,
                ..Default::default()
            },
            response_timeout_ms: 50,
            settle_interval_ms: 0,
            ..Default::default()
        }
    }

    async fn controller(head: MockHead, config: ScanConfig) -> ScanController<MockHead> {
        let mut controller = ScanController::new(
            head,
            detector(),
            FeatureMapper::default(),
            Arc::new(MetricsRecorder::new()),
        );
        controller.configure(config).unwrap();
        controller.initialize().await.unwrap();
        controller
    }

    async fn run_sweep(controller: &mut ScanController<MockHead>) -> Arc<SweepReport> {
        for _ in 0..1000 {
            if let Some(report) = controller.tick().await.unwrap() {
                return report;
            }
        }
        panic!("sweep never completed");
    }

    #[tokio::test]
    async fn wrapping_sweep_completes_after_end_step() {
        let mut controller = controller(MockHead::new(32), scan_config(398, 1, 32)).await;
        assert_eq!(controller.state(), ScanState::Idle);

        for _ in 0..4 {
            assert!(controller.tick().await.unwrap().is_none());
        }
        assert_eq!(controller.state(), ScanState::SweepComplete);
        assert_eq!(controller.current_step(), 398);

        let report = controller.tick().await.unwrap().unwrap();
        assert_eq!(controller.state(), ScanState::Stepping);
        assert_eq!(report.angles_deg, vec![358.2, 359.1, 0.0, 0.9]);
        assert_eq!(report.matrix.dim(), (32, 4));
        assert_eq!(report.mask.dim(), (32, 4));
        assert_eq!(controller.device.commands, vec![398, 399, 0, 1]);
        assert_abs_diff_eq!(report.features.bearings_deg[3], 360.9, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn single_spike_sweep_yields_single_point() {
        let mut head = MockHead::new(64);
        head.spike = Some((100, 20));
        let mut controller = controller(head, scan_config(0, 399, 64)).await;

        let report = run_sweep(&mut controller).await;
        assert_eq!(report.matrix.ncols(), 400);
        assert_eq!(report.detection_count(), 1);
        assert_eq!(report.mask.iter().filter(|&&hit| hit).count(), 1);

        let range = 20.0 * report.range_resolution_m;
        let point = report.features.points[0];
        assert_abs_diff_eq!(point.x, range, epsilon = 1e-9);
        assert_abs_diff_eq!(point.y, 0.0, epsilon = 1e-9);
        assert_eq!(controller.metrics.snapshot().detections, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missed_responses_shrink_the_sweep() {
        let mut head = MockHead::new(16);
        head.silent.insert(11);
        head.stalled.insert(12);
        let mut controller = controller(head, scan_config(10, 13, 16)).await;

        let report = run_sweep(&mut controller).await;
        assert_eq!(report.matrix.ncols(), 2);
        assert_eq!(report.dropped_steps, 2);
        assert_eq!(report.angles_deg, vec![9.0, 11.7]);
        assert_eq!(controller.metrics.snapshot().steps_dropped, 2);
        assert_eq!(controller.device.commands, vec![10, 11, 12, 13]);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_end_step_still_closes_the_sweep() {
        let mut head = MockHead::new(16);
        head.silent.insert(13);
        let mut controller = controller(head, scan_config(10, 13, 16)).await;

        for _ in 0..4 {
            assert!(controller.tick().await.unwrap().is_none());
        }
        assert_eq!(controller.state(), ScanState::SweepComplete);
        assert_eq!(controller.current_step(), 10);

        let report = controller.tick().await.unwrap().unwrap();
        assert_eq!(report.matrix.ncols(), 3);
        assert_eq!(report.dropped_steps, 1);
        assert_eq!(report.angles_deg, vec![9.0, 9.9, 10.8]);
        assert_eq!(controller.device.commands, vec![10, 11, 12, 13]);

        // The next sweep starts over from the first step.
        controller.tick().await.unwrap();
        assert_eq!(controller.device.commands.last(), Some(&10));
    }

    #[tokio::test]
    async fn silent_sweep_publishes_nothing() {
        let mut head = MockHead::new(8);
        head.silent.extend([5, 6]);
        let mut controller = controller(head, scan_config(5, 6, 8)).await;
        for _ in 0..3 {
            assert!(controller.tick().await.unwrap().is_none());
        }
        assert_eq!(controller.state(), ScanState::Stepping);
        assert!(controller.latest_report().is_none());
    }

    #[tokio::test]
    async fn invalid_configuration_keeps_previous_one() {
        let mut controller = controller(MockHead::new(8), scan_config(5, 6, 8)).await;
        let err = controller.configure(scan_config(5, 400, 8)).unwrap_err();
        assert!(matches!(err, SonarError::InvalidParameter(_)));
        assert_eq!(controller.config().end_step, 6);
    }

    #[tokio::test]
    async fn failed_initialization_is_fatal() {
        let mut head = MockHead::new(8);
        head.fail_init = true;
        let mut controller = ScanController::new(
            head,
            detector(),
            FeatureMapper::default(),
            Arc::new(MetricsRecorder::new()),
        );
        let err = controller.initialize().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(controller.tick().await.is_err());
    }

    #[tokio::test]
    async fn subscribers_receive_each_sweep() {
        let mut controller = controller(MockHead::new(16), scan_config(0, 1, 16)).await;
        let mut reports = controller.subscribe();
        run_sweep(&mut controller).await;
        run_sweep(&mut controller).await;
        assert_eq!(reports.recv().await.unwrap().sequence, 1);
        assert_eq!(reports.recv().await.unwrap().sequence, 2);
        assert_eq!(controller.latest_report().unwrap().sequence, 2);
    }

    #[tokio::test]
    async fn blind_zone_is_cleaned_before_accumulation() {
        let mut head = MockHead::new(64);
        head.spike = Some((0, 2));
        let mut config = scan_config(0, 0, 64);
        // 160 ticks: ~2.96 mm per bin.
        config.min_range_m = Some(0.01);
        let mut controller = controller(head, config).await;
        let report = run_sweep(&mut controller).await;
        assert_eq!(report.first_valid_bin, 4);
        assert_eq!(report.matrix[[2, 0]], 0);
    }

    #[tokio::test]
    async fn run_stops_at_shutdown_and_parks_the_motor() {
        let mut controller = controller(MockHead::new(16), scan_config(0, 1, 16)).await;
        let mut reports = controller.subscribe();
        let (stop_tx, stop_rx) = watch::channel(false);

        let (sweeps, _) = tokio::join!(controller.run(stop_rx), async move {
            reports.recv().await.unwrap();
            stop_tx.send(true).unwrap();
        });

        assert!(sweeps.unwrap() >= 1);
        assert!(controller.device.motor_off);
        assert_eq!(controller.state(), ScanState::Idle);
    }
}
