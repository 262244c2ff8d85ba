use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::diagnostics::MetricsRecorder;
use crate::interface::{
    AttitudeData, GpsData, ImuData, PressureData, SensorKind, ServoData, TelemetryRecord,
};
use crate::telemetry::buffer::{TelemetryBuffer, DEFAULT_CAPACITY};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub capacity: usize,
    pub poll_interval_ms: u64,
    pub poll_timeout_ms: u64,
    pub sensors: Vec<SensorKind>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            poll_interval_ms: 100,
            poll_timeout_ms: 1000,
            sensors: SensorKind::ALL.to_vec(),
        }
    }
}

/// Navigation state nearest to one instant, one entry per stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalizationSnapshot {
    pub target_ms: u64,
    pub gps: Option<GpsData>,
    pub imu: Option<ImuData>,
    pub attitude: Option<AttitudeData>,
    pub pressure: Option<PressureData>,
}

/// One independent buffer per sensor stream.
pub struct TelemetryHub {
    gps: TelemetryBuffer<GpsData>,
    imu: TelemetryBuffer<ImuData>,
    attitude: TelemetryBuffer<AttitudeData>,
    pressure: TelemetryBuffer<PressureData>,
    servo: TelemetryBuffer<ServoData>,
    metrics: Arc<MetricsRecorder>,
}

impl TelemetryHub {
    pub fn new(capacity: usize, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            gps: TelemetryBuffer::new(capacity),
            imu: TelemetryBuffer::new(capacity),
            attitude: TelemetryBuffer::new(capacity),
            pressure: TelemetryBuffer::new(capacity),
            servo: TelemetryBuffer::new(capacity),
            metrics,
        }
    }

    /// Push path: routes a decoded record to its stream's buffer.
    pub fn ingest(&self, record: TelemetryRecord) {
        match record {
            TelemetryRecord::Gps(data) => self.gps.append(data),
            TelemetryRecord::Imu(data) => self.imu.append(data),
            TelemetryRecord::Attitude(data) => self.attitude.append(data),
            TelemetryRecord::Pressure(data) => self.pressure.append(data),
            TelemetryRecord::Servo(data) => self.servo.append(data),
        }
        self.metrics.record_telemetry_sample();
    }

    pub fn latest(&self, kind: SensorKind) -> Option<TelemetryRecord> {
        match kind {
            SensorKind::Gps => self.gps.latest().map(TelemetryRecord::Gps),
            SensorKind::Imu => self.imu.latest().map(TelemetryRecord::Imu),
            SensorKind::Attitude => self.attitude.latest().map(TelemetryRecord::Attitude),
            SensorKind::Pressure => self.pressure.latest().map(TelemetryRecord::Pressure),
            SensorKind::Servo => self.servo.latest().map(TelemetryRecord::Servo),
        }
    }

    pub fn nearest(&self, kind: SensorKind, target_ms: u64) -> Option<TelemetryRecord> {
        match kind {
            SensorKind::Gps => self.gps.nearest(target_ms).map(TelemetryRecord::Gps),
            SensorKind::Imu => self.imu.nearest(target_ms).map(TelemetryRecord::Imu),
            SensorKind::Attitude => self
                .attitude
                .nearest(target_ms)
                .map(TelemetryRecord::Attitude),
            SensorKind::Pressure => self
                .pressure
                .nearest(target_ms)
                .map(TelemetryRecord::Pressure),
            SensorKind::Servo => self.servo.nearest(target_ms).map(TelemetryRecord::Servo),
        }
    }

    pub fn len(&self, kind: SensorKind) -> usize {
        match kind {
            SensorKind::Gps => self.gps.len(),
            SensorKind::Imu => self.imu.len(),
            SensorKind::Attitude => self.attitude.len(),
            SensorKind::Pressure => self.pressure.len(),
            SensorKind::Servo => self.servo.len(),
        }
    }

    pub fn localization_at(&self, target_ms: u64) -> LocalizationSnapshot {
        LocalizationSnapshot {
            target_ms,
            gps: self.gps.nearest(target_ms),
            imu: self.imu.nearest(target_ms),
            attitude: self.attitude.nearest(target_ms),
            pressure: self.pressure.nearest(target_ms),
        }
    }

    pub fn gps(&self) -> &TelemetryBuffer<GpsData> {
        &self.gps
    }

    pub fn imu(&self) -> &TelemetryBuffer<ImuData> {
        &self.imu
    }

    pub fn attitude(&self) -> &TelemetryBuffer<AttitudeData> {
        &self.attitude
    }

    pub fn pressure(&self) -> &TelemetryBuffer<PressureData> {
        &self.pressure
    }

    pub fn servo(&self) -> &TelemetryBuffer<ServoData> {
        &self.servo
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, Arc::new(MetricsRecorder::new()))
    }
}
