use serde::{Deserialize, Serialize};

/// Azimuth steps per full rotation of the scan head (gradians).
pub const GRADIANS_PER_CIRCLE: u16 = 400;

/// Speed of sound in sea water used for range conversion, m/s.
pub const WATER_SPEED_OF_SOUND: f64 = 1481.0;

/// Duration of one device sample-period tick, seconds.
pub const SAMPLE_PERIOD_TICK_S: f64 = 25e-9;

/// Transmit parameters echoed with every sonar sample and carried in every scan command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmitParameters {
    /// Pulse length in microseconds.
    pub transmit_duration: u16,
    /// Sample period in 25 ns ticks.
    pub sample_period: u16,
    /// Transmit frequency in kHz.
    pub transmit_frequency: u16,
    /// Number of range bins returned per ping.
    pub sample_count: u16,
}

impl TransmitParameters {
    pub fn sample_period_s(&self) -> f64 {
        self.sample_period as f64 * SAMPLE_PERIOD_TICK_S
    }
}

impl Default for TransmitParameters {
    fn default() -> Self {
        Self {
            transmit_duration: 80,
            sample_period: 160,
            transmit_frequency: 750,
            sample_count: 1024,
        }
    }
}

/// Common error type shared by the scan, detection and telemetry paths.
#[derive(thiserror::Error, Debug)]
pub enum SonarError {
    #[error("device initialization failed: {0}")]
    DeviceInit(String),
    #[error("no device response for step {step} within {timeout_ms} ms")]
    DeviceTimeout { step: u16, timeout_ms: u64 },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("telemetry source failure: {0}")]
    TelemetrySource(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl SonarError {
    /// Only initialization failures stop the process; everything else degrades a single unit of work.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SonarError::DeviceInit(_))
    }
}

pub type SonarResult<T> = Result<T, SonarError>;
