use serde::{Deserialize, Serialize};

use crate::interface::GainSetting;
use crate::prelude::{SonarError, SonarResult, TransmitParameters, GRADIANS_PER_CIRCLE};

/// Sweep geometry and per-ping settings for the scan head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// First step of a sweep, gradians.
    pub start_step: u16,
    /// Last step of a sweep; the sweep wraps through 0 when smaller than `start_step`.
    pub end_step: u16,
    pub transmit: TransmitParameters,
    pub gain: GainSetting,
    pub response_timeout_ms: u64,
    /// Pause after each step so the head can settle.
    pub settle_interval_ms: u64,
    /// Bins nearer than this are zeroed before accumulation.
    pub min_range_m: Option<f64>,
    /// Amplitudes below this are zeroed before accumulation.
    pub intensity_floor: Option<u8>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            start_step: 372,
            end_step: 27,
            transmit: TransmitParameters::default(),
            gain: GainSetting::Low,
            response_timeout_ms: 500,
            settle_interval_ms: 100,
            min_range_m: None,
            intensity_floor: None,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> SonarResult<()> {
        for (name, step) in [("start", self.start_step), ("end", self.end_step)] {
            if step >= GRADIANS_PER_CIRCLE {
                return Err(SonarError::InvalidParameter(format!(
                    "{} step must be in [0, {}], got {}",
                    name,
                    GRADIANS_PER_CIRCLE - 1,
                    step
                )));
            }
        }
        if self.transmit.sample_count == 0 {
            return Err(SonarError::InvalidParameter(
                "sample count must be positive".into(),
            ));
        }
        if self.transmit.sample_period == 0 {
            return Err(SonarError::InvalidParameter(
                "sample period must be positive".into(),
            ));
        }
        if self.response_timeout_ms == 0 {
            return Err(SonarError::InvalidParameter(
                "response timeout must be positive".into(),
            ));
        }
        if let Some(min_range) = self.min_range_m {
            if !(min_range.is_finite() && min_range >= 0.0) {
                return Err(SonarError::InvalidParameter(format!(
                    "minimum range must be non-negative, got {}",
                    min_range
                )));
            }
        }
        Ok(())
    }

    /// Number of steps in one sweep, counting both ends.
    pub fn steps_per_sweep(&self) -> usize {
        let span = (self.end_step + GRADIANS_PER_CIRCLE - self.start_step) % GRADIANS_PER_CIRCLE;
        span as usize + 1
    }
}
