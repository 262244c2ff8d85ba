use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::prelude::{SonarResult, TransmitParameters, GRADIANS_PER_CIRCLE};

/// Receiver gain selection understood by the scan head.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GainSetting {
    #[default]
    Low,
    Normal,
    High,
}

/// One transducer command: ping once at `angle_step` with the given transmit parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanCommand {
    pub mode: u8,
    pub gain: GainSetting,
    pub angle_step: u16,
    pub transmit: TransmitParameters,
}

impl ScanCommand {
    pub fn new(angle_step: u16, gain: GainSetting, transmit: TransmitParameters) -> Self {
        Self {
            mode: 1,
            gain,
            angle_step,
            transmit,
        }
    }
}

/// Already-decoded device data message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceResponse {
    pub angle_step: u16,
    pub data: Vec<u8>,
}

/// A single decoded ping placed in a sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SonarSample {
    pub angle_step: u16,
    pub angle_deg: f64,
    pub transmit: TransmitParameters,
    pub intensities: Vec<u8>,
}

/// Converts native head units (400 per circle) to degrees.
pub fn gradians_to_degrees(step: u16) -> f64 {
    step as f64 * 360.0 / GRADIANS_PER_CIRCLE as f64
}

/// Boundary to the sonar driver. Framing and parsing live on the far side of this trait.
pub trait SonarDevice: Send {
    /// Brings the head up; a failure here is fatal for the scan task.
    fn initialize(&mut self) -> impl Future<Output = SonarResult<()>> + Send;

    /// Sends one command and waits for its data message. `None` means the device answered
    /// with nothing usable.
    fn transact(&mut self, command: &ScanCommand)
        -> impl Future<Output = Option<DeviceResponse>> + Send;

    fn motor_off(&mut self) -> impl Future<Output = ()> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradians_cover_full_circle() {
        assert_eq!(gradians_to_degrees(0), 0.0);
        assert_eq!(gradians_to_degrees(100), 90.0);
        assert_eq!(gradians_to_degrees(372), 334.8);
    }

    #[test]
    fn command_defaults_to_transmit_mode() {
        let command = ScanCommand::new(12, GainSetting::Normal, TransmitParameters::default());
        assert_eq!(command.mode, 1);
        assert_eq!(command.angle_step, 12);
    }
}
