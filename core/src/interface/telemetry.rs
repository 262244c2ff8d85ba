use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::prelude::{SonarError, SonarResult};

/// Sensor streams buffered for time correlation with sonar sweeps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Gps,
    Imu,
    Attitude,
    Pressure,
    Servo,
}

impl SensorKind {
    pub const ALL: [SensorKind; 5] = [
        SensorKind::Gps,
        SensorKind::Imu,
        SensorKind::Attitude,
        SensorKind::Pressure,
        SensorKind::Servo,
    ];

    /// MAVLink message the autopilot publishes for this stream.
    pub fn message_name(self) -> &'static str {
        match self {
            SensorKind::Gps => "GLOBAL_POSITION_INT",
            SensorKind::Imu => "RAW_IMU",
            SensorKind::Attitude => "ATTITUDE",
            SensorKind::Pressure => "SCALED_PRESSURE",
            SensorKind::Servo => "SERVO_OUTPUT_RAW",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorKind::Gps => "gps",
            SensorKind::Imu => "imu",
            SensorKind::Attitude => "attitude",
            SensorKind::Pressure => "pressure",
            SensorKind::Servo => "servo",
        };
        f.write_str(name)
    }
}

impl FromStr for SensorKind {
    type Err = SonarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorKind::ALL
            .into_iter()
            .find(|kind| kind.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| SonarError::InvalidInput(format!("unknown sensor kind '{}'", s)))
    }
}

/// Anything stored in a telemetry buffer carries a boot-relative timestamp.
pub trait Timestamped {
    fn timestamp_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsData {
    pub timestamp_ms: u64,
    /// Degrees × 1e7.
    pub latitude: i32,
    /// Degrees × 1e7.
    pub longitude: i32,
    /// Millimetres above MSL.
    pub altitude: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuData {
    pub timestamp_ms: u64,
    pub x_acc: f32,
    pub y_acc: f32,
    pub z_acc: f32,
    pub x_gyro: f32,
    pub y_gyro: f32,
    pub z_gyro: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttitudeData {
    pub timestamp_ms: u64,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub roll_speed: f32,
    pub pitch_speed: f32,
    pub yaw_speed: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PressureData {
    pub timestamp_ms: u64,
    /// hPa.
    pub press_abs: f32,
    /// hPa.
    pub press_diff: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServoData {
    pub timestamp_ms: u64,
    /// PWM microseconds for outputs 1..=8.
    pub channels: [u16; 8],
}

macro_rules! impl_timestamped {
    ($($ty:ty),*) => {
        $(impl Timestamped for $ty {
            fn timestamp_ms(&self) -> u64 {
                self.timestamp_ms
            }
        })*
    };
}

impl_timestamped!(GpsData, ImuData, AttitudeData, PressureData, ServoData);

/// A decoded telemetry message of any supported kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TelemetryRecord {
    Gps(GpsData),
    Imu(ImuData),
    Attitude(AttitudeData),
    Pressure(PressureData),
    Servo(ServoData),
}

impl TelemetryRecord {
    pub fn kind(&self) -> SensorKind {
        match self {
            TelemetryRecord::Gps(_) => SensorKind::Gps,
            TelemetryRecord::Imu(_) => SensorKind::Imu,
            TelemetryRecord::Attitude(_) => SensorKind::Attitude,
            TelemetryRecord::Pressure(_) => SensorKind::Pressure,
            TelemetryRecord::Servo(_) => SensorKind::Servo,
        }
    }
}

impl Timestamped for TelemetryRecord {
    fn timestamp_ms(&self) -> u64 {
        match self {
            TelemetryRecord::Gps(data) => data.timestamp_ms,
            TelemetryRecord::Imu(data) => data.timestamp_ms,
            TelemetryRecord::Attitude(data) => data.timestamp_ms,
            TelemetryRecord::Pressure(data) => data.timestamp_ms,
            TelemetryRecord::Servo(data) => data.timestamp_ms,
        }
    }
}

/// Pull-side boundary to the vehicle autopilot.
pub trait TelemetrySource: Send {
    /// Fetches the newest message of `kind`. Transport and decode failures map to
    /// [`SonarError::TelemetrySource`].
    fn poll(&mut self, kind: SensorKind) -> impl Future<Output = SonarResult<TelemetryRecord>> + Send;
}
