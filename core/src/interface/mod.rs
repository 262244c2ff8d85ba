pub mod sonar;
pub mod telemetry;

pub use sonar::{DeviceResponse, GainSetting, ScanCommand, SonarDevice, SonarSample};
pub use telemetry::{
    AttitudeData, GpsData, ImuData, PressureData, SensorKind, ServoData, TelemetryRecord,
    TelemetrySource, Timestamped,
};
