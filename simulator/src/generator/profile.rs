use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sonarcore::interface::sonar::gradians_to_degrees;
use sonarcore::interface::{
    AttitudeData, DeviceResponse, GpsData, ImuData, PressureData, ScanCommand, SensorKind,
    ServoData, SonarDevice, TelemetryRecord, TelemetrySource,
};
use sonarcore::prelude::{SonarError, SonarResult, WATER_SPEED_OF_SOUND};
use std::time::Duration;
use tokio::time::{self, Instant};

/// A point target the synthetic head will echo from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reflector {
    pub bearing_deg: f64,
    pub range_m: f64,
    pub strength: u8,
}

/// Configuration for the synthetic sonar head and vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub seed: u64,
    pub reflectors: Vec<Reflector>,
    /// Upper bound of the uniform background noise.
    pub noise: u8,
    /// Beam width around each step that still sees a reflector.
    pub beam_width_deg: f64,
    /// Range extent of each echo, in bins.
    pub echo_bins: usize,
    /// Probability that a command goes unanswered.
    pub drop_rate: f64,
    pub response_latency_ms: u64,
    /// Probability that a telemetry poll fails.
    pub telemetry_failure_rate: f64,
    pub origin_latitude: f64,
    pub origin_longitude: f64,
    pub depth_m: f64,
    /// Vehicle turn rate, degrees per second.
    pub yaw_rate_deg_s: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            reflectors: vec![
                Reflector {
                    bearing_deg: 0.0,
                    range_m: 12.0,
                    strength: 220,
                },
                Reflector {
                    bearing_deg: 340.0,
                    range_m: 25.0,
                    strength: 180,
                },
                Reflector {
                    bearing_deg: 20.0,
                    range_m: 7.5,
                    strength: 200,
                },
            ],
            noise: 12,
            beam_width_deg: 2.0,
            echo_bins: 3,
            drop_rate: 0.0,
            response_latency_ms: 5,
            telemetry_failure_rate: 0.0,
            origin_latitude: 63.4305,
            origin_longitude: 10.3951,
            depth_m: 4.0,
            yaw_rate_deg_s: 1.5,
        }
    }
}

fn angular_distance(a: f64, b: f64) -> f64 {
    ((a - b + 540.0).rem_euclid(360.0) - 180.0).abs()
}

/// Seeded stand-in for a mechanically scanned sonar head.
pub struct SyntheticSonar {
    config: GeneratorConfig,
    speed_of_sound_m_s: f64,
    rng: StdRng,
    motor_on: bool,
}

impl SyntheticSonar {
    pub fn new(config: GeneratorConfig, speed_of_sound_m_s: f64) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            speed_of_sound_m_s,
            rng,
            motor_on: false,
        }
    }

    /// One ping's intensity profile for the commanded bearing.
    pub fn echo(&mut self, command: &ScanCommand) -> Vec<u8> {
        let bins = command.transmit.sample_count as usize;
        let bin_length = self.speed_of_sound_m_s * command.transmit.sample_period_s() / 2.0;
        let bearing = gradians_to_degrees(command.angle_step);
        let noise = self.config.noise;
        let mut data: Vec<u8> = (0..bins).map(|_| self.rng.gen_range(0..=noise)).collect();

        for reflector in &self.config.reflectors {
            if angular_distance(reflector.bearing_deg, bearing) > self.config.beam_width_deg / 2.0 {
                continue;
            }
            if bin_length <= 0.0 {
                continue;
            }
            let first = (reflector.range_m / bin_length).round() as usize;
            let last = first.saturating_add(self.config.echo_bins.max(1)).min(bins);
            for value in data.iter_mut().take(last).skip(first) {
                *value = (*value).max(reflector.strength);
            }
        }
        data
    }
}

impl SonarDevice for SyntheticSonar {
    async fn initialize(&mut self) -> SonarResult<()> {
        if !self.speed_of_sound_m_s.is_finite() || self.speed_of_sound_m_s <= 0.0 {
            return Err(SonarError::DeviceInit(format!(
                "cannot model echoes at {} m/s",
                self.speed_of_sound_m_s
            )));
        }
        self.motor_on = true;
        log::info!(
            target: "generator",
            "synthetic head up: {} reflectors, seed {}",
            self.config.reflectors.len(),
            self.config.seed
        );
        Ok(())
    }

    async fn transact(&mut self, command: &ScanCommand) -> Option<DeviceResponse> {
        time::sleep(Duration::from_millis(self.config.response_latency_ms)).await;
        if !self.motor_on {
            return None;
        }
        if self.config.drop_rate > 0.0 && self.rng.gen_bool(self.config.drop_rate.min(1.0)) {
            return None;
        }
        Some(DeviceResponse {
            angle_step: command.angle_step,
            data: self.echo(command),
        })
    }

    async fn motor_off(&mut self) {
        self.motor_on = false;
        log::info!(target: "generator", "synthetic head motor off");
    }
}

/// Seeded vehicle state answering telemetry polls, timestamped against a shared epoch.
pub struct SyntheticTelemetry {
    config: GeneratorConfig,
    rng: StdRng,
    epoch: Instant,
}

impl SyntheticTelemetry {
    pub fn new(config: GeneratorConfig, stream: SensorKind, epoch: Instant) -> Self {
        let offset = SensorKind::ALL
            .iter()
            .position(|kind| *kind == stream)
            .unwrap_or_default() as u64;
        let rng = StdRng::seed_from_u64(config.seed.wrapping_add(offset + 1));
        Self { config, rng, epoch }
    }

    fn jitter(&mut self, spread: f32) -> f32 {
        self.rng.gen_range(-spread..=spread)
    }

    pub fn sample(&mut self, kind: SensorKind) -> TelemetryRecord {
        let timestamp_ms = self.epoch.elapsed().as_millis() as u64;
        let elapsed_s = timestamp_ms as f64 / 1000.0;
        let yaw = (self.config.yaw_rate_deg_s * elapsed_s).rem_euclid(360.0).to_radians() as f32;
        match kind {
            SensorKind::Gps => TelemetryRecord::Gps(GpsData {
                timestamp_ms,
                latitude: (self.config.origin_latitude * 1e7) as i32,
                longitude: (self.config.origin_longitude * 1e7) as i32,
                altitude: (-self.config.depth_m * 1000.0) as i32,
            }),
            SensorKind::Imu => TelemetryRecord::Imu(ImuData {
                timestamp_ms,
                x_acc: self.jitter(0.05),
                y_acc: self.jitter(0.05),
                z_acc: -9.81 + self.jitter(0.05),
                x_gyro: self.jitter(0.01),
                y_gyro: self.jitter(0.01),
                z_gyro: self.config.yaw_rate_deg_s.to_radians() as f32 + self.jitter(0.01),
            }),
            SensorKind::Attitude => TelemetryRecord::Attitude(AttitudeData {
                timestamp_ms,
                roll: self.jitter(0.02),
                pitch: self.jitter(0.02),
                yaw,
                roll_speed: self.jitter(0.005),
                pitch_speed: self.jitter(0.005),
                yaw_speed: self.config.yaw_rate_deg_s.to_radians() as f32,
            }),
            SensorKind::Pressure => TelemetryRecord::Pressure(PressureData {
                timestamp_ms,
                // Surface pressure plus ~98 hPa per metre of sea water.
                press_abs: (1013.25 + 98.0 * self.config.depth_m) as f32 + self.jitter(0.5),
                press_diff: (98.0 * self.config.depth_m) as f32,
            }),
            SensorKind::Servo => TelemetryRecord::Servo(ServoData {
                timestamp_ms,
                channels: [1500; 8],
            }),
        }
    }
}

impl TelemetrySource for SyntheticTelemetry {
    async fn poll(&mut self, kind: SensorKind) -> SonarResult<TelemetryRecord> {
        let rate = self.config.telemetry_failure_rate;
        if rate > 0.0 && self.rng.gen_bool(rate.min(1.0)) {
            return Err(SonarError::TelemetrySource(format!(
                "{} unavailable",
                kind.message_name()
            )));
        }
        Ok(self.sample(kind))
    }
}

impl Default for SyntheticSonar {
    fn default() -> Self {
        Self::new(GeneratorConfig::default(), WATER_SPEED_OF_SOUND)
    }
}
