use crate::generator::profile::GeneratorConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use sonarcore::processing::{CfarAlgorithm, CfarConfig, MapperConfig};
use sonarcore::scan::ScanConfig;
use sonarcore::telemetry::TelemetryConfig;
use std::fs;
use std::path::Path;

/// Everything one simulator run needs; every section falls back to field defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub scan: ScanConfig,
    pub cfar: CfarConfig,
    pub mapper: MapperConfig,
    pub telemetry: TelemetryConfig,
    pub generator: GeneratorConfig,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    /// Applies command-line overrides on top of the file or default settings.
    pub fn with_overrides(
        mut self,
        seed: Option<u64>,
        algorithm: Option<CfarAlgorithm>,
        pfa: Option<f64>,
    ) -> Self {
        if let Some(seed) = seed {
            self.generator.seed = seed;
        }
        if let Some(algorithm) = algorithm {
            self.cfar.algorithm = algorithm;
        }
        if let Some(pfa) = pfa {
            self.cfar.pfa = pfa;
        }
        self
    }

    /// Rejects settings the core would refuse at startup.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.scan.validate().context("scan section")?;
        self.cfar.resolve().context("cfar section")?;
        if !(self.mapper.speed_of_sound_m_s.is_finite() && self.mapper.speed_of_sound_m_s > 0.0) {
            anyhow::bail!(
                "mapper section: speed of sound must be positive, got {}",
                self.mapper.speed_of_sound_m_s
            );
        }
        if !(0.0..=1.0).contains(&self.generator.drop_rate) {
            anyhow::bail!(
                "generator section: drop_rate must be within [0, 1], got {}",
                self.generator.drop_rate
            );
        }
        Ok(())
    }
}
