use std::str::FromStr;
use std::sync::{Arc, RwLock};

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::diagnostics::log::LogManager;
use crate::math::cfar_factor;
use crate::math::stats::StatsHelper;
use crate::prelude::{SonarError, SonarResult};

/// Noise estimator used by the detector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CfarAlgorithm {
    /// Mean of the whole training window.
    Ca,
    /// Smaller of the leading/lagging sums.
    #[default]
    Soca,
    /// Greater of the leading/lagging sums.
    Goca,
    /// Ranked training cell.
    Os,
}

impl CfarAlgorithm {
    pub const ALL: [CfarAlgorithm; 4] = [
        CfarAlgorithm::Ca,
        CfarAlgorithm::Soca,
        CfarAlgorithm::Goca,
        CfarAlgorithm::Os,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CfarAlgorithm::Ca => "CA",
            CfarAlgorithm::Soca => "SOCA",
            CfarAlgorithm::Goca => "GOCA",
            CfarAlgorithm::Os => "OS",
        }
    }
}

impl FromStr for CfarAlgorithm {
    type Err = SonarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CfarAlgorithm::ALL
            .into_iter()
            .find(|algorithm| algorithm.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| SonarError::InvalidInput(format!("unknown CFAR algorithm '{}'", s)))
    }
}

/// Detector tuning. `ntc` and `ngc` are per-side cell counts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CfarConfig {
    pub ntc: usize,
    pub ngc: usize,
    pub pfa: f64,
    pub algorithm: CfarAlgorithm,
    /// 1-based rank for [`CfarAlgorithm::Os`]; defaults to `ntc` (the window median).
    pub rank: Option<usize>,
    /// Absolute amplitude floor applied after the adaptive test; 0 disables it.
    pub threshold: u16,
    /// Overrides the multiplier derived from `pfa`.
    pub scale_factor: Option<f64>,
}

impl Default for CfarConfig {
    fn default() -> Self {
        Self {
            ntc: 80,
            ngc: 20,
            pfa: 1e-3,
            algorithm: CfarAlgorithm::Soca,
            rank: None,
            threshold: 0,
            scale_factor: None,
        }
    }
}

impl CfarConfig {
    /// Checks every field and derives the multiplier. Nothing is mutated on failure.
    pub fn resolve(&self) -> SonarResult<CfarSettings> {
        if self.ntc == 0 || self.ntc % 2 != 0 {
            return Err(SonarError::InvalidParameter(format!(
                "Ntc must be a positive even number, got {}",
                self.ntc
            )));
        }
        if self.ngc % 2 != 0 {
            return Err(SonarError::InvalidParameter(format!(
                "Ngc must be an even number, got {}",
                self.ngc
            )));
        }
        if !(self.pfa > 0.0 && self.pfa <= 1.0) {
            return Err(SonarError::InvalidParameter(format!(
                "Pfa must be in (0, 1], got {}",
                self.pfa
            )));
        }
        if self.threshold > u8::MAX as u16 {
            return Err(SonarError::InvalidParameter(format!(
                "threshold must be in [0, 255], got {}",
                self.threshold
            )));
        }

        let rank = self.rank.unwrap_or(self.ntc);
        if self.algorithm == CfarAlgorithm::Os && !(1..=2 * self.ntc).contains(&rank) {
            return Err(SonarError::InvalidParameter(format!(
                "OS rank must be in [1, {}], got {}",
                2 * self.ntc,
                rank
            )));
        }

        let scale_factor = match self.scale_factor {
            Some(factor) if !factor.is_finite() || factor <= 0.0 => {
                return Err(SonarError::InvalidParameter(format!(
                    "scale factor must be positive, got {}",
                    factor
                )));
            }
            Some(factor) => factor,
            None => match self.algorithm {
                CfarAlgorithm::Ca => cfar_factor::ca_scale_factor(self.pfa, self.ntc),
                CfarAlgorithm::Soca => cfar_factor::soca_scale_factor(self.pfa, self.ntc),
                CfarAlgorithm::Goca => cfar_factor::goca_scale_factor(self.pfa, self.ntc),
                CfarAlgorithm::Os => cfar_factor::os_scale_factor(self.pfa, self.ntc, rank),
            },
        };

        Ok(CfarSettings {
            config: self.clone(),
            rank,
            scale_factor,
        })
    }

    /// Rows at either edge that never hold a full training window.
    pub fn margin(&self) -> usize {
        self.ntc + self.ngc
    }
}

/// Validated configuration plus derived values; immutable once built.
#[derive(Debug, Clone)]
pub struct CfarSettings {
    pub config: CfarConfig,
    pub rank: usize,
    pub scale_factor: f64,
}

/// Mask plus the per-cell level each return was compared against.
#[derive(Debug, Clone)]
pub struct CfarOutput {
    pub mask: Array2<bool>,
    pub threshold: Array2<f32>,
}

/// Column-wise CFAR over a range × azimuth intensity matrix.
///
/// Parameters may be replaced while another task is detecting; each call works on the
/// settings it captured at entry.
pub struct DetectionEngine {
    active: RwLock<Arc<CfarSettings>>,
    logger: LogManager,
}

impl DetectionEngine {
    pub fn new(config: CfarConfig) -> SonarResult<Self> {
        let settings = config.resolve()?;
        Ok(Self {
            active: RwLock::new(Arc::new(settings)),
            logger: LogManager::new("cfar"),
        })
    }

    pub fn settings(&self) -> Arc<CfarSettings> {
        match self.active.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn config(&self) -> CfarConfig {
        self.settings().config.clone()
    }

    /// Swaps in a new configuration after full validation; the old one stays on error.
    pub fn update_parameters(&self, config: CfarConfig) -> SonarResult<()> {
        let settings = match config.resolve() {
            Ok(settings) => settings,
            Err(err) => {
                self.logger.warn(&format!("rejected CFAR update: {}", err));
                return Err(err);
            }
        };
        self.logger.record(&format!(
            "CFAR parameters updated: Ntc={}, Ngc={}, Pfa={}, alg={:?}, threshold={}, scale={:.4}",
            config.ntc,
            config.ngc,
            config.pfa,
            config.algorithm,
            config.threshold,
            settings.scale_factor
        ));
        let settings = Arc::new(settings);
        match self.active.write() {
            Ok(mut guard) => *guard = settings,
            Err(poisoned) => *poisoned.into_inner() = settings,
        }
        Ok(())
    }

    pub fn detect(&self, matrix: ArrayView2<u8>) -> Array2<bool> {
        let settings = self.settings();
        let mask = evaluate(&settings, matrix, None);
        self.logger.trace(&format!(
            "CFAR {:?} detections {}",
            settings.config.algorithm,
            mask.iter().filter(|&&hit| hit).count()
        ));
        mask
    }

    pub fn detect_with_threshold(&self, matrix: ArrayView2<u8>) -> CfarOutput {
        let settings = self.settings();
        let mut threshold = Array2::zeros(matrix.dim());
        let mask = evaluate(&settings, matrix, Some(&mut threshold));
        CfarOutput { mask, threshold }
    }
}

fn evaluate(
    settings: &CfarSettings,
    matrix: ArrayView2<u8>,
    mut levels: Option<&mut Array2<f32>>,
) -> Array2<bool> {
    let (rows, cols) = matrix.dim();
    let mut mask = Array2::from_elem((rows, cols), false);

    let config = &settings.config;
    let (ntc, ngc) = (config.ntc, config.ngc);
    let margin = config.margin();
    if rows <= 2 * margin {
        return mask;
    }

    // Sums of a u8 column never approach u64::MAX.
    let mut prefix = vec![0u64; rows + 1];
    let mut window: Vec<u8> = Vec::with_capacity(2 * ntc);
    let mut column: Vec<u8> = Vec::with_capacity(rows);

    for col in 0..cols {
        column.clear();
        column.extend(matrix.column(col).iter().copied());
        for (row, &value) in column.iter().enumerate() {
            prefix[row + 1] = prefix[row] + value as u64;
        }

        for row in margin..rows - margin {
            let leading = prefix[row - ngc] - prefix[row - margin];
            let lagging = prefix[row + margin + 1] - prefix[row + ngc + 1];

            let noise = match config.algorithm {
                CfarAlgorithm::Ca => (leading + lagging) as f64 / (2 * ntc) as f64,
                CfarAlgorithm::Soca => leading.min(lagging) as f64 / ntc as f64,
                CfarAlgorithm::Goca => leading.max(lagging) as f64 / ntc as f64,
                CfarAlgorithm::Os => {
                    window.clear();
                    window.extend_from_slice(&column[row - margin..row - ngc]);
                    window.extend_from_slice(&column[row + ngc + 1..=row + margin]);
                    StatsHelper::kth_smallest(&mut window, settings.rank).unwrap_or(0) as f64
                }
            };

            let level = settings.scale_factor * noise;
            let cell = column[row];
            let above_floor = config.threshold == 0 || cell as u16 > config.threshold;
            mask[[row, col]] = cell as f64 > level && above_floor;

            if let Some(levels) = levels.as_mut() {
                levels[[row, col]] = level as f32;
            }
        }
    }

    mask
}
