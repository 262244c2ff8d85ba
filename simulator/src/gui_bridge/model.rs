use serde::{Deserialize, Serialize};
use sonarcore::processing::CartesianPoint;
use sonarcore::scan::SweepReport;
use sonarcore::telemetry::LocalizationSnapshot;

/// JSON view of one finished sweep; the raw matrix stays in the process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepSummary {
    pub sequence: u64,
    pub timestamp_ms: u64,
    pub columns: usize,
    pub range_bins: usize,
    pub first_bearing_deg: Option<f64>,
    pub last_bearing_deg: Option<f64>,
    pub range_resolution_m: f64,
    pub first_valid_bin: usize,
    pub dropped_steps: usize,
    pub mean_intensity: f64,
    pub detections: usize,
    pub occupied_cells: usize,
    pub points: Vec<CartesianPoint>,
    pub localization: LocalizationSnapshot,
}

impl SweepSummary {
    pub fn from_report(report: &SweepReport, localization: LocalizationSnapshot) -> Self {
        let (range_bins, columns) = report.matrix.dim();
        Self {
            sequence: report.sequence,
            timestamp_ms: report.timestamp_ms,
            columns,
            range_bins,
            first_bearing_deg: report.features.bearings_deg.first().copied(),
            last_bearing_deg: report.features.bearings_deg.last().copied(),
            range_resolution_m: report.range_resolution_m,
            first_valid_bin: report.first_valid_bin,
            dropped_steps: report.dropped_steps,
            mean_intensity: report.mean_intensity,
            detections: report.detection_count(),
            occupied_cells: report.features.occupied_cells(),
            points: report.features.points.clone(),
            localization,
        }
    }
}

/// Cartesian costmap of one sweep, rows indexed along `grid_y`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostmapView {
    pub sequence: u64,
    pub grid_x: Vec<f64>,
    pub grid_y: Vec<f64>,
    pub costmap: Vec<Vec<f32>>,
}

impl CostmapView {
    pub fn from_report(report: &SweepReport) -> Self {
        let features = &report.features;
        Self {
            sequence: report.sequence,
            grid_x: features.grid_x.clone(),
            grid_y: features.grid_y.clone(),
            costmap: features
                .costmap
                .rows()
                .into_iter()
                .map(|row| row.to_vec())
                .collect(),
        }
    }
}

/// State served by the HTTP bridge.
#[derive(Debug, Clone, Serialize, Default)]
pub struct BridgeModel {
    pub latest_sweep: Option<SweepSummary>,
    pub latest_costmap: Option<CostmapView>,
    pub sweeps_seen: u64,
}
