use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::math::geometry::{arange, bearing_span, polar_to_cartesian, range_resolution, unwrap_bearings};
use crate::prelude::{SonarError, SonarResult, WATER_SPEED_OF_SOUND};

/// Detected return in the vehicle frame, metres. +y is the sonar's 0° direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartesianPoint {
    pub x: f64,
    pub y: f64,
}

/// Cartesian products of one sweep. `costmap` is indexed `[y, x]` against `grid_y`/`grid_x`.
#[derive(Debug, Clone)]
pub struct FeatureMap {
    pub points: Vec<CartesianPoint>,
    pub costmap: Array2<f32>,
    pub grid_x: Vec<f64>,
    pub grid_y: Vec<f64>,
    pub bearings_deg: Vec<f64>,
}

impl FeatureMap {
    pub fn occupied_cells(&self) -> usize {
        self.costmap.iter().filter(|&&cost| cost > 0.0).count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    pub speed_of_sound_m_s: f64,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            speed_of_sound_m_s: WATER_SPEED_OF_SOUND,
        }
    }
}

/// Projects a polar detection mask onto the vehicle frame. Holds no per-sweep state.
#[derive(Debug, Clone, Default)]
pub struct FeatureMapper {
    config: MapperConfig,
}

impl FeatureMapper {
    pub fn new(config: MapperConfig) -> Self {
        Self { config }
    }

    pub fn speed_of_sound(&self) -> f64 {
        self.config.speed_of_sound_m_s
    }

    /// Metres covered by one range bin at the given sample period.
    pub fn range_resolution(&self, sample_period_s: f64) -> f64 {
        range_resolution(self.config.speed_of_sound_m_s, sample_period_s)
    }

    pub fn project(
        &self,
        mask: ArrayView2<bool>,
        angles_deg: &[f64],
        range_resolution_m: f64,
    ) -> SonarResult<FeatureMap> {
        let (range_bins, azimuths) = mask.dim();
        if angles_deg.len() != azimuths {
            return Err(SonarError::InvalidInput(format!(
                "{} bearings for {} mask columns",
                angles_deg.len(),
                azimuths
            )));
        }
        if !(range_resolution_m.is_finite() && range_resolution_m > 0.0) {
            return Err(SonarError::InvalidInput(format!(
                "range resolution must be positive, got {}",
                range_resolution_m
            )));
        }

        let bearings_deg = unwrap_bearings(angles_deg);

        let points: Vec<CartesianPoint> = mask
            .indexed_iter()
            .filter(|&(_, &hit)| hit)
            .map(|((range_idx, azimuth_idx), _)| {
                let range_m = range_idx as f64 * range_resolution_m;
                let (x, y) = polar_to_cartesian(range_m, bearings_deg[azimuth_idx]);
                CartesianPoint { x, y }
            })
            .collect();

        let (grid_x, grid_y) = grid_axes(range_bins, bearing_span(&bearings_deg), range_resolution_m);
        let mut costmap = Array2::zeros((grid_y.len(), grid_x.len()));
        for point in &points {
            let col = snap(&grid_x, point.x, range_resolution_m);
            let row = snap(&grid_y, point.y, range_resolution_m);
            costmap[[row, col]] = 1.0;
        }

        Ok(FeatureMap {
            points,
            costmap,
            grid_x,
            grid_y,
            bearings_deg,
        })
    }
}

/// Grid extent from sweep geometry: `height = bins * res`, `width = sin(span) * height`.
///
/// Spans whose sine is zero or negative leave a single column at `x = 0`; points outside the
/// grid clamp to its edge cells.
fn grid_axes(range_bins: usize, span_deg: f64, resolution: f64) -> (Vec<f64>, Vec<f64>) {
    let height = range_bins as f64 * resolution;
    let width = span_deg.to_radians().sin() * height;

    let mut grid_x = arange(-width / 2.0, width / 2.0, resolution);
    let mut grid_y = arange(0.0, height, resolution);
    if grid_x.is_empty() {
        grid_x.push(0.0);
    }
    if grid_y.is_empty() {
        grid_y.push(0.0);
    }
    (grid_x, grid_y)
}

/// Nearest cell on a uniform axis; the lower cell wins an exact tie and outliers clamp to the edge.
fn snap(axis: &[f64], value: f64, resolution: f64) -> usize {
    let last = axis.len() - 1;
    let offset = (value - axis[0]) / resolution;
    if offset <= 0.0 {
        return 0;
    }
    let lower = offset.floor();
    let idx = if offset - lower > 0.5 { lower + 1.0 } else { lower };
    (idx as usize).min(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn mapper() -> FeatureMapper {
        FeatureMapper::default()
    }

    #[test]
    fn single_detection_lands_on_bearing() {
        let mut mask = Array2::from_elem((32, 3), false);
        mask[[10, 1]] = true;
        let map = mapper().project(mask.view(), &[20.0, 30.0, 40.0], 0.1).unwrap();

        assert_eq!(map.points.len(), 1);
        let point = map.points[0];
        assert_abs_diff_eq!(point.x, 1.0 * 30f64.to_radians().sin(), epsilon = 1e-6);
        assert_abs_diff_eq!(point.y, 1.0 * 30f64.to_radians().cos(), epsilon = 1e-6);
        assert_eq!(map.occupied_cells(), 1);
    }

    #[test]
    fn costmap_marks_nearest_cell() {
        let mut mask = Array2::from_elem((40, 2), false);
        mask[[20, 0]] = true;
        let map = mapper().project(mask.view(), &[0.0, 60.0], 0.5).unwrap();

        // 60° span: width = sin(60°) * 20 m.
        assert_eq!(map.grid_y.len(), 40);
        assert_eq!(map.grid_x.len(), 35);
        let hit = map
            .costmap
            .indexed_iter()
            .find(|&(_, &cost)| cost > 0.0)
            .map(|(idx, _)| idx)
            .unwrap();
        let (row, col) = hit;
        assert_abs_diff_eq!(map.grid_y[row], 10.0, epsilon = 1e-9);
        assert!((map.grid_x[col] - 0.0).abs() <= 0.25);
    }

    #[test]
    fn wrapped_sweep_is_unwrapped_before_projection() {
        let mut mask = Array2::from_elem((16, 5), false);
        mask[[4, 2]] = true;
        let map = mapper()
            .project(mask.view(), &[350.0, 355.0, 0.0, 5.0, 10.0], 1.0)
            .unwrap();
        assert_eq!(map.bearings_deg, vec![350.0, 355.0, 360.0, 365.0, 370.0]);
        assert_abs_diff_eq!(map.points[0].x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(map.points[0].y, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn empty_mask_is_not_an_error() {
        let mask = Array2::from_elem((8, 4), false);
        let map = mapper().project(mask.view(), &[0.0, 10.0, 20.0, 30.0], 0.2).unwrap();
        assert!(map.points.is_empty());
        assert!(map.costmap.iter().all(|&cost| cost == 0.0));
        assert!(!map.grid_x.is_empty() && !map.grid_y.is_empty());
    }

    #[test]
    fn bearing_count_must_match_columns() {
        let mask = Array2::from_elem((8, 4), false);
        let err = mapper().project(mask.view(), &[0.0, 10.0], 0.2).unwrap_err();
        assert!(matches!(err, SonarError::InvalidInput(_)));
        assert!(mapper().project(mask.view(), &[0.0; 4], 0.0).is_err());
    }

    #[test]
    fn wide_sweeps_follow_sine_width() {
        let mut mask = Array2::from_elem((10, 3), false);
        mask[[5, 1]] = true;

        // sin(120°) * 10 m = 8.66 m.
        let map = mapper().project(mask.view(), &[0.0, 60.0, 120.0], 1.0).unwrap();
        assert_eq!(map.grid_x.len(), 9);
        assert_eq!(map.grid_y.len(), 10);
        assert_eq!(map.grid_y.first().copied(), Some(0.0));
        assert_eq!(map.occupied_cells(), 1);

        // A half turn or more has no positive width left: one column, y never below zero.
        for angles in [[0.0, 90.0, 180.0], [0.0, 120.0, 270.0]] {
            let map = mapper().project(mask.view(), &angles, 1.0).unwrap();
            assert_eq!(map.grid_x, vec![0.0]);
            assert_eq!(map.grid_y.len(), 10);
            assert_eq!(map.grid_y.first().copied(), Some(0.0));
            assert_eq!(map.costmap.dim(), (10, 1));
        }
    }

    #[test]
    fn resolution_follows_sample_period() {
        assert_abs_diff_eq!(mapper().range_resolution(4.0e-6), 0.002962, epsilon = 1e-9);
    }
}
