use ndarray::Array2;

use crate::interface::SonarSample;
use crate::math::geometry::range_resolution;

/// Zeroes every bin nearer than `min_range_m`.
///
/// Returns the cleaned vector and the index of the first bin at or beyond the minimum range.
pub fn clean(
    mut intensities: Vec<u8>,
    sample_period_s: f64,
    speed_of_sound_m_s: f64,
    min_range_m: f64,
) -> (Vec<u8>, usize) {
    let resolution = range_resolution(speed_of_sound_m_s, sample_period_s);
    let first_valid = if resolution > 0.0 && min_range_m > 0.0 {
        ((min_range_m / resolution).ceil() as usize).min(intensities.len())
    } else {
        0
    };
    intensities[..first_valid].fill(0);
    (intensities, first_valid)
}

/// Zeroes amplitudes below `floor`.
pub fn threshold(intensities: &mut [u8], floor: u8) {
    for value in intensities.iter_mut().filter(|value| **value < floor) {
        *value = 0;
    }
}

/// Range × azimuth matrix of one finished sweep with its per-column bearings.
#[derive(Debug, Clone)]
pub struct CompletedSweep {
    pub matrix: Array2<u8>,
    pub angles_deg: Vec<f64>,
    pub steps: Vec<u16>,
}

impl CompletedSweep {
    pub fn columns(&self) -> usize {
        self.matrix.ncols()
    }
}

/// In-progress sweep: samples in capture order, each resized to the configured bin count.
#[derive(Debug)]
pub struct SweepAccumulator {
    sample_count: usize,
    steps: Vec<u16>,
    angles_deg: Vec<f64>,
    columns: Vec<Vec<u8>>,
}

impl SweepAccumulator {
    pub fn new(sample_count: usize) -> Self {
        Self {
            sample_count,
            steps: Vec::new(),
            angles_deg: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Appends one sample. Returns `false` when the sample length had to be adjusted.
    pub fn push(&mut self, sample: SonarSample) -> bool {
        let mut intensities = sample.intensities;
        let intact = intensities.len() == self.sample_count;
        intensities.resize(self.sample_count, 0);
        self.steps.push(sample.angle_step);
        self.angles_deg.push(sample.angle_deg);
        self.columns.push(intensities);
        intact
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn reset(&mut self, sample_count: usize) {
        self.sample_count = sample_count;
        self.steps.clear();
        self.angles_deg.clear();
        self.columns.clear();
    }

    /// Stacks the accumulated columns and leaves the accumulator empty.
    pub fn finish(&mut self) -> CompletedSweep {
        let columns = std::mem::take(&mut self.columns);
        let matrix = Array2::from_shape_fn((self.sample_count, columns.len()), |(row, col)| {
            columns[col][row]
        });
        CompletedSweep {
            matrix,
            angles_deg: std::mem::take(&mut self.angles_deg),
            steps: std::mem::take(&mut self.steps),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::TransmitParameters;

    fn sample(step: u16, intensities: Vec<u8>) -> SonarSample {
        SonarSample {
            angle_step: step,
            angle_deg: step as f64 * 0.9,
            transmit: TransmitParameters::default(),
            intensities,
        }
    }

    #[test]
    fn clean_zeroes_blind_zone() {
        // 1500 m/s at 1 ms per bin is 0.75 m per bin.
        let (cleaned, first_valid) = clean(vec![9; 6], 1e-3, 1500.0, 1.6);
        assert_eq!(first_valid, 3);
        assert_eq!(cleaned, vec![0, 0, 0, 9, 9, 9]);
    }

    #[test]
    fn clean_clamps_to_vector_length() {
        let (cleaned, first_valid) = clean(vec![5; 4], 1e-3, 1500.0, 100.0);
        assert_eq!(first_valid, 4);
        assert!(cleaned.iter().all(|&value| value == 0));
        assert_eq!(clean(vec![5; 4], 1e-3, 1500.0, 0.0).1, 0);
    }

    #[test]
    fn threshold_removes_weak_returns() {
        let mut values = vec![3, 10, 11, 200];
        threshold(&mut values, 11);
        assert_eq!(values, vec![0, 0, 11, 200]);
    }

    #[test]
    fn finish_stacks_columns_in_capture_order() {
        let mut accumulator = SweepAccumulator::new(3);
        assert!(accumulator.push(sample(398, vec![1, 2, 3])));
        assert!(accumulator.push(sample(399, vec![4, 5, 6])));
        assert!(!accumulator.push(sample(0, vec![7])));
        assert_eq!(accumulator.len(), 3);

        let sweep = accumulator.finish();
        assert!(accumulator.is_empty());
        assert_eq!(sweep.matrix.dim(), (3, 3));
        assert_eq!(sweep.matrix.column(0).to_vec(), vec![1, 2, 3]);
        assert_eq!(sweep.matrix.column(2).to_vec(), vec![7, 0, 0]);
        assert_eq!(sweep.steps, vec![398, 399, 0]);
        assert_eq!(sweep.columns(), 3);
    }
}
