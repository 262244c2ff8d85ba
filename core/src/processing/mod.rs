pub mod cfar;
pub mod features;
pub mod sweep;

pub use cfar::{CfarAlgorithm, CfarConfig, CfarOutput, CfarSettings, DetectionEngine};
pub use features::{CartesianPoint, FeatureMap, FeatureMapper, MapperConfig};
pub use sweep::{CompletedSweep, SweepAccumulator};
