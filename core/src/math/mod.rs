pub mod cfar_factor;
pub mod geometry;
pub mod stats;

pub use stats::StatsHelper;
