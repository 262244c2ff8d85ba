pub mod config;
pub mod controller;

pub use config::ScanConfig;
pub use controller::{ScanController, ScanState, SweepReport};
