//! Sonar front-end core: scan sequencing, CFAR detection, polar to Cartesian
//! feature mapping and timestamped vehicle telemetry buffers.
//!
//! Device and telemetry transports sit behind the traits in [`interface`] so the
//! pipeline runs the same against hardware, a simulator or a test double.

pub mod diagnostics;
pub mod interface;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod scan;
pub mod telemetry;

pub use prelude::{SonarError, SonarResult, TransmitParameters};
