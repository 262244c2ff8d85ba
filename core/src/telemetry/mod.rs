pub mod buffer;
pub mod hub;
pub mod poller;

pub use buffer::{TelemetryBuffer, DEFAULT_CAPACITY};
pub use hub::{LocalizationSnapshot, TelemetryConfig, TelemetryHub};
pub use poller::TelemetryPoller;
