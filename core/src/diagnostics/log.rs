use log::{error, info, trace, warn};

/// Component-scoped front for the `log` facade; the component becomes the log target.
#[derive(Debug, Clone, Copy)]
pub struct LogManager {
    component: &'static str,
}

impl LogManager {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn record(&self, message: &str) {
        info!(target: self.component, "{}", message);
    }

    pub fn warn(&self, message: &str) {
        warn!(target: self.component, "{}", message);
    }

    pub fn error(&self, message: &str) {
        error!(target: self.component, "{}", message);
    }

    pub fn trace(&self, message: &str) {
        trace!(target: self.component, "{}", message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("sonarcore")
    }
}
