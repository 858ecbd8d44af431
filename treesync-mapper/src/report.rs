//! Outcome of a manager operation: aggregated errors plus soft warnings.

use std::fmt;

use treesync_core::MultiError;

use crate::error::MapperError;

#[derive(Debug, Default)]
pub struct Report {
    pub errors: MultiError,
    pub warnings: Vec<String>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a soft problem; it is logged and kept for the caller.
    pub fn warn(&mut self, message: impl fmt::Display) {
        let message = message.to_string();
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    pub fn warn_all(&mut self, messages: impl IntoIterator<Item = String>) {
        for message in messages {
            self.warn(message);
        }
    }

    pub fn error(&mut self, err: MapperError) {
        err.append_to(&mut self.errors);
    }

    /// Adds `err` nested under `message`.
    pub fn error_prefixed(&mut self, message: impl Into<String>, err: MapperError) {
        self.errors.push_prefixed(message, err.into_multi());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn merge(&mut self, other: Report) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_errors_nest_causes() {
        let mut report = Report::new();
        report.error_prefixed("invalid config \"main/x\"", MapperError::invalid("bad"));
        report.warn("soft");
        assert_eq!(report.errors.to_string(), "invalid config \"main/x\":\n- bad");
        assert_eq!(report.warnings, vec!["soft"]);
        assert!(report.has_errors());
    }
}
