//! Logging handle for vpn-admin
//!
//! Components never reach for a global logger of their own. Each one is
//! handed a [`Logger`] at construction time and writes through it; the
//! handle forwards to the `log` facade under its own target so the binary
//! decides (once, at startup) where records end up.

use std::fmt;

/// Root target used when no component name is given
pub const ROOT_TARGET: &str = "vpn_admin";

/// Cheap, cloneable logging capability passed through constructors
#[derive(Debug, Clone)]
pub struct Logger {
    target: String,
    verbose: bool,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(ROOT_TARGET, false)
    }
}

impl Logger {
    /// Create a logger writing under `target`
    pub fn new(target: impl Into<String>, verbose: bool) -> Self {
        Self {
            target: target.into(),
            verbose,
        }
    }

    /// Derive a logger for a sub-component (`vpn_admin::runner`, ...)
    pub fn child(&self, component: &str) -> Self {
        Self {
            target: format!("{}::{}", self.target, component),
            verbose: self.verbose,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Debug output is only emitted in verbose mode
    pub fn debug(&self, message: impl fmt::Display) {
        if self.verbose {
            log::debug!(target: self.target.as_str(), "{}", message);
        }
    }

    pub fn info(&self, message: impl fmt::Display) {
        log::info!(target: self.target.as_str(), "{}", message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        log::warn!(target: self.target.as_str(), "{}", message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        log::error!(target: self.target.as_str(), "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_target() {
        let root = Logger::new("vpn_admin", true);
        let child = root.child("runner");
        assert_eq!(child.target(), "vpn_admin::runner");
        assert!(child.is_verbose());
    }

    #[test]
    fn test_default_is_quiet_root() {
        let logger = Logger::default();
        assert_eq!(logger.target(), ROOT_TARGET);
        assert!(!logger.is_verbose());
        // Logging without an installed backend is a no-op
        logger.debug("nothing");
        logger.info(format_args!("value {}", 1));
    }
}
