//! Per-call options

use std::time::Duration;

/// What an operation does after logging a failure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Return the operation's empty value
    #[default]
    Swallow,
    /// Return the error to the caller
    Propagate,
}

/// Options for a single invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Command timeout in seconds; zero or negative uses the configured default
    pub command_timeout_secs: i32,
    pub error_policy: ErrorPolicy,
    /// Emit debug diagnostics for the call
    pub log_debug: bool,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that return errors instead of swallowing them
    pub fn propagate() -> Self {
        Self {
            error_policy: ErrorPolicy::Propagate,
            ..Self::default()
        }
    }

    pub fn with_timeout_secs(mut self, secs: i32) -> Self {
        self.command_timeout_secs = secs;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_debug(mut self, log_debug: bool) -> Self {
        self.log_debug = log_debug;
        self
    }

    /// Command timeout for this call given the configured default
    pub fn effective_timeout(&self, default: Option<Duration>) -> Option<Duration> {
        if self.command_timeout_secs > 0 {
            Some(Duration::from_secs(self.command_timeout_secs as u64))
        } else {
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_swallow_without_debug() {
        let options = CallOptions::default();
        assert_eq!(options.error_policy, ErrorPolicy::Swallow);
        assert_eq!(options.command_timeout_secs, 0);
        assert!(!options.log_debug);
    }

    #[test]
    fn test_effective_timeout() {
        let default = Some(Duration::from_secs(30));
        assert_eq!(CallOptions::new().effective_timeout(default), default);
        assert_eq!(
            CallOptions::new().with_timeout_secs(-5).effective_timeout(default),
            default
        );
        assert_eq!(
            CallOptions::new().with_timeout_secs(90).effective_timeout(default),
            Some(Duration::from_secs(90))
        );
        assert_eq!(CallOptions::new().effective_timeout(None), None);
    }
}
