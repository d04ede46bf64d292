//! Coordinator configuration

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Bound on every call to a participant; elapsing counts as unreachable
    pub call_timeout: Duration,

    /// Commit a sole participant with `commit_one_phase`
    pub one_phase_optimization: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            one_phase_optimization: true,
        }
    }
}

impl CoordinatorConfig {
    /// Short timeouts so unreachable participants fail fast in tests
    pub fn for_testing() -> Self {
        Self {
            call_timeout: Duration::from_millis(250),
            ..Default::default()
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_one_phase_optimization(mut self, enabled: bool) -> Self {
        self.one_phase_optimization = enabled;
        self
    }
}
