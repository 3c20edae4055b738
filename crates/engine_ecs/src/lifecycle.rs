//! Runtime lifecycle states.

/// Where the runtime is in its initialize → update → shutdown lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    /// Constructed, `initialize` not yet called.
    #[default]
    Uninitialized,
    /// Between `initialize` and `shutdown`; the only state in which the
    /// runtime accepts calls.
    Running,
    /// `shutdown` has completed. Terminal.
    ShutDown,
}

impl LifecycleState {
    /// Whether updates may run.
    #[must_use]
    pub fn is_running(self) -> bool {
        self == LifecycleState::Running
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Running => "running",
            LifecycleState::ShutDown => "shut down",
        })
    }
}
