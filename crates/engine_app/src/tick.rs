//! Tick driver.
//!
//! Owns the process-scoped [`Runtime`] and walks it through its lifecycle:
//!
//! 1. `initialize` builds the runtime and runs the system's `initialize`.
//! 2. `update` advances the tick counter and runs one system update.
//! 3. `shutdown` runs the system's `shutdown` and tears the runtime down.
//!
//! Calls made out of that order fail with `LifecycleViolation`.

use std::time::Instant;

use engine_ecs::{ContentResolver, EngineError, LifecycleState, NoContent};
use tracing::{debug, error, info, warn};

use crate::config::{RuntimeConfig, TickConfig};
use crate::runtime::Runtime;
use crate::system::ScriptSystem;

/// The lifecycle step a script system failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initialize,
    Update,
    Shutdown,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Phase::Initialize => "initialize",
            Phase::Update => "update",
            Phase::Shutdown => "shutdown",
        })
    }
}

/// Errors returned by the tick driver.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The script system returned an error.
    #[error("script system failed during {phase}: {error:#}")]
    System { phase: Phase, error: anyhow::Error },
}

impl DriverError {
    fn system(phase: Phase, error: anyhow::Error) -> Self {
        Self::System { phase, error }
    }
}

/// Drives a [`ScriptSystem`] against a [`Runtime`].
pub struct TickDriver<S> {
    system: S,
    runtime_config: RuntimeConfig,
    tick_config: TickConfig,
    content: Option<Box<dyn ContentResolver>>,
    runtime: Option<Runtime>,
    state: LifecycleState,
}

impl<S: std::fmt::Debug> std::fmt::Debug for TickDriver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickDriver")
            .field("system", &self.system)
            .field("tick_config", &self.tick_config)
            .field("state", &self.state)
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}

impl<S: ScriptSystem> TickDriver<S> {
    /// A driver in the uninitialized state.
    #[must_use]
    pub fn new(system: S, runtime_config: RuntimeConfig, tick_config: TickConfig) -> Self {
        Self {
            system,
            runtime_config,
            tick_config,
            content: None,
            runtime: None,
            state: LifecycleState::Uninitialized,
        }
    }

    /// Use `content` to resolve entity templates. Without it no template
    /// resolves.
    #[must_use]
    pub fn with_content(mut self, content: impl ContentResolver + 'static) -> Self {
        self.content = Some(Box::new(content));
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Returns the current tick counter, or 0 outside the running window.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.runtime.as_ref().map_or(0, Runtime::tick)
    }

    /// The driven system.
    #[must_use]
    pub fn system(&self) -> &S {
        &self.system
    }

    /// The driven system, mutably.
    pub fn system_mut(&mut self) -> &mut S {
        &mut self.system
    }

    /// The runtime, available only between `initialize` and `shutdown`.
    pub fn runtime(&self) -> Result<&Runtime, EngineError> {
        let state = self.state;
        self.runtime
            .as_ref()
            .ok_or(EngineError::LifecycleViolation {
                operation: "runtime",
                state,
            })
    }

    /// The runtime, available only while running.
    pub fn runtime_mut(&mut self) -> Result<&mut Runtime, EngineError> {
        let state = self.state;
        self.runtime
            .as_mut()
            .ok_or(EngineError::LifecycleViolation {
                operation: "runtime",
                state,
            })
    }

    /// Build the runtime and run the system's `initialize`.
    ///
    /// If the system fails, the runtime is torn down and the driver ends in
    /// the shut-down state.
    pub fn initialize(&mut self) -> Result<(), DriverError> {
        if self.state != LifecycleState::Uninitialized {
            return Err(self.violation("initialize").into());
        }

        let content = self
            .content
            .take()
            .unwrap_or_else(|| Box::new(NoContent));
        let mut runtime = Runtime::new(&self.runtime_config, content);
        self.state = LifecycleState::Running;

        if let Err(err) = self.system.initialize(&mut runtime) {
            error!(system = self.system.name(), error = %err, "initialize failed");
            self.state = LifecycleState::ShutDown;
            return Err(DriverError::system(Phase::Initialize, err));
        }

        info!(
            system = self.system.name(),
            entities = runtime.world().entity_count(),
            "runtime initialized"
        );
        self.runtime = Some(runtime);
        Ok(())
    }

    /// Advance the tick counter and run one system update.
    pub fn update(&mut self) -> Result<(), DriverError> {
        let Some(runtime) = self.runtime.as_mut() else {
            return Err(self.violation("update").into());
        };

        let tick_id = runtime.advance_tick();
        debug!(tick_id, "tick start");
        self.system
            .update(runtime)
            .map_err(|err| DriverError::system(Phase::Update, err))
    }

    /// Run the system's `shutdown` and tear the runtime down.
    ///
    /// The runtime is dropped even when the system fails.
    pub fn shutdown(&mut self) -> Result<(), DriverError> {
        let Some(mut runtime) = self.runtime.take() else {
            return Err(self.violation("shutdown").into());
        };

        let result = self.system.shutdown(&mut runtime);
        self.state = LifecycleState::ShutDown;
        info!(
            system = self.system.name(),
            ticks = runtime.tick(),
            entities = runtime.world().entity_count(),
            "runtime shut down"
        );
        result.map_err(|err| DriverError::system(Phase::Shutdown, err))
    }

    /// Initialize, tick at the configured rate until `max_ticks` (or
    /// forever), then shut down.
    ///
    /// A failing update stops the loop; the runtime is still shut down and
    /// the update error returned.
    pub fn run(&mut self) -> Result<(), DriverError> {
        let tick_duration = self.tick_config.tick_duration();
        let max_ticks = self.tick_config.max_ticks;

        self.initialize()?;
        info!(
            tick_rate = self.tick_config.tick_rate,
            max_ticks, "starting tick loop"
        );

        let mut tick_count = 0u64;
        loop {
            let start = Instant::now();

            if let Err(err) = self.update() {
                error!(tick_id = self.tick_id(), error = %err, "tick failed, shutting down");
                if let Err(shutdown_err) = self.shutdown() {
                    error!(error = %shutdown_err, "shutdown after failed tick also failed");
                }
                return Err(err);
            }

            tick_count += 1;
            if max_ticks > 0 && tick_count >= max_ticks {
                info!(ticks = tick_count, "tick loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            } else if !tick_duration.is_zero() {
                warn!(
                    tick_id = self.tick_id(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }

        self.shutdown()
    }

    fn violation(&self, operation: &'static str) -> EngineError {
        EngineError::LifecycleViolation {
            operation,
            state: self.state,
        }
    }
}
