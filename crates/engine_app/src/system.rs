//! Host logic driven by the tick loop.

use crate::runtime::Runtime;

/// Per-tick host logic: the code a behavior pack's scripts would run.
///
/// Errors are reported to the driver, which wraps them with the phase they
/// occurred in.
pub trait ScriptSystem {
    /// Name used in log output.
    fn name(&self) -> &str {
        "script"
    }

    /// Called once after the runtime is built.
    fn initialize(&mut self, _runtime: &mut Runtime) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once per tick.
    fn update(&mut self, runtime: &mut Runtime) -> anyhow::Result<()>;

    /// Called once before the runtime is torn down.
    fn shutdown(&mut self, _runtime: &mut Runtime) -> anyhow::Result<()> {
        Ok(())
    }
}
