//! # engine_app
//!
//! The script-facing side of the runtime: the [`Runtime`] handed to host
//! logic, the [`ScriptSystem`] trait that host logic implements, and the
//! [`TickDriver`] that owns the runtime and steps it through
//! initialize → update → shutdown.

pub mod config;
pub mod runtime;
pub mod system;
pub mod tick;

pub use config::{RuntimeConfig, TickConfig};
pub use runtime::{ENTITY_CREATED_EVENT, ENTITY_DESTROYED_EVENT, Runtime};
pub use system::ScriptSystem;
pub use tick::{DriverError, Phase, TickDriver};
