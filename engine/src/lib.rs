//! Offline plugin processing: routes the channels of a sound file into one or
//! more plugin instances, runs them block by block and writes the
//! interleaved result.

pub mod audio;
pub mod controls;
pub mod error;
pub mod plugins;
pub mod routing;
pub mod runner;
pub mod session;
pub mod sndfile;
pub mod urid;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
pub use plugins::{PluginFactory, PluginInstance, PortInfo, PortKind, PortLayout};
pub use runner::{DEFAULT_BLOCK_SIZE, ProcessOptions, RunSummary};
pub use session::{ApplyJob, ApplySummary, apply, process};
