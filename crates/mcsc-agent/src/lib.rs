//! Supervision and configuration core for a single Minecraft server process.
//!
//! [`ServerController`] owns every configuration aggregate and the process
//! supervisor; callers go through it for all reads and mutations.

pub mod aggregate;
mod allowlist;
mod bans;
pub mod console;
pub mod controller;
pub mod download;
pub mod error;
pub mod launch;
pub mod layout;
mod ops;
pub mod properties;
pub mod settings;
pub mod supervisor;
mod versions;

pub use aggregate::AggregateKind;
pub use controller::ServerController;
pub use error::{ErrorKind, Result, ServerError};
pub use settings::{LockRetry, Settings};
