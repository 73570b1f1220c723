//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of the process.
//!
//! # Tasks
//! - Probe loop: checks connectivity at a fixed interval and updates the mode
//! - Persistence writer: replaces the local cache file after mutations

mod persist;
mod probe_loop;

pub use persist::{spawn_persist_task, PersistHandle};
pub use probe_loop::spawn_probe_task;
