//! Connectivity Probe Module
//!
//! Bounded-timeout reachability checks against the external services the
//! assistant depends on, reduced to a single "anything reachable" signal.

mod prober;
mod state;

pub use prober::ConnectivityProber;
pub use state::{is_any_reachable, ConnectivityState, ProbeReport};
