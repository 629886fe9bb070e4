pub mod config;
pub mod errors;
pub mod events;
pub mod facts;
pub mod metrics_defs;
pub mod pipeline;
pub mod reducer;
pub mod session;

#[cfg(test)]
mod testutils;

pub use errors::{RelayError, Result};
pub use pipeline::{Relay, RunOptions, RunSummary};
