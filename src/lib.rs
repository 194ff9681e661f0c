//! # hydrated
//!
//! Single-bottle daily hydration tracker.
//!
//! The library holds everything the binary does so integration tests can
//! drive it with a simulated clock and an in-memory store.
//!
//! ## Architecture
//!
//! - **Engine**: `day` (day keys), `pacing` (expected-intake curve),
//!   `state` (consumption snapshot, undo, rollover), `rhythm` (scoring),
//!   `nudge` (reminder decisions and delivery), `estimate` (photo fill
//!   estimation)
//! - **Session**: `session::HydrationSession` owns the snapshot and runs every
//!   operation with the rollover check, persistence and nudge re-evaluation
//! - **Daemon**: `core` loop, `io` (signals, logind/clock monitors, lock file),
//!   `config` (TOML with hot reload), `store` (persistence)
//! - **CLI**: `args` and `commands`

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod args;
pub mod commands;
pub mod common;
pub mod config;
pub mod day;
pub mod estimate;
pub mod io;
pub mod nudge;
pub mod pacing;
pub mod rhythm;
pub mod session;
pub mod state;
pub mod store;
pub mod time_source;

#[cfg(any(test, feature = "testing-support"))]
pub mod testing;

mod core;

pub use session::{HydrationSession, StatusReport};
