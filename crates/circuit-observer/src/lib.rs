//! HTTP control surface and WebSocket tick stream for the Circuit
//! simulation.
//!
//! This crate provides an Axum server that exposes:
//!
//! - **WebSocket endpoint** (`/simulations/live`) that creates one
//!   simulation per connection and streams a tick snapshot every tick
//! - **Control endpoints** for brain mode, broadcast and reject of the
//!   pending instruction, conflict and instruction queries, and CSV export
//! - **Injection endpoints** for anomalies and transcript lines reported
//!   by external tools
//!
//! # Architecture
//!
//! Each connection task exclusively owns its simulation. The
//! [`SimulationRegistry`] maps live simulation ids to a
//! [`SessionHandle`](session::SessionHandle); control endpoints send a
//! [`ControlCommand`](session::ControlCommand) through it and await the
//! reply, so control operations are serialized with the owner's ticks.
//!
//! [`SimulationRegistry`]: state::SimulationRegistry

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod session;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::{AppState, SimulationRegistry};
