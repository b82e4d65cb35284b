//! Motion, separation, and control logic for the Circuit traffic-pattern
//! simulation.
//!
//! A [`Simulation`] owns one world and advances it a tick at a time. The
//! modules below are the pieces it is assembled from; each is usable on
//! its own.
//!
//! # Modules
//!
//! - [`aircraft`] -- Aircraft state, per-mode sub-state, and instruction
//!   application.
//! - [`brain`] -- Conflict resolution strategies, cooldowns, and the
//!   pending-instruction workflow.
//! - [`clock`] -- Tick counter and simulated time.
//! - [`config`] -- Configuration loading from `circuit-config.yaml` into
//!   strongly-typed structs.
//! - [`detector`] -- Pairwise separation checks and conflict classification.
//! - [`geometry`] -- Planar frame, heading arithmetic, and the pattern track.
//! - [`history`] -- Per-tick history rows and CSV export.
//! - [`motion`] -- The per-tick motion model and chaos perturbation.
//! - [`simulation`] -- The tick orchestrator and control surface.
//! - [`transcript`] -- Radio transcript and message templates.
//!
//! [`Simulation`]: simulation::Simulation

pub mod aircraft;
pub mod brain;
pub mod clock;
pub mod config;
pub mod detector;
pub mod geometry;
pub mod history;
pub mod motion;
pub mod simulation;
pub mod transcript;

pub use config::{CircuitConfig, ConfigError, SimulationConfig};
pub use simulation::{InjectionError, Simulation, SimulationError};
