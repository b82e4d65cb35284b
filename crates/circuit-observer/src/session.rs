//! Exclusive ownership of one simulation by its connection task.
//!
//! A [`Session`] owns a [`Simulation`] outright. HTTP handlers never touch
//! it directly: they send a [`ControlCommand`] through the session's
//! [`SessionHandle`] and await the reply on a oneshot channel. The owning
//! task interleaves those commands with its own ticks, so every control
//! operation runs between two ticks and never during one.

use chrono::{DateTime, Utc};
use circuit_core::Simulation;
use circuit_core::clock::ClockError;
use circuit_core::history::ExportError;
use circuit_core::simulation::InjectionError;
use circuit_types::{
    Anomaly, BrainMode, Conflict, ExternalAnomaly, ExternalTranscript, Instruction, SimulationId,
    TickSnapshot,
};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

/// Capacity of a session's command queue.
const COMMAND_CAPACITY: usize = 32;

/// A control operation addressed to one simulation.
///
/// Each variant carries the sender half of a oneshot channel on which the
/// owning task delivers the result.
#[derive(Debug)]
pub enum ControlCommand {
    /// Switch the brain mode.
    SetBrainMode {
        /// `true` for automatic mode.
        auto_mode: bool,
        /// Receives the mode now in effect.
        reply: oneshot::Sender<BrainMode>,
    },
    /// Broadcast the pending instruction.
    Broadcast {
        /// Receives whether an instruction was pending.
        reply: oneshot::Sender<bool>,
    },
    /// Reject the pending instruction.
    Reject {
        /// Receives whether an instruction was pending.
        reply: oneshot::Sender<bool>,
    },
    /// Read the conflicts from the last tick.
    Conflicts {
        /// Receives the conflicts.
        reply: oneshot::Sender<Vec<Conflict>>,
    },
    /// Read the instruction history.
    Instructions {
        /// Maximum number of instructions returned.
        limit: usize,
        /// Receives the instructions, most recent first.
        reply: oneshot::Sender<Vec<Instruction>>,
    },
    /// Export the history log as CSV.
    ExportCsv {
        /// Receives the CSV text.
        reply: oneshot::Sender<Result<String, ExportError>>,
    },
    /// Merge an externally reported anomaly.
    InjectAnomaly {
        /// The reported anomaly.
        anomaly: ExternalAnomaly,
        /// Receives the stored anomaly.
        reply: oneshot::Sender<Result<Anomaly, InjectionError>>,
    },
    /// Append an externally supplied transcript line.
    InjectTranscript {
        /// The line to append.
        line: ExternalTranscript,
        /// Receives the validation result.
        reply: oneshot::Sender<Result<(), InjectionError>>,
    },
}

impl ControlCommand {
    /// Run the command against `sim` and deliver the reply.
    ///
    /// A caller that stopped waiting is not an error; the result is
    /// dropped.
    pub fn execute(self, sim: &mut Simulation) {
        match self {
            Self::SetBrainMode { auto_mode, reply } => {
                sim.set_brain_mode(BrainMode::from_auto(auto_mode));
                let _ = reply.send(sim.brain_mode());
            }
            Self::Broadcast { reply } => {
                let _ = reply.send(sim.broadcast());
            }
            Self::Reject { reply } => {
                let _ = reply.send(sim.reject());
            }
            Self::Conflicts { reply } => {
                let _ = reply.send(sim.conflicts().to_vec());
            }
            Self::Instructions { limit, reply } => {
                let _ = reply.send(sim.instructions(limit));
            }
            Self::ExportCsv { reply } => {
                let _ = reply.send(sim.export_csv());
            }
            Self::InjectAnomaly { anomaly, reply } => {
                let _ = reply.send(sim.inject_anomaly(anomaly));
            }
            Self::InjectTranscript { line, reply } => {
                let _ = reply.send(sim.inject_transcript(&line));
            }
        }
    }
}

/// Progress of a live simulation, published after every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionStatus {
    /// Ticks completed.
    pub tick: u64,
    /// Simulated seconds elapsed.
    pub sim_time_sec: f64,
    /// Aircraft currently simulated.
    pub aircraft: usize,
}

/// The cloneable address of a live session, held by the registry.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Command queue of the owning task.
    pub commands: mpsc::Sender<ControlCommand>,
    /// Wall-clock creation time.
    pub created_at: DateTime<Utc>,
    /// Latest published status.
    pub status: watch::Receiver<SessionStatus>,
}

/// One simulation and the receiving ends of its control channels.
#[derive(Debug)]
pub struct Session {
    sim: Simulation,
    commands: mpsc::Receiver<ControlCommand>,
    status: watch::Sender<SessionStatus>,
}

impl Session {
    /// Wrap `sim` and create the handle other tasks use to reach it.
    pub fn new(sim: Simulation) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let (status_tx, status_rx) = watch::channel(status_of(&sim));
        let handle = SessionHandle {
            commands: tx,
            created_at: Utc::now(),
            status: status_rx,
        };
        let session = Self {
            sim,
            commands: rx,
            status: status_tx,
        };
        (session, handle)
    }

    /// Id of the owned simulation.
    pub const fn id(&self) -> SimulationId {
        self.sim.id()
    }

    /// Advance the simulation one tick and publish the new status.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError`] if the simulation clock cannot advance.
    pub fn tick(&mut self) -> Result<TickSnapshot, ClockError> {
        let snapshot = self.sim.step()?;
        self.status.send_replace(status_of(&self.sim));
        Ok(snapshot)
    }

    /// Wait for the next control command.
    ///
    /// Returns `None` once every handle has been dropped.
    pub async fn next_command(&mut self) -> Option<ControlCommand> {
        self.commands.recv().await
    }

    /// Execute a control command against the owned simulation.
    pub fn handle(&mut self, command: ControlCommand) {
        debug!(sim_id = %self.sim.id(), ?command, "control command");
        command.execute(&mut self.sim);
    }
}

fn status_of(sim: &Simulation) -> SessionStatus {
    SessionStatus {
        tick: sim.tick(),
        sim_time_sec: sim.sim_time_sec(),
        aircraft: sim.fleet().len(),
    }
}
