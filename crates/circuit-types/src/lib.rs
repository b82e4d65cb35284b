//! Shared wire types for the Circuit traffic-pattern simulation.
//!
//! This crate is the single source of truth for everything that crosses the
//! boundary between the simulation core and its observers. Types flow
//! downstream to `TypeScript` via `ts-rs` for the dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Simulation, instruction, and aircraft identifiers
//! - [`enums`] -- Flight modes, legs, severities, instruction kinds
//! - [`structs`] -- Aircraft view, conflicts, anomalies, instructions,
//!   transcript lines, tick snapshots, history rows

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{
    BrainMode, ClearanceStatus, FlightMode, Geometry, InstructionStatus, InstructionType,
    PatternDirection, PatternLeg, Phase, RouteSegment, Severity, TranscriptRole,
};
pub use ids::{AircraftId, InstructionId, SimulationId};
pub use structs::{
    AircraftView, Anomaly, Conflict, ExternalAnomaly, ExternalTranscript, HistoryAnomaly,
    HistoryRow, Instruction, LOSS_OF_SEPARATION, TickSnapshot, TranscriptEntry,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // Importing the types with #[ts(export)] and calling export_all
        // writes the bindings to `bindings/` relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::SimulationId::export_all();
        let _ = crate::ids::InstructionId::export_all();
        let _ = crate::ids::AircraftId::export_all();

        // Enums
        let _ = crate::enums::FlightMode::export_all();
        let _ = crate::enums::PatternLeg::export_all();
        let _ = crate::enums::PatternDirection::export_all();
        let _ = crate::enums::Phase::export_all();
        let _ = crate::enums::RouteSegment::export_all();
        let _ = crate::enums::ClearanceStatus::export_all();
        let _ = crate::enums::Severity::export_all();
        let _ = crate::enums::Geometry::export_all();
        let _ = crate::enums::InstructionType::export_all();
        let _ = crate::enums::InstructionStatus::export_all();
        let _ = crate::enums::BrainMode::export_all();
        let _ = crate::enums::TranscriptRole::export_all();

        // Structs
        let _ = crate::structs::AircraftView::export_all();
        let _ = crate::structs::Conflict::export_all();
        let _ = crate::structs::Anomaly::export_all();
        let _ = crate::structs::ExternalAnomaly::export_all();
        let _ = crate::structs::Instruction::export_all();
        let _ = crate::structs::TranscriptEntry::export_all();
        let _ = crate::structs::ExternalTranscript::export_all();
        let _ = crate::structs::TickSnapshot::export_all();
        let _ = crate::structs::HistoryAnomaly::export_all();
        let _ = crate::structs::HistoryRow::export_all();
    }
}
