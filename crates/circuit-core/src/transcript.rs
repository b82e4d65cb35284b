//! Append-only radio and system transcript.
//!
//! Every line is retained for the lifetime of the simulation; snapshots
//! carry only the most recent window. Line ids are sequential (`msg1`,
//! `msg2`, ...).

use circuit_types::{TranscriptEntry, TranscriptRole};

/// Pilot acknowledgement of a traffic alert.
pub const TRAFFIC_ACK: &str = "Traffic in sight, maintaining separation.";

/// Append-only transcript of one simulation.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    counter: u64,
}

impl Transcript {
    /// An empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line.
    pub fn push(
        &mut self,
        at_sim_time_sec: f64,
        role: TranscriptRole,
        callsign: Option<&str>,
        text: impl Into<String>,
    ) {
        self.counter = self.counter.saturating_add(1);
        let entry = TranscriptEntry {
            id: format!("msg{}", self.counter),
            at_sim_time_sec,
            role,
            callsign: callsign.map(str::to_owned),
            text: text.into(),
        };
        self.entries.push(entry);
    }

    /// The last `window` lines, oldest first.
    pub fn recent(&self, window: usize) -> Vec<TranscriptEntry> {
        let start = self.entries.len().saturating_sub(window);
        self.entries.iter().skip(start).cloned().collect()
    }

    /// Every line, oldest first.
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no line was ever written.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse the speaker label of an external transcript line.
///
/// A missing label means the tower. Unknown labels yield `None`.
pub fn parse_role(label: Option<&str>) -> Option<TranscriptRole> {
    let Some(label) = label else {
        return Some(TranscriptRole::Tower);
    };
    match label.trim().to_ascii_lowercase().as_str() {
        "" | "tower" | "atc" | "controller" => Some(TranscriptRole::Tower),
        "pilot" => Some(TranscriptRole::Pilot),
        "system" => Some(TranscriptRole::System),
        _ => None,
    }
}

/// Tower traffic alert to `callsign` about `intruder` at a clock position.
pub fn traffic_alert(callsign: &str, intruder: &str, clock: u8) -> String {
    format!("{callsign}, traffic alert, {intruder} at your {clock} o'clock, maintain separation.")
}

/// Suggested call for an external anomaly without a conflict record.
pub fn anomaly_alert(callsigns: &[String], description: &str) -> String {
    match callsigns {
        [] => format!("All stations, caution: {description}."),
        [first, ..] => format!("{first}, caution: {description}."),
    }
}

/// Routine call made when nothing needs attention.
pub fn routine_call(callsign: &str) -> String {
    format!("{callsign}, report turning base.")
}
