//! Per-tick, per-aircraft history and its CSV export.
//!
//! One [`HistoryRow`] is recorded for every aircraft on every tick. The log
//! is only ever appended to and is exported on demand as CSV with a fixed
//! header. Lat/lon carry six decimals, altitude and speed are rounded to
//! whole numbers, heading keeps one decimal, and the writer handles quoting.

use circuit_types::{HistoryAnomaly, HistoryRow};

/// Column names of the CSV export, in order.
pub const CSV_HEADER: [&str; 15] = [
    "sim_id",
    "sim_time_sec",
    "aircraft_id",
    "callsign",
    "lat",
    "lon",
    "altitude_ft",
    "ground_speed_kt",
    "heading_deg",
    "phase",
    "route_segment",
    "anomaly_id",
    "anomaly_type",
    "anomaly_severity",
    "anomaly_description",
];

/// Errors that can occur while exporting history.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The CSV writer rejected a record.
    #[error("failed to write CSV record: {source}")]
    Csv {
        /// The underlying CSV error.
        #[from]
        source: csv::Error,
    },

    /// Flushing the CSV writer failed.
    #[error("failed to flush CSV output: {reason}")]
    Flush {
        /// Description of the flush failure.
        reason: String,
    },

    /// The output was not valid UTF-8.
    #[error("CSV output is not UTF-8: {source}")]
    Utf8 {
        /// The underlying conversion error.
        #[from]
        source: std::string::FromUtf8Error,
    },
}

/// Append-only history of one simulation.
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    rows: Vec<HistoryRow>,
}

impl HistoryLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows.
    pub fn extend(&mut self, rows: impl IntoIterator<Item = HistoryRow>) {
        self.rows.extend(rows);
    }

    /// Every row, oldest first.
    pub fn rows(&self) -> &[HistoryRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render the whole log as CSV, header first.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] if the CSV writer fails.
    pub fn to_csv(&self) -> Result<String, ExportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;
        for row in &self.rows {
            writer.write_record(csv_fields(row))?;
        }
        let bytes = writer.into_inner().map_err(|e| ExportError::Flush {
            reason: e.error().to_string(),
        })?;
        Ok(String::from_utf8(bytes)?)
    }
}

fn csv_fields(row: &HistoryRow) -> [String; 15] {
    let (id, kind, severity, description) = row.anomaly.as_ref().map_or_else(
        || (String::new(), String::new(), String::new(), String::new()),
        |a: &HistoryAnomaly| {
            (
                a.anomaly_id.clone(),
                a.anomaly_type.clone(),
                a.anomaly_severity.as_str().to_owned(),
                a.anomaly_description.clone(),
            )
        },
    );
    [
        row.sim_id.to_string(),
        format_seconds(row.sim_time_sec),
        row.aircraft_id.to_string(),
        row.callsign.clone(),
        format!("{:.6}", row.lat),
        format!("{:.6}", row.lon),
        format!("{:.0}", row.altitude_ft),
        format!("{:.0}", row.ground_speed_kt),
        format!("{:.1}", row.heading_deg),
        row.phase.as_str().to_owned(),
        row.route_segment.as_str().to_owned(),
        id,
        kind,
        severity,
        description,
    ]
}

/// Whole seconds without a fractional part, otherwise up to three decimals.
fn format_seconds(sec: f64) -> String {
    if sec.fract().abs() < 1e-9 {
        format!("{sec:.0}")
    } else {
        let s = format!("{sec:.3}");
        s.trim_end_matches('0').to_owned()
    }
}
