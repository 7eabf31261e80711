// 📣 Report Sink - structured events instead of ad hoc printing
//
// The pipeline decides, the sink presents. Every recoverable or
// informational outcome of a run is one `ReportEvent`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use uuid::Uuid;

// ============================================================================
// EVENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReportEvent {
    /// No data file for a catalog table; the table is skipped
    MissingDataFile { table: String, path: PathBuf },

    /// The data file could not be opened or its header read; the table is skipped
    DataFileParseError {
        table: String,
        path: PathBuf,
        cause: String,
    },

    /// `missing` columns are NULL-filled, `extra` columns are ignored
    ColumnMismatch {
        table: String,
        missing: Vec<String>,
        extra: Vec<String>,
    },

    /// One data row was not inserted; the rest of the table continues
    RowInsertError {
        table: String,
        line: u64,
        record: Vec<String>,
        cause: String,
    },

    /// Post-load verification of one table. Also the partial-load warning:
    /// when `inserted != expected` its severity is `Warning`.
    LoadResult {
        schema: String,
        table: String,
        inserted: usize,
        expected: usize,
    },

    OverdrawnAccount {
        id: String,
        owner: String,
        balance: Decimal,
    },

    OverpaidLoan {
        id: String,
        owner: String,
        balance: Decimal,
    },

    TotalAssetSize { value: Decimal },
}

impl ReportEvent {
    pub fn severity(&self) -> Severity {
        match self {
            ReportEvent::MissingDataFile { .. } => Severity::Warning,
            ReportEvent::DataFileParseError { .. } => Severity::Error,
            ReportEvent::ColumnMismatch { .. } => Severity::Warning,
            ReportEvent::RowInsertError { .. } => Severity::Error,
            ReportEvent::LoadResult { .. } if self.is_partial_load() => Severity::Warning,
            ReportEvent::LoadResult { .. } => Severity::Info,
            ReportEvent::OverdrawnAccount { .. } => Severity::Info,
            ReportEvent::OverpaidLoan { .. } => Severity::Info,
            ReportEvent::TotalAssetSize { .. } => Severity::Info,
        }
    }

    /// A load result whose inserted count falls short of the file's rows
    pub fn is_partial_load(&self) -> bool {
        matches!(
            self,
            ReportEvent::LoadResult { inserted, expected, .. } if inserted != expected
        )
    }

    /// Human-readable one-liner
    pub fn message(&self) -> String {
        match self {
            ReportEvent::MissingDataFile { table, path } => format!(
                "Data file for {} not found at {}. Skipping this table.",
                table,
                path.display()
            ),
            ReportEvent::DataFileParseError { table, path, cause } => format!(
                "Error processing data file for {} ({}): {}",
                table,
                path.display(),
                cause
            ),
            ReportEvent::ColumnMismatch { table, missing, extra } => {
                let mut parts = Vec::new();
                if !missing.is_empty() {
                    parts.push(format!(
                        "Missing columns in {} data file: {}. These will be populated with NULL.",
                        table,
                        missing.join(", ")
                    ));
                }
                if !extra.is_empty() {
                    parts.push(format!(
                        "Extra columns in {} data file: {}. These will be ignored.",
                        table,
                        extra.join(", ")
                    ));
                }
                parts.join(" ")
            }
            ReportEvent::RowInsertError { table, line, record, cause } => format!(
                "Insert failed for {} line {} [{}]: {}",
                table,
                line,
                record.join(", "),
                cause
            ),
            ReportEvent::LoadResult { schema, table, inserted, expected } => {
                if inserted == expected {
                    format!(
                        "All {} rows inserted successfully into {}.{}.",
                        expected, schema, table
                    )
                } else {
                    format!(
                        "Only inserted {} out of {} rows into {}.{}. Check for errors.",
                        inserted, expected, schema, table
                    )
                }
            }
            ReportEvent::OverdrawnAccount { id, owner, balance } => format!(
                "Overdrawn checking account {} ({}): {}",
                id, owner, balance
            ),
            ReportEvent::OverpaidLoan { id, owner, balance } => {
                format!("Overpaid loan {} ({}): {}", id, owner, balance)
            }
            ReportEvent::TotalAssetSize { value } => format!("Total asset size: {}", value),
        }
    }
}

// ============================================================================
// SINKS
// ============================================================================

pub trait ReportSink {
    fn emit(&mut self, event: ReportEvent);
}

/// Human-readable output: info to stdout, warnings and errors to stderr
#[derive(Debug, Default)]
pub struct ConsoleReport;

impl ReportSink for ConsoleReport {
    fn emit(&mut self, event: ReportEvent) {
        match event.severity() {
            Severity::Info => println!("✓ {}", event.message()),
            Severity::Warning => eprintln!("⚠️  {}", event.message()),
            Severity::Error => eprintln!("❌ {}", event.message()),
        }
    }
}

/// Envelope written by `JsonLinesReport`
#[derive(Debug, Serialize)]
struct Envelope<'a> {
    run_id: Uuid,
    timestamp: DateTime<Utc>,
    severity: Severity,
    #[serde(flatten)]
    event: &'a ReportEvent,
}

/// One JSON object per line, tagged with a run id
pub struct JsonLinesReport<W: Write> {
    out: W,
    run_id: Uuid,
}

impl<W: Write> JsonLinesReport<W> {
    pub fn new(out: W) -> Self {
        JsonLinesReport {
            out,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for JsonLinesReport<W> {
    fn emit(&mut self, event: ReportEvent) {
        let envelope = Envelope {
            run_id: self.run_id,
            timestamp: Utc::now(),
            severity: event.severity(),
            event: &event,
        };

        let written = serde_json::to_string(&envelope)
            .map_err(std::io::Error::from)
            .and_then(|line| writeln!(self.out, "{}", line));

        if let Err(e) = written {
            log::warn!("failed to write report event: {}", e);
        }
    }
}

/// Collects events in memory
#[derive(Debug, Default)]
pub struct MemoryReport {
    events: Vec<ReportEvent>,
}

impl MemoryReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ReportEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ReportEvent> {
        self.events
    }

    pub fn count_where(&self, pred: impl Fn(&ReportEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl ReportSink for MemoryReport {
    fn emit(&mut self, event: ReportEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_partial_load_is_warning() {
        let complete = ReportEvent::LoadResult {
            schema: "dbo".to_string(),
            table: "MEMBERS".to_string(),
            inserted: 3,
            expected: 3,
        };
        let partial = ReportEvent::LoadResult {
            schema: "dbo".to_string(),
            table: "MEMBERS".to_string(),
            inserted: 2,
            expected: 3,
        };

        assert_eq!(complete.severity(), Severity::Info);
        assert!(!complete.is_partial_load());
        assert_eq!(partial.severity(), Severity::Warning);
        assert!(partial.is_partial_load());
        assert_eq!(
            partial.message(),
            "Only inserted 2 out of 3 rows into dbo.MEMBERS. Check for errors."
        );
    }

    #[test]
    fn test_column_mismatch_message() {
        let event = ReportEvent::ColumnMismatch {
            table: "LOANS".to_string(),
            missing: vec!["A".to_string()],
            extra: vec!["D".to_string(), "E".to_string()],
        };

        let message = event.message();
        assert!(message.contains("Missing columns in LOANS data file: A."));
        assert!(message.contains("Extra columns in LOANS data file: D, E."));
    }

    #[test]
    fn test_json_lines_report() {
        let mut sink = JsonLinesReport::new(Vec::new());
        let run_id = sink.run_id();

        sink.emit(ReportEvent::TotalAssetSize {
            value: Decimal::from_str("100.50").unwrap(),
        });
        sink.emit(ReportEvent::MissingDataFile {
            table: "LOANS".to_string(),
            path: PathBuf::from("data/LOANS.csv"),
        });

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "total_asset_size");
        assert_eq!(lines[0]["value"], "100.50");
        assert_eq!(lines[0]["severity"], "info");
        assert_eq!(lines[0]["run_id"], run_id.to_string());
        assert_eq!(lines[1]["event"], "missing_data_file");
        assert_eq!(lines[1]["severity"], "warning");
    }

    #[test]
    fn test_memory_report_collects_in_order() {
        let mut sink = MemoryReport::new();
        sink.emit(ReportEvent::TotalAssetSize { value: Decimal::ZERO });
        sink.emit(ReportEvent::TotalAssetSize { value: Decimal::ONE });

        assert_eq!(sink.events().len(), 2);
        assert_eq!(
            sink.count_where(|e| matches!(e, ReportEvent::TotalAssetSize { .. })),
            2
        );
        assert_eq!(
            sink.into_events()[1],
            ReportEvent::TotalAssetSize { value: Decimal::ONE }
        );
    }
}
