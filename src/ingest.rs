// 📥 Data Ingester - one CSV per catalog table → INSERTs
//
// Per table: resolve the file, reconcile its header against the catalog,
// insert row by row (a bad row never aborts the table), commit, then prove
// the inserted count against the rows actually read.
//
// Source files are produced outside this system, so they may gain or lose
// columns and may carry bad rows; everything salvageable gets loaded.

use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, Schema, Table};
use crate::db::{insert_sql, qualified_name, Database, SqlValue};
use crate::errors::{PipelineError, PipelineResult};
use crate::report::{ReportEvent, ReportSink};

// ============================================================================
// OPTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    /// Data files are `<table>.<extension>`
    pub extension: String,
    pub delimiter: u8,
    /// Insert empty CSV fields as NULL instead of ''
    pub empty_as_null: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions {
            extension: "csv".to_string(),
            delimiter: b',',
            empty_as_null: false,
        }
    }
}

// ============================================================================
// COLUMN RECONCILIATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnReconciliation {
    /// Expected by the catalog, absent from the file (catalog order)
    pub missing: Vec<String>,
    /// Present in the file, unknown to the catalog (file order)
    pub extra: Vec<String>,
}

impl ColumnReconciliation {
    pub fn is_exact(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

pub fn reconcile_columns(table: &Table, actual: &[String]) -> ColumnReconciliation {
    let actual_set: HashSet<&str> = actual.iter().map(String::as_str).collect();
    let expected_set: HashSet<&str> = table.columns().iter().map(|c| c.name()).collect();

    let missing = table
        .columns()
        .iter()
        .map(|c| c.name())
        .filter(|name| !actual_set.contains(name))
        .map(String::from)
        .collect();

    let mut seen = HashSet::new();
    let extra = actual
        .iter()
        .map(String::as_str)
        .filter(|name| !expected_set.contains(name) && seen.insert(*name))
        .map(String::from)
        .collect();

    ColumnReconciliation { missing, extra }
}

// ============================================================================
// TABLE OUTCOME
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadStatus {
    MissingFile,
    Unreadable,
    Loaded {
        inserted: usize,
        failed: usize,
        total: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableLoad {
    pub schema: String,
    pub table: String,
    pub path: PathBuf,
    pub status: LoadStatus,
}

impl TableLoad {
    /// Every row of the file made it into the table
    pub fn is_complete(&self) -> bool {
        matches!(self.status, LoadStatus::Loaded { inserted, total, .. } if inserted == total)
    }
}

// ============================================================================
// ROW WRITES
// ============================================================================

const ROW_SAVEPOINT: &str = "ingest_row";

/// A row written since the last commit, kept until the commit lands
struct PendingRow {
    line: u64,
    record: Vec<String>,
    values: Vec<SqlValue>,
}

enum RowFailure {
    /// Only this row was undone
    Statement(String),
    /// The open transaction ended, taking every uncommitted row with it
    TransactionLost(String),
}

impl RowFailure {
    fn cause(&self) -> String {
        match self {
            RowFailure::Statement(cause) => cause.clone(),
            RowFailure::TransactionLost(cause) => format!("{} (transaction rolled back)", cause),
        }
    }

    fn lost_transaction(&self) -> bool {
        matches!(self, RowFailure::TransactionLost(_))
    }
}

/// Insert one row inside its own savepoint
fn insert_row<D>(db: &mut D, sql: &str, values: &[SqlValue]) -> Result<(), RowFailure>
where
    D: Database + ?Sized,
{
    let written = db
        .savepoint(ROW_SAVEPOINT)
        .and_then(|_| db.execute(sql, values))
        .and_then(|_| db.release(ROW_SAVEPOINT));

    let error = match written {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    if !db.in_transaction() {
        return Err(RowFailure::TransactionLost(error.to_string()));
    }

    match db
        .rollback_to(ROW_SAVEPOINT)
        .and_then(|_| db.release(ROW_SAVEPOINT))
    {
        Ok(()) => Err(RowFailure::Statement(error.to_string())),
        Err(undo) => {
            warn!("cannot undo failed row ({}); rolling back", undo);
            if let Err(e) = db.rollback() {
                warn!("rollback failed: {}", e);
            }
            Err(RowFailure::TransactionLost(error.to_string()))
        }
    }
}

// ============================================================================
// INGESTER
// ============================================================================

pub struct DataIngester {
    data_root: PathBuf,
    options: IngestOptions,
}

impl DataIngester {
    pub fn new(data_root: impl Into<PathBuf>, options: IngestOptions) -> Self {
        DataIngester {
            data_root: data_root.into(),
            options,
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn data_file_path(&self, table: &str) -> PathBuf {
        self.data_root
            .join(format!("{}.{}", table, self.options.extension))
    }

    /// Load every catalog table, in catalog order
    pub fn ingest<D, R>(
        &self,
        catalog: &Catalog,
        db: &mut D,
        sink: &mut R,
    ) -> PipelineResult<Vec<TableLoad>>
    where
        D: Database + ?Sized,
        R: ReportSink + ?Sized,
    {
        let mut loads = Vec::with_capacity(catalog.table_count());

        for (schema, table) in catalog.tables() {
            loads.push(self.ingest_table(schema, table, db, sink)?);
        }

        let complete = loads.iter().filter(|l| l.is_complete()).count();
        info!("ingested {}/{} table(s) completely", complete, loads.len());

        Ok(loads)
    }

    /// Load one table. Only a failed commit is fatal; every other problem
    /// becomes a report event.
    pub fn ingest_table<D, R>(
        &self,
        schema: &Schema,
        table: &Table,
        db: &mut D,
        sink: &mut R,
    ) -> PipelineResult<TableLoad>
    where
        D: Database + ?Sized,
        R: ReportSink + ?Sized,
    {
        let path = self.data_file_path(table.name());
        let outcome = |status| TableLoad {
            schema: schema.name().to_string(),
            table: table.name().to_string(),
            path: path.clone(),
            status,
        };

        // 1. Resolve the file
        if !path.is_file() {
            sink.emit(ReportEvent::MissingDataFile {
                table: table.name().to_string(),
                path: path.clone(),
            });
            return Ok(outcome(LoadStatus::MissingFile));
        }

        // 2. Header row
        let (mut rdr, headers) = match self.open_data_file(&path) {
            Ok(opened) => opened,
            Err(cause) => {
                sink.emit(ReportEvent::DataFileParseError {
                    table: table.name().to_string(),
                    path: path.clone(),
                    cause,
                });
                return Ok(outcome(LoadStatus::Unreadable));
            }
        };

        // 3. Reconcile
        let reconciliation = reconcile_columns(table, &headers);
        if !reconciliation.is_exact() {
            sink.emit(ReportEvent::ColumnMismatch {
                table: table.name().to_string(),
                missing: reconciliation.missing,
                extra: reconciliation.extra,
            });
        }

        // Name-based lookup: file position of each catalog column
        let positions: Vec<Option<usize>> = table
            .columns()
            .iter()
            .map(|col| headers.iter().position(|h| h == col.name()))
            .collect();

        // 4. Insert
        let sql = insert_sql(schema.name(), table);
        debug!("{}", sql);

        let mut total = 0usize;
        let mut inserted = 0usize;
        let mut failed = 0usize;
        let mut pending: Vec<PendingRow> = Vec::new();

        for result in rdr.records() {
            total += 1;
            // header is line 1
            let fallback_line = total as u64 + 1;

            match result {
                Ok(record) => {
                    let row = PendingRow {
                        line: record.position().map(|p| p.line()).unwrap_or(fallback_line),
                        record: record.iter().map(String::from).collect(),
                        values: self.row_values(&positions, &record),
                    };

                    match insert_row(db, &sql, &row.values) {
                        Ok(()) => {
                            inserted += 1;
                            pending.push(row);
                        }
                        Err(failure) => {
                            failed += 1;
                            sink.emit(ReportEvent::RowInsertError {
                                table: table.name().to_string(),
                                line: row.line,
                                record: row.record,
                                cause: failure.cause(),
                            });

                            if failure.lost_transaction() {
                                let lost = replay_rows(table, db, &sql, &mut pending, sink);
                                inserted -= lost;
                                failed += lost;
                            }
                        }
                    }
                }
                Err(e) => {
                    failed += 1;
                    let line = e.position().map(|p| p.line()).unwrap_or(fallback_line);
                    let io_failure = matches!(e.kind(), csv::ErrorKind::Io(_));

                    sink.emit(ReportEvent::RowInsertError {
                        table: table.name().to_string(),
                        line,
                        record: Vec::new(),
                        cause: format!("unreadable record: {}", e),
                    });

                    // the reader cannot make progress past an I/O failure
                    if io_failure {
                        break;
                    }
                }
            }
        }

        db.commit().map_err(|source| {
            PipelineError::database(
                format!("commit {}", qualified_name(schema.name(), table.name())),
                source,
            )
        })?;

        // 5. Verify against the same record stream
        sink.emit(ReportEvent::LoadResult {
            schema: schema.name().to_string(),
            table: table.name().to_string(),
            inserted,
            expected: total,
        });

        Ok(outcome(LoadStatus::Loaded {
            inserted,
            failed,
            total,
        }))
    }

    fn open_data_file(
        &self,
        path: &Path,
    ) -> Result<(csv::Reader<std::fs::File>, Vec<String>), String> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .trim(Trim::Headers)
            .flexible(true)
            .from_path(path)
            .map_err(|e| e.to_string())?;

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| e.to_string())?
            .iter()
            .map(String::from)
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err("no header row".to_string());
        }

        Ok((rdr, headers))
    }

    /// Values in catalog column order; absent columns and short rows give NULL
    fn row_values(&self, positions: &[Option<usize>], record: &StringRecord) -> Vec<SqlValue> {
        positions
            .iter()
            .map(|pos| match pos.and_then(|i| record.get(i)) {
                Some("") if self.options.empty_as_null => SqlValue::Null,
                Some(value) => SqlValue::Text(value.to_string()),
                None => SqlValue::Null,
            })
            .collect()
    }
}

/// Write again every uncommitted row a lost transaction took with it.
/// Returns how many of them fail this time; each gets its own event.
fn replay_rows<D, R>(
    table: &Table,
    db: &mut D,
    sql: &str,
    pending: &mut Vec<PendingRow>,
    sink: &mut R,
) -> usize
where
    D: Database + ?Sized,
    R: ReportSink + ?Sized,
{
    let mut queue = std::mem::take(pending);
    let mut lost = 0usize;

    warn!(
        "transaction lost while loading {}; re-inserting {} row(s)",
        table.name(),
        queue.len()
    );

    // every restart drops at least one row, so this terminates
    'replay: loop {
        let mut rest = queue.into_iter();

        while let Some(row) = rest.next() {
            match insert_row(db, sql, &row.values) {
                Ok(()) => pending.push(row),
                Err(failure) => {
                    lost += 1;
                    sink.emit(ReportEvent::RowInsertError {
                        table: table.name().to_string(),
                        line: row.line,
                        record: row.record,
                        cause: failure.cause(),
                    });

                    if failure.lost_transaction() {
                        queue = std::mem::take(pending).into_iter().chain(rest).collect();
                        continue 'replay;
                    }
                }
            }
        }

        return lost;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Column;
    use crate::db::SqliteDatabase;
    use crate::materializer::create_tables;
    use crate::report::MemoryReport;
    use std::fs;
    use tempfile::TempDir;

    fn catalog_of(tables: &[(&str, &[(&str, &str)])]) -> Catalog {
        let mut catalog = Catalog::new();
        for (table, columns) in tables {
            for (name, data_type) in columns.iter() {
                catalog
                    .add_column("dbo", table, Column::new(*name, *data_type))
                    .unwrap();
            }
        }
        catalog
    }

    fn setup(catalog: &Catalog) -> (TempDir, SqliteDatabase) {
        let dir = TempDir::new().unwrap();
        let mut db = SqliteDatabase::open_in_memory().unwrap();
        create_tables(catalog, &mut db).unwrap();
        (dir, db)
    }

    fn rows_of(db: &mut SqliteDatabase, sql: &str) -> Vec<Vec<SqlValue>> {
        db.query(sql, &[])
            .unwrap()
            .into_iter()
            .map(|row| row.values().to_vec())
            .collect()
    }

    fn text(s: &str) -> SqlValue {
        SqlValue::Text(s.to_string())
    }

    #[test]
    fn test_reconcile_missing_and_extra() {
        let catalog = catalog_of(&[("T", &[("A", "text"), ("B", "text"), ("C", "text")])]);
        let table = catalog.table("dbo", "T").unwrap();
        let actual = vec!["B".to_string(), "C".to_string(), "D".to_string()];

        let reconciliation = reconcile_columns(table, &actual);

        assert_eq!(reconciliation.missing, vec!["A".to_string()]);
        assert_eq!(reconciliation.extra, vec!["D".to_string()]);
        assert!(!reconciliation.is_exact());
    }

    #[test]
    fn test_missing_columns_null_filled_extra_ignored() {
        let catalog = catalog_of(&[("T", &[("A", "text"), ("B", "text"), ("C", "text")])]);
        let (dir, mut db) = setup(&catalog);
        fs::write(dir.path().join("T.csv"), "B,C,D\nb1,c1,d1\nb2,c2,d2\n").unwrap();

        let ingester = DataIngester::new(dir.path(), IngestOptions::default());
        let mut report = MemoryReport::new();
        let loads = ingester.ingest(&catalog, &mut db, &mut report).unwrap();

        assert!(loads[0].is_complete());
        assert_eq!(
            rows_of(&mut db, "SELECT * FROM \"dbo\".\"T\" ORDER BY \"B\""),
            vec![
                vec![SqlValue::Null, text("b1"), text("c1")],
                vec![SqlValue::Null, text("b2"), text("c2")],
            ]
        );
        assert_eq!(
            report.events()[0],
            ReportEvent::ColumnMismatch {
                table: "T".to_string(),
                missing: vec!["A".to_string()],
                extra: vec!["D".to_string()],
            }
        );
    }

    #[test]
    fn test_insert_order_independent_of_file_order() {
        let catalog = catalog_of(&[("T", &[("A", "text"), ("B", "text"), ("C", "text")])]);
        let (dir, mut db) = setup(&catalog);
        fs::write(dir.path().join("T.csv"), "C,A,B\nc1,a1,b1\n").unwrap();

        let ingester = DataIngester::new(dir.path(), IngestOptions::default());
        let mut report = MemoryReport::new();
        ingester.ingest(&catalog, &mut db, &mut report).unwrap();

        assert_eq!(
            rows_of(&mut db, "SELECT \"A\", \"B\", \"C\" FROM \"dbo\".\"T\""),
            vec![vec![text("a1"), text("b1"), text("c1")]]
        );
        assert_eq!(
            report.count_where(|e| matches!(e, ReportEvent::ColumnMismatch { .. })),
            0
        );
    }

    #[test]
    fn test_bad_rows_are_skipped_and_counted() {
        let catalog = catalog_of(&[(
            "T",
            &[("ID", "integer primary key"), ("NAME", "text not null")],
        )]);
        let (dir, mut db) = setup(&catalog);
        // line 3 duplicates the key, line 4 lacks NAME (NULL)
        fs::write(
            dir.path().join("T.csv"),
            "ID,NAME\n1,one\n1,again\n2\n3,three\n",
        )
        .unwrap();

        let ingester = DataIngester::new(dir.path(), IngestOptions::default());
        let mut report = MemoryReport::new();
        let loads = ingester.ingest(&catalog, &mut db, &mut report).unwrap();

        assert_eq!(
            loads[0].status,
            LoadStatus::Loaded {
                inserted: 2,
                failed: 2,
                total: 4,
            }
        );
        assert!(!loads[0].is_complete());

        let error_lines: Vec<u64> = report
            .events()
            .iter()
            .filter_map(|e| match e {
                ReportEvent::RowInsertError { line, .. } => Some(*line),
                _ => None,
            })
            .collect();
        assert_eq!(error_lines, vec![3, 4]);

        let last = report.events().last().unwrap();
        assert_eq!(
            *last,
            ReportEvent::LoadResult {
                schema: "dbo".to_string(),
                table: "T".to_string(),
                inserted: 2,
                expected: 4,
            }
        );
        assert!(last.is_partial_load());

        assert_eq!(
            rows_of(&mut db, "SELECT \"ID\" FROM \"dbo\".\"T\" ORDER BY \"ID\""),
            vec![vec![SqlValue::Integer(1)], vec![SqlValue::Integer(3)]]
        );
    }

    #[test]
    fn test_missing_file_does_not_stop_other_tables() {
        let catalog = catalog_of(&[
            ("GONE", &[("X", "text")]),
            ("HERE", &[("X", "text")]),
        ]);
        let (dir, mut db) = setup(&catalog);
        fs::write(dir.path().join("HERE.csv"), "X\nx1\n").unwrap();

        let ingester = DataIngester::new(dir.path(), IngestOptions::default());
        let mut report = MemoryReport::new();
        let loads = ingester.ingest(&catalog, &mut db, &mut report).unwrap();

        assert_eq!(loads[0].status, LoadStatus::MissingFile);
        assert_eq!(loads[0].path, dir.path().join("GONE.csv"));
        assert!(loads[1].is_complete());
        assert!(matches!(
            report.events()[0],
            ReportEvent::MissingDataFile { ref table, .. } if table == "GONE"
        ));
        assert_eq!(
            rows_of(&mut db, "SELECT \"X\" FROM \"dbo\".\"HERE\""),
            vec![vec![text("x1")]]
        );
    }

    #[test]
    fn test_empty_file_is_parse_error() {
        let catalog = catalog_of(&[("EMPTY", &[("X", "text")]), ("NEXT", &[("X", "text")])]);
        let (dir, mut db) = setup(&catalog);
        fs::write(dir.path().join("EMPTY.csv"), "").unwrap();
        fs::write(dir.path().join("NEXT.csv"), "X\n1\n").unwrap();

        let ingester = DataIngester::new(dir.path(), IngestOptions::default());
        let mut report = MemoryReport::new();
        let loads = ingester.ingest(&catalog, &mut db, &mut report).unwrap();

        assert_eq!(loads[0].status, LoadStatus::Unreadable);
        assert!(matches!(
            report.events()[0],
            ReportEvent::DataFileParseError { .. }
        ));
        assert!(loads[1].is_complete());
    }

    #[test]
    fn test_conflict_rollback_keeps_earlier_rows() {
        let catalog = catalog_of(&[("T", &[("ID", "integer primary key on conflict rollback")])]);
        let (dir, mut db) = setup(&catalog);
        fs::write(dir.path().join("T.csv"), "ID\n1\n2\n2\n3\n").unwrap();

        let ingester = DataIngester::new(dir.path(), IngestOptions::default());
        let mut report = MemoryReport::new();
        let loads = ingester.ingest(&catalog, &mut db, &mut report).unwrap();

        assert_eq!(
            loads[0].status,
            LoadStatus::Loaded {
                inserted: 3,
                failed: 1,
                total: 4,
            }
        );
        assert!(matches!(
            report.events()[0],
            ReportEvent::RowInsertError { line: 4, .. }
        ));
        assert_eq!(
            rows_of(&mut db, "SELECT \"ID\" FROM \"dbo\".\"T\" ORDER BY \"ID\""),
            vec![
                vec![SqlValue::Integer(1)],
                vec![SqlValue::Integer(2)],
                vec![SqlValue::Integer(3)],
            ]
        );
    }

    #[test]
    fn test_unreadable_record_counts_as_row_error() {
        let catalog = catalog_of(&[("T", &[("A", "text")])]);
        let (dir, mut db) = setup(&catalog);
        fs::write(dir.path().join("T.csv"), b"A\nok\n\xff\xfe\nok2\n").unwrap();

        let ingester = DataIngester::new(dir.path(), IngestOptions::default());
        let mut report = MemoryReport::new();
        let loads = ingester.ingest(&catalog, &mut db, &mut report).unwrap();

        assert_eq!(
            loads[0].status,
            LoadStatus::Loaded {
                inserted: 2,
                failed: 1,
                total: 3,
            }
        );
        let error_lines: Vec<u64> = report
            .events()
            .iter()
            .filter_map(|e| match e {
                ReportEvent::RowInsertError { line, .. } => Some(*line),
                _ => None,
            })
            .collect();
        assert_eq!(error_lines, vec![3]);
        assert_eq!(
            rows_of(&mut db, "SELECT \"A\" FROM \"dbo\".\"T\" ORDER BY \"A\""),
            vec![vec![text("ok")], vec![text("ok2")]]
        );
    }

    #[test]
    fn test_invalid_utf8_header_is_parse_error() {
        let catalog = catalog_of(&[("T", &[("A", "text")])]);
        let (dir, mut db) = setup(&catalog);
        fs::write(dir.path().join("T.csv"), b"\xff\xfe\nx\n").unwrap();

        let ingester = DataIngester::new(dir.path(), IngestOptions::default());
        let mut report = MemoryReport::new();
        let loads = ingester.ingest(&catalog, &mut db, &mut report).unwrap();

        assert_eq!(loads[0].status, LoadStatus::Unreadable);
        assert_eq!(report.events().len(), 1);
        assert!(matches!(
            report.events()[0],
            ReportEvent::DataFileParseError { .. }
        ));
    }

    #[test]
    fn test_header_whitespace_and_empty_as_null() {
        let catalog = catalog_of(&[("T", &[("A", "text"), ("B", "text")])]);
        let (dir, mut db) = setup(&catalog);
        fs::write(dir.path().join("T.txt"), " A | B \n|b1\n").unwrap();

        let options = IngestOptions {
            extension: "txt".to_string(),
            delimiter: b'|',
            empty_as_null: true,
        };
        let ingester = DataIngester::new(dir.path(), options);
        let mut report = MemoryReport::new();
        ingester.ingest(&catalog, &mut db, &mut report).unwrap();

        assert_eq!(
            rows_of(&mut db, "SELECT \"A\", \"B\" FROM \"dbo\".\"T\""),
            vec![vec![SqlValue::Null, text("b1")]]
        );
    }

    #[test]
    fn test_counts_always_add_up() {
        let catalog = catalog_of(&[("T", &[("ID", "integer unique")])]);
        let (dir, mut db) = setup(&catalog);
        fs::write(dir.path().join("T.csv"), "ID\n1\n2\n2\n3\n3\n3\n").unwrap();

        let ingester = DataIngester::new(dir.path(), IngestOptions::default());
        let mut report = MemoryReport::new();
        let loads = ingester.ingest(&catalog, &mut db, &mut report).unwrap();

        match loads[0].status {
            LoadStatus::Loaded { inserted, failed, total } => {
                assert_eq!(total, 6);
                assert_eq!(inserted, 3);
                assert_eq!(inserted + failed, total);
                assert_eq!(
                    failed,
                    report.count_where(|e| matches!(e, ReportEvent::RowInsertError { .. }))
                );
            }
            other => panic!("unexpected status: {:?}", other),
        }
    }
}
