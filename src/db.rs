// 🗄️ Database capability - the only thing the pipeline knows about SQL drivers
//
// The core builds SQL text here (quoted identifiers, column lists,
// placeholders) and hands it to a `Database`. `SqliteDatabase` is the
// shipped driver: rusqlite with bundled SQLite, where every catalog schema
// is an attached database.

use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::catalog::Table;

// ============================================================================
// SQL TEXT
// ============================================================================

/// Double-quote an identifier, doubling any embedded quote
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"schema"."table"`
pub fn qualified_name(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

pub fn create_schema_sql(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema))
}

/// CREATE TABLE IF NOT EXISTS with the table's columns in catalog order,
/// data types copied verbatim
pub fn create_table_sql(schema: &str, table: &Table) -> String {
    let column_definitions = table
        .columns()
        .iter()
        .map(|col| {
            format!("{} {}", quote_ident(col.name()), col.data_type())
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        qualified_name(schema, table.name()),
        column_definitions
    )
}

/// Parameterized INSERT naming every catalog column, in catalog order
pub fn insert_sql(schema: &str, table: &Table) -> String {
    let columns = table
        .columns()
        .iter()
        .map(|col| quote_ident(col.name()))
        .collect::<Vec<_>>()
        .join(", ");

    let placeholders = (1..=table.columns().len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualified_name(schema, table.name()),
        columns,
        placeholders
    )
}

// ============================================================================
// VALUES & ROWS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Text rendering of a non-null value
    pub fn as_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Integer(i) => Some(i.to_string()),
            SqlValue::Real(f) => Some(f.to_string()),
            SqlValue::Text(s) => Some(s.clone()),
        }
    }
}

impl From<Option<&str>> for SqlValue {
    fn from(value: Option<&str>) -> Self {
        match value {
            Some(s) => SqlValue::Text(s.to_string()),
            None => SqlValue::Null,
        }
    }
}

impl From<&SqlValue> for Value {
    fn from(value: &SqlValue) -> Self {
        match value {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(i) => Value::Integer(*i),
            SqlValue::Real(f) => Value::Real(*f),
            SqlValue::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl From<Value> for SqlValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Integer(i) => SqlValue::Integer(i),
            Value::Real(f) => SqlValue::Real(f),
            Value::Text(s) => SqlValue::Text(s),
            Value::Blob(b) => SqlValue::Text(String::from_utf8_lossy(&b).into_owned()),
        }
    }
}

/// One result row; column names are shared across a result set
#[derive(Debug, Clone, PartialEq)]
pub struct SqlRow {
    columns: Arc<Vec<String>>,
    values: Vec<SqlValue>,
}

impl SqlRow {
    pub fn new(columns: Arc<Vec<String>>, values: Vec<SqlValue>) -> Self {
        SqlRow { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Value of the named column (case-insensitive, first match)
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|i| self.values.get(i))
    }
}

// ============================================================================
// DATABASE CAPABILITY
// ============================================================================

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Unsupported(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Primitives the pipeline needs from a SQL driver
pub trait Database {
    /// Create a schema; a no-op when it already exists
    fn create_schema(&mut self, name: &str) -> DbResult<()> {
        self.execute(&create_schema_sql(name), &[]).map(|_| ())
    }

    /// Run one DDL or DML statement, returning affected rows
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize>;

    /// Run a query, rows in the order the statement produces them
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<SqlRow>>;

    fn commit(&mut self) -> DbResult<()>;

    fn rollback(&mut self) -> DbResult<()>;

    /// True while a transaction is open. A statement error that ends the
    /// whole transaction (ON CONFLICT ROLLBACK, disk full) shows up here.
    fn in_transaction(&self) -> bool;

    fn savepoint(&mut self, name: &str) -> DbResult<()> {
        self.execute(&format!("SAVEPOINT {}", quote_ident(name)), &[])
            .map(|_| ())
    }

    fn release(&mut self, name: &str) -> DbResult<()> {
        self.execute(&format!("RELEASE SAVEPOINT {}", quote_ident(name)), &[])
            .map(|_| ())
    }

    /// Undo everything since `name`; the savepoint itself stays open
    fn rollback_to(&mut self, name: &str) -> DbResult<()> {
        self.execute(&format!("ROLLBACK TO SAVEPOINT {}", quote_ident(name)), &[])
            .map(|_| ())
    }
}

// ============================================================================
// SQLITE
// ============================================================================

pub struct SqliteDatabase {
    conn: Connection,
    /// Where attached schema files live; None attaches in-memory databases
    schema_dir: Option<PathBuf>,
}

impl SqliteDatabase {
    /// Open (or create) a database file; schemas become `<schema_dir>/<name>.sqlite`
    pub fn open(path: &Path, schema_dir: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        // Enable WAL mode for crash recovery
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("opened {} (journal_mode={})", path.display(), mode);

        Ok(SqliteDatabase {
            conn,
            schema_dir: Some(schema_dir.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(SqliteDatabase {
            conn: Connection::open_in_memory()?,
            schema_dir: None,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn has_schema(&self, name: &str) -> DbResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pragma_database_list WHERE name = ?1 COLLATE NOCASE",
            [name],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    fn schema_file(&self, name: &str) -> String {
        match &self.schema_dir {
            Some(dir) => {
                let safe: String = name
                    .chars()
                    .map(|c| {
                        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                            c
                        } else {
                            '_'
                        }
                    })
                    .collect();
                dir.join(format!("{}.sqlite", safe)).to_string_lossy().into_owned()
            }
            None => ":memory:".to_string(),
        }
    }

    fn begin_if_needed(&self) -> DbResult<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }
}

impl Database for SqliteDatabase {
    fn create_schema(&mut self, name: &str) -> DbResult<()> {
        if name.eq_ignore_ascii_case("main")
            || name.eq_ignore_ascii_case("temp")
            || self.has_schema(name)?
        {
            return Ok(());
        }

        if !self.conn.is_autocommit() {
            return Err(DbError::Unsupported(format!(
                "cannot attach schema \"{}\" inside an open transaction",
                name
            )));
        }

        let file = self.schema_file(name);
        debug!("attaching schema {} at {}", name, file);
        self.conn.execute(
            &format!("ATTACH DATABASE ?1 AS {}", quote_ident(name)),
            [file],
        )?;

        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        self.begin_if_needed()?;

        let mut stmt = self.conn.prepare_cached(sql)?;
        let affected = stmt.execute(params_from_iter(params.iter().map(Value::from)))?;

        Ok(affected)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<SqlRow>> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Arc<Vec<String>> = Arc::new(
            stmt.column_names()
                .into_iter()
                .map(String::from)
                .collect(),
        );

        let mut rows = stmt.query(params_from_iter(params.iter().map(Value::from)))?;
        let mut result = Vec::new();

        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                let value: Value = row.get(i)?;
                values.push(SqlValue::from(value));
            }
            result.push(SqlRow::new(Arc::clone(&columns), values));
        }

        Ok(result)
    }

    fn commit(&mut self) -> DbResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> DbResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }
}
