// 📚 Schema Catalog - schemas → tables → columns
// Built once from the metadata file, read-only while DDL and loading run.
//
// Every level is an ordered map keyed by name: iteration follows first
// insertion, lookups go through a name index, duplicates are rejected.

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("{kind} name must not be empty")]
    EmptyName { kind: &'static str },

    #[error("column \"{column}\" is declared twice in table \"{table}\"")]
    DuplicateColumn { table: String, column: String },
}

fn require_name(kind: &'static str, name: &str) -> Result<(), CatalogError> {
    if name.is_empty() {
        Err(CatalogError::EmptyName { kind })
    } else {
        Ok(())
    }
}

// ============================================================================
// COLUMN
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    name: String,
    /// Declared SQL type, passed verbatim into CREATE TABLE
    data_type: String,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &str {
        &self.data_type
    }
}

// ============================================================================
// TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Table {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declaration order (DDL and INSERT order)
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn add_column(&mut self, column: Column) -> Result<(), CatalogError> {
        require_name("column", &column.name)?;

        if self.column(&column.name).is_some() {
            return Err(CatalogError::DuplicateColumn {
                table: self.name.clone(),
                column: column.name,
            });
        }

        self.columns.push(column);
        Ok(())
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    name: String,
    tables: Vec<Table>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Schema {
            name: name.into(),
            tables: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.index.get(name).map(|&i| &self.tables[i])
    }

    /// Look up a table, creating it on first encounter
    pub fn table_entry(&mut self, name: &str) -> Result<&mut Table, CatalogError> {
        require_name("table", name)?;

        let idx = match self.index.get(name) {
            Some(&i) => i,
            None => {
                self.tables.push(Table::new(name));
                let i = self.tables.len() - 1;
                self.index.insert(name.to_string(), i);
                i
            }
        };

        Ok(&mut self.tables[idx])
    }
}

// ============================================================================
// CATALOG
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    schemas: Vec<Schema>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }

    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.index.get(name).map(|&i| &self.schemas[i])
    }

    pub fn table(&self, schema: &str, table: &str) -> Option<&Table> {
        self.schema(schema).and_then(|s| s.table(table))
    }

    /// Look up a schema, creating it on first encounter
    pub fn schema_entry(&mut self, name: &str) -> Result<&mut Schema, CatalogError> {
        require_name("schema", name)?;

        let idx = match self.index.get(name) {
            Some(&i) => i,
            None => {
                self.schemas.push(Schema::new(name));
                let i = self.schemas.len() - 1;
                self.index.insert(name.to_string(), i);
                i
            }
        };

        Ok(&mut self.schemas[idx])
    }

    /// Append one column to `schema.table`, creating both on first encounter
    pub fn add_column(
        &mut self,
        schema: &str,
        table: &str,
        column: Column,
    ) -> Result<(), CatalogError> {
        self.schema_entry(schema)?
            .table_entry(table)?
            .add_column(column)
    }

    /// Every (schema, table) pair in catalog order
    pub fn tables(&self) -> impl Iterator<Item = (&Schema, &Table)> {
        self.schemas
            .iter()
            .flat_map(|s| s.tables.iter().map(move |t| (s, t)))
    }

    pub fn table_count(&self) -> usize {
        self.schemas.iter().map(|s| s.tables.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
