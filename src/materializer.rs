// 🏗️ Schema Materializer - Catalog → CREATE SCHEMA / CREATE TABLE
//
// Every statement is IF NOT EXISTS, so a repeated run is a no-op. All
// schemas are created before any table because some drivers (SQLite's
// ATTACH) refuse schema creation inside an open transaction.

use log::{debug, info, warn};

use crate::catalog::Catalog;
use crate::db::{create_schema_sql, create_table_sql, qualified_name, Database};
use crate::errors::{PipelineError, PipelineResult};

/// Issue DDL for every schema and table in the catalog, committing once
pub fn create_tables<D: Database + ?Sized>(catalog: &Catalog, db: &mut D) -> PipelineResult<()> {
    for schema in catalog.schemas() {
        debug!("create schema {}", schema.name());
        if let Err(source) = db.create_schema(schema.name()) {
            return Err(abort(
                db,
                PipelineError::SchemaCreation {
                    object: format!("schema {}", schema.name()),
                    statement: create_schema_sql(schema.name()),
                    source,
                },
            ));
        }
    }

    for (schema, table) in catalog.tables() {
        let statement = create_table_sql(schema.name(), table);
        debug!("{}", statement);

        if let Err(source) = db.execute(&statement, &[]) {
            return Err(abort(
                db,
                PipelineError::SchemaCreation {
                    object: format!("table {}", qualified_name(schema.name(), table.name())),
                    statement,
                    source,
                },
            ));
        }
    }

    db.commit()
        .map_err(|source| PipelineError::database("schema commit", source))?;

    info!(
        "materialized {} schema(s), {} table(s)",
        catalog.schemas().len(),
        catalog.table_count()
    );

    Ok(())
}

fn abort<D: Database + ?Sized>(db: &mut D, err: PipelineError) -> PipelineError {
    if let Err(e) = db.rollback() {
        warn!("rollback after DDL failure failed: {}", e);
    }
    err
}
