// 📖 Metadata Loader - INFORMATION_SCHEMA-style CSV → Catalog
//
// Each data row describes one column of one table. Headers may come in any
// order and with stray whitespace; only the four required ones are read.

use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info};
use std::path::Path;

use crate::catalog::{Catalog, Column};
use crate::errors::{PipelineError, PipelineResult};

pub const TABLE_SCHEMA: &str = "TABLE_SCHEMA";
pub const TABLE_NAME: &str = "TABLE_NAME";
pub const COLUMN_NAME: &str = "COLUMN_NAME";
pub const DATA_TYPE: &str = "DATA_TYPE";

const REQUIRED_HEADERS: [&str; 4] = [TABLE_SCHEMA, TABLE_NAME, COLUMN_NAME, DATA_TYPE];

/// Positions of the required headers within the file
struct HeaderPositions {
    schema: usize,
    table: usize,
    column: usize,
    data_type: usize,
}

impl HeaderPositions {
    fn locate(path: &Path, headers: &StringRecord) -> PipelineResult<Self> {
        let position = |name: &str| headers.iter().position(|h| h == name);

        let missing: Vec<&str> = REQUIRED_HEADERS
            .iter()
            .copied()
            .filter(|&name| position(name).is_none())
            .collect();

        match (
            position(TABLE_SCHEMA),
            position(TABLE_NAME),
            position(COLUMN_NAME),
            position(DATA_TYPE),
        ) {
            (Some(schema), Some(table), Some(column), Some(data_type)) => Ok(HeaderPositions {
                schema,
                table,
                column,
                data_type,
            }),
            _ => Err(PipelineError::malformed_metadata(
                path,
                format!("missing required header(s): {}", missing.join(", ")),
            )),
        }
    }
}

/// Parse the metadata file at `path` into a fully populated catalog
pub fn load_metadata(path: &Path, delimiter: u8) -> PipelineResult<Catalog> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| PipelineError::malformed_metadata(path, format!("cannot open: {}", e)))?;

    let headers = rdr
        .headers()
        .map_err(|e| {
            PipelineError::malformed_metadata(path, format!("cannot read header row: {}", e))
        })?
        .clone();
    let positions = HeaderPositions::locate(path, &headers)?;

    let mut catalog = Catalog::new();
    let mut record = StringRecord::new();

    loop {
        match rdr.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                return Err(PipelineError::malformed_metadata(path, e.to_string()));
            }
        }

        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let field = |idx: usize, name: &str| {
            record.get(idx).ok_or_else(|| {
                PipelineError::malformed_metadata(path, format!("line {}: no {} value", line, name))
            })
        };

        let schema = field(positions.schema, TABLE_SCHEMA)?;
        let table = field(positions.table, TABLE_NAME)?;
        let column = field(positions.column, COLUMN_NAME)?;
        let data_type = field(positions.data_type, DATA_TYPE)?;

        catalog
            .add_column(schema, table, Column::new(column, data_type))
            .map_err(|e| PipelineError::malformed_metadata(path, format!("line {}: {}", line, e)))?;

        debug!("catalog: {}.{}.{} {}", schema, table, column, data_type);
    }

    info!(
        "loaded metadata from {}: {} schema(s), {} table(s)",
        path.display(),
        catalog.schemas().len(),
        catalog.table_count()
    );

    Ok(catalog)
}
