mod mysql;
mod oracle;

pub use mysql::{to_pyformat, MySqlEngine};
pub use oracle::{is_unsupported_pagination, AssetRecord, OracleEngine, Pagination, SerialLookup};

use crate::{
    binds::BindMap,
    coerce::{coerce, CellValue},
    driver::{Dialect, RawResultSet, RawRows, SqlDriver},
    error::{ProbeError, Result},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One raw-SQL invocation as the caller typed it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryRequest {
    pub sql: String,
    /// JSON object or `k=v` list.
    #[serde(default)]
    pub params: String,
    pub max_rows: u32,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>, params: impl Into<String>, max_rows: u32) -> Self {
        Self {
            sql: sql.into(),
            params: params.into(),
            max_rows,
        }
    }

    fn row_cap(&self) -> Result<u32> {
        if self.max_rows == 0 {
            return Err(ProbeError::Validation("max_rows must be positive".into()));
        }
        Ok(self.max_rows)
    }
}

/// Statements are rendered for one dialect; a driver speaking another is a
/// wiring mistake and never gets the statement.
fn require_dialect(driver: &dyn SqlDriver, expected: Dialect) -> Result<()> {
    let actual = driver.dialect();
    if actual != expected {
        return Err(ProbeError::Config(format!(
            "database target '{}' speaks {actual}, expected {expected}",
            driver.target()
        )));
    }
    Ok(())
}

/// Rows keep the order the database returned them in; index each row by `columns`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    pub row_count: usize,
    #[serde(rename = "binds")]
    pub resolved_binds: BindMap,
}

impl QueryResult {
    pub(crate) fn from_raw(raw: RawResultSet, resolved_binds: BindMap) -> Self {
        let rows = materialize(&raw.columns, raw.rows);
        Self {
            row_count: rows.len(),
            columns: raw.columns,
            rows,
            resolved_binds,
        }
    }
}

fn materialize(columns: &[String], rows: RawRows) -> Vec<Map<String, Value>> {
    match rows {
        RawRows::Records(records) => records
            .into_iter()
            .map(|record| {
                record
                    .into_iter()
                    .map(|(name, cell)| (name, coerce(cell)))
                    .collect()
            })
            .collect(),
        RawRows::Tuples(tuples) => tuples
            .into_iter()
            .map(|tuple| {
                columns
                    .iter()
                    .cloned()
                    .zip(tuple.into_iter().map(coerce))
                    .collect()
            })
            .collect(),
    }
}

/// First row's cells in column order, whatever shape the driver used.
fn first_row(rows: RawRows) -> Option<Vec<CellValue>> {
    match rows {
        RawRows::Records(records) => records
            .into_iter()
            .next()
            .map(|record| record.into_iter().map(|(_, cell)| cell).collect()),
        RawRows::Tuples(tuples) => tuples.into_iter().next(),
    }
}
