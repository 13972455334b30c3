use super::{Dialect, RawResultSet, RawRows, SqlDriver};
use crate::{
    binds::{BindMap, BindValue},
    coerce::CellValue,
    config::OracleTarget,
    error::DriverError,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use oracle::{sql_type::OracleType, Connection, Row, Statement};
use rust_decimal::Decimal;
use std::{str::FromStr, sync::Arc};
use tracing::debug;

pub(super) struct OracleDriver {
    target: Arc<OracleTarget>,
}

impl OracleDriver {
    pub(super) fn new(target: OracleTarget) -> Self {
        Self {
            target: Arc::new(target),
        }
    }
}

#[async_trait]
impl SqlDriver for OracleDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Oracle
    }

    fn target(&self) -> &str {
        &self.target.alias
    }

    async fn fetch(&self, statement: &str, binds: &BindMap) -> Result<RawResultSet, DriverError> {
        let target = Arc::clone(&self.target);
        let statement = statement.to_string();
        let binds = binds.clone();

        // The client library blocks; the connection lives and dies inside the closure.
        tokio::task::spawn_blocking(move || run_statement(&target, &statement, &binds))
            .await
            .map_err(|err| DriverError::new(format!("oracle worker failed: {err}")))?
    }
}

fn run_statement(
    target: &OracleTarget,
    sql: &str,
    binds: &BindMap,
) -> Result<RawResultSet, DriverError> {
    debug!(alias = %target.alias, binds = binds.len(), "executing oracle statement");
    let conn = Connection::connect(&target.user, &target.password, &target.dsn)
        .map_err(driver_error)?;

    let mut stmt = conn.statement(sql).build().map_err(driver_error)?;
    bind_all(&mut stmt, binds).map_err(driver_error)?;

    let result_set = stmt.query(&[]).map_err(driver_error)?;
    let column_info = result_set.column_info();
    let columns: Vec<String> = column_info.iter().map(|col| col.name().to_string()).collect();
    let types: Vec<OracleType> = column_info
        .iter()
        .map(|col| col.oracle_type().clone())
        .collect();

    let mut rows = Vec::new();
    for row in result_set {
        let row = row.map_err(driver_error)?;
        let cells = types
            .iter()
            .enumerate()
            .map(|(idx, ty)| read_cell(&row, idx, ty))
            .collect::<oracle::Result<Vec<_>>>()
            .map_err(driver_error)?;
        rows.push(cells);
    }

    Ok(RawResultSet {
        columns,
        rows: RawRows::Tuples(rows),
    })
}

fn bind_all(stmt: &mut Statement, binds: &BindMap) -> oracle::Result<()> {
    for (name, value) in binds.iter() {
        match value {
            BindValue::Null => stmt.bind(name, &None::<String>)?,
            // Pre-23 servers have no SQL BOOLEAN.
            BindValue::Bool(flag) => stmt.bind(name, &i64::from(*flag))?,
            BindValue::Int(int) => stmt.bind(name, int)?,
            BindValue::Float(float) => stmt.bind(name, float)?,
            BindValue::Text(text) => stmt.bind(name, text)?,
        }
    }
    Ok(())
}

fn read_cell(row: &Row, idx: usize, ty: &OracleType) -> oracle::Result<CellValue> {
    let cell = match ty {
        OracleType::Number(_, _) | OracleType::Float(_) => row
            .get::<_, Option<String>>(idx)?
            .map_or(CellValue::Null, |text| number_cell(&text)),
        OracleType::BinaryFloat | OracleType::BinaryDouble => row
            .get::<_, Option<f64>>(idx)?
            .map_or(CellValue::Null, CellValue::Float),
        OracleType::Date | OracleType::Timestamp(_) => row
            .get::<_, Option<NaiveDateTime>>(idx)?
            .map_or(CellValue::Null, CellValue::DateTime),
        OracleType::TimestampTZ(_) | OracleType::TimestampLTZ(_) => row
            .get::<_, Option<DateTime<FixedOffset>>>(idx)?
            .map_or(CellValue::Null, CellValue::Timestamptz),
        OracleType::Raw(_) | OracleType::BLOB | OracleType::LongRaw => row
            .get::<_, Option<Vec<u8>>>(idx)?
            .map_or(CellValue::Null, CellValue::Bytes),
        OracleType::Varchar2(_)
        | OracleType::NVarchar2(_)
        | OracleType::Char(_)
        | OracleType::NChar(_)
        | OracleType::CLOB
        | OracleType::NCLOB
        | OracleType::Long => row
            .get::<_, Option<String>>(idx)?
            .map_or(CellValue::Null, CellValue::Text),
        _ => row
            .get::<_, Option<String>>(idx)?
            .map_or(CellValue::Null, CellValue::Other),
    };
    Ok(cell)
}

// NUMBER arrives as text so precision survives until coercion.
fn number_cell(text: &str) -> CellValue {
    if let Ok(int) = text.parse::<i64>() {
        return CellValue::Int(int);
    }
    if let Ok(decimal) = Decimal::from_str(text) {
        return CellValue::Decimal(decimal);
    }
    // Beyond 28 digits or in exponent form.
    match text.parse::<f64>() {
        Ok(float) if float.is_finite() => CellValue::Float(float),
        _ => CellValue::Text(text.to_string()),
    }
}

fn driver_error(err: oracle::Error) -> DriverError {
    DriverError::new(err.to_string())
}
