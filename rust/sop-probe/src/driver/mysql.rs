use super::{Dialect, RawResultSet, RawRows, SqlDriver};
use crate::{
    binds::{BindMap, BindValue},
    coerce::CellValue,
    config::MySqlConfig,
    error::DriverError,
};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, ConnectOptions, Connection, Executor, Row, Statement, TypeInfo};
use tracing::{debug, warn};

pub(super) struct MySqlDriver {
    config: MySqlConfig,
}

impl MySqlDriver {
    pub(super) fn new(config: MySqlConfig) -> Self {
        Self { config }
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .username(&self.config.user)
            .password(&self.config.password)
            .database(&self.config.database)
            .charset(&self.config.charset)
            .timezone(None::<String>)
    }
}

#[async_trait]
impl SqlDriver for MySqlDriver {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn target(&self) -> &str {
        "mysql"
    }

    async fn fetch(&self, statement: &str, binds: &BindMap) -> Result<RawResultSet, DriverError> {
        let (sql, ordered) = positional_placeholders(statement, binds)?;
        debug!(host = %self.config.host, binds = ordered.len(), "executing mysql statement");

        let mut conn = tokio::time::timeout(
            self.config.connect_timeout,
            self.connect_options().connect(),
        )
        .await
        .map_err(|_| {
            DriverError::new(format!(
                "timed out connecting to {}:{} after {:?}",
                self.config.host, self.config.port, self.config.connect_timeout
            ))
        })?
        .map_err(driver_error)?;

        let outcome = run_statement(&mut conn, &sql, &ordered).await;
        if let Err(err) = conn.close().await {
            warn!(error = %err, "failed to close mysql connection cleanly");
        }
        outcome
    }
}

async fn run_statement(
    conn: &mut MySqlConnection,
    sql: &str,
    ordered: &[BindValue],
) -> Result<RawResultSet, DriverError> {
    let mut query = sqlx::query(sql);
    for value in ordered {
        query = bind_value(query, value);
    }

    let rows: Vec<MySqlRow> = query.fetch_all(&mut *conn).await.map_err(driver_error)?;

    let columns: Vec<String> = match rows.first() {
        Some(first) => first
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect(),
        None => (&mut *conn)
            .prepare(sql)
            .await
            .map_err(driver_error)?
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect(),
    };

    let records = rows
        .iter()
        .map(|row| {
            row.columns()
                .iter()
                .map(|col| (col.name().to_string(), extract_value(row, col.ordinal())))
                .collect()
        })
        .collect();

    Ok(RawResultSet {
        columns,
        rows: RawRows::Records(records),
    })
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &BindValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        BindValue::Null => query.bind(None::<String>),
        BindValue::Bool(flag) => query.bind(*flag),
        BindValue::Int(int) => query.bind(*int),
        BindValue::Float(float) => query.bind(*float),
        BindValue::Text(text) => query.bind(text.clone()),
    }
}

/// Rewrites `%(name)s` markers into `?` and lists the bind values in the
/// order the markers appear.
fn positional_placeholders(
    sql: &str,
    binds: &BindMap,
) -> Result<(String, Vec<BindValue>), DriverError> {
    let mut rewritten = String::with_capacity(sql.len());
    let mut ordered = Vec::new();
    let mut rest = sql;

    while let Some(start) = rest.find("%(") {
        let after = &rest[start + 2..];
        let Some(end) = after.find(")s") else {
            break;
        };
        let name = &after[..end];
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            rewritten.push_str(&rest[..start + 2]);
            rest = after;
            continue;
        }

        let value = binds
            .get(name)
            .ok_or_else(|| DriverError::new(format!("missing value for bind '{name}'")))?;
        rewritten.push_str(&rest[..start]);
        rewritten.push('?');
        ordered.push(value.clone());
        rest = &after[end + 2..];
    }

    rewritten.push_str(rest);
    Ok((rewritten, ordered))
}

/// Calendar column families, picked by column type name. DATETIME and
/// TIMESTAMP both decode as naive wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Temporal {
    DateTime,
    Date,
    Time,
}

fn temporal_kind(type_name: &str) -> Option<Temporal> {
    match type_name.to_ascii_uppercase().as_str() {
        "DATETIME" | "TIMESTAMP" => Some(Temporal::DateTime),
        "DATE" => Some(Temporal::Date),
        "TIME" => Some(Temporal::Time),
        _ => None,
    }
}

fn temporal_value(row: &MySqlRow, idx: usize, kind: Temporal) -> Option<CellValue> {
    let cell = match kind {
        Temporal::DateTime => row
            .try_get::<Option<NaiveDateTime>, _>(idx)
            .ok()?
            .map_or(CellValue::Null, CellValue::DateTime),
        Temporal::Date => row
            .try_get::<Option<NaiveDate>, _>(idx)
            .ok()?
            .map_or(CellValue::Null, CellValue::Date),
        Temporal::Time => row
            .try_get::<Option<NaiveTime>, _>(idx)
            .ok()?
            .map_or(CellValue::Null, CellValue::Time),
    };
    Some(cell)
}

fn extract_value(row: &MySqlRow, idx: usize) -> CellValue {
    let type_name = row.column(idx).type_info().name();
    if let Some(cell) = temporal_kind(type_name).and_then(|kind| temporal_value(row, idx, kind)) {
        return cell;
    }

    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map_or(CellValue::Null, CellValue::Int);
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
        return v.map_or(CellValue::Null, |n| match i64::try_from(n) {
            Ok(int) => CellValue::Int(int),
            Err(_) => CellValue::Decimal(Decimal::from(n)),
        });
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map_or(CellValue::Null, CellValue::Bool);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map_or(CellValue::Null, CellValue::Float);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
        return v.map_or(CellValue::Null, |f| CellValue::Float(f64::from(f)));
    }
    if let Ok(v) = row.try_get::<Option<Decimal>, _>(idx) {
        return v.map_or(CellValue::Null, CellValue::Decimal);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map_or(CellValue::Null, CellValue::Text);
    }
    if let Ok(v) = row.try_get::<Option<serde_json::Value>, _>(idx) {
        return v.map_or(CellValue::Null, CellValue::Json);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v.map_or(CellValue::Null, CellValue::Bytes);
    }

    CellValue::Other(format!("<{type_name}>"))
}

fn driver_error(err: sqlx::Error) -> DriverError {
    DriverError::new(err.to_string())
}
