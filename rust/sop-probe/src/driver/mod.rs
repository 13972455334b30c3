//! The narrow interface the query engines need from a database client.
//!
//! Each `fetch` opens its own connection, runs exactly one statement and
//! releases the connection before returning, on success and failure alike.

#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "oracle")]
mod oracle;

use crate::{
    binds::BindMap,
    coerce::CellValue,
    config::{MySqlConfig, OracleTarget},
    error::{DriverError, ProbeError, Result},
};
use async_trait::async_trait;
use std::{fmt, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Oracle,
    MySql,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Oracle => f.write_str("Oracle"),
            Dialect::MySql => f.write_str("MySQL"),
        }
    }
}

/// Row shapes differ between clients: some hand back name-keyed records,
/// others bare tuples in column order.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRows {
    Records(Vec<Vec<(String, CellValue)>>),
    Tuples(Vec<Vec<CellValue>>),
}

impl RawRows {
    pub fn len(&self) -> usize {
        match self {
            RawRows::Records(rows) => rows.len(),
            RawRows::Tuples(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawResultSet {
    pub columns: Vec<String>,
    pub rows: RawRows,
}

#[async_trait]
pub trait SqlDriver: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Alias of the database target, used in error context.
    fn target(&self) -> &str;

    async fn fetch(
        &self,
        statement: &str,
        binds: &BindMap,
    ) -> std::result::Result<RawResultSet, DriverError>;
}

/// Builds the Oracle client for `target`.
pub fn oracle_driver(target: &OracleTarget) -> Result<Arc<dyn SqlDriver>> {
    if target.dsn.trim().is_empty() {
        return Err(ProbeError::Config(format!(
            "database target '{}' has no connection descriptor",
            target.alias
        )));
    }

    #[cfg(feature = "oracle")]
    {
        Ok(Arc::new(oracle::OracleDriver::new(target.clone())))
    }

    #[cfg(not(feature = "oracle"))]
    {
        Err(ProbeError::DriverUnavailable(Dialect::Oracle))
    }
}

/// Builds the MySQL client.
pub fn mysql_driver(config: &MySqlConfig) -> Result<Arc<dyn SqlDriver>> {
    if config.host.is_empty() {
        return Err(ProbeError::Config("MYSQL_HOST must not be empty".into()));
    }

    #[cfg(feature = "mysql")]
    {
        Ok(Arc::new(mysql::MySqlDriver::new(config.clone())))
    }

    #[cfg(not(feature = "mysql"))]
    {
        Err(ProbeError::DriverUnavailable(Dialect::MySql))
    }
}
