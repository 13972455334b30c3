use super::{first_row, require_dialect, QueryRequest, QueryResult};
use crate::{
    binds::{self, BindMap, MAX_ROWS_BIND},
    coerce::{coerce, CellValue},
    driver::{Dialect, RawResultSet, SqlDriver},
    error::{DriverError, ProbeError, Result},
    sql,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Errors meaning the server cannot parse the Top-N form (pre-12c engines).
const UNSUPPORTED_PAGINATION_CODES: [&str; 3] = ["ORA-00933", "ORA-00923", "ORA-32034"];

pub fn is_unsupported_pagination(err: &DriverError) -> bool {
    UNSUPPORTED_PAGINATION_CODES
        .iter()
        .any(|code| err.mentions(code))
}

/// Row-limiting rewrites, tried from `TopN` down the `fallback` chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// `FIRST_ROWS(n)` hint plus `FETCH FIRST n ROWS ONLY`.
    TopN,
    /// The statement wrapped in `SELECT * FROM (...) WHERE ROWNUM <= :max_rows`.
    RowNum,
}

impl Pagination {
    pub fn name(self) -> &'static str {
        match self {
            Pagination::TopN => "top-n",
            Pagination::RowNum => "rownum",
        }
    }

    /// Tier to try when this one is rejected as unsupported.
    pub fn fallback(self) -> Option<Pagination> {
        match self {
            Pagination::TopN => Some(Pagination::RowNum),
            Pagination::RowNum => None,
        }
    }

    pub fn render(self, normalized: &str, max_rows: u32, binds: &BindMap) -> (String, BindMap) {
        match self {
            Pagination::TopN => {
                let hinted = sql::replace_leading_select(
                    &sql::strip_terminator(normalized),
                    &format!("SELECT /*+ FIRST_ROWS({max_rows}) */"),
                );
                (
                    format!("{hinted} FETCH FIRST {max_rows} ROWS ONLY"),
                    binds.clone(),
                )
            }
            Pagination::RowNum => {
                let mut binds = binds.clone();
                binds.insert(MAX_ROWS_BIND, i64::from(max_rows));
                (
                    format!("SELECT * FROM ({normalized}) WHERE ROWNUM <= :{MAX_ROWS_BIND}"),
                    binds,
                )
            }
        }
    }
}

/// Raw SELECT execution against the secondary Oracle target.
pub struct OracleEngine {
    driver: Arc<dyn SqlDriver>,
}

impl OracleEngine {
    pub fn new(driver: Arc<dyn SqlDriver>) -> Self {
        Self { driver }
    }

    pub async fn execute(&self, request: &QueryRequest) -> Result<QueryResult> {
        let normalized = sql::prepare_select(&request.sql)?;
        let max_rows = request.row_cap()?;
        let binds = binds::parse_bind_params(&request.params).without_max_rows();
        require_dialect(self.driver.as_ref(), Dialect::Oracle)?;

        let raw = self.paginate(&normalized, max_rows, &binds).await?;
        Ok(QueryResult::from_raw(raw, binds))
    }

    async fn paginate(
        &self,
        normalized: &str,
        max_rows: u32,
        binds: &BindMap,
    ) -> Result<RawResultSet> {
        let mut strategy = Pagination::TopN;
        loop {
            let (statement, statement_binds) = strategy.render(normalized, max_rows, binds);
            match self.driver.fetch(&statement, &statement_binds).await {
                Ok(raw) => {
                    debug!(
                        alias = self.driver.target(),
                        strategy = strategy.name(),
                        rows = raw.rows.len(),
                        "oracle query succeeded"
                    );
                    return Ok(raw);
                }
                Err(err) => match strategy.fallback() {
                    Some(next) if is_unsupported_pagination(&err) => {
                        warn!(
                            strategy = strategy.name(),
                            next = next.name(),
                            error = %err,
                            "pagination syntax unsupported, retrying with fallback"
                        );
                        strategy = next;
                    }
                    _ => {
                        return Err(ProbeError::DialectFallback {
                            target: self.driver.target().to_string(),
                            strategy: strategy.name(),
                            source: err,
                        })
                    }
                },
            }
        }
    }
}

/// Outcome of the fixed lookup-by-serial-number statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetRecord {
    #[serde(rename = "MODEL_NAME")]
    pub model_name: Value,
    #[serde(rename = "SHIPPING_SN")]
    pub shipping_sn: Value,
    #[serde(rename = "DATA1")]
    pub data1: Value,
}

impl AssetRecord {
    pub const COLUMNS: [&'static str; 3] = ["MODEL_NAME", "SHIPPING_SN", "DATA1"];

    fn from_cells(cells: Vec<CellValue>) -> Self {
        let mut cells = cells.into_iter().map(coerce);
        Self {
            model_name: cells.next().unwrap_or(Value::Null),
            shipping_sn: cells.next().unwrap_or(Value::Null),
            data1: cells.next().unwrap_or(Value::Null),
        }
    }

    pub fn to_row(&self) -> Map<String, Value> {
        Self::COLUMNS
            .iter()
            .map(|name| name.to_string())
            .zip([
                self.model_name.clone(),
                self.shipping_sn.clone(),
                self.data1.clone(),
            ])
            .collect()
    }
}

/// Runs the one parameterized statement keyed by `:sn` against the primary target.
pub struct SerialLookup {
    driver: Arc<dyn SqlDriver>,
    statement: String,
}

impl SerialLookup {
    pub fn new(driver: Arc<dyn SqlDriver>, statement: impl Into<String>) -> Self {
        Self {
            driver,
            statement: statement.into(),
        }
    }

    pub async fn lookup(&self, serial: &str) -> Result<Option<AssetRecord>> {
        let serial = serial.trim();
        if serial.is_empty() {
            return Err(ProbeError::Validation("serial number is required".into()));
        }
        require_dialect(self.driver.as_ref(), Dialect::Oracle)?;

        let binds: BindMap = [("sn", serial)].into_iter().collect();
        let raw = self
            .driver
            .fetch(&self.statement, &binds)
            .await
            .map_err(|source| ProbeError::Database {
                target: self.driver.target().to_string(),
                source,
            })?;

        Ok(first_row(raw.rows).map(AssetRecord::from_cells))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binds::BindValue;

    #[test]
    fn top_n_injects_hint_and_fetch_clause() {
        let binds: BindMap = [("sn", "X")].into_iter().collect();
        let (statement, rendered) =
            Pagination::TopN.render("select * from r109 where sn = :sn;", 50, &binds);

        assert_eq!(
            statement,
            "SELECT /*+ FIRST_ROWS(50) */ * from r109 where sn = :sn FETCH FIRST 50 ROWS ONLY"
        );
        assert_eq!(rendered, binds);
    }

    #[test]
    fn rownum_wraps_the_normalized_statement() {
        let binds: BindMap = [("sn", "X")].into_iter().collect();
        let (statement, rendered) =
            Pagination::RowNum.render("SELECT a FROM t WHERE sn = :sn", 25, &binds);

        assert_eq!(
            statement,
            "SELECT * FROM (SELECT a FROM t WHERE sn = :sn) WHERE ROWNUM <= :max_rows"
        );
        assert_eq!(rendered.get("sn"), Some(&BindValue::from("X")));
        assert_eq!(rendered.get(MAX_ROWS_BIND), Some(&BindValue::Int(25)));
    }

    #[test]
    fn fallback_chain_ends_after_rownum() {
        assert_eq!(Pagination::TopN.fallback(), Some(Pagination::RowNum));
        assert_eq!(Pagination::RowNum.fallback(), None);
    }

    #[test]
    fn only_known_codes_trigger_fallback() {
        for code in UNSUPPORTED_PAGINATION_CODES {
            let err = DriverError::new(format!("{code}: something went wrong"));
            assert!(is_unsupported_pagination(&err), "{code} should fall back");
        }
        assert!(!is_unsupported_pagination(&DriverError::new(
            "ORA-00942: table or view does not exist"
        )));
    }

    #[test]
    fn asset_record_fills_missing_cells_with_null() {
        let record = AssetRecord::from_cells(vec![CellValue::Text("ModelX".into())]);
        assert_eq!(record.model_name, Value::String("ModelX".into()));
        assert_eq!(record.shipping_sn, Value::Null);
        assert_eq!(record.data1, Value::Null);
    }
}
