use super::{require_dialect, QueryRequest, QueryResult};
use crate::{
    binds::{self, MAX_ROWS_BIND},
    driver::{Dialect, SqlDriver},
    error::{ProbeError, Result},
    sql,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

static EXISTING_LIMIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)\blimit\s+\d+\b").unwrap());

/// Raw SELECT execution against MySQL. `LIMIT` has no version hazard here,
/// so there is a single tier and no hint.
pub struct MySqlEngine {
    driver: Arc<dyn SqlDriver>,
}

impl MySqlEngine {
    pub fn new(driver: Arc<dyn SqlDriver>) -> Self {
        Self { driver }
    }

    pub async fn execute(&self, request: &QueryRequest) -> Result<QueryResult> {
        let normalized = sql::prepare_select(&request.sql)?;
        let max_rows = request.row_cap()?;
        let mut binds = binds::parse_bind_params(&request.params).without_max_rows();
        require_dialect(self.driver.as_ref(), Dialect::MySql)?;

        let mut statement = sql::strip_terminator(&normalized);
        if !EXISTING_LIMIT.is_match(&statement) {
            statement = format!("{statement} LIMIT %({MAX_ROWS_BIND})s");
            binds.insert(MAX_ROWS_BIND, i64::from(max_rows));
        }
        let statement = to_pyformat(&statement);

        debug!(binds = binds.len(), "running mysql query");
        let raw = self
            .driver
            .fetch(&statement, &binds)
            .await
            .map_err(|source| ProbeError::Database {
                target: self.driver.target().to_string(),
                source,
            })?;

        Ok(QueryResult::from_raw(raw, binds))
    }
}

/// Rewrites `:name` binds to `%(name)s`. A colon preceded by another colon
/// (`::` casts) is left as is.
pub fn to_pyformat(sql: &str) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut result = String::with_capacity(sql.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let opens_name = chars
            .get(i + 1)
            .is_some_and(|next| next.is_ascii_alphabetic() || *next == '_');
        let after_colon = i > 0 && chars[i - 1] == ':';

        if ch == ':' && opens_name && !after_colon {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
                end += 1;
            }
            result.push_str("%(");
            result.extend(&chars[start..end]);
            result.push_str(")s");
            i = end;
        } else {
            result.push(ch);
            i += 1;
        }
    }

    result
}
