//! Cosmetic repair of user-typed SELECT text. Not a parser: grammar is left
//! to the database.

use crate::error::{ProbeError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static TRAILING_TERMINATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r";\s*\z").unwrap());
static SELECT_TYPO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)^\s*selec\b").unwrap());
static TO_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\bTO[\s_]*NUMBER\s*\(").unwrap());
static SPLIT_UNDERSCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w)\s*_\s*(\w)").unwrap());
static HORIZONTAL_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static LEADING_SELECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)^\s*select\b").unwrap());

/// Applies, in order: trim, drop one trailing `;`, `selec` -> `SELECT`,
/// `to number(` -> `TO_NUMBER(`, `A _ B` -> `A_B`, squeeze spaces and tabs.
pub fn normalize(raw: &str) -> String {
    let sql = strip_terminator(raw.trim());
    let sql = SELECT_TYPO.replace(&sql, "SELECT");
    let sql = TO_NUMBER.replace_all(&sql, "TO_NUMBER(");
    let sql = SPLIT_UNDERSCORE.replace_all(&sql, "${1}_${2}");
    HORIZONTAL_SPACE.replace_all(&sql, " ").into_owned()
}

/// Removes a single `;` at the end, along with whitespace after it.
pub fn strip_terminator(sql: &str) -> String {
    TRAILING_TERMINATOR.replace(sql, "").into_owned()
}

pub fn is_select(sql: &str) -> bool {
    LEADING_SELECT.is_match(sql)
}

/// Normalizes caller text and rejects anything that is not a SELECT.
pub fn prepare_select(raw: &str) -> Result<String> {
    if raw.trim().is_empty() {
        return Err(ProbeError::Validation("SQL text is required".into()));
    }

    let sql = normalize(raw);
    if !is_select(&sql) {
        return Err(ProbeError::Validation(
            "only SELECT statements are allowed (no INSERT/UPDATE/DELETE/DDL)".into(),
        ));
    }
    Ok(sql)
}

/// Swaps the leading SELECT keyword for `replacement`.
pub(crate) fn replace_leading_select(sql: &str, replacement: &str) -> String {
    LEADING_SELECT
        .replace(sql, regex::NoExpand(replacement))
        .into_owned()
}
