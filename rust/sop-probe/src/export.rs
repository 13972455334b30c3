use crate::error::{ProbeError, Result};
use serde_json::{Map, Value};
use std::{fs, io::Write, path::Path};
use tracing::info;

const UTF8_BOM: &str = "\u{feff}";
const LINE_END: &str = "\r\n";

/// Writes rows as CSV: a BOM so spreadsheet tools detect UTF-8, a header
/// line from `columns`, then one line per row indexed by those columns.
pub fn write_csv(path: &Path, columns: &[String], rows: &[Map<String, Value>]) -> Result<()> {
    let export_error = |source| ProbeError::Export {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(export_error)?;
    }

    let mut out = String::from(UTF8_BOM);
    push_line(&mut out, columns.iter().map(|column| escape_cell(column)));
    for row in rows {
        push_line(
            &mut out,
            columns
                .iter()
                .map(|column| escape_cell(&cell_text(row.get(column)))),
        );
    }

    let mut file = fs::File::create(path).map_err(export_error)?;
    file.write_all(out.as_bytes()).map_err(export_error)?;

    info!(path = %path.display(), rows = rows.len(), "wrote CSV export");
    Ok(())
}

fn push_line(out: &mut String, cells: impl Iterator<Item = String>) {
    let cells: Vec<String> = cells.collect();
    out.push_str(&cells.join(","));
    out.push_str(LINE_END);
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn escape_cell(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
