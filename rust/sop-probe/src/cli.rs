use crate::{
    api::{summarize_payload, ApiClient},
    config::AppConfig,
    driver,
    error::{ProbeError, Result},
    export,
    query::{AssetRecord, MySqlEngine, OracleEngine, QueryRequest, QueryResult, SerialLookup},
};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "sop-probe")]
#[command(about = "Asset and repair status lookup by serial number", long_about = None)]
pub struct Cli {
    #[arg(long, value_enum, default_value_t = Mode::Api)]
    pub mode: Mode,

    /// Serial number, with or without surrounding braces
    #[arg(long)]
    pub sn: Option<String>,

    /// SELECT statement to run; implies a raw query mode
    #[arg(long)]
    pub sql: Option<String>,

    /// Bind parameters as a JSON object or "k=v,k2=v2"
    #[arg(long, default_value = "")]
    pub params: String,

    /// Row cap for raw queries (defaults to SQL_MAX_ROWS)
    #[arg(long)]
    pub max_rows: Option<u32>,

    /// Also write SQL results to this CSV file
    #[arg(long)]
    pub out_csv: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Api,
    #[value(alias = "sql_sn")]
    SqlSn,
    #[value(alias = "sql_raw")]
    SqlRaw,
    #[value(alias = "mysql_raw")]
    MysqlRaw,
}

/// What one invocation resolves to once flags are reconciled.
#[derive(Debug, Clone)]
pub enum Action {
    Api { serial: String },
    SerialLookup { serial: String },
    OracleRaw(QueryRequest),
    MySqlRaw(QueryRequest),
}

impl Cli {
    /// `--sql` on its own selects the Oracle raw engine; only `mysql-raw`
    /// routes it to MySQL.
    pub fn action(&self, default_max_rows: u32) -> Result<Action> {
        let max_rows = self.max_rows.unwrap_or(default_max_rows);

        if self.mode == Mode::MysqlRaw {
            return Ok(Action::MySqlRaw(self.raw_request(max_rows)?));
        }
        if self.mode == Mode::SqlRaw || self.sql.is_some() {
            return Ok(Action::OracleRaw(self.raw_request(max_rows)?));
        }

        let serial = self.serial()?;
        Ok(match self.mode {
            Mode::SqlSn => Action::SerialLookup { serial },
            _ => Action::Api { serial },
        })
    }

    fn raw_request(&self, max_rows: u32) -> Result<QueryRequest> {
        let sql = self.sql.as_deref().ok_or_else(|| {
            ProbeError::Validation("provide the query with --sql \"SELECT ...\"".into())
        })?;
        Ok(QueryRequest::new(sql, self.params.as_str(), max_rows))
    }

    fn serial(&self) -> Result<String> {
        let serial = self
            .sn
            .as_deref()
            .map(strip_braces)
            .unwrap_or_default();
        if serial.is_empty() {
            return Err(ProbeError::Validation("provide a serial number with --sn".into()));
        }
        Ok(serial.to_string())
    }
}

/// `{ABC123}` and `ABC123` name the same unit.
pub fn strip_braces(serial: &str) -> &str {
    serial.trim().trim_matches(|c| c == '{' || c == '}').trim()
}

pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    let action = cli.action(config.default_max_rows)?;
    debug!(?action, "resolved command line");

    match action {
        Action::Api { serial } => {
            let client = ApiClient::new(config.api)?;
            let payload = client.fetch(&serial).await?;
            println!("{}", summarize_payload(&payload));
            println!("\nfull JSON");
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        Action::SerialLookup { serial } => {
            let lookup = SerialLookup::new(
                driver::oracle_driver(&config.primary)?,
                config.serial_statement,
            );
            match lookup.lookup(&serial).await? {
                Some(record) => {
                    if let Some(path) = &cli.out_csv {
                        let columns = AssetRecord::COLUMNS.map(str::to_string);
                        export_csv(path, &columns, &[record.to_row()])?;
                    }
                    println!("{}", serde_json::to_string_pretty(&record)?);
                }
                None => println!("no record found for {serial}"),
            }
        }
        Action::OracleRaw(request) => {
            let engine = OracleEngine::new(driver::oracle_driver(&config.secondary)?);
            print_result(&engine.execute(&request).await?, cli.out_csv.as_deref())?;
        }
        Action::MySqlRaw(request) => {
            let engine = MySqlEngine::new(driver::mysql_driver(&config.mysql)?);
            print_result(&engine.execute(&request).await?, cli.out_csv.as_deref())?;
        }
    }

    Ok(())
}

fn print_result(result: &QueryResult, out_csv: Option<&Path>) -> anyhow::Result<()> {
    if let Some(path) = out_csv {
        export_csv(path, &result.columns, &result.rows)?;
    }
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

fn export_csv(
    path: &Path,
    columns: &[String],
    rows: &[serde_json::Map<String, serde_json::Value>],
) -> Result<()> {
    export::write_csv(path, columns, rows)?;
    let shown = std::env::current_dir()
        .map(|dir| dir.join(path))
        .unwrap_or_else(|_| path.to_path_buf());
    println!("CSV written to {}", shown.display());
    Ok(())
}
