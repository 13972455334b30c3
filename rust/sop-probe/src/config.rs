use anyhow::{Context, Result};
use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

pub const DEFAULT_SERIAL_STATEMENT: &str =
    "SELECT MODEL_NAME, SHIPPING_SN, DATA1 FROM sfism4.R109 WHERE SHIPPING_SN = :sn";

pub const PRIMARY_ALIAS: &str = "primary";
pub const SECONDARY_ALIAS: &str = "secondary";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub primary: OracleTarget,
    pub secondary: OracleTarget,
    pub mysql: MySqlConfig,
    pub default_max_rows: u32,
    pub serial_statement: String,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Path and query, must contain `{sn}`.
    pub path_template: String,
    pub timeout: Duration,
    pub use_system_proxy: bool,
    pub host_header: Option<String>,
    pub verification: TlsVerification,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsVerification {
    Disabled,
    PlatformRoots,
    CaBundle(PathBuf),
}

impl TlsVerification {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, TlsVerification::Disabled)
    }
}

impl std::fmt::Display for TlsVerification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsVerification::Disabled => f.write_str("off"),
            TlsVerification::PlatformRoots => f.write_str("on"),
            TlsVerification::CaBundle(path) => write!(f, "CA:{}", path.display()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OracleTarget {
    pub alias: String,
    pub user: String,
    pub password: String,
    /// Easy Connect descriptor, empty when unconfigured.
    pub dsn: String,
}

#[derive(Debug, Clone)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub connect_timeout: Duration,
    pub charset: String,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_api_host")]
    api_host: String,
    #[serde(default = "default_api_port")]
    api_port: u16,
    #[serde(default = "default_api_path")]
    api_path: String,
    #[serde(default = "default_timeout_secs")]
    api_timeout: u64,
    #[serde(default = "default_on")]
    use_system_proxy: String,
    #[serde(default)]
    api_host_header: Option<String>,
    #[serde(default = "default_off")]
    api_verify: String,
    #[serde(default)]
    api_ca: Option<String>,

    #[serde(default)]
    oracle_user: String,
    #[serde(default)]
    oracle_password: String,
    #[serde(default)]
    oracle_dsn: String,
    #[serde(default)]
    oracle2_user: String,
    #[serde(default)]
    oracle2_password: String,
    #[serde(default)]
    oracle2_dsn: String,
    #[serde(default = "default_timeout_secs")]
    oracle_connect_timeout: u64,
    #[serde(default)]
    oracle_sql_sn: Option<String>,

    #[serde(default = "default_mysql_host")]
    mysql_host: String,
    #[serde(default = "default_mysql_port")]
    mysql_port: u16,
    #[serde(default)]
    mysql_db: String,
    #[serde(default)]
    mysql_user: String,
    #[serde(default)]
    mysql_password: String,
    #[serde(default = "default_timeout_secs")]
    mysql_timeout: u64,
    #[serde(default = "default_charset")]
    mysql_charset: String,

    #[serde(default = "default_max_rows")]
    sql_max_rows: u32,
}

fn default_api_host() -> String {
    "localhost".to_string()
}

const fn default_api_port() -> u16 {
    8080
}

fn default_api_path() -> String {
    "/FPORTAL/GoodsOut/GetAssetInfoWithParams?sn={sn}".to_string()
}

const fn default_timeout_secs() -> u64 {
    20
}

fn default_on() -> String {
    "1".to_string()
}

fn default_off() -> String {
    "0".to_string()
}

fn default_mysql_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_mysql_port() -> u16 {
    3306
}

fn default_charset() -> String {
    "utf8mb4".to_string()
}

const fn default_max_rows() -> u32 {
    200
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let raw: RawConfig =
            envy::from_env().context("failed to parse API_*, ORACLE_* and MYSQL_* variables")?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawConfig) -> Self {
        let oracle_timeout = raw.oracle_connect_timeout.max(1);
        let verification = resolve_verification(&raw.api_verify, raw.api_ca.as_deref());

        Self {
            api: ApiConfig {
                host: raw.api_host.trim().to_string(),
                port: raw.api_port,
                path_template: raw.api_path,
                timeout: Duration::from_secs(raw.api_timeout.max(1)),
                use_system_proxy: raw.use_system_proxy.trim() == "1",
                host_header: non_empty(raw.api_host_header),
                verification,
            },
            primary: OracleTarget {
                alias: PRIMARY_ALIAS.to_string(),
                user: raw.oracle_user,
                password: raw.oracle_password,
                dsn: easy_connect_dsn(&raw.oracle_dsn, oracle_timeout),
            },
            secondary: OracleTarget {
                alias: SECONDARY_ALIAS.to_string(),
                user: raw.oracle2_user,
                password: raw.oracle2_password,
                dsn: easy_connect_dsn(&raw.oracle2_dsn, oracle_timeout),
            },
            mysql: MySqlConfig {
                host: raw.mysql_host.trim().to_string(),
                port: raw.mysql_port,
                database: raw.mysql_db.trim().to_string(),
                user: raw.mysql_user.trim().to_string(),
                password: raw.mysql_password.trim().to_string(),
                connect_timeout: Duration::from_secs(raw.mysql_timeout.max(1)),
                charset: raw.mysql_charset.trim().to_string(),
            },
            default_max_rows: raw.sql_max_rows.max(1),
            serial_statement: non_empty(raw.oracle_sql_sn)
                .unwrap_or_else(|| DEFAULT_SERIAL_STATEMENT.to_string()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn resolve_verification(verify: &str, ca: Option<&str>) -> TlsVerification {
    match ca.map(str::trim).filter(|path| !path.is_empty()) {
        Some(path) => TlsVerification::CaBundle(PathBuf::from(path)),
        None if verify.trim() == "1" => TlsVerification::PlatformRoots,
        None => TlsVerification::Disabled,
    }
}

/// Appends `connect_timeout` to an Easy Connect descriptor. TNS aliases
/// (no `/`, `:` or `@`) pass through untouched.
pub fn easy_connect_dsn(base: &str, timeout_secs: u64) -> String {
    let dsn = base.trim();
    let easy_connect = dsn.contains(['/', ':', '@']);

    if easy_connect && !dsn.contains("connect_timeout=") {
        let joiner = if dsn.contains('?') { '&' } else { '?' };
        format!("{dsn}{joiner}connect_timeout={timeout_secs}")
    } else {
        dsn.to_string()
    }
}
