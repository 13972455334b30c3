use crate::driver::Dialect;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProbeError>;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("{0}")]
    TransportExhausted(Box<TransportFailure>),

    /// Oracle pagination failed for a reason the ROWNUM rewrite cannot fix,
    /// or the rewrite itself failed.
    #[error("{strategy} query on '{target}' failed: {source}")]
    DialectFallback {
        target: String,
        strategy: &'static str,
        #[source]
        source: DriverError,
    },

    #[error("query on '{target}' failed: {source}")]
    Database {
        target: String,
        #[source]
        source: DriverError,
    },

    #[error("no usable {0} driver is compiled into this build")]
    DriverUnavailable(Dialect),

    #[error("failed to write {path}: {source}")]
    Export {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure reported by a database driver adapter. The message is kept
/// verbatim so vendor error codes stay searchable.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DriverError {
    message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn mentions(&self, code: &str) -> bool {
        self.message.contains(code)
    }
}

/// Everything needed to diagnose an API lookup where every candidate URL failed.
#[derive(Debug, Clone)]
pub struct TransportFailure {
    pub attempted: Vec<String>,
    pub last_error: String,
    pub settings: String,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "API request failed; attempted:")?;
        for url in &self.attempted {
            writeln!(f, "  - {url}")?;
        }
        writeln!(f, "settings: {}", self.settings)?;
        write!(f, "last error: {}", self.last_error)
    }
}
