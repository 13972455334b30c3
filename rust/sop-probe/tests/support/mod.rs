#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use sop_probe::{
    binds::BindMap,
    coerce::CellValue,
    driver::{Dialect, RawResultSet, RawRows, SqlDriver},
    error::DriverError,
};
use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tokio::{net::TcpListener, task::JoinHandle};

/// One statement as the engine handed it to the driver.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub statement: String,
    pub binds: BindMap,
}

/// Driver double that replays scripted outcomes in order and records every
/// statement it receives.
pub struct RecordingDriver {
    dialect: Dialect,
    responses: Mutex<VecDeque<Result<RawResultSet, DriverError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingDriver {
    pub fn new(dialect: Dialect, responses: Vec<Result<RawResultSet, DriverError>>) -> Arc<Self> {
        Arc::new(Self {
            dialect,
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl SqlDriver for RecordingDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn target(&self) -> &str {
        "recording"
    }

    async fn fetch(&self, statement: &str, binds: &BindMap) -> Result<RawResultSet, DriverError> {
        self.calls.lock().expect("calls lock").push(RecordedCall {
            statement: statement.to_string(),
            binds: binds.clone(),
        });
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Err(DriverError::new("no scripted response left")))
    }
}

pub fn tuples(columns: &[&str], rows: Vec<Vec<CellValue>>) -> RawResultSet {
    RawResultSet {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        rows: RawRows::Tuples(rows),
    }
}

pub fn records(columns: &[&str], rows: Vec<Vec<CellValue>>) -> RawResultSet {
    let names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    RawResultSet {
        rows: RawRows::Records(
            rows.into_iter()
                .map(|cells| names.iter().cloned().zip(cells).collect())
                .collect(),
        ),
        columns: names,
    }
}

pub fn text(value: &str) -> CellValue {
    CellValue::Text(value.to_string())
}

/// Plain-HTTP server on an ephemeral loopback port, stopped on drop.
pub struct StubServer {
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl StubServer {
    pub async fn spawn(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.expect("stub server");
        });
        Self { addr, handle }
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A loopback port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind throwaway listener");
    listener.local_addr().expect("throwaway listener address").port()
}
