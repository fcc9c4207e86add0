//! Shared doubles for integration tests.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use deadline_server::config::ServerConfig;
use deadline_server::deadline::Deadline;
use deadline_server::remote::call;
use deadline_server::remote::{Row, Store, StoreError, Transaction};
use deadline_server::HttpServer;

/// What the fake remote service did with a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Completed,
    Aborted,
}

/// An in-memory stand-in for the external service. `select pg_sleep(n)`
/// runs on its own task, as it would on the server, and stops early only
/// when an abort arrives.
#[derive(Default)]
pub struct MemoryStore {
    sessions: Arc<Mutex<Vec<SessionState>>>,
    refuse_aborts: bool,
    closed: AtomicBool,
}

impl MemoryStore {
    #[allow(dead_code)]
    pub fn refusing_aborts() -> Self {
        Self {
            refuse_aborts: true,
            ..Self::default()
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> Vec<SessionState> {
        self.sessions.lock().unwrap().clone()
    }

    fn sleep_secs(statement: &str) -> Result<u64, StoreError> {
        statement
            .split("pg_sleep(")
            .nth(1)
            .and_then(|rest| rest.split(')').next())
            .and_then(|secs| secs.trim().parse().ok())
            .ok_or_else(|| StoreError::Remote(format!("unsupported statement: {statement}")))
    }

    /// Start the remote work and return its id plus the abort signal.
    fn start(&self, secs: u64) -> (tokio::task::JoinHandle<SessionState>, CancellationToken) {
        let sessions = self.sessions.clone();
        let id = {
            let mut sessions = sessions.lock().unwrap();
            sessions.push(SessionState::Running);
            sessions.len() - 1
        };
        let abort = CancellationToken::new();
        let signal = abort.clone();
        let work = tokio::spawn(async move {
            let state = tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => SessionState::Completed,
                _ = signal.cancelled() => SessionState::Aborted,
            };
            sessions.lock().unwrap()[id] = state;
            state
        });
        (work, abort)
    }

    fn row() -> Row {
        Row::new(vec!["pg_sleep".into()], vec![Some(String::new())])
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn execute(&self, statement: &str) -> Result<u64, StoreError> {
        self.query(statement).await.map(|rows| rows.len() as u64)
    }

    async fn query(&self, statement: &str) -> Result<Vec<Row>, StoreError> {
        let (work, _abort) = self.start(Self::sleep_secs(statement)?);
        work.await.map_err(|e| StoreError::Remote(e.to_string()))?;
        Ok(vec![Self::row()])
    }

    async fn query_cancellable(
        &self,
        deadline: &Deadline,
        statement: &str,
    ) -> Result<Vec<Row>, StoreError> {
        let secs = Self::sleep_secs(statement)?;
        let (work, abort) = self.start(secs);
        let refuse = self.refuse_aborts;

        call::execute(
            deadline,
            async move {
                match work.await {
                    Ok(SessionState::Completed) => Ok(vec![Self::row()]),
                    Ok(state) => Err(StoreError::Remote(format!("session ended as {state:?}"))),
                    Err(e) => Err(StoreError::Remote(e.to_string())),
                }
            },
            async move {
                if refuse {
                    return Err(StoreError::AbortFailed("connection refused".into()));
                }
                abort.cancel();
                Ok(())
            },
        )
        .await
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        Err(StoreError::Remote("transactions are not supported".into()))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Build a server around `store` with default config.
pub fn server(store: Arc<MemoryStore>) -> HttpServer {
    HttpServer::new(ServerConfig::default(), store)
}

/// Send one GET through the router and collect status and body.
pub async fn get(server: &HttpServer, path: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(path).body(Body::empty()).unwrap();
    let response = server.router().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}
