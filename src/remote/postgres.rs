//! Postgres backend for [`Store`].
//!
//! # Responsibilities
//! - Open connections with `tokio-postgres` and drive them on background tasks
//! - Run statements over the simple query protocol
//! - Turn a canceled deadline into a server-side `pg_cancel_backend`-style
//!   abort through the connection's `CancelToken`
//!
//! # Design Decisions
//! - The pool is lazy: constructing a store never touches the network
//! - A connection whose query was canceled is closed, never reused, so a
//!   late reply can't be read by the next borrower

use async_trait::async_trait;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};

use crate::config::DatabaseConfig;
use crate::deadline::Deadline;
use crate::remote::call;
use crate::remote::pool::{Manager, Pool, PoolState, PooledConnection};
use crate::remote::store::{Row, Store, Transaction};
use crate::remote::StoreError;

/// Opens `tokio-postgres` connections from a parsed connection string.
pub struct PgManager {
    config: tokio_postgres::Config,
}

impl PgManager {
    pub fn new(url: &str) -> Result<Self, StoreError> {
        let config = url.parse::<tokio_postgres::Config>().map_err(StoreError::Connect)?;
        Ok(Self { config })
    }
}

/// A live client. Its connection future runs on a spawned task and ends
/// when the client is dropped.
pub struct PgConnection {
    client: Client,
}

#[async_trait]
impl Manager for PgManager {
    type Connection = PgConnection;

    async fn connect(&self) -> Result<PgConnection, StoreError> {
        let (client, connection) = self.config.connect(NoTls).await.map_err(StoreError::Connect)?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "Postgres connection closed with error");
            }
        });
        Ok(PgConnection { client })
    }

    fn is_broken(&self, conn: &PgConnection) -> bool {
        conn.client.is_closed()
    }
}

fn into_rows(messages: Vec<SimpleQueryMessage>) -> Vec<Row> {
    messages
        .into_iter()
        .filter_map(|message| match message {
            SimpleQueryMessage::Row(row) => {
                let columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                let values = (0..row.len()).map(|i| row.get(i).map(str::to_string)).collect();
                Some(Row::new(columns, values))
            }
            _ => None,
        })
        .collect()
}

fn affected(messages: &[SimpleQueryMessage]) -> u64 {
    messages
        .iter()
        .map(|message| match message {
            SimpleQueryMessage::CommandComplete(n) => *n,
            _ => 0,
        })
        .sum()
}

async fn simple(conn: &PgConnection, statement: &str) -> Result<Vec<SimpleQueryMessage>, StoreError> {
    Ok(conn.client.simple_query(statement).await?)
}

/// Run `statement` on `conn`, aborting it server-side if `deadline` fires.
async fn simple_cancellable(
    conn: &mut PooledConnection<PgManager>,
    deadline: &Deadline,
    statement: &str,
) -> Result<Vec<SimpleQueryMessage>, StoreError> {
    let cancel = conn.client.cancel_token();
    let result = call::execute(deadline, simple(&**conn, statement), async move {
        cancel
            .cancel_query(NoTls)
            .await
            .map_err(|e| StoreError::AbortFailed(e.to_string()))
    })
    .await;

    if matches!(result, Err(StoreError::Canceled)) {
        conn.mark_broken();
    }
    result
}

/// [`Store`] backed by a bounded pool of Postgres connections.
pub struct PgStore {
    pool: Pool<PgManager>,
}

impl PgStore {
    pub fn new(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let manager = PgManager::new(&config.url)?;
        let bounds = config.pool_bounds();
        tracing::info!(
            max_open = bounds.max_open,
            max_idle = bounds.max_idle,
            max_lifetime_secs = bounds.max_lifetime.as_secs(),
            "Postgres store configured"
        );
        Ok(Self {
            pool: Pool::new(manager, bounds),
        })
    }

    pub fn pool_state(&self) -> PoolState {
        self.pool.state()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn execute(&self, statement: &str) -> Result<u64, StoreError> {
        let conn = self.pool.get().await?;
        Ok(affected(&simple(&conn, statement).await?))
    }

    async fn query(&self, statement: &str) -> Result<Vec<Row>, StoreError> {
        let conn = self.pool.get().await?;
        Ok(into_rows(simple(&conn, statement).await?))
    }

    async fn query_cancellable(
        &self,
        deadline: &Deadline,
        statement: &str,
    ) -> Result<Vec<Row>, StoreError> {
        let mut conn = self.pool.get_with(deadline).await?;
        Ok(into_rows(simple_cancellable(&mut conn, deadline, statement).await?))
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let mut conn = self.pool.get().await?;
        if let Err(e) = simple(&conn, "BEGIN").await {
            conn.mark_broken();
            return Err(e);
        }
        Ok(Box::new(PgTransaction { conn, finished: false }))
    }

    async fn close(&self) {
        self.pool.close();
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let conn = self.pool.get().await?;
        simple(&conn, "SELECT 1").await.map(|_| ())
    }
}

/// A transaction pinned to one pooled connection.
pub struct PgTransaction {
    conn: PooledConnection<PgManager>,
    finished: bool,
}

impl PgTransaction {
    async fn finish(mut self: Box<Self>, statement: &str) -> Result<(), StoreError> {
        let result = simple(&self.conn, statement).await.map(|_| ());
        if result.is_ok() {
            self.finished = true;
        }
        result
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn execute(&mut self, statement: &str) -> Result<u64, StoreError> {
        Ok(affected(&simple(&self.conn, statement).await?))
    }

    async fn query(&mut self, statement: &str) -> Result<Vec<Row>, StoreError> {
        Ok(into_rows(simple(&self.conn, statement).await?))
    }

    async fn query_cancellable(
        &mut self,
        deadline: &Deadline,
        statement: &str,
    ) -> Result<Vec<Row>, StoreError> {
        Ok(into_rows(simple_cancellable(&mut self.conn, deadline, statement).await?))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for PgTransaction {
    fn drop(&mut self) {
        if !self.finished {
            self.conn.mark_broken();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_url() {
        let config = DatabaseConfig {
            url: "postgres://app@localhost:notaport/postgres".into(),
        };
        assert!(matches!(PgStore::new(&config), Err(StoreError::Connect(_))));
    }

    #[tokio::test]
    async fn test_lazy_pool() {
        let config = DatabaseConfig {
            url: "postgres://app@localhost:5432/postgres".into(),
        };
        let store = PgStore::new(&config).unwrap();
        let state = store.pool_state();
        assert_eq!(state.open, 0);
        assert_eq!(state.max_open, DatabaseConfig::MAX_OPEN_CONNECTIONS);
    }
}
