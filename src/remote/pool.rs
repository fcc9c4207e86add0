//! Bounded connection pool.
//!
//! # Responsibilities
//! - Cap concurrently open connections (semaphore permits)
//! - Keep at most `max_idle` connections around for reuse
//! - Evict connections older than `max_lifetime` on checkout and on return
//! - Hand out RAII guards that return the connection and the slot on drop
//!
//! # Design Decisions
//! - `get` waits for a slot without bound; `get_with` gives up when the
//!   caller's deadline fires. There is no separate wait-for-pool timeout
//! - Broken connections are never returned to the idle list

use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::deadline::Deadline;
use crate::observability::metrics;
use crate::remote::StoreError;

/// Creates and health-checks connections for a [`Pool`].
#[async_trait]
pub trait Manager: Send + Sync + 'static {
    type Connection: Send + 'static;

    async fn connect(&self) -> Result<Self::Connection, StoreError>;

    /// True if the connection must not be reused.
    fn is_broken(&self, conn: &Self::Connection) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolBounds {
    pub max_open: usize,
    pub max_idle: usize,
    pub max_lifetime: Duration,
}

/// Current pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolState {
    pub open: usize,
    pub idle: usize,
    pub max_open: usize,
}

struct Idle<C> {
    conn: C,
    created_at: Instant,
}

struct Shared<M: Manager> {
    manager: M,
    bounds: PoolBounds,
    slots: Arc<Semaphore>,
    idle: Mutex<VecDeque<Idle<M::Connection>>>,
    open: AtomicUsize,
}

impl<M: Manager> Shared<M> {
    fn idle(&self) -> MutexGuard<'_, VecDeque<Idle<M::Connection>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expired(&self, created_at: Instant) -> bool {
        created_at.elapsed() >= self.bounds.max_lifetime
    }

    fn opened(&self) {
        let open = self.open.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::set_pool_open(open);
    }

    fn closed_one(&self) {
        let open = self.open.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        metrics::set_pool_open(open);
    }
}

/// A pool of connections produced by `M`. Cloning shares the pool.
pub struct Pool<M: Manager> {
    shared: Arc<Shared<M>>,
}

impl<M: Manager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<M: Manager> Pool<M> {
    /// Create a pool. No connection is opened until the first checkout.
    pub fn new(manager: M, bounds: PoolBounds) -> Self {
        Self {
            shared: Arc::new(Shared {
                manager,
                bounds,
                slots: Arc::new(Semaphore::new(bounds.max_open)),
                idle: Mutex::new(VecDeque::with_capacity(bounds.max_idle)),
                open: AtomicUsize::new(0),
            }),
        }
    }

    /// Check out a connection, waiting for a free slot as long as it takes.
    pub async fn get(&self) -> Result<PooledConnection<M>, StoreError> {
        let permit = self
            .shared
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StoreError::PoolClosed)?;
        self.checkout(permit).await
    }

    /// Check out a connection, giving up with `Canceled` once `deadline` fires.
    pub async fn get_with(&self, deadline: &Deadline) -> Result<PooledConnection<M>, StoreError> {
        tokio::select! {
            biased;
            _ = deadline.canceled() => Err(StoreError::Canceled),
            conn = self.get() => conn,
        }
    }

    async fn checkout(&self, permit: OwnedSemaphorePermit) -> Result<PooledConnection<M>, StoreError> {
        loop {
            let Some(idle) = self.shared.idle().pop_back() else {
                break;
            };
            if self.shared.expired(idle.created_at) || self.shared.manager.is_broken(&idle.conn) {
                tracing::debug!("Evicting stale idle connection");
                self.shared.closed_one();
                continue;
            }
            return Ok(self.wrap(idle.conn, idle.created_at, permit));
        }

        let conn = self.shared.manager.connect().await?;
        self.shared.opened();
        tracing::debug!(open = self.shared.open.load(Ordering::Relaxed), "Opened new connection");
        Ok(self.wrap(conn, Instant::now(), permit))
    }

    fn wrap(&self, conn: M::Connection, created_at: Instant, permit: OwnedSemaphorePermit) -> PooledConnection<M> {
        PooledConnection {
            conn: Some(conn),
            created_at,
            broken: false,
            shared: self.shared.clone(),
            _permit: permit,
        }
    }

    /// Refuse further checkouts and drop every idle connection.
    /// Checked-out connections are dropped when their guards are.
    pub fn close(&self) {
        self.shared.slots.close();
        let drained: Vec<_> = self.shared.idle().drain(..).collect();
        for _ in &drained {
            self.shared.closed_one();
        }
        tracing::info!(dropped = drained.len(), "Connection pool closed");
    }

    pub fn state(&self) -> PoolState {
        PoolState {
            open: self.shared.open.load(Ordering::Relaxed),
            idle: self.shared.idle().len(),
            max_open: self.shared.bounds.max_open,
        }
    }

    pub fn bounds(&self) -> PoolBounds {
        self.shared.bounds
    }
}

/// A checked-out connection. Dropping it returns the connection to the idle
/// list (or closes it) and then frees the slot.
pub struct PooledConnection<M: Manager> {
    conn: Option<M::Connection>,
    created_at: Instant,
    broken: bool,
    shared: Arc<Shared<M>>,
    _permit: OwnedSemaphorePermit,
}

impl<M: Manager> PooledConnection<M> {
    /// Close this connection instead of returning it to the pool.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }
}

impl<M: Manager> Deref for PooledConnection<M> {
    type Target = M::Connection;
    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection taken")
    }
}

impl<M: Manager> DerefMut for PooledConnection<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection taken")
    }
}

impl<M: Manager> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        let reusable = !self.broken
            && !self.shared.slots.is_closed()
            && !self.shared.expired(self.created_at)
            && !self.shared.manager.is_broken(&conn);

        if reusable {
            let mut idle = self.shared.idle();
            if idle.len() < self.shared.bounds.max_idle {
                idle.push_back(Idle {
                    conn,
                    created_at: self.created_at,
                });
                return;
            }
        }

        drop(conn);
        self.shared.closed_one();
    }
}
