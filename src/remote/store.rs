//! Store abstraction over an external, stateful service.
//!
//! Statements go over the simple query protocol, so rows carry text values.

use async_trait::async_trait;

use crate::deadline::Deadline;
use crate::remote::StoreError;

/// One result row: column names and their text values (`None` for NULL).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Option<String>>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Option<String>>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).and_then(|v| v.as_deref())
    }

    pub fn get_by_name(&self, name: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.get(idx)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn first_row(rows: Vec<Row>) -> Result<Row, StoreError> {
    rows.into_iter().next().ok_or(StoreError::NoRows)
}

/// The capability set every backend provides.
#[async_trait]
pub trait Store: Send + Sync {
    /// Run a statement, returning the number of affected rows.
    async fn execute(&self, statement: &str) -> Result<u64, StoreError>;

    async fn query(&self, statement: &str) -> Result<Vec<Row>, StoreError>;

    /// Like `query`, but when `deadline` is canceled the local wait ends with
    /// `Canceled` and the remote side is asked to stop.
    async fn query_cancellable(
        &self,
        deadline: &Deadline,
        statement: &str,
    ) -> Result<Vec<Row>, StoreError>;

    async fn query_one(&self, statement: &str) -> Result<Row, StoreError> {
        first_row(self.query(statement).await?)
    }

    async fn query_one_cancellable(
        &self,
        deadline: &Deadline,
        statement: &str,
    ) -> Result<Row, StoreError> {
        first_row(self.query_cancellable(deadline, statement).await?)
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;

    /// Stop handing out connections and drop idle ones.
    async fn close(&self);

    async fn ping(&self) -> Result<(), StoreError>;
}

/// An open transaction. Dropping it without `commit` or `rollback` discards
/// the underlying connection, which rolls the transaction back remotely.
#[async_trait]
pub trait Transaction: Send {
    async fn execute(&mut self, statement: &str) -> Result<u64, StoreError>;

    async fn query(&mut self, statement: &str) -> Result<Vec<Row>, StoreError>;

    async fn query_cancellable(
        &mut self,
        deadline: &Deadline,
        statement: &str,
    ) -> Result<Vec<Row>, StoreError>;

    async fn query_one(&mut self, statement: &str) -> Result<Row, StoreError> {
        first_row(self.query(statement).await?)
    }

    async fn query_one_cancellable(
        &mut self,
        deadline: &Deadline,
        statement: &str,
    ) -> Result<Row, StoreError> {
        first_row(self.query_cancellable(deadline, statement).await?)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
