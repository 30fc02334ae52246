//! Statement execution seam.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::query::params::ParamMap;
use crate::repo::record::Record;

/// Runs one statement against the store.
///
/// Implementations own the session; the query core never opens, pools or
/// closes connections, and never retries.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Executes `statement` with `params` bound to its placeholders and returns
    /// the records in store order.
    async fn execute(&self, statement: &str, params: &ParamMap) -> Result<Vec<Record>, StoreError>;
}

#[async_trait]
impl<T> StatementExecutor for Arc<T>
where
    T: StatementExecutor + ?Sized,
{
    async fn execute(&self, statement: &str, params: &ParamMap) -> Result<Vec<Record>, StoreError> {
        (**self).execute(statement, params).await
    }
}
