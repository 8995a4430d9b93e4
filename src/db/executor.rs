//! Query execution façade.
//!
//! Handlers describe what they want as an [`Operation`]; the executor acquires
//! the live handle, renders the operation in that backend's dialect, runs it
//! and hands back a [`NormalizedResult`]. Connection-level failures mark the
//! handle that failed stale, if it is still the current one, so the next
//! request reconnects. Nothing is retried here.

use crate::db::operations::Operation;
use crate::db::pool::ConnectionManager;
use crate::error::{DbError, DbResult};
use crate::models::NormalizedResult;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct QueryExecutor {
    manager: Arc<ConnectionManager>,
}

impl QueryExecutor {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Run an operation against the current backend.
    pub async fn run(&self, operation: &Operation) -> DbResult<NormalizedResult> {
        let lease = self.manager.lease().await?;
        let handle = &lease.handle;
        let statement = operation.statement(handle.dialect());
        let start = Instant::now();

        debug!(
            operation = operation.name(),
            backend = %handle.kind(),
            params = statement.params.len(),
            "Executing operation"
        );

        match handle.execute(&statement).await {
            Ok(result) => {
                debug!(
                    operation = operation.name(),
                    rows = result.row_count(),
                    inserted_id = ?result.inserted_id,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Operation completed"
                );
                Ok(result)
            }
            Err(err) => {
                if err.is_connection_loss() && self.manager.invalidate_lease(&lease).await {
                    warn!(
                        operation = operation.name(),
                        generation = lease.generation,
                        error = %err,
                        "Connection lost, handle will be replaced on next use"
                    );
                }
                Err(err)
            }
        }
    }

    /// Run a read and decode the first row, if any.
    pub async fn fetch_optional<T: DeserializeOwned>(
        &self,
        operation: &Operation,
    ) -> DbResult<Option<T>> {
        let result = self.run(operation).await?;
        result
            .first_as()
            .map_err(|e| row_shape_error(operation, e))
    }

    /// Run a read and decode every row.
    pub async fn fetch_all<T: DeserializeOwned>(&self, operation: &Operation) -> DbResult<Vec<T>> {
        let result = self.run(operation).await?;
        result
            .rows_as()
            .map_err(|e| row_shape_error(operation, e))
    }

    /// Run an insert and return the generated id.
    pub async fn insert(&self, operation: &Operation) -> DbResult<i64> {
        self.run(operation)
            .await?
            .inserted_id
            .ok_or_else(|| DbError::internal(format!("{} returned no id", operation.name())))
    }
}

fn row_shape_error(operation: &Operation, err: serde_json::Error) -> DbError {
    DbError::internal(format!(
        "Unexpected row shape from {}: {}",
        operation.name(),
        err
    ))
}
