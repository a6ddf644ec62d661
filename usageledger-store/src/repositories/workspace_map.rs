//! WorkspaceMap (C3): which billing account owns each workspace.

use async_trait::async_trait;
use uuid::Uuid;

use usageledger_core::error::{StoreError, StoreResult};

use crate::store::Store;

#[async_trait]
pub trait WorkspaceMapRepository {
    /// Insert `(workspace, account)` only if no row with that workspace
    /// exists. Returns true iff a row was inserted.
    async fn record_mapping(&self, account: Uuid, workspace: &str) -> StoreResult<bool>;

    async fn account_for_workspace(&self, workspace: &str) -> StoreResult<Option<Uuid>>;
}

#[async_trait]
impl WorkspaceMapRepository for Store {
    async fn record_mapping(&self, account: Uuid, workspace: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO workspace_account (workspace, account)
            VALUES ($1, $2)
            ON CONFLICT (workspace) DO NOTHING
            "#,
        )
        .bind(workspace)
        .bind(account)
        .execute(self.pool())
        .await
        .map_err(StoreError::Transient)?;

        Ok(result.rows_affected() == 1)
    }

    async fn account_for_workspace(&self, workspace: &str) -> StoreResult<Option<Uuid>> {
        use sqlx::Row;

        let row = sqlx::query("SELECT account FROM workspace_account WHERE workspace = $1")
            .bind(workspace)
            .fetch_optional(self.pool())
            .await
            .map_err(StoreError::Transient)?;

        row.map(|r| r.try_get("account").map_err(StoreError::Transient)).transpose()
    }
}
