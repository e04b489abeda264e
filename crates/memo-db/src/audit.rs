//! Append-only audit trail for entry writes.

use chrono::Utc;
use sqlx::{Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use memo_core::{new_v7, AuditAction, AuditRecord, Error, Result, UserScope};

/// Append an audit row inside the caller's transaction.
pub(crate) async fn record_tx(
    tx: &mut Transaction<'_, Postgres>,
    scope: UserScope,
    action: AuditAction,
    table_name: &str,
    record_id: Uuid,
    changes: serde_json::Value,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO audit_log (id, user_id, action_type, table_name, record_id, changes, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(new_v7())
    .bind(scope.user_id())
    .bind(action.as_str())
    .bind(table_name)
    .bind(record_id)
    .bind(changes)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await
    .map_err(Error::Database)?;
    Ok(())
}

/// Read access to the audit trail.
#[derive(Clone)]
pub struct PgAuditRepository {
    pool: Pool<Postgres>,
}

impl PgAuditRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Audit rows for one record, oldest first.
    pub async fn list_for_record(&self, scope: UserScope, record_id: Uuid) -> Result<Vec<AuditRecord>> {
        let rows = sqlx::query(
            "SELECT id, user_id, action_type, table_name, record_id, changes, created_at
             FROM audit_log
             WHERE user_id = $1 AND record_id = $2
             ORDER BY created_at, id",
        )
        .bind(scope.user_id())
        .bind(record_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter()
            .map(|row| {
                let action: String = row.get("action_type");
                Ok(AuditRecord {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    action: action.parse().map_err(Error::Internal)?,
                    table_name: row.get("table_name"),
                    record_id: row.get("record_id"),
                    changes: row.get("changes"),
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }
}
