//! Tag repository implementation.
//!
//! Tags live in one global namespace with unique names. A caller only sees
//! tags attached to at least one of their own entries, and rename/delete
//! only touch the caller's associations.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::filter::{bind_params, FilterBuilder};
use crate::reconcile::{ensure_entry_owned_tx, find_or_create_tag_tx};
use memo_core::{validate_tag_name, Error, Page, Result, Tag, TagRepository, UserScope};

/// Tag visible to `$1` (user id) through one of their entries.
const VISIBLE_TO_USER: &str = "EXISTS (
    SELECT 1 FROM entry_tag et
    JOIN entry e ON e.id = et.entry_id
    WHERE et.tag_id = t.id AND e.user_id = $1
)";

fn tag_from_row(row: &PgRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// PostgreSQL implementation of TagRepository.
#[derive(Clone)]
pub struct PgTagRepository {
    pool: Pool<Postgres>,
}

impl PgTagRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn visible_tx(
        tx: &mut Transaction<'_, Postgres>,
        scope: UserScope,
        id: Uuid,
    ) -> Result<Tag> {
        let row = sqlx::query(&format!(
            "SELECT t.id, t.name, t.created_at, t.updated_at FROM tag t WHERE {} AND t.id = $2",
            VISIBLE_TO_USER
        ))
        .bind(scope.user_id())
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;
        row.map(|r| tag_from_row(&r))
            .ok_or_else(|| Error::NotFound(format!("Tag {}", id)))
    }

    /// Remove the caller's associations with `tag_id`.
    async fn detach_all_for_user_tx(
        tx: &mut Transaction<'_, Postgres>,
        scope: UserScope,
        tag_id: Uuid,
    ) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM entry_tag et USING entry e
             WHERE e.id = et.entry_id AND et.tag_id = $1 AND e.user_id = $2",
        )
        .bind(tag_id)
        .bind(scope.user_id())
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    /// Drop a tag row when no entry references it any more.
    async fn delete_if_orphaned_tx(tx: &mut Transaction<'_, Postgres>, tag_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM tag t WHERE t.id = $1
             AND NOT EXISTS (SELECT 1 FROM entry_tag et WHERE et.tag_id = t.id)",
        )
        .bind(tag_id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TagRepository for PgTagRepository {
    async fn find_or_create(&self, name: &str) -> Result<Tag> {
        let name = name.trim();
        validate_tag_name(name)?;
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let tag = find_or_create_tag_tx(&mut tx, name).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(tag)
    }

    async fn list(&self, scope: UserScope, page: Page) -> Result<Vec<Tag>> {
        let mut filter = FilterBuilder::owned_by("e.user_id", scope);
        let tail = filter.limit_offset(page.limit, page.skip);
        let sql = format!(
            "SELECT t.id, t.name, t.created_at, t.updated_at
             FROM tag t
             WHERE EXISTS (
                 SELECT 1 FROM entry_tag et
                 JOIN entry e ON e.id = et.entry_id
                 WHERE et.tag_id = t.id AND {}
             )
             ORDER BY t.name {}",
            filter.where_clause(),
            tail
        );
        let rows = bind_params(sqlx::query(&sql), filter.params())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn get(&self, scope: UserScope, id: Uuid) -> Result<Tag> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let tag = Self::visible_tx(&mut tx, scope, id).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(tag)
    }

    async fn rename(&self, scope: UserScope, id: Uuid, name: &str) -> Result<Tag> {
        let name = name.trim();
        validate_tag_name(name)?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let current = Self::visible_tx(&mut tx, scope, id).await?;
        if current.name == name {
            tx.commit().await.map_err(Error::Database)?;
            return Ok(current);
        }

        let target = find_or_create_tag_tx(&mut tx, name).await?;
        sqlx::query(
            "INSERT INTO entry_tag (entry_id, tag_id)
             SELECT et.entry_id, $1
             FROM entry_tag et
             JOIN entry e ON e.id = et.entry_id
             WHERE et.tag_id = $2 AND e.user_id = $3
             ON CONFLICT DO NOTHING",
        )
        .bind(target.id)
        .bind(id)
        .bind(scope.user_id())
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let moved = Self::detach_all_for_user_tx(&mut tx, scope, id).await?;
        let dropped = Self::delete_if_orphaned_tx(&mut tx, id).await?;

        sqlx::query("UPDATE tag SET updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(target.id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "tags",
            op = "rename",
            user_id = %scope,
            tag_id = %id,
            target_tag_id = %target.id,
            moved,
            dropped,
            "Tag renamed for user"
        );
        self.get(scope, target.id).await
    }

    async fn delete(&self, scope: UserScope, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        Self::visible_tx(&mut tx, scope, id).await?;
        let detached = Self::detach_all_for_user_tx(&mut tx, scope, id).await?;
        let dropped = Self::delete_if_orphaned_tx(&mut tx, id).await?;
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "tags",
            op = "delete",
            user_id = %scope,
            tag_id = %id,
            detached,
            dropped,
            "Tag removed from user's entries"
        );
        Ok(())
    }

    async fn attach(&self, scope: UserScope, entry_id: Uuid, tag_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        ensure_entry_owned_tx(&mut tx, scope, entry_id).await?;

        let exists: Option<bool> = sqlx::query_scalar("SELECT true FROM tag WHERE id = $1")
            .bind(tag_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?;
        if exists.is_none() {
            return Err(Error::NotFound(format!("Tag {}", tag_id)));
        }

        sqlx::query("INSERT INTO entry_tag (entry_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(entry_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        sqlx::query("UPDATE entry SET updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(entry_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn detach(&self, scope: UserScope, entry_id: Uuid, tag_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        ensure_entry_owned_tx(&mut tx, scope, entry_id).await?;

        let result = sqlx::query("DELETE FROM entry_tag WHERE entry_id = $1 AND tag_id = $2")
            .bind(entry_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "Tag {} is not attached to entry {}",
                tag_id, entry_id
            )));
        }
        sqlx::query("UPDATE entry SET updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(entry_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }
}
