//! Entry repository implementation.
//!
//! Entry writes run the reconciler inside the same transaction as the entry
//! row, so a failed tag or metric write leaves nothing behind. Reads
//! batch-load tags and metrics for the whole page.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::record_tx;
use crate::filter::{bind_params, FilterBuilder};
use crate::metrics::{metric_from_row, METRIC_COLUMNS};
use crate::reconcile::{
    ensure_category_owned_tx, plan_metrics, plan_tags, replace_entry_metrics_tx,
    replace_entry_tags_tx,
};
use memo_core::{
    new_v7_at, AuditAction, CreateEntryRequest, Entry, EntryRepository, Error,
    ListEntriesRequest, Metric, Result, Tag, UpdateEntryRequest, UserScope,
};

const ENTRY_TABLE: &str = "entry";

/// Entry columns; expects `entry e LEFT JOIN category c`.
const ENTRY_COLUMNS: &str = "e.id, e.user_id, e.category_id, c.name AS category_name, \
     e.title, e.content, e.priority, e.status, e.created_at, e.updated_at";

fn entry_from_row(row: &PgRow) -> Entry {
    let priority: String = row.get("priority");
    let status: String = row.get("status");
    Entry {
        id: row.get("id"),
        user_id: row.get("user_id"),
        category_id: row.get("category_id"),
        category: row.get("category_name"),
        title: row.get("title"),
        content: row.get("content"),
        priority: priority.parse().unwrap_or_default(),
        status: status.parse().unwrap_or_default(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        tags: Vec::new(),
        metrics: Vec::new(),
    }
}

/// PostgreSQL implementation of EntryRepository.
#[derive(Clone)]
pub struct PgEntryRepository {
    pool: Pool<Postgres>,
}

impl PgEntryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Fill `tags` and `metrics` for a page of entries with two queries.
    async fn hydrate(&self, entries: &mut [Entry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = entries.iter().map(|e| e.id).collect();

        let tag_rows = sqlx::query(
            "SELECT et.entry_id, t.id, t.name, t.created_at, t.updated_at
             FROM entry_tag et
             JOIN tag t ON t.id = et.tag_id
             WHERE et.entry_id = ANY($1)
             ORDER BY t.name",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut tags: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for row in &tag_rows {
            tags.entry(row.get("entry_id")).or_default().push(Tag {
                id: row.get("id"),
                name: row.get("name"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            });
        }

        let metric_rows = sqlx::query(&format!(
            "SELECT {} FROM metric m
             LEFT JOIN category c ON c.id = m.category_id
             WHERE m.entry_id = ANY($1)
             ORDER BY m.created_at, m.id",
            METRIC_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut metrics: HashMap<Uuid, Vec<Metric>> = HashMap::new();
        for row in &metric_rows {
            let metric = metric_from_row(row);
            metrics.entry(metric.entry_id).or_default().push(metric);
        }

        for entry in entries.iter_mut() {
            entry.tags = tags.remove(&entry.id).unwrap_or_default();
            entry.metrics = metrics.remove(&entry.id).unwrap_or_default();
        }
        Ok(())
    }
}

#[async_trait]
impl EntryRepository for PgEntryRepository {
    async fn create(&self, scope: UserScope, req: CreateEntryRequest) -> Result<Entry> {
        req.validate()?;
        let tag_names = plan_tags(&req.tags)?;
        let planned = plan_metrics(&req.metrics)?;

        let created_at = req.created_at.unwrap_or_else(Utc::now);
        let id = new_v7_at(&created_at);
        let title = req.title.trim().to_string();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        if let Some(category_id) = req.category_id {
            ensure_category_owned_tx(&mut tx, scope, category_id).await?;
        }

        sqlx::query(
            "INSERT INTO entry (id, user_id, category_id, title, content, priority, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(id)
        .bind(scope.user_id())
        .bind(req.category_id)
        .bind(&title)
        .bind(&req.content)
        .bind(req.priority.as_str())
        .bind(req.status.as_str())
        .bind(created_at)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let tags = replace_entry_tags_tx(&mut tx, id, &tag_names).await?;
        let metric_count = replace_entry_metrics_tx(&mut tx, scope, id, created_at, &planned).await?;

        record_tx(
            &mut tx,
            scope,
            AuditAction::Insert,
            ENTRY_TABLE,
            id,
            json!({
                "title": title,
                "category_id": req.category_id,
                "priority": req.priority,
                "status": req.status,
                "tags": tag_names,
                "metric_count": metric_count,
            }),
        )
        .await?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "entries",
            op = "create",
            user_id = %scope,
            entry_id = %id,
            tag_count = tags.len(),
            metric_count,
            "Entry created"
        );
        self.get(scope, id).await
    }

    async fn get(&self, scope: UserScope, id: Uuid) -> Result<Entry> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM entry e
             LEFT JOIN category c ON c.id = e.category_id
             WHERE e.id = $1 AND e.user_id = $2",
            ENTRY_COLUMNS
        ))
        .bind(id)
        .bind(scope.user_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("Entry {}", id)))?;

        let mut entries = vec![entry_from_row(&row)];
        self.hydrate(&mut entries).await?;
        entries
            .pop()
            .ok_or_else(|| Error::Internal("entry vanished during hydration".to_string()))
    }

    async fn list(&self, scope: UserScope, req: ListEntriesRequest) -> Result<Vec<Entry>> {
        let mut filter = FilterBuilder::owned_by("e.user_id", scope)
            .eq_uuid("e.category_id", req.category_id)
            .eq_text("e.status", req.status.as_ref().map(|s| s.as_str()))
            .eq_text("e.priority", req.priority.as_ref().map(|p| p.as_str()));
        let tail = filter.limit_offset(req.page.limit, req.page.skip);
        let sql = format!(
            "SELECT {} FROM entry e
             LEFT JOIN category c ON c.id = e.category_id
             WHERE {}
             ORDER BY e.created_at DESC, e.id DESC {}",
            ENTRY_COLUMNS,
            filter.where_clause(),
            tail
        );
        let rows = bind_params(sqlx::query(&sql), filter.params())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let mut entries: Vec<Entry> = rows.iter().map(entry_from_row).collect();
        self.hydrate(&mut entries).await?;
        debug!(
            subsystem = "db",
            component = "entries",
            op = "list",
            user_id = %scope,
            result_count = entries.len(),
            "Entries listed"
        );
        Ok(entries)
    }

    async fn update(&self, scope: UserScope, id: Uuid, req: UpdateEntryRequest) -> Result<Entry> {
        req.validate()?;
        let tag_names = req.tags.as_deref().map(plan_tags).transpose()?;
        let planned = req.metrics.as_deref().map(plan_metrics).transpose()?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let row = sqlx::query(
            "SELECT category_id, title, content, priority, status, created_at
             FROM entry WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(scope.user_id())
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("Entry {}", id)))?;

        if let Some(Some(category_id)) = req.category_id {
            ensure_category_owned_tx(&mut tx, scope, category_id).await?;
        }

        let mut changes = serde_json::Map::new();
        let title: String = match &req.title {
            Some(t) => {
                let t = t.trim().to_string();
                changes.insert("title".into(), json!(t));
                t
            }
            None => row.get("title"),
        };
        let content: String = match &req.content {
            Some(c) => {
                changes.insert("content_changed".into(), json!(true));
                c.clone()
            }
            None => row.get("content"),
        };
        let category_id: Option<Uuid> = match req.category_id {
            Some(c) => {
                changes.insert("category_id".into(), json!(c));
                c
            }
            None => row.get("category_id"),
        };
        let priority: String = match req.priority {
            Some(p) => {
                changes.insert("priority".into(), json!(p));
                p.as_str().to_string()
            }
            None => row.get("priority"),
        };
        let status: String = match req.status {
            Some(s) => {
                changes.insert("status".into(), json!(s));
                s.as_str().to_string()
            }
            None => row.get("status"),
        };
        let created_at: DateTime<Utc> = match req.created_at {
            Some(at) => {
                changes.insert("created_at".into(), json!(at));
                at
            }
            None => row.get("created_at"),
        };

        sqlx::query(
            "UPDATE entry
             SET category_id = $1, title = $2, content = $3, priority = $4, status = $5,
                 created_at = $6, updated_at = $7
             WHERE id = $8",
        )
        .bind(category_id)
        .bind(&title)
        .bind(&content)
        .bind(&priority)
        .bind(&status)
        .bind(created_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if let Some(names) = &tag_names {
            replace_entry_tags_tx(&mut tx, id, names).await?;
            changes.insert("tags".into(), json!(names));
        }
        if let Some(planned) = &planned {
            let count = replace_entry_metrics_tx(&mut tx, scope, id, created_at, planned).await?;
            changes.insert("metric_count".into(), json!(count));
        }

        record_tx(
            &mut tx,
            scope,
            AuditAction::Update,
            ENTRY_TABLE,
            id,
            serde_json::Value::Object(changes),
        )
        .await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "entries",
            op = "update",
            user_id = %scope,
            entry_id = %id,
            "Entry updated"
        );
        self.get(scope, id).await
    }

    async fn delete(&self, scope: UserScope, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let title: Option<String> =
            sqlx::query_scalar("DELETE FROM entry WHERE id = $1 AND user_id = $2 RETURNING title")
                .bind(id)
                .bind(scope.user_id())
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::Database)?;
        let Some(title) = title else {
            return Err(Error::NotFound(format!("Entry {}", id)));
        };

        record_tx(
            &mut tx,
            scope,
            AuditAction::Delete,
            ENTRY_TABLE,
            id,
            json!({ "title": title }),
        )
        .await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "entries",
            op = "delete",
            user_id = %scope,
            entry_id = %id,
            "Entry deleted"
        );
        Ok(())
    }
}
