//! Category repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::filter::{bind_params, FilterBuilder};
use crate::reconcile::ensure_category_owned_tx;
use crate::unique_violation_as_conflict;
use memo_core::{
    new_v7, Category, CategoryRepository, CreateCategoryRequest, Error, Page, Result,
    UpdateCategoryRequest, UserScope,
};

const CATEGORY_COLUMNS: &str =
    "c.id, c.user_id, c.name, c.description, c.parent_category_id, c.is_active, c.created_at, c.updated_at";

fn category_from_row(row: &PgRow) -> Category {
    Category {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        description: row.get("description"),
        parent_category_id: row.get("parent_category_id"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Conflict message for a unique violation on a category write.
fn category_conflict(name: &str, constraint: Option<&str>) -> String {
    match constraint {
        Some("uq_category_user_name") | None => format!("Category '{}' already exists", name),
        Some(other) => format!("Category '{}' conflicts with an existing row ({})", name, other),
    }
}

/// PostgreSQL implementation of CategoryRepository.
#[derive(Clone)]
pub struct PgCategoryRepository {
    pool: Pool<Postgres>,
}

impl PgCategoryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Reject a parent that is the category itself or one of its descendants.
    async fn check_parent_tx(
        tx: &mut Transaction<'_, Postgres>,
        scope: UserScope,
        id: Uuid,
        parent_id: Uuid,
    ) -> Result<()> {
        if parent_id == id {
            return Err(Error::InvalidInput(
                "A category cannot be its own parent".to_string(),
            ));
        }
        ensure_category_owned_tx(tx, scope, parent_id).await?;

        let creates_cycle: bool = sqlx::query_scalar(
            r#"
            WITH RECURSIVE ancestors AS (
                SELECT id, parent_category_id FROM category WHERE id = $1
                UNION
                SELECT c.id, c.parent_category_id
                FROM category c
                JOIN ancestors a ON c.id = a.parent_category_id
            )
            SELECT EXISTS (SELECT 1 FROM ancestors WHERE id = $2)
            "#,
        )
        .bind(parent_id)
        .bind(id)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;

        if creates_cycle {
            return Err(Error::InvalidInput(
                "Parent category would create a cycle".to_string(),
            ));
        }
        Ok(())
    }

    async fn fetch(&self, scope: UserScope, id: Uuid) -> Result<Option<Category>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM category c WHERE c.id = $1 AND c.user_id = $2",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .bind(scope.user_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.map(|r| category_from_row(&r)))
    }
}

#[async_trait]
impl CategoryRepository for PgCategoryRepository {
    async fn create(&self, scope: UserScope, req: CreateCategoryRequest) -> Result<Category> {
        req.validate()?;
        let name = req.name.trim().to_string();
        let id = new_v7();
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        if let Some(parent_id) = req.parent_category_id {
            ensure_category_owned_tx(&mut tx, scope, parent_id).await?;
        }

        sqlx::query(
            "INSERT INTO category (id, user_id, name, description, parent_category_id, is_active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)",
        )
        .bind(id)
        .bind(scope.user_id())
        .bind(&name)
        .bind(&req.description)
        .bind(req.parent_category_id)
        .bind(req.is_active.unwrap_or(true))
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_violation_as_conflict(e, |c| category_conflict(&name, c)))?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "categories",
            op = "create",
            user_id = %scope,
            category_id = %id,
            "Category created"
        );
        self.get(scope, id).await
    }

    async fn get(&self, scope: UserScope, id: Uuid) -> Result<Category> {
        self.fetch(scope, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Category {}", id)))
    }

    async fn list(&self, scope: UserScope, page: Page) -> Result<Vec<Category>> {
        let mut filter = FilterBuilder::owned_by("c.user_id", scope);
        let tail = filter.limit_offset(page.limit, page.skip);
        let sql = format!(
            "SELECT {} FROM category c WHERE {} ORDER BY c.name {}",
            CATEGORY_COLUMNS,
            filter.where_clause(),
            tail
        );
        let rows = bind_params(sqlx::query(&sql), filter.params())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(category_from_row).collect())
    }

    async fn update(&self, scope: UserScope, id: Uuid, req: UpdateCategoryRequest) -> Result<Category> {
        req.validate()?;
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM category c WHERE c.id = $1 AND c.user_id = $2 FOR UPDATE",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .bind(scope.user_id())
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("Category {}", id)))?;
        let current = category_from_row(&row);

        if let Some(Some(parent_id)) = req.parent_category_id {
            Self::check_parent_tx(&mut tx, scope, id, parent_id).await?;
        }

        let name = req
            .name
            .as_deref()
            .map(|n| n.trim().to_string())
            .unwrap_or(current.name);
        let description = req.description.unwrap_or(current.description);
        let parent = req.parent_category_id.unwrap_or(current.parent_category_id);
        let is_active = req.is_active.unwrap_or(current.is_active);

        sqlx::query(
            "UPDATE category
             SET name = $1, description = $2, parent_category_id = $3, is_active = $4, updated_at = $5
             WHERE id = $6 AND user_id = $7",
        )
        .bind(&name)
        .bind(&description)
        .bind(parent)
        .bind(is_active)
        .bind(Utc::now())
        .bind(id)
        .bind(scope.user_id())
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_violation_as_conflict(e, |c| category_conflict(&name, c)))?;

        tx.commit().await.map_err(Error::Database)?;
        self.get(scope, id).await
    }

    async fn delete(&self, scope: UserScope, id: Uuid) -> Result<()> {
        // Children, entries and metrics are detached by ON DELETE SET NULL.
        let result = sqlx::query("DELETE FROM category WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(scope.user_id())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Category {}", id)));
        }
        info!(
            subsystem = "db",
            component = "categories",
            op = "delete",
            user_id = %scope,
            category_id = %id,
            "Category deleted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_conflict_names_the_category() {
        assert_eq!(
            category_conflict("health", Some("uq_category_user_name")),
            "Category 'health' already exists"
        );
        assert_eq!(
            category_conflict("health", None),
            "Category 'health' already exists"
        );
        let other = category_conflict("health", Some("category_pkey"));
        assert!(other.contains("category_pkey"));
        assert!(!other.contains("already exists"));
    }
}
