//! Integration tests for category ownership, naming and detach-on-delete.
//!
//! **IMPORTANT**: These tests require PostgreSQL. Migrations are applied by
//! the setup helper.

use memo_db::test_fixtures::{test_database_url, unique_identity};
use memo_db::{
    CategoryRepository, CreateCategoryRequest, CreateEntryRequest, Database, EntryRepository,
    Error, MetricSpec, RegisterUserRequest, UpdateCategoryRequest, UserRepository, UserScope,
};
use sqlx::PgPool;

async fn setup_test_db() -> Database {
    dotenvy::dotenv().ok();
    let pool = PgPool::connect(&test_database_url())
        .await
        .expect("Failed to connect to test database");
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .expect("Failed to apply migrations");
    Database::new(pool)
}

async fn new_user(db: &Database) -> UserScope {
    let (username, email) = unique_identity("category");
    let user = db
        .users
        .register(RegisterUserRequest {
            email,
            username,
            password: "correct horse battery".to_string(),
        })
        .await
        .expect("register");
    UserScope::new(user.id)
}

fn named(name: &str) -> CreateCategoryRequest {
    CreateCategoryRequest {
        name: name.to_string(),
        description: None,
        parent_category_id: None,
        is_active: None,
    }
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_names_are_unique_per_user() {
    let db = setup_test_db().await;
    let alice = new_user(&db).await;
    let bob = new_user(&db).await;

    db.categories.create(alice, named("health")).await.unwrap();
    assert!(matches!(
        db.categories.create(alice, named("health")).await,
        Err(Error::Conflict(_))
    ));
    // Another user may reuse the name.
    db.categories.create(bob, named("health")).await.unwrap();

    let sleep = db.categories.create(alice, named("sleep")).await.unwrap();
    let renamed = db
        .categories
        .update(
            alice,
            sleep.id,
            UpdateCategoryRequest {
                name: Some("health".to_string()),
                ..Default::default()
            },
        )
        .await;
    match renamed {
        Err(Error::Conflict(msg)) => assert_eq!(msg, "Category 'health' already exists"),
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_parent_must_be_owned_and_acyclic() {
    let db = setup_test_db().await;
    let alice = new_user(&db).await;
    let bob = new_user(&db).await;

    let root = db.categories.create(alice, named("root")).await.unwrap();
    let mut child_req = named("child");
    child_req.parent_category_id = Some(root.id);
    let child = db.categories.create(alice, child_req).await.unwrap();
    assert_eq!(child.parent_category_id, Some(root.id));

    let cycle = db
        .categories
        .update(
            alice,
            root.id,
            UpdateCategoryRequest {
                parent_category_id: Some(Some(child.id)),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(cycle, Err(Error::InvalidInput(_))));

    let mut foreign = named("foreign-child");
    foreign.parent_category_id = Some(root.id);
    assert!(matches!(
        db.categories.create(bob, foreign).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_delete_detaches_entries_and_metrics() {
    let db = setup_test_db().await;
    let scope = new_user(&db).await;
    let category = db.categories.create(scope, named("health")).await.unwrap();

    let entry = db
        .entries
        .create(
            scope,
            CreateEntryRequest {
                title: "Weigh-in".to_string(),
                category_id: Some(category.id),
                metrics: vec![MetricSpec {
                    category: Some("health".to_string()),
                    metric_name: Some("weight".to_string()),
                    value: Some(70.5),
                    unit: Some("kg".to_string()),
                }],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(entry.metrics[0].category_id, Some(category.id));

    db.categories.delete(scope, category.id).await.unwrap();

    let entry = db.entries.get(scope, entry.id).await.unwrap();
    assert_eq!(entry.category_id, None);
    assert_eq!(entry.metrics.len(), 1);
    assert_eq!(entry.metrics[0].category_id, None);

    assert!(matches!(
        db.categories.get(scope, category.id).await,
        Err(Error::NotFound(_))
    ));
}
