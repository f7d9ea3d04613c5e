//! Integration tests for the calculation node repository and `PgNodeStore`.

use std::sync::Arc;

use assert_matches::assert_matches;
use calctree_core::calculation::Operation;
use calctree_core::engine::CalculationEngine;
use calctree_core::error::CoreError;
use calctree_core::store::NodeStore;
use calctree_core::types::DbId;
use calctree_db::models::calculation_node::CreateCalculationNode;
use calctree_db::models::user::CreateUser;
use calctree_db::repositories::{CalculationNodeRepo, UserRepo};
use calctree_db::store::PgNodeStore;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_user(pool: &PgPool, username: &str) -> DbId {
    UserRepo::create(
        pool,
        &CreateUser {
            username: username.to_string(),
            password_hash: "not-a-real-hash".to_string(),
            avatar_url: Some(format!("https://example.com/{username}.svg")),
            role: "user".to_string(),
        },
    )
    .await
    .unwrap()
    .id
}

fn root_insert(user_id: DbId, value: f64) -> CreateCalculationNode {
    CreateCalculationNode {
        root_id: None,
        parent_id: None,
        operation: Operation::Start,
        input_value: value,
        calculated_value: value,
        depth: 0,
        user_id,
    }
}

fn engine(pool: &PgPool) -> CalculationEngine {
    CalculationEngine::new(Arc::new(PgNodeStore::new(pool.clone())))
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_and_finalize_root(pool: PgPool) {
    let user = seed_user(&pool, "alice").await;
    let row = CalculationNodeRepo::create(&pool, &root_insert(user, 5.0))
        .await
        .unwrap();
    assert_eq!(row.root_id, None);
    assert_eq!(row.operation, "START");

    assert!(CalculationNodeRepo::update_root_id(&pool, row.id, row.id)
        .await
        .unwrap());
    let found = CalculationNodeRepo::find_by_id(&pool, row.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.root_id, Some(row.id));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_root_id_reports_missing_row(pool: PgPool) {
    let id = uuid::Uuid::new_v4();
    assert!(!CalculationNodeRepo::update_root_id(&pool, id, id)
        .await
        .unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn reply_without_parent_is_rejected(pool: PgPool) {
    let user = seed_user(&pool, "alice").await;
    let mut insert = root_insert(user, 1.0);
    insert.operation = Operation::Add;

    let result = CalculationNodeRepo::create(&pool, &insert).await;
    assert_matches!(result, Err(sqlx::Error::Database(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_tree_removes_every_node(pool: PgPool) {
    let user = seed_user(&pool, "alice").await;
    let engine = engine(&pool);
    let root = engine.start_calculation(user, Some(10.0)).await.unwrap();
    let child = engine
        .add_operation(root.id, "MUL", Some(2.0), user)
        .await
        .unwrap();
    engine
        .add_operation(child.id, "SUB", Some(1.0), user)
        .await
        .unwrap();

    let removed = CalculationNodeRepo::delete_tree(&pool, root.id).await.unwrap();
    assert_eq!(removed, 3);
    assert_eq!(
        CalculationNodeRepo::count_by_root_id(&pool, root.id)
            .await
            .unwrap(),
        0
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn deleting_user_cascades_to_nodes(pool: PgPool) {
    let user = seed_user(&pool, "alice").await;
    let root = engine(&pool).start_calculation(user, Some(1.0)).await.unwrap();

    assert!(UserRepo::delete(&pool, user).await.unwrap());
    assert!(CalculationNodeRepo::find_by_id(&pool, root.id)
        .await
        .unwrap()
        .is_none());
}

// ---------------------------------------------------------------------------
// PgNodeStore through the engine
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn engine_builds_tree_from_postgres(pool: PgPool) {
    let alice = seed_user(&pool, "alice").await;
    let bob = seed_user(&pool, "bob").await;
    let engine = engine(&pool);

    let root = engine.start_calculation(alice, Some(100.0)).await.unwrap();
    let added = engine
        .add_operation(root.id, "ADD", Some(50.0), bob)
        .await
        .unwrap();
    engine
        .add_operation(added.id, "MUL", Some(2.0), alice)
        .await
        .unwrap();
    engine
        .add_operation(root.id, "DIV", Some(4.0), bob)
        .await
        .unwrap();

    let tree = engine.get_calculation_tree(root.id).await.unwrap();
    assert_eq!(tree.node_count(), 4);
    let values: Vec<f64> = tree.children.iter().map(|c| c.node.calculated_value).collect();
    assert_eq!(values, vec![150.0, 25.0]);
    assert_eq!(tree.children[0].children[0].node.calculated_value, 300.0);

    let authored = engine.get_authored_tree(root.id).await.unwrap();
    assert_eq!(authored.node.author.username, "alice");
    assert_eq!(authored.children[0].node.author.username, "bob");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn listing_is_newest_first(pool: PgPool) {
    let alice = seed_user(&pool, "alice").await;
    let engine = engine(&pool);
    let first = engine.start_calculation(alice, Some(1.0)).await.unwrap();
    let second = engine.start_calculation(alice, Some(2.0)).await.unwrap();

    let mine = engine.get_user_calculations(alice).await.unwrap();
    let ids: Vec<DbId> = mine.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let all = engine.get_all_calculations().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].node.node.id, second.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unfinalized_root_is_hidden_from_listings(pool: PgPool) {
    let alice = seed_user(&pool, "alice").await;
    CalculationNodeRepo::create(&pool, &root_insert(alice, 7.0))
        .await
        .unwrap();

    let store = PgNodeStore::new(pool.clone());
    assert!(store.find_roots_with_authors().await.unwrap().is_empty());
    assert!(store.find_by_user_id(alice, true).await.unwrap().is_empty());
    assert_eq!(store.find_by_user_id(alice, false).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn store_update_root_id_missing_is_not_found(pool: PgPool) {
    let store = PgNodeStore::new(pool);
    let id = uuid::Uuid::new_v4();
    assert_matches!(
        store.update_root_id(id, id).await,
        Err(CoreError::NotFound { .. })
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn engine_delete_requires_owner(pool: PgPool) {
    let alice = seed_user(&pool, "alice").await;
    let bob = seed_user(&pool, "bob").await;
    let engine = engine(&pool);
    let root = engine.start_calculation(alice, Some(3.0)).await.unwrap();
    engine
        .add_operation(root.id, "ADD", Some(1.0), bob)
        .await
        .unwrap();

    assert_matches!(
        engine.delete_calculation(root.id, bob).await,
        Err(CoreError::Forbidden(_))
    );
    assert!(engine.delete_calculation(root.id, alice).await.unwrap());
    assert_matches!(
        engine.get_calculation_tree(root.id).await,
        Err(CoreError::NotFound { .. })
    );
}
