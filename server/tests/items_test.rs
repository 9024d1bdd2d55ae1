//! Integration tests for the server's item upsert contract (spec §8 S4/S5),
//! which lives here rather than in `pocket-engine` because the "match
//! incoming sync_id exclusively within a profile" dedup rule is a property
//! of the server's storage, not the client's.

use pocket_engine::model::ItemType;
use pocket_engine::sync::wire::ClientItem;
use sqlx::PgPool;

use pocket_server::db;

fn client_item(content: &str, sync_id: &str) -> ClientItem {
    ClientItem {
        item_type: ItemType::Url,
        content: Some(content.to_string()),
        tags: vec![],
        metadata: None,
        sync_id: sync_id.to_string(),
    }
}

/// S4: pushing the same `sync_id` twice from the same profile updates the
/// same row rather than creating a second one.
#[sqlx::test(migrations = "./migrations")]
async fn s4_same_sync_id_updates_the_existing_row(pool: PgPool) -> sqlx::Result<()> {
    let (id1, created1) = db::upsert_item(&pool, "", &client_item("https://x.test", "c1"))
        .await?;
    assert!(created1);

    let (id2, created2) = db::upsert_item(
        &pool,
        "",
        &client_item("https://x.test/updated", "c1"),
    )
    .await?;
    assert!(!created2);
    assert_eq!(id1, id2);

    let rows = db::get_items(&pool, "").await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].content.as_deref(), Some("https://x.test/updated"));

    Ok(())
}

/// S5: two different `sync_id`s with identical content produce two rows.
#[sqlx::test(migrations = "./migrations")]
async fn s5_different_sync_ids_produce_distinct_rows(pool: PgPool) -> sqlx::Result<()> {
    let (id_a, _) = db::upsert_item(&pool, "", &client_item("https://shared.test", "a")).await?;
    let (id_b, _) = db::upsert_item(&pool, "", &client_item("https://shared.test", "b")).await?;

    assert_ne!(id_a, id_b);

    let rows = db::get_items(&pool, "").await?;
    assert_eq!(rows.len(), 2);

    Ok(())
}

/// The same `sync_id` in two different profiles does not collide; the
/// unique index is `(profile_id, sync_id)`, not `sync_id` alone.
#[sqlx::test(migrations = "./migrations")]
async fn same_sync_id_in_different_profiles_does_not_collide(pool: PgPool) -> sqlx::Result<()> {
    let (id_p1, created_p1) =
        db::upsert_item(&pool, "profile-1", &client_item("https://x.test", "c1")).await?;
    let (id_p2, created_p2) =
        db::upsert_item(&pool, "profile-2", &client_item("https://x.test", "c1")).await?;

    assert!(created_p1);
    assert!(created_p2);
    assert_ne!(id_p1, id_p2);

    Ok(())
}

/// `get_items_since` only returns rows updated after the given instant.
#[sqlx::test(migrations = "./migrations")]
async fn get_items_since_filters_by_updated_at(pool: PgPool) -> sqlx::Result<()> {
    db::upsert_item(&pool, "", &client_item("https://a.test", "a")).await?;
    let cutoff = chrono::Utc::now();
    db::upsert_item(&pool, "", &client_item("https://b.test", "b")).await?;

    let rows = db::get_items_since(&pool, "", cutoff).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].sync_id, "b");

    Ok(())
}
