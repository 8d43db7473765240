//! Idempotent-merge invariant (§8): merging the same ContainerIDs into the
//! long-lived indices twice, through the real atomic-write cache store,
//! must leave the on-disk index bit-identical.

use chrono::Utc;
use showvault::cache::CacheStore;
use showvault::types::{ArtistsIndex, CatalogEntry, ContainersIndex};

fn entry(container_id: u64, artist_id: u64, artist_name: &str) -> CatalogEntry {
    CatalogEntry {
        container_id,
        artist_id,
        artist_name: artist_name.to_string(),
        container_info: format!("Show {container_id}"),
        performance_date: Utc::now(),
        venue: None,
        venue_city: None,
        venue_state: None,
        availability_type_str: None,
        products: vec!["MP3".to_string()],
        product_format_list: vec![],
    }
}

/// Mirrors the merge-then-atomic-write sequence the catalog engine's
/// incremental update runs under the cache lock.
async fn merge_and_persist(store: &CacheStore, entries: &[CatalogEntry]) -> usize {
    store
        .with_lock(|| async {
            let mut containers: ContainersIndex =
                store.read_index("containers_index").await?.unwrap_or_default();
            let mut artists: ArtistsIndex = store.read_index("artists_index").await?.unwrap_or_default();

            let inserted = containers.merge(entries);
            for entry in entries {
                artists.insert(&entry.artist_name, entry.artist_id);
            }

            store
                .atomic_write(&store.path_for("containers_index"), &serde_json::to_vec_pretty(&containers).unwrap())
                .await?;
            store
                .atomic_write(&store.path_for("artists_index"), &serde_json::to_vec_pretty(&artists).unwrap())
                .await?;
            Ok(inserted)
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn repeated_merge_of_the_same_entries_is_idempotent_on_disk() {
    let dir = std::env::temp_dir().join(format!("showvault-merge-test-{}", std::process::id()));
    let store = CacheStore::new(&dir);

    let entries = vec![
        entry(100, 7, "Goose"),
        entry(101, 7, "Goose"),
        entry(200, 9, "Trey Anastasio Band"),
    ];

    let first_inserted = merge_and_persist(&store, &entries).await;
    assert_eq!(first_inserted, 3);

    let containers_path = store.path_for("containers_index");
    let after_first = tokio::fs::read(&containers_path).await.unwrap();

    let second_inserted = merge_and_persist(&store, &entries).await;
    assert_eq!(second_inserted, 0, "re-merging the same ContainerIDs must insert nothing new");

    let after_second = tokio::fs::read(&containers_path).await.unwrap();
    assert_eq!(after_first, after_second, "index bytes must be bit-identical across idempotent merges");

    tokio::fs::remove_dir_all(&dir).await.ok();
}

#[tokio::test]
async fn merging_a_new_entry_only_inserts_the_new_id() {
    let dir = std::env::temp_dir().join(format!("showvault-merge-test-grow-{}", std::process::id()));
    let store = CacheStore::new(&dir);

    merge_and_persist(&store, &[entry(1, 1, "Phish")]).await;
    let grown = merge_and_persist(&store, &[entry(1, 1, "Phish"), entry(2, 1, "Phish")]).await;
    assert_eq!(grown, 1);

    let containers: ContainersIndex = store.read_index("containers_index").await.unwrap().unwrap();
    assert_eq!(containers.0.len(), 2);

    tokio::fs::remove_dir_all(&dir).await.ok();
}
