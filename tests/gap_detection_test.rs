//! End-to-end gap-detection scenario: an artist's catalog shows compared
//! against a locally-downloaded library, exercising the catalog engine
//! (cache store read) and the presence index (local folder listing)
//! together rather than either in isolation.

use chrono::Utc;
use showvault::cache::CacheStore;
use showvault::catalog::CatalogEngine;
use showvault::fingerprint;
use showvault::presence::ArtistPresenceBuilder;
use showvault::remote::RemoteClient;
use showvault::types::{CatalogEntry, MediaFilter};

fn billy_strings_show(container_id: u64, container_info: &str) -> CatalogEntry {
    CatalogEntry {
        container_id,
        artist_id: 1125,
        artist_name: "Billy Strings".to_string(),
        container_info: container_info.to_string(),
        performance_date: Utc::now(),
        venue: None,
        venue_city: None,
        venue_state: None,
        availability_type_str: None,
        products: vec!["MP3".to_string()],
        product_format_list: vec![],
    }
}

/// ArtistID 1125 has three shows; the user's local library already has the
/// folder for one of them. `gaps 1125` must report exactly the other two,
/// in catalog (ascending ContainerID) order.
#[tokio::test]
async fn gaps_reports_shows_missing_from_local_library() {
    let test_root = std::env::temp_dir().join(format!("showvault-gaps-test-{}", std::process::id()));
    let cache_dir = test_root.join("cache");
    let out_path = test_root.join("library");
    tokio::fs::create_dir_all(&cache_dir).await.unwrap();

    let shows = vec![
        billy_strings_show(23329, "Capitol Theatre"),
        billy_strings_show(23790, "Red Rocks Amphitheatre"),
        billy_strings_show(24105, "The Anthem"),
    ];

    let store = CacheStore::new(&cache_dir);
    // Matches the documented on-disk layout (§6): the latest-additions
    // snapshot is persisted under the name "catalog" (catalog.json).
    store.write_index("catalog", &shows).await.unwrap();

    let has_23329 = fingerprint::album_folder_name("Billy Strings", "Capitol Theatre");
    let local_dir = out_path.join("Billy Strings").join(&has_23329);
    tokio::fs::create_dir_all(&local_dir).await.unwrap();

    let engine = CatalogEngine::new(store, RemoteClient::new("https://example.invalid"));
    let presence = ArtistPresenceBuilder::new(None, false);

    let gaps = engine
        .gaps(1125, MediaFilter::Any, &presence, out_path.to_str().unwrap())
        .await
        .unwrap();

    let gap_ids: Vec<u64> = gaps.iter().map(|e| e.container_id).collect();
    assert_eq!(gap_ids, vec![23790, 24105]);

    tokio::fs::remove_dir_all(&test_root).await.ok();
}

/// An artist whose only show is already downloaded has no gaps.
#[tokio::test]
async fn fully_downloaded_artist_has_no_gaps() {
    let test_root = std::env::temp_dir().join(format!("showvault-gaps-test-full-{}", std::process::id()));
    let cache_dir = test_root.join("cache");
    let out_path = test_root.join("library");
    tokio::fs::create_dir_all(&cache_dir).await.unwrap();

    let shows = vec![billy_strings_show(1, "Only Show")];
    let store = CacheStore::new(&cache_dir);
    store.write_index("catalog", &shows).await.unwrap();

    let folder = fingerprint::album_folder_name("Billy Strings", "Only Show");
    tokio::fs::create_dir_all(out_path.join("Billy Strings").join(&folder)).await.unwrap();

    let engine = CatalogEngine::new(store, RemoteClient::new("https://example.invalid"));
    let presence = ArtistPresenceBuilder::new(None, false);

    let gaps = engine
        .gaps(1125, MediaFilter::Any, &presence, out_path.to_str().unwrap())
        .await
        .unwrap();
    assert!(gaps.is_empty());

    tokio::fs::remove_dir_all(&test_root).await.ok();
}
