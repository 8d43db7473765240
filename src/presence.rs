//! Library Presence Index (C10).
//!
//! Builds the set of album folder names an artist already has, combining a
//! local directory listing with an optional remote mirror listing. A failed
//! remote listing is recorded on the index rather than propagated — gap
//! detection degrades to local-only rather than failing outright (§4.3,
//! §4.10).

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::mirror::MirrorDriver;
use crate::types::ArtistPresenceIndex;
use crate::Res;

pub struct ArtistPresenceBuilder {
    mirror: Option<Arc<MirrorDriver>>,
    is_video: bool,
}

impl ArtistPresenceBuilder {
    pub fn new(mirror: Option<Arc<MirrorDriver>>, is_video: bool) -> Self {
        Self { mirror, is_video }
    }

    /// Lists `out_path/<artist_name>`'s subdirectories locally and, when a
    /// mirror is configured, the remote's folders for the same artist.
    pub async fn build(&self, artist_name: &str, out_path: &str) -> Res<ArtistPresenceIndex> {
        let artist_dir = std::path::Path::new(out_path).join(artist_name);
        let local_folders = list_local_folders(&artist_dir).await;

        let mut remote_folders = BTreeSet::new();
        let mut remote_list_err = None;
        if let Some(mirror) = &self.mirror {
            match mirror.list_artist_folders(artist_name, self.is_video).await {
                Ok(folders) => remote_folders.extend(folders),
                Err(e) => remote_list_err = Some(e.to_string()),
            }
        }

        Ok(ArtistPresenceIndex {
            local_folders,
            remote_folders,
            remote_list_err,
        })
    }
}

async fn list_local_folders(dir: &std::path::Path) -> BTreeSet<String> {
    let mut folders = BTreeSet::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return folders,
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if let Ok(file_type) = entry.file_type().await {
            if file_type.is_dir() {
                folders.insert(entry.file_name().to_string_lossy().to_string());
            }
        }
    }
    folders
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_local_directory_yields_empty_set() {
        let builder = ArtistPresenceBuilder::new(None, false);
        let index = builder.build("Nonexistent Artist", "/tmp/showvault-presence-test-missing").await.unwrap();
        assert!(index.local_folders.is_empty());
        assert!(index.remote_list_err.is_none());
    }

    #[tokio::test]
    async fn lists_local_subdirectories() {
        let base = std::env::temp_dir().join(format!("showvault-presence-{}", std::process::id()));
        let artist_dir = base.join("Some Artist");
        tokio::fs::create_dir_all(artist_dir.join("2024-01-01 Venue")).await.unwrap();
        tokio::fs::write(artist_dir.join("not-a-folder.txt"), b"x").await.unwrap();

        let builder = ArtistPresenceBuilder::new(None, false);
        let index = builder.build("Some Artist", base.to_str().unwrap()).await.unwrap();
        assert!(index.local_folders.contains("2024-01-01 Venue"));
        assert!(!index.local_folders.contains("not-a-folder.txt"));

        tokio::fs::remove_dir_all(&base).await.unwrap();
    }
}
