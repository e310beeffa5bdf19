use std::collections::HashMap;

use anyhow::Context;
use tracing::{debug, warn};

use super::kv::KeyValueStore;
use crate::model::EpisodeOverride;

pub const STORAGE_KEY_PREFIX: &str = "episode_details_";

/// Per-episode overrides on top of a [`KeyValueStore`], with a slug index kept in
/// step with every write so slug lookups never scan the store.
pub struct OverrideStore<S> {
    backend: S,
    id_by_slug: HashMap<String, String>,
    slug_by_id: HashMap<String, String>,
}

impl<S: KeyValueStore> OverrideStore<S> {
    pub fn open(backend: S) -> anyhow::Result<Self> {
        let mut store = Self {
            backend,
            id_by_slug: HashMap::new(),
            slug_by_id: HashMap::new(),
        };
        store.rebuild_index()?;
        Ok(store)
    }

    pub fn save(&mut self, episode_id: &str, overrides: &EpisodeOverride) -> anyhow::Result<()> {
        let value = serde_json::to_string(overrides)?;
        self.backend
            .set(&storage_key(episode_id), value)
            .with_context(|| format!("failed to save overrides for episode {episode_id}"))?;

        if self.unindex(episode_id).is_some() {
            // the freed slug may belong to another entry now
            self.rebuild_index()?;
        } else if let Some(slug) = non_empty(overrides.slug.as_deref()) {
            self.index(episode_id, slug);
        }

        debug!(episode_id, "episode overrides saved");
        Ok(())
    }

    /// Stored overrides for an episode. Unreadable entries count as absent.
    pub fn get(&self, episode_id: &str) -> Option<EpisodeOverride> {
        let raw = match self.backend.get(&storage_key(episode_id)) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(error = ?err, episode_id, "failed to read episode overrides");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(overrides) => Some(overrides),
            Err(err) => {
                warn!(error = %err, episode_id, "stored episode overrides are not valid json");
                None
            }
        }
    }

    pub fn find_id_by_slug(&self, slug: &str) -> Option<&str> {
        self.id_by_slug.get(slug).map(String::as_str)
    }

    /// Returns whether an entry was removed.
    pub fn clear(&mut self, episode_id: &str) -> anyhow::Result<bool> {
        let removed = self.backend.remove(&storage_key(episode_id))?;
        if removed {
            // another entry may share the slug that just became free
            self.rebuild_index()?;
            debug!(episode_id, "episode overrides cleared");
        }
        Ok(removed)
    }

    /// All readable entries, ordered by storage key.
    pub fn entries(&self) -> anyhow::Result<Vec<(String, EpisodeOverride)>> {
        let mut keys = self.backend.keys()?;
        keys.sort();
        Ok(keys
            .iter()
            .filter_map(|key| key.strip_prefix(STORAGE_KEY_PREFIX))
            .filter_map(|id| self.get(id).map(|overrides| (id.to_string(), overrides)))
            .collect())
    }

    fn rebuild_index(&mut self) -> anyhow::Result<()> {
        self.id_by_slug.clear();
        self.slug_by_id.clear();
        for (id, overrides) in self.entries()? {
            if let Some(slug) = non_empty(overrides.slug.as_deref()) {
                self.index(&id, slug);
            }
        }
        debug!(indexed = self.id_by_slug.len(), "override slug index rebuilt");
        Ok(())
    }

    fn index(&mut self, episode_id: &str, slug: &str) {
        // a contested slug belongs to the lowest episode id, whatever the write order
        if let Some(owner) = self.id_by_slug.get(slug) {
            warn!(episode_id, slug, owner = %owner, "slug shared by several episodes");
            if owner.as_str() <= episode_id {
                return;
            }
            let owner = owner.clone();
            self.slug_by_id.remove(&owner);
        }
        self.id_by_slug
            .insert(slug.to_string(), episode_id.to_string());
        self.slug_by_id
            .insert(episode_id.to_string(), slug.to_string());
    }

    /// Drops the slug owned by `episode_id`, returning it.
    fn unindex(&mut self, episode_id: &str) -> Option<String> {
        let slug = self.slug_by_id.remove(episode_id)?;
        self.id_by_slug.remove(&slug);
        Some(slug)
    }
}

fn storage_key(episode_id: &str) -> String {
    format!("{STORAGE_KEY_PREFIX}{episode_id}")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::kv::{JsonFileStore, KeyValueStore, MemoryStore};

    fn with_slug(slug: &str) -> EpisodeOverride {
        EpisodeOverride {
            youtube_id: Some("dQw4w9WgXcQ".to_string()),
            slug: Some(slug.to_string()),
            ..EpisodeOverride::default()
        }
    }

    #[test]
    fn save_then_get_round_trips_under_prefixed_key() {
        let mut store = OverrideStore::open(MemoryStore::new()).unwrap();
        let overrides = with_slug("episode-3-foo");
        store.save("guid-3", &overrides).unwrap();

        assert_eq!(store.get("guid-3"), Some(overrides));
        assert_eq!(store.get("guid-4"), None);
        let raw = store.backend.get("episode_details_guid-3").unwrap().unwrap();
        assert!(raw.contains("\"youtubeId\":\"dQw4w9WgXcQ\""));
    }

    #[test]
    fn slug_lookup_follows_writes() {
        let mut store = OverrideStore::open(MemoryStore::new()).unwrap();
        store.save("a", &with_slug("old-slug")).unwrap();
        assert_eq!(store.find_id_by_slug("old-slug"), Some("a"));

        store.save("a", &with_slug("new-slug")).unwrap();
        assert_eq!(store.find_id_by_slug("old-slug"), None);
        assert_eq!(store.find_id_by_slug("new-slug"), Some("a"));

        assert!(store.clear("a").unwrap());
        assert_eq!(store.find_id_by_slug("new-slug"), None);
        assert!(!store.clear("a").unwrap());
    }

    #[test]
    fn contested_slug_passes_on_when_owner_is_cleared() {
        let mut store = OverrideStore::open(MemoryStore::new()).unwrap();
        store.save("a", &with_slug("shared")).unwrap();
        store.save("b", &with_slug("shared")).unwrap();
        assert_eq!(store.find_id_by_slug("shared"), Some("a"));

        store.clear("a").unwrap();
        assert_eq!(store.find_id_by_slug("shared"), Some("b"));
    }

    #[test]
    fn moving_the_owner_hands_a_shared_slug_to_the_next_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.json");
        let mut store = OverrideStore::open(JsonFileStore::open(&path).unwrap()).unwrap();
        store.save("a", &with_slug("shared")).unwrap();
        store.save("b", &with_slug("shared")).unwrap();
        store.save("a", &with_slug("moved")).unwrap();

        assert_eq!(store.find_id_by_slug("shared"), Some("b"));
        assert_eq!(store.find_id_by_slug("moved"), Some("a"));

        let reopened = OverrideStore::open(JsonFileStore::open(&path).unwrap()).unwrap();
        assert_eq!(reopened.find_id_by_slug("shared"), Some("b"));
        assert_eq!(reopened.find_id_by_slug("moved"), Some("a"));
    }

    #[test]
    fn shared_slug_owner_does_not_depend_on_write_order() {
        let mut store = OverrideStore::open(MemoryStore::new()).unwrap();
        store.save("b", &with_slug("shared")).unwrap();
        store.save("a", &with_slug("shared")).unwrap();
        assert_eq!(store.find_id_by_slug("shared"), Some("a"));

        let reopened = OverrideStore::open(store.backend).unwrap();
        assert_eq!(reopened.find_id_by_slug("shared"), Some("a"));
    }

    #[test]
    fn corrupt_entry_is_treated_as_absent() {
        let mut backend = MemoryStore::new();
        backend
            .set("episode_details_bad", "{not json".to_string())
            .unwrap();
        backend
            .set(
                "episode_details_good",
                r#"{"slug":"good-slug","thumbnailUrl":"https://x.io/t.png"}"#.to_string(),
            )
            .unwrap();
        backend.set("unrelated", "zzz".to_string()).unwrap();

        let store = OverrideStore::open(backend).unwrap();
        assert_eq!(store.get("bad"), None);
        assert_eq!(store.find_id_by_slug("good-slug"), Some("good"));
        let entries = store.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "good");
    }

    #[test]
    fn index_is_rebuilt_from_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.json");
        {
            let mut store = OverrideStore::open(JsonFileStore::open(&path).unwrap()).unwrap();
            store.save("ep-1", &with_slug("episode-1-pilot")).unwrap();
        }

        let store = OverrideStore::open(JsonFileStore::open(&path).unwrap()).unwrap();
        assert_eq!(store.find_id_by_slug("episode-1-pilot"), Some("ep-1"));
        assert_eq!(
            store.get("ep-1").and_then(|o| o.youtube_id).as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }
}
