use tracing::{debug, info};

use crate::{
    error::{AppError, AppResult},
    fetcher::FeedFetcher,
    model::{Episode, EpisodeOverride},
    repo::{kv::KeyValueStore, overrides::OverrideStore},
    util::{
        slug::{correct_episode_path, slug},
        youtube::extract_youtube_id,
    },
};

/// How a caller addressed an episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpisodeKey {
    /// `/episodes/{id}`, the legacy route.
    Id(String),
    /// `/podcasts/{slug}`, the canonical route.
    Slug(String),
    /// A bare value; tried as an id first, then as a slug.
    Any(String),
}

impl EpisodeKey {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let path = correct_episode_path(raw).unwrap_or_else(|| raw.to_string());
        if let Some(slug) = path.strip_prefix("/podcasts/") {
            return EpisodeKey::Slug(slug.trim_end_matches('/').to_string());
        }
        if let Some(id) = path.strip_prefix("/episodes/") {
            return EpisodeKey::Id(id.trim_end_matches('/').to_string());
        }
        EpisodeKey::Any(path)
    }
}

/// Editor input for one episode. `None` keeps the stored value, `Some("")` clears it.
#[derive(Debug, Clone, Default)]
pub struct OverrideUpdate {
    pub youtube_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// Route segment for an episode: the precomputed slug or one derived from title and number.
pub fn route_slug(episode: &Episode) -> String {
    match episode.slug.as_deref().filter(|s| !s.is_empty()) {
        Some(existing) => existing.to_string(),
        None => slug(&episode.title, Some(episode.episode_number)),
    }
}

/// Apply stored overrides. Only non-empty override values replace feed values.
pub fn merge_override(mut episode: Episode, overrides: Option<&EpisodeOverride>) -> Episode {
    let Some(overrides) = overrides else {
        return episode;
    };

    if let Some(youtube_id) = non_empty(overrides.youtube_id.as_deref()) {
        episode.youtube_id = Some(youtube_id.to_string());
    }
    if let Some(thumbnail) = non_empty(overrides.thumbnail_url.as_deref()) {
        episode.image_url = Some(thumbnail.to_string());
    }
    episode
}

/// Merge overrides into freshly parsed episodes and fill in their route slugs.
pub fn prepare_episodes<S: KeyValueStore>(
    episodes: Vec<Episode>,
    overrides: &OverrideStore<S>,
) -> Vec<Episode> {
    episodes
        .into_iter()
        .map(|episode| {
            let stored = overrides.get(&episode.id);
            let mut episode = merge_override(episode, stored.as_ref());
            episode.slug = Some(route_slug(&episode));
            episode
        })
        .collect()
}

pub fn find_by_id<'a>(episodes: &'a [Episode], id: &str) -> Option<&'a Episode> {
    episodes.iter().find(|episode| episode.id == id)
}

/// Override index first, then recompute slugs across the whole list.
pub fn find_by_slug<'a, S: KeyValueStore>(
    episodes: &'a [Episode],
    overrides: &OverrideStore<S>,
    slug: &str,
) -> Option<&'a Episode> {
    if let Some(found) = overrides
        .find_id_by_slug(slug)
        .and_then(|id| find_by_id(episodes, id))
    {
        return Some(found);
    }

    debug!(slug, "slug not indexed, scanning episode list");
    episodes
        .iter()
        .find(|episode| route_slug(episode) == slug)
}

pub fn resolve<'a, S: KeyValueStore>(
    episodes: &'a [Episode],
    overrides: &OverrideStore<S>,
    key: &EpisodeKey,
) -> AppResult<&'a Episode> {
    let found = match key {
        EpisodeKey::Id(id) => find_by_id(episodes, id),
        EpisodeKey::Slug(slug) => find_by_slug(episodes, overrides, slug),
        EpisodeKey::Any(value) => {
            find_by_id(episodes, value).or_else(|| find_by_slug(episodes, overrides, value))
        }
    };

    found.ok_or_else(|| AppError::NotFound(format!("episode {key:?}")))
}

/// Build the override to store for `episode` from editor input and the stored value.
pub fn build_override(
    episode: &Episode,
    existing: Option<EpisodeOverride>,
    update: OverrideUpdate,
) -> AppResult<EpisodeOverride> {
    let mut overrides = existing.unwrap_or_default();

    if let Some(url) = update.youtube_url {
        let url = url.trim();
        if url.is_empty() {
            overrides.youtube_url = None;
            overrides.youtube_id = None;
        } else {
            let id = extract_youtube_id(url).ok_or_else(|| {
                AppError::BadRequest(format!("{url} is not a recognized YouTube url"))
            })?;
            overrides.youtube_url = Some(url.to_string());
            overrides.youtube_id = Some(id);
        }
    }

    if let Some(thumbnail) = update.thumbnail_url {
        let thumbnail = thumbnail.trim();
        overrides.thumbnail_url = if thumbnail.is_empty() {
            None
        } else {
            Some(thumbnail.to_string())
        };
    }

    overrides.slug = Some(route_slug(episode));
    Ok(overrides)
}

/// Feed episodes joined with their stored overrides.
pub struct EpisodeService<S> {
    fetcher: FeedFetcher,
    overrides: OverrideStore<S>,
}

impl<S: KeyValueStore> EpisodeService<S> {
    pub fn new(fetcher: FeedFetcher, overrides: OverrideStore<S>) -> Self {
        Self { fetcher, overrides }
    }

    pub fn fetcher(&self) -> &FeedFetcher {
        &self.fetcher
    }

    pub fn overrides(&self) -> &OverrideStore<S> {
        &self.overrides
    }

    /// One fetch, merged with overrides. Fetch failures give an empty list.
    pub async fn list(&self) -> Vec<Episode> {
        let episodes = self.fetcher.fetch_episodes().await;
        prepare_episodes(episodes, &self.overrides)
    }

    pub async fn detail(&self, key: &EpisodeKey) -> AppResult<Episode> {
        let episodes = self.list().await;
        resolve(&episodes, &self.overrides, key).cloned()
    }

    pub async fn save_override(
        &mut self,
        key: &EpisodeKey,
        update: OverrideUpdate,
    ) -> AppResult<EpisodeOverride> {
        let episode = self.detail(key).await?;
        let overrides = build_override(&episode, self.overrides.get(&episode.id), update)?;
        self.overrides.save(&episode.id, &overrides)?;
        info!(episode_id = %episode.id, slug = ?overrides.slug, "episode overrides updated");
        Ok(overrides)
    }

    pub fn get_override(&self, episode_id: &str) -> AppResult<EpisodeOverride> {
        self.overrides
            .get(episode_id)
            .ok_or_else(|| AppError::NotFound(format!("no overrides for episode {episode_id}")))
    }

    pub fn clear_override(&mut self, episode_id: &str) -> AppResult<()> {
        if !self.overrides.clear(episode_id)? {
            return Err(AppError::NotFound(format!(
                "no overrides for episode {episode_id}"
            )));
        }
        info!(episode_id, "episode overrides cleared");
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
