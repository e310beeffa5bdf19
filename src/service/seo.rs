use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::{
    config::SiteConfig,
    model::{Episode, SeoMetadata},
    service::episodes::route_slug,
    util::{html::plain_summary, title::title_keywords, url_norm::site_url},
};

const DESCRIPTION_LIMIT: usize = 155;
const ELLIPSIS: &str = "...";

static RE_LEADING_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*episode\s+(\d+)\b").unwrap());

/// Page metadata for an episode detail page. Never fails; missing fields
/// fall back to site-level defaults.
pub fn build_episode_seo(episode: &Episode, site: &SiteConfig) -> SeoMetadata {
    let title = episode_title(episode);
    let full_title = if title.contains(&site.name) {
        title.clone()
    } else {
        format!("{title} | {}", site.name)
    };

    let summary = plain_summary(&episode.description);
    let description = if summary.is_empty() {
        site.series_description.clone()
    } else {
        truncate_description(&summary)
    };

    let keywords = keywords(&episode.title, &site.keywords);
    let canonical_url = site_url(site.base(), &format!("/podcasts/{}", route_slug(episode)));
    let image = episode.image_url.clone().filter(|url| !url.is_empty());
    let image_alt = image_alt(episode, &site.name);
    let structured_data = structured_data(episode, site, &title, &description, &canonical_url);

    SeoMetadata {
        title,
        full_title,
        description,
        keywords,
        canonical_url,
        image,
        image_alt,
        structured_data,
    }
}

fn episode_title(episode: &Episode) -> String {
    if episode.episode_number == 0 {
        return episode.title.clone();
    }
    let already_prefixed = RE_LEADING_EPISODE
        .captures(&episode.title)
        .and_then(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .is_some_and(|n| n == episode.episode_number);
    if already_prefixed {
        episode.title.clone()
    } else {
        format!("Episode {}: {}", episode.episode_number, episode.title)
    }
}

/// At most 155 characters; longer text keeps 152 and gains `...`.
pub fn truncate_description(text: &str) -> String {
    if text.chars().count() <= DESCRIPTION_LIMIT {
        return text.to_string();
    }
    let keep = DESCRIPTION_LIMIT - ELLIPSIS.len();
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Baseline terms followed by up to five title words not already present.
pub fn keywords(title: &str, baseline: &[String]) -> Vec<String> {
    let mut out: Vec<String> = baseline.to_vec();
    for word in title_keywords(title) {
        if !out.iter().any(|k| k.eq_ignore_ascii_case(&word)) {
            out.push(word);
        }
    }
    out
}

fn image_alt(episode: &Episode, site_name: &str) -> String {
    let prefix = if episode.episode_number > 0 {
        format!("Episode {}", episode.episode_number)
    } else {
        "Episode".to_string()
    };
    format!("{prefix}: {} - {site_name} podcast thumbnail", episode.title)
}

fn structured_data(
    episode: &Episode,
    site: &SiteConfig,
    title: &str,
    description: &str,
    url: &str,
) -> Value {
    let mut data = Map::new();
    data.insert("@context".into(), json!("https://schema.org"));
    data.insert("@type".into(), json!("PodcastEpisode"));
    data.insert("name".into(), json!(title));
    data.insert("description".into(), json!(description));
    data.insert("url".into(), json!(url));
    if !episode.publish_date.is_empty() {
        data.insert("datePublished".into(), json!(episode.publish_date));
    }
    data.insert(
        "author".into(),
        json!({ "@type": "Person", "name": site.author }),
    );
    data.insert(
        "partOfSeries".into(),
        json!({
            "@type": "PodcastSeries",
            "name": site.name,
            "description": site.series_description,
            "url": site.base(),
        }),
    );
    if episode.episode_number > 0 {
        data.insert("episodeNumber".into(), json!(episode.episode_number));
    }
    if !episode.duration.is_empty() {
        data.insert("duration".into(), json!(episode.duration));
    }
    if !episode.audio_url.is_empty() {
        let mut media = Map::new();
        media.insert("@type".into(), json!("AudioObject"));
        media.insert("contentUrl".into(), json!(episode.audio_url));
        if !episode.duration.is_empty() {
            media.insert("duration".into(), json!(episode.duration));
        }
        data.insert("associatedMedia".into(), Value::Object(media));
    }
    if let Some(image) = episode.image_url.as_deref().filter(|url| !url.is_empty()) {
        data.insert("image".into(), json!(image));
    }
    Value::Object(data)
}
