use std::{fs, path::Path};

use anyhow::Context;
use chrono::NaiveDate;
use quick_xml::{
    events::{BytesDecl, BytesText, Event},
    Writer,
};
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    error::{AppError, AppResult},
    model::{Episode, SitemapEntry},
    service::episodes::route_slug,
    util::{
        date::iso_day,
        url_norm::{normalize_sitemap_url, ping_urls, site_url},
    },
};

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

const STATIC_PAGES: &[(&str, &str, &str)] = &[
    ("/", "1.0", "daily"),
    ("/episodes", "0.9", "daily"),
    ("/about", "0.7", "monthly"),
    ("/subscribe", "0.8", "monthly"),
];

#[derive(Debug, Serialize)]
pub struct PingOutcome {
    pub endpoint: String,
    pub status: Option<u16>,
    pub error: Option<String>,
}

/// Static routes first, then one `/podcasts/{slug}` entry per episode.
pub fn sitemap_entries(episodes: &[Episode], base_url: &str, today: NaiveDate) -> Vec<SitemapEntry> {
    let today = today.format("%Y-%m-%d").to_string();

    let static_pages = STATIC_PAGES
        .iter()
        .map(|&(path, priority, changefreq)| SitemapEntry {
            loc: site_url(base_url, path),
            lastmod: today.clone(),
            changefreq,
            priority,
        });

    let episode_pages = episodes.iter().map(|episode| SitemapEntry {
        loc: site_url(base_url, &format!("/podcasts/{}", route_slug(episode))),
        lastmod: iso_day(&episode.publish_date).unwrap_or_else(|| today.clone()),
        changefreq: "weekly",
        priority: "0.8",
    });

    static_pages.chain(episode_pages).collect()
}

pub fn render_sitemap(entries: &[SitemapEntry]) -> anyhow::Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer
        .create_element("urlset")
        .with_attribute(("xmlns", SITEMAP_NS))
        .write_inner_content(|w| {
            for entry in entries {
                w.create_element("url").write_inner_content(|w| {
                    w.create_element("loc")
                        .write_text_content(BytesText::new(&entry.loc))?;
                    w.create_element("lastmod")
                        .write_text_content(BytesText::new(&entry.lastmod))?;
                    w.create_element("changefreq")
                        .write_text_content(BytesText::new(entry.changefreq))?;
                    w.create_element("priority")
                        .write_text_content(BytesText::new(entry.priority))?;
                    Ok::<(), quick_xml::Error>(())
                })?;
            }
            Ok::<(), quick_xml::Error>(())
        })?;

    let mut xml = String::from_utf8(writer.into_inner()).context("sitemap is not utf-8")?;
    xml.push('\n');
    Ok(xml)
}

pub fn write_sitemap(path: &Path, xml: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {:?}", parent))?;
    }
    fs::write(path, xml).with_context(|| format!("failed to write sitemap {:?}", path))?;
    info!(path = ?path, bytes = xml.len(), "sitemap written");
    Ok(())
}

/// Notify search engines about the published sitemap. Each endpoint is tried once.
pub async fn submit_sitemap(client: &Client, sitemap_url: &str) -> AppResult<Vec<PingOutcome>> {
    let sitemap_url = normalize_sitemap_url(sitemap_url)
        .map_err(|err| AppError::BadRequest(format!("{err:#}")))?;

    let mut outcomes = Vec::new();
    for endpoint in ping_urls(&sitemap_url) {
        let outcome = match client.get(&endpoint).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    info!(endpoint = %endpoint, status = status.as_u16(), "sitemap ping accepted");
                } else {
                    warn!(endpoint = %endpoint, status = status.as_u16(), "sitemap ping rejected");
                }
                PingOutcome {
                    endpoint,
                    status: Some(status.as_u16()),
                    error: None,
                }
            }
            Err(err) => {
                warn!(error = ?err, endpoint = %endpoint, "sitemap ping failed");
                PingOutcome {
                    endpoint,
                    status: err.status().map(|s| s.as_u16()),
                    error: Some(err.to_string()),
                }
            }
        };
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn episodes() -> Vec<Episode> {
        vec![
            Episode {
                id: "2".to_string(),
                title: "Q&A Special".to_string(),
                publish_date: "Sat, 15 Apr 2023 09:00:00 GMT".to_string(),
                episode_number: 2,
                ..Episode::default()
            },
            Episode {
                id: "1".to_string(),
                title: "Pilot".to_string(),
                publish_date: "sometime".to_string(),
                episode_number: 1,
                slug: Some("custom-pilot".to_string()),
                ..Episode::default()
            },
        ]
    }

    #[test]
    fn entries_cover_static_pages_and_episodes() {
        let entries = sitemap_entries(&episodes(), "https://pod.example.com/", day());
        assert_eq!(entries.len(), 6);

        assert_eq!(entries[0].loc, "https://pod.example.com/");
        assert_eq!(entries[0].priority, "1.0");
        assert_eq!(entries[3].loc, "https://pod.example.com/subscribe");
        assert_eq!(entries[3].changefreq, "monthly");

        assert_eq!(entries[4].loc, "https://pod.example.com/podcasts/episode-2-qa-special");
        assert_eq!(entries[4].lastmod, "2023-04-15");
        assert_eq!(entries[4].changefreq, "weekly");

        assert_eq!(entries[5].loc, "https://pod.example.com/podcasts/custom-pilot");
        assert_eq!(entries[5].lastmod, "2024-06-01");
    }

    #[test]
    fn rendered_xml_is_a_urlset() {
        let xml = render_sitemap(&sitemap_entries(&episodes(), "https://pod.example.com", day()))
            .unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert_eq!(xml.matches("<url>").count(), 6);
        assert!(xml.contains("<loc>https://pod.example.com/episodes</loc>"));
        assert!(xml.contains("<priority>0.9</priority>"));
        assert!(xml.contains("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">"));
        assert!(xml.trim_end().ends_with("</urlset>"));
    }

    #[test]
    fn loc_is_xml_escaped() {
        let entries = vec![SitemapEntry {
            loc: "https://pod.example.com/podcasts/a?x=1&y=2".to_string(),
            lastmod: "2024-06-01".to_string(),
            changefreq: "weekly",
            priority: "0.8",
        }];
        let xml = render_sitemap(&entries).unwrap();
        assert!(xml.contains("<loc>https://pod.example.com/podcasts/a?x=1&amp;y=2</loc>"));
        assert!(!xml.contains("&y=2"));
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("public").join("sitemap.xml");
        write_sitemap(&path, "<urlset/>").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "<urlset/>");
    }

    #[tokio::test]
    async fn invalid_sitemap_url_is_rejected_before_any_request() {
        let result = submit_sitemap(&Client::new(), "not a url").await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
