use anyhow::{anyhow, Context, Result};
use url::Url;

const PING_ENDPOINTS: &[&str] = &[
    "https://www.google.com/ping?sitemap=",
    "https://www.bing.com/ping?sitemap=",
];

/// Join the site base url and an absolute route path.
pub fn site_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.is_empty() || path == "/" {
        return format!("{base}/");
    }
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Validate a public sitemap url and drop the fragment so pings stay stable.
pub fn normalize_sitemap_url(raw: &str) -> Result<String> {
    let mut url = Url::parse(raw.trim()).with_context(|| format!("invalid url: {raw}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!("sitemap url must be http or https: {raw}"));
    }
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Search-engine endpoints that accept a sitemap submission ping.
pub fn ping_urls(sitemap_url: &str) -> Vec<String> {
    let encoded: String = form_urlencoded::byte_serialize(sitemap_url.as_bytes()).collect();
    PING_ENDPOINTS
        .iter()
        .map(|endpoint| format!("{endpoint}{encoded}"))
        .collect()
}
