pub mod parser;

use std::time::Duration;

use anyhow::{anyhow, Context};
use encoding_rs::Encoding;
use reqwest::{header, Client};
use tracing::{debug, info, warn};

use crate::{
    config::{FeedConfig, HttpClientConfig},
    model::Episode,
};

pub use parser::parse_episodes;

pub struct FeedFetcher {
    client: Client,
    url: String,
}

impl FeedFetcher {
    pub fn new(config: &FeedConfig, http_client: &HttpClientConfig) -> anyhow::Result<Self> {
        let timeout_secs = if config.request_timeout_secs == 0 {
            10
        } else {
            config.request_timeout_secs
        };

        let client = http_client
            .apply(Client::builder())
            .context("failed to apply proxy settings for feed client")?
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build feed http client")?;

        Ok(Self {
            client,
            url: config.url.trim().to_string(),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetch and parse the feed. Any failure is logged and yields no episodes.
    pub async fn fetch_episodes(&self) -> Vec<Episode> {
        let xml = match self.fetch_feed_text().await {
            Ok(xml) => xml,
            Err(err) => {
                warn!(error = ?err, url = %self.url, "feed fetch failed");
                return Vec::new();
            }
        };

        match parse_episodes(&xml) {
            Ok(episodes) => {
                info!(count = episodes.len(), url = %self.url, "feed parsed");
                episodes
            }
            Err(err) => {
                warn!(error = ?err, url = %self.url, "feed parse failed");
                Vec::new()
            }
        }
    }

    pub async fn fetch_feed_text(&self) -> anyhow::Result<String> {
        debug!(url = %self.url, "fetching feed");
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("feed request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("unexpected status {}", status));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response
            .bytes()
            .await
            .context("failed to read feed body")?;

        Ok(decode_feed_bytes(&bytes, content_type.as_deref()))
    }
}

/// Decode a feed body: BOM, then the Content-Type charset, then the xml
/// declaration, then utf-8, and finally a detector guess.
pub fn decode_feed_bytes(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = Encoding::for_bom(bytes)
        .map(|(encoding, _)| encoding)
        .or_else(|| content_type.and_then(charset_from_content_type))
        .or_else(|| charset_from_xml_declaration(bytes))
        .unwrap_or_else(|| {
            if std::str::from_utf8(bytes).is_ok() {
                encoding_rs::UTF_8
            } else {
                let mut detector = chardetng::EncodingDetector::new();
                detector.feed(bytes, true);
                detector.guess(None, true)
            }
        });

    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!(encoding = used.name(), "feed body contained malformed sequences");
    }
    text.into_owned()
}

fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, value)| Encoding::for_label(value.trim().trim_matches('"').as_bytes()))
}

fn charset_from_xml_declaration(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(256)];
    let head = String::from_utf8_lossy(head);
    let decl_end = head.find("?>")?;
    let decl = &head[..decl_end];
    let start = decl.find("encoding=")? + "encoding=".len();
    let rest = &decl[start..];
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let label = rest[1..].split(quote).next()?;
    Encoding::for_label(label.as_bytes())
}
