use anyhow::{anyhow, Context};
use reqwest::ClientBuilder;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            request_timeout_secs: 15,
            user_agent: "PodcastBackend/0.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    pub proxy_url: Option<String>,
}

impl HttpClientConfig {
    pub fn apply(&self, builder: ClientBuilder) -> anyhow::Result<ClientBuilder> {
        match self.proxy_url.as_deref().map(str::trim) {
            Some(proxy) if !proxy.is_empty() => {
                let proxy = reqwest::Proxy::all(proxy)
                    .with_context(|| format!("invalid proxy url {proxy}"))?;
                Ok(builder.proxy(proxy))
            }
            _ => Ok(builder),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub name: String,
    pub author: String,
    pub series_description: String,
    pub keywords: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://yoursite.com".to_string(),
            name: "AI Navigator Station".to_string(),
            author: "Ryan Poplin".to_string(),
            series_description:
                "Digital Pop's podcast exploring AI, digital marketing, and business transformation"
                    .to_string(),
            keywords: [
                "AI Navigator Station",
                "Digital Pop",
                "Ryan Poplin",
                "artificial intelligence",
                "AI podcast",
                "digital marketing",
                "business transformation",
                "technology podcast",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl SiteConfig {
    /// Base url without the trailing slash, ready for `format!("{base}/path")`.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "data/episode_overrides.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: String,
    pub level: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: "logs/podcast-backend.log".to_string(),
            level: Some("info".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub http_client: HttpClientConfig,
    pub site: SiteConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn load(explicit_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config = if let Some(path) = explicit_path {
            if !path.exists() {
                return Err(anyhow!("config file {:?} not found", path));
            }
            Self::load_from_file(&path)?
        } else {
            let path = locate_default_config();
            if let Some(path) = path {
                Self::load_from_file(&path)?
            } else {
                AppConfig::default()
            }
        };

        Self::apply_env_overrides(config)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        Self::from_yaml(&contents).with_context(|| format!("failed to parse config file {:?}", path))
    }

    fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        let config: AppConfig = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    fn apply_env_overrides(mut config: AppConfig) -> anyhow::Result<AppConfig> {
        if let Ok(url) = std::env::var("FEED_URL") {
            config.feed.url = url;
        }

        if let Some(timeout) = parse_optional_env("FEED_TIMEOUT_SECS")? {
            config.feed.request_timeout_secs = timeout;
        }

        if let Ok(proxy) = std::env::var("HTTP_PROXY_URL") {
            config.http_client.proxy_url = Some(proxy);
        }

        if let Ok(base_url) = std::env::var("SITE_BASE_URL") {
            config.site.base_url = base_url;
        }

        if let Ok(path) = std::env::var("OVERRIDE_STORE_PATH") {
            config.store.path = path;
        }

        if let Ok(log_file) = std::env::var("LOG_FILE_PATH") {
            config.logging.file = log_file;
        }

        if let Ok(log_level) = std::env::var("LOG_LEVEL") {
            config.logging.level = Some(log_level);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.feed.url.trim().is_empty() {
            return Err(anyhow!(
                "feed url missing; set FEED_URL env var or feed.url in config file"
            ));
        }
        Url::parse(self.feed.url.trim())
            .with_context(|| format!("feed url {:?} is not a valid url", self.feed.url))?;
        Url::parse(self.site.base_url.trim())
            .with_context(|| format!("site base url {:?} is not a valid url", self.site.base_url))?;
        if self.store.path.trim().is_empty() {
            return Err(anyhow!(
                "override store path missing; set OVERRIDE_STORE_PATH or store.path in config file"
            ));
        }
        Ok(())
    }
}

fn parse_optional_env<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => Ok(Some(
            v.parse::<T>()
                .with_context(|| format!("{key} must be a valid value"))?,
        )),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn locate_default_config() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from("config/config.yaml"),
        PathBuf::from("../config/config.yaml"),
    ];

    candidates.into_iter().find(|path| path.exists())
}
