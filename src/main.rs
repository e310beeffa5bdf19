mod config;
mod error;
mod fetcher;
mod model;
mod repo;
mod service;
mod util;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::OnceLock,
};
use tracing::info;
use tracing_appender::rolling;
use tracing_subscriber::{
    filter::filter_fn, fmt::layer as fmt_layer, prelude::*, EnvFilter, Registry,
};

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    fetcher::FeedFetcher,
    model::{EpisodeDetailOut, EpisodeOverride},
    repo::{kv::JsonFileStore, overrides::OverrideStore},
    service::{
        episodes::{route_slug, EpisodeKey, EpisodeService, OverrideUpdate},
        seo::build_episode_seo,
        sitemap::{render_sitemap, sitemap_entries, submit_sitemap, write_sitemap},
    },
    util::{
        date::display_date,
        description::{blocks_to_html, render_description},
        slug::correct_episode_path,
    },
};

const CRATE_TARGET: &str = "podcast_backend";

#[derive(Debug, Parser)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Cli {
    /// YAML config file; defaults to config/config.yaml when present.
    #[arg(long, global = true, env = "CONFIG_FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch the feed and print all episodes with overrides applied.
    Episodes,
    /// Print one episode with its rendered notes and SEO metadata.
    Show {
        /// Episode id, slug, `/episodes/{id}` or `/podcasts/{slug}`.
        key: String,
    },
    /// Manage per-episode overrides.
    #[command(subcommand)]
    Override(OverrideCommand),
    /// Build the XML sitemap.
    Sitemap {
        /// Write to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Submit a published sitemap url to search engines.
    PingSitemap { url: String },
    /// Print the corrected path for a legacy episode url, if any.
    Redirect { path: String },
}

#[derive(Debug, Subcommand)]
enum OverrideCommand {
    List,
    Get {
        episode_id: String,
    },
    Set {
        /// Episode id, slug or route path.
        key: String,
        #[arg(long)]
        youtube_url: Option<String>,
        #[arg(long)]
        thumbnail_url: Option<String>,
    },
    Clear {
        episode_id: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            match &err {
                AppError::Internal(inner) => eprintln!("error: {inner:#}"),
                other => eprintln!("error: {other}"),
            }
            ExitCode::from(code as u8)
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    // path rewriting needs neither the feed nor the store
    if let Command::Redirect { path } = &cli.command {
        return match correct_episode_path(path) {
            Some(corrected) => {
                println!("{corrected}");
                Ok(())
            }
            None => Err(AppError::NotFound(format!("no redirect for {path}"))),
        };
    }

    let config = AppConfig::load(cli.config).context("failed to load configuration")?;
    setup_tracing(&config)?;

    let fetcher = FeedFetcher::new(&config.feed, &config.http_client)?;
    let store = JsonFileStore::open(&config.store.path)?;
    info!(feed = %config.feed.url, store = ?store.path(), "podcast backend ready");
    let mut service = EpisodeService::new(fetcher, OverrideStore::open(store)?);

    match cli.command {
        Command::Episodes => print_json(&service.list().await)?,
        Command::Show { key } => {
            let episode = service.detail(&EpisodeKey::parse(&key)).await?;
            let blocks = render_description(&episode.description);
            let detail = EpisodeDetailOut {
                slug: route_slug(&episode),
                display_date: display_date(&episode.publish_date),
                description_html: blocks_to_html(&blocks),
                seo: build_episode_seo(&episode, &config.site),
                episode,
            };
            print_json(&detail)?;
        }
        Command::Override(OverrideCommand::List) => {
            let entries: BTreeMap<String, EpisodeOverride> =
                service.overrides().entries()?.into_iter().collect();
            print_json(&entries)?;
        }
        Command::Override(OverrideCommand::Get { episode_id }) => {
            print_json(&service.get_override(&episode_id)?)?
        }
        Command::Override(OverrideCommand::Set {
            key,
            youtube_url,
            thumbnail_url,
        }) => {
            if youtube_url.is_none() && thumbnail_url.is_none() {
                return Err(AppError::BadRequest(
                    "pass --youtube-url and/or --thumbnail-url".into(),
                ));
            }
            let update = OverrideUpdate {
                youtube_url,
                thumbnail_url,
            };
            let saved = service
                .save_override(&EpisodeKey::parse(&key), update)
                .await?;
            print_json(&saved)?;
        }
        Command::Override(OverrideCommand::Clear { episode_id }) => {
            service.clear_override(&episode_id)?
        }
        Command::Sitemap { out } => {
            let episodes = service.list().await;
            let entries = sitemap_entries(&episodes, config.site.base(), Utc::now().date_naive());
            let xml = render_sitemap(&entries)?;
            match out {
                Some(path) => write_sitemap(&path, &xml)?,
                None => print!("{xml}"),
            }
        }
        Command::PingSitemap { url } => {
            let outcomes = submit_sitemap(service.fetcher().client(), &url).await?;
            print_json(&outcomes)?;
        }
        Command::Redirect { .. } => {}
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn setup_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config
            .logging
            .level
            .clone()
            .unwrap_or_else(|| "info".to_string());
        EnvFilter::new(level)
    });

    let log_path = Path::new(&config.logging.file);
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_name = log_path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow::anyhow!("invalid log file path"))?;
    let directory = log_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| Path::new(".").to_path_buf());

    let file_appender = rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
    let _ = FILE_GUARD.set(guard);

    let crate_filter = filter_fn(|meta| meta.target().starts_with(CRATE_TARGET));
    let other_filter = filter_fn(|meta| !meta.target().starts_with(CRATE_TARGET));

    // stdout carries command output, so console logs go to stderr
    let stderr_crate = fmt_layer()
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_filter(crate_filter.clone());

    let stderr_general = fmt_layer()
        .with_writer(std::io::stderr)
        .with_filter(other_filter);

    let file_layer = fmt_layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_filter(crate_filter);

    Registry::default()
        .with(env_filter)
        .with(stderr_crate)
        .with(stderr_general)
        .with(file_layer)
        .try_init()
        .context("failed to init tracing subscriber")?;

    Ok(())
}
