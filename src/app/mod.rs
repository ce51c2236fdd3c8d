mod materialize;
mod numbering;
mod rotate;
mod select;
mod tagging;


use std::io::{self, IsTerminal};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::feed::FeedSource;
use crate::http::HttpClient;
use crate::paths::config_file_path;

use self::materialize::{Downloader, materialize};
use self::numbering::{DirSnapshot, count_archived, number_new_episodes};
use self::rotate::rotate_batch;
use self::select::select_new_episodes;

const FALLBACK_SHOW_NAME: &str = "Podcast";

pub fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => config_file_path()?,
    };
    let client = HttpClient::new(
        Duration::from_secs(cli.connect_timeout),
        Duration::from_secs(cli.read_timeout),
    );

    match cli.command {
        Some(Command::Pending) => run_pending(&Config::load(&config_path)?, &client)?,
        Some(Command::Status) => run_status(&Config::load(&config_path)?, &config_path)?,
        Some(Command::Fetch) | None => {
            let options = FetchOptions {
                show_name: cli.show_name,
                show_progress: !cli.no_progress && io::stderr().is_terminal(),
            };
            let outcome = fetch_and_save(&config_path, &client, &client, &options)?;
            print_outcome(&outcome);
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FetchOptions {
    pub(crate) show_name: Option<String>,
    pub(crate) show_progress: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FetchOutcome {
    pub(crate) selected: usize,
    pub(crate) archived: usize,
    pub(crate) downloaded: usize,
    pub(crate) skipped: usize,
    pub(crate) numbered: usize,
    pub(crate) failed: usize,
}

/// Loads the config, runs one batch and saves the config back. The file is
/// left untouched when nothing was new or when the batch fails.
pub(crate) fn fetch_and_save(
    config_path: &Path,
    feeds: &dyn FeedSource,
    downloader: &dyn Downloader,
    options: &FetchOptions,
) -> Result<FetchOutcome> {
    let mut config = Config::load(config_path)?;
    let outcome = run_fetch(&mut config, feeds, downloader, options)?;
    if outcome.selected > 0 {
        config.save(config_path)?;
    }
    Ok(outcome)
}

pub(crate) fn run_fetch(
    config: &mut Config,
    feeds: &dyn FeedSource,
    downloader: &dyn Downloader,
    options: &FetchOptions,
) -> Result<FetchOutcome> {
    let last_run = config.last_run_instant()?;
    let feed = feeds.snapshot(&config.rss_address)?;
    let selected = select_new_episodes(&feed.entries, last_run, &config.date_format);
    if selected.is_empty() {
        info!(last_run = config.last_run().raw(), "no new episodes");
        return Ok(FetchOutcome::default());
    }
    info!(count = selected.len(), "found new episodes");

    let archived = rotate_batch(&config.new_episodes_dir, &config.old_episodes_dir)?;
    let base_count = count_archived(&config.old_episodes_dir).with_context(|| {
        format!(
            "failed to count archived episodes in {}",
            config.old_episodes_dir.display()
        )
    })?;

    let progress = progress_bar(selected.len() as u64, options.show_progress);
    let report = materialize(&selected, config, downloader, &progress)?;
    progress.finish_and_clear();

    let show_name = options
        .show_name
        .clone()
        .or_else(|| feed.title.clone())
        .unwrap_or_else(|| FALLBACK_SHOW_NAME.to_string());
    let numbering = number_new_episodes(&config.new_episodes_dir, base_count, &show_name)
        .with_context(|| {
            format!(
                "failed to list new episodes in {}",
                config.new_episodes_dir.display()
            )
        })?;

    Ok(FetchOutcome {
        selected: selected.len(),
        archived,
        downloaded: report.downloaded.len(),
        skipped: report.skipped.len(),
        numbered: numbering.numbered.len(),
        failed: numbering.failed,
    })
}

fn run_pending(config: &Config, feeds: &dyn FeedSource) -> Result<()> {
    let last_run = config.last_run_instant()?;
    let feed = feeds.snapshot(&config.rss_address)?;
    let selected = select_new_episodes(&feed.entries, last_run, &config.date_format);
    if selected.is_empty() {
        println!("No new episodes since {}.", config.last_run().raw());
        return Ok(());
    }

    println!("{:<32} {:<48} {}", "PUBLISHED", "TITLE", "ENCLOSURE");
    for entry in selected {
        println!(
            "{:<32} {:<48} {}",
            truncate(&entry.published, 32),
            truncate(&entry.title, 48),
            entry.enclosure_url().unwrap_or("(none, will be skipped)")
        );
    }
    Ok(())
}

fn run_status(config: &Config, config_path: &Path) -> Result<()> {
    println!("Config:       {}", config_path.display());
    println!("Feed:         {}", config.rss_address);
    match config.last_run_instant() {
        Ok(instant) => println!(
            "Last run:     {} ({})",
            config.last_run().raw(),
            instant.to_rfc3339()
        ),
        Err(err) => println!(
            "Last run:     {} ({:#})",
            config.last_run().raw(),
            anyhow::Error::new(err)
        ),
    }
    println!(
        "New episodes: {} ({})",
        config.new_episodes_dir.display(),
        describe_count(DirSnapshot::read(&config.new_episodes_dir, false))
    );
    println!(
        "Old episodes: {} ({})",
        config.old_episodes_dir.display(),
        describe_count(DirSnapshot::read(&config.old_episodes_dir, true))
    );
    Ok(())
}

fn describe_count(snapshot: io::Result<DirSnapshot>) -> String {
    match snapshot {
        Ok(snapshot) => format!("{} file(s)", snapshot.file_count()),
        Err(err) => format!("unreadable: {err}"),
    }
}

fn print_outcome(outcome: &FetchOutcome) {
    if outcome.selected == 0 {
        println!("No new episodes.");
        return;
    }
    println!(
        "Downloaded {} episode(s); archived {} from the previous batch.",
        outcome.downloaded, outcome.archived
    );
    if outcome.skipped > 0 {
        println!("Skipped {} episode(s) without an enclosure.", outcome.skipped);
    }
    if outcome.failed > 0 {
        println!(
            "{} episode(s) could not be tagged or renamed; see the log above.",
            outcome.failed
        );
    }
}

fn progress_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}
