use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use tracing::{info, warn};

use crate::config::Config;
use crate::feed::FeedEntry;
use crate::http::{HttpClient, HttpError};

pub(crate) const EPISODE_EXTENSION: &str = "mp3";
const ALLOWED_PUNCTUATION: &str = "\"'.! -_";

#[derive(Debug, thiserror::Error)]
#[error("failed to download {url} to {}", .dest.display())]
pub(crate) struct DownloadError {
    pub(crate) url: String,
    pub(crate) dest: PathBuf,
    #[source]
    pub(crate) source: HttpError,
}

#[derive(Debug, thiserror::Error)]
#[error("no enclosure link for '{title}' (published {published})")]
pub(crate) struct EnclosureNotFound {
    pub(crate) title: String,
    pub(crate) published: String,
}

pub(crate) trait Downloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError>;
}

impl Downloader for HttpClient {
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        self.download_to(url, dest)
            .map(|_| ())
            .map_err(|source| DownloadError {
                url: url.to_string(),
                dest: dest.to_path_buf(),
                source,
            })
    }
}

/// Where one selected entry is fetched from and written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EpisodeRecord {
    pub(crate) url: String,
    pub(crate) file_name: String,
    pub(crate) path: PathBuf,
}

#[derive(Debug, Default)]
pub(crate) struct MaterializeReport {
    pub(crate) downloaded: Vec<EpisodeRecord>,
    pub(crate) skipped: Vec<EnclosureNotFound>,
}

/// Keeps ASCII letters, digits and `"'.! -_`; everything else is dropped.
pub(crate) fn clean_title(title: &str) -> String {
    title
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || ALLOWED_PUNCTUATION.contains(*ch))
        .collect()
}

pub(crate) fn episode_file_name(title: &str) -> String {
    format!("{}.{EPISODE_EXTENSION}", clean_title(title))
}

pub(crate) fn resolve_episode(
    entry: &FeedEntry,
    new_dir: &Path,
) -> Result<EpisodeRecord, EnclosureNotFound> {
    let url = entry.enclosure_url().ok_or_else(|| EnclosureNotFound {
        title: entry.title.clone(),
        published: entry.published.clone(),
    })?;
    let file_name = episode_file_name(&entry.title);
    Ok(EpisodeRecord {
        url: url.to_string(),
        path: new_dir.join(&file_name),
        file_name,
    })
}

/// Downloads `entries` in order into the new-episodes directory. After each
/// download the config's last-run marker moves to that entry's published
/// string. The first failed download aborts the batch.
pub(crate) fn materialize(
    entries: &[&FeedEntry],
    config: &mut Config,
    downloader: &dyn Downloader,
    progress: &ProgressBar,
) -> Result<MaterializeReport, DownloadError> {
    let mut report = MaterializeReport::default();
    let new_dir = config.new_episodes_dir.clone();

    for entry in entries {
        progress.set_message(entry.title.clone());
        let record = match resolve_episode(entry, &new_dir) {
            Ok(record) => record,
            Err(missing) => {
                warn!("{missing}, skipping");
                report.skipped.push(missing);
                progress.inc(1);
                continue;
            }
        };

        downloader.download(&record.url, &record.path)?;
        config.set_last_run(entry.published.clone());
        info!(file = %record.file_name, "downloaded episode");
        report.downloaded.push(record);
        progress.inc(1);
    }

    Ok(report)
}
