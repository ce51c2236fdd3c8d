use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use super::tagging::tag_episode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileEntry {
    pub(crate) name: String,
    pub(crate) path: PathBuf,
    pub(crate) created: SystemTime,
}

/// A directory tree read once from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DirSnapshot {
    pub(crate) files: Vec<FileEntry>,
    pub(crate) dirs: Vec<DirSnapshot>,
}

impl DirSnapshot {
    /// Reads `path`. With `recursive` unset, subdirectories are neither listed
    /// nor descended into.
    pub(crate) fn read(path: &Path, recursive: bool) -> io::Result<Self> {
        let mut snapshot = DirSnapshot::default();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                if recursive {
                    snapshot.dirs.push(Self::read(&entry.path(), true)?);
                }
                continue;
            }

            let metadata = entry.metadata()?;
            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .unwrap_or(UNIX_EPOCH);
            snapshot.files.push(FileEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
                created,
            });
        }
        Ok(snapshot)
    }

    /// Files in this directory and every directory below it.
    pub(crate) fn file_count(&self) -> usize {
        self.files.len() + self.dirs.iter().map(DirSnapshot::file_count).sum::<usize>()
    }
}

pub(crate) fn count_archived(old_dir: &Path) -> io::Result<usize> {
    DirSnapshot::read(old_dir, true).map(|snapshot| snapshot.file_count())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NumberedEpisode {
    pub(crate) number: usize,
    pub(crate) source: PathBuf,
    pub(crate) target: PathBuf,
}

/// Numbers `files` from `base_count + 1` in creation order, ties broken by
/// name, and computes the `"{number}. {name}"` rename for each.
pub(crate) fn plan_numbering(base_count: usize, files: &[FileEntry]) -> Vec<NumberedEpisode> {
    let mut ordered: Vec<&FileEntry> = files.iter().collect();
    ordered.sort_by(|left, right| {
        left.created
            .cmp(&right.created)
            .then_with(|| left.name.cmp(&right.name))
    });

    ordered
        .into_iter()
        .enumerate()
        .map(|(idx, file)| {
            let number = base_count + idx + 1;
            NumberedEpisode {
                number,
                source: file.path.clone(),
                target: file.path.with_file_name(format!("{number}. {}", file.name)),
            }
        })
        .collect()
}

#[derive(Debug, Default)]
pub(crate) struct NumberingReport {
    pub(crate) numbered: Vec<NumberedEpisode>,
    pub(crate) failed: usize,
}

/// Tags and renames every file in `new_dir`, continuing the numbering after
/// `base_count` archived files. A file that cannot be tagged or renamed is
/// reported and keeps its number; the rest of the batch carries on.
pub(crate) fn number_new_episodes(
    new_dir: &Path,
    base_count: usize,
    show_name: &str,
) -> io::Result<NumberingReport> {
    let batch = DirSnapshot::read(new_dir, false)?;
    let mut report = NumberingReport::default();

    for episode in plan_numbering(base_count, &batch.files) {
        if let Err(err) = tag_episode(&episode.source, show_name, episode.number) {
            warn!(file = %episode.source.display(), "failed to tag episode: {err}");
            report.failed += 1;
            continue;
        }
        if let Err(err) = fs::rename(&episode.source, &episode.target) {
            warn!(file = %episode.source.display(), "failed to rename episode: {err}");
            report.failed += 1;
            continue;
        }
        info!(number = episode.number, file = %episode.target.display(), "numbered episode");
        report.numbered.push(episode);
    }

    Ok(report)
}
