use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub(crate) enum RotationError {
    #[error("{role} episodes directory {} is not accessible", .path.display())]
    Inaccessible {
        role: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{role} episodes directory {} is not a directory", .path.display())]
    NotADirectory { role: &'static str, path: PathBuf },
    #[error("failed to move {} to {}", .from.display(), .to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlannedMove {
    pub(crate) from: PathBuf,
    pub(crate) to: PathBuf,
}

/// Every regular file in `new_dir` paired with its archive path in `old_dir`.
/// A name already taken in the archive gets a ` (2)`, ` (3)`, ... suffix so
/// nothing there is overwritten. Fails before anything moves if a directory
/// is unusable.
pub(crate) fn plan_rotation(
    new_dir: &Path,
    old_dir: &Path,
) -> Result<Vec<PlannedMove>, RotationError> {
    ensure_dir("new", new_dir)?;
    ensure_dir("old", old_dir)?;

    let inaccessible = |source| RotationError::Inaccessible {
        role: "new",
        path: new_dir.to_path_buf(),
        source,
    };

    let mut sources = Vec::new();
    for entry in fs::read_dir(new_dir).map_err(inaccessible)? {
        let entry = entry.map_err(inaccessible)?;
        let from = entry.path();
        if from.is_file() {
            sources.push(from);
        }
    }
    sources.sort();

    let mut taken = HashSet::new();
    let moves = sources
        .into_iter()
        .filter_map(|from| {
            let name = from.file_name()?.to_os_string();
            let to = archive_target(old_dir, &name.to_string_lossy(), &taken);
            if to.file_name() != Some(name.as_os_str()) {
                warn!(from = %from.display(), to = %to.display(), "archive name taken, renaming");
            }
            taken.insert(to.clone());
            Some(PlannedMove { from, to })
        })
        .collect();
    Ok(moves)
}

/// First of `name`, `stem (2).ext`, `stem (3).ext`, ... that is neither on
/// disk in `old_dir` nor already claimed by this rotation.
fn archive_target(old_dir: &Path, name: &str, taken: &HashSet<PathBuf>) -> PathBuf {
    let free = |candidate: &PathBuf| !candidate.exists() && !taken.contains(candidate);
    let first = old_dir.join(name);
    if free(&first) {
        return first;
    }

    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, Some(extension)),
        _ => (name, None),
    };
    (2_usize..)
        .map(|copy| match extension {
            Some(extension) => old_dir.join(format!("{stem} ({copy}).{extension}")),
            None => old_dir.join(format!("{stem} ({copy})")),
        })
        .find(free)
        .unwrap_or(first)
}

/// Archives the previous batch: moves every file from `new_dir` into
/// `old_dir`, keeping its name unless the archive already holds one.
/// Returns how many files moved.
pub(crate) fn rotate_batch(new_dir: &Path, old_dir: &Path) -> Result<usize, RotationError> {
    let moves = plan_rotation(new_dir, old_dir)?;
    for planned in &moves {
        move_file(&planned.from, &planned.to).map_err(|source| RotationError::Move {
            from: planned.from.clone(),
            to: planned.to.clone(),
            source,
        })?;
        debug!(from = %planned.from.display(), to = %planned.to.display(), "archived episode");
    }
    if !moves.is_empty() {
        info!(count = moves.len(), "archived previous batch");
    }
    Ok(moves.len())
}

fn ensure_dir(role: &'static str, path: &Path) -> Result<(), RotationError> {
    let metadata = fs::metadata(path).map_err(|source| RotationError::Inaccessible {
        role,
        path: path.to_path_buf(),
        source,
    })?;
    if metadata.is_dir() {
        Ok(())
    } else {
        Err(RotationError::NotADirectory {
            role,
            path: path.to_path_buf(),
        })
    }
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn names(dir: &Path) -> BTreeSet<String> {
        fs::read_dir(dir)
            .expect("read dir")
            .map(|entry| {
                entry
                    .expect("dir entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn moves_files_and_keeps_names() {
        let new_dir = tempfile::tempdir().expect("tempdir");
        let old_dir = tempfile::tempdir().expect("tempdir");
        fs::write(new_dir.path().join("1. Podcast 1.mp3"), b"one").expect("write");
        fs::write(new_dir.path().join("2. Podcast 2.mp3"), b"two").expect("write");
        fs::write(old_dir.path().join("archived.mp3"), b"old").expect("write");

        let moved = rotate_batch(new_dir.path(), old_dir.path()).expect("rotate");

        assert_eq!(moved, 2);
        assert!(names(new_dir.path()).is_empty());
        assert_eq!(
            names(old_dir.path()),
            set(&["1. Podcast 1.mp3", "2. Podcast 2.mp3", "archived.mp3"])
        );
        assert_eq!(
            fs::read(old_dir.path().join("2. Podcast 2.mp3")).expect("read"),
            b"two"
        );
    }

    #[test]
    fn leaves_subdirectories_in_place() {
        let new_dir = tempfile::tempdir().expect("tempdir");
        let old_dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(new_dir.path().join("extras")).expect("mkdir");
        fs::write(new_dir.path().join("ep.mp3"), b"ep").expect("write");

        rotate_batch(new_dir.path(), old_dir.path()).expect("rotate");

        assert_eq!(names(new_dir.path()), set(&["extras"]));
        assert_eq!(names(old_dir.path()), set(&["ep.mp3"]));
    }

    #[test]
    fn rotation_is_idempotent() {
        let new_dir = tempfile::tempdir().expect("tempdir");
        let old_dir = tempfile::tempdir().expect("tempdir");
        fs::write(old_dir.path().join("archived.mp3"), b"old").expect("write");

        assert_eq!(rotate_batch(new_dir.path(), old_dir.path()).expect("rotate"), 0);
        assert_eq!(names(old_dir.path()), set(&["archived.mp3"]));

        fs::write(new_dir.path().join("ep.mp3"), b"ep").expect("write");
        assert_eq!(rotate_batch(new_dir.path(), old_dir.path()).expect("rotate"), 1);
        assert_eq!(rotate_batch(new_dir.path(), old_dir.path()).expect("rotate"), 0);
        assert!(names(new_dir.path()).is_empty());
        assert_eq!(names(old_dir.path()), set(&["archived.mp3", "ep.mp3"]));
    }

    #[test]
    fn missing_directory_is_fatal() {
        let new_dir = tempfile::tempdir().expect("tempdir");
        let missing = new_dir.path().join("missing");
        fs::write(new_dir.path().join("ep.mp3"), b"ep").expect("write");

        let err = rotate_batch(new_dir.path(), &missing).expect_err("missing old dir");
        assert!(matches!(err, RotationError::Inaccessible { role: "old", .. }));
        assert_eq!(names(new_dir.path()), set(&["ep.mp3"]));
    }

    #[test]
    fn file_in_place_of_directory_is_fatal() {
        let base = tempfile::tempdir().expect("tempdir");
        let not_dir = base.path().join("old");
        fs::write(&not_dir, b"").expect("write");

        let err = rotate_batch(base.path(), &not_dir).expect_err("not a directory");
        assert!(matches!(err, RotationError::NotADirectory { .. }));
    }

    #[test]
    fn taken_archive_names_get_a_copy_suffix() {
        let new_dir = tempfile::tempdir().expect("tempdir");
        let old_dir = tempfile::tempdir().expect("tempdir");
        fs::write(new_dir.path().join("a.mp3"), b"new a").expect("write");
        fs::write(new_dir.path().join("b.mp3"), b"new b").expect("write");
        fs::write(new_dir.path().join("b (2).mp3"), b"new b2").expect("write");
        fs::write(old_dir.path().join("b.mp3"), b"old b").expect("write");

        let moved = rotate_batch(new_dir.path(), old_dir.path()).expect("rotate");

        assert_eq!(moved, 3);
        assert!(names(new_dir.path()).is_empty());
        assert_eq!(
            names(old_dir.path()),
            set(&["a.mp3", "b.mp3", "b (2).mp3", "b (3).mp3"])
        );
        assert_eq!(fs::read(old_dir.path().join("b.mp3")).expect("read"), b"old b");
        assert_eq!(fs::read(old_dir.path().join("b (2).mp3")).expect("read"), b"new b2");
        assert_eq!(fs::read(old_dir.path().join("b (3).mp3")).expect("read"), b"new b");
    }

    #[test]
    fn archive_target_handles_names_without_extension() {
        let old_dir = tempfile::tempdir().expect("tempdir");
        fs::write(old_dir.path().join("notes"), b"").expect("write");
        fs::write(old_dir.path().join(".hidden"), b"").expect("write");

        let taken = HashSet::new();
        assert_eq!(
            archive_target(old_dir.path(), "notes", &taken),
            old_dir.path().join("notes (2)")
        );
        assert_eq!(
            archive_target(old_dir.path(), ".hidden", &taken),
            old_dir.path().join(".hidden (2)")
        );
    }
}
