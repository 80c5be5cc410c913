//! Filesystem helpers for export artefacts and definition files, built on
//! `cap-std` and `camino`.
//!
//! Artefacts are written through a sibling `.partial` file and renamed into
//! place, so a reader never observes a half-written export.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io::{self, Write};
use std::path::Component;

/// Directory holding `path` together with the final path component.
fn parent_dir_and_name(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let name = path
        .file_name()
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("{path} has no file name"))
        })?
        .to_owned();
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, name))
}

/// Read a UTF-8 text file such as a form definition.
pub fn read_to_string(path: &Utf8Path) -> io::Result<String> {
    let (dir, name) = parent_dir_and_name(path)?;
    dir.read_to_string(name.as_str())
}

/// Whether `path` exists and is a regular file.
pub fn is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = parent_dir_and_name(path)?;
    match dir.metadata(name.as_str()) {
        Ok(meta) => Ok(meta.is_file()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Create the parent directory of `path` and its ancestors.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }
    let (base, relative) = split_at_root(parent)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    base.create_dir_all(&relative)
}

/// Write `bytes` to `path`, replacing any existing file only once the new
/// content is complete.
///
/// The data goes to `.{name}.partial` next to the target and is renamed over
/// it after a flush; on failure the partial file is removed.
pub fn write_file_atomically(path: &Utf8Path, bytes: &[u8]) -> io::Result<()> {
    ensure_parent_dir(path)?;
    let (dir, name) = parent_dir_and_name(path)?;
    let partial = format!(".{name}.partial");

    let written = dir.create(partial.as_str()).and_then(|mut file| {
        file.write_all(bytes)?;
        file.flush()?;
        file.sync_all()
    });
    let renamed = written.and_then(|()| dir.rename(partial.as_str(), &dir, name.as_str()));
    if renamed.is_err() {
        // Best effort; the original error is the one worth reporting.
        let _ = dir.remove_file(partial.as_str());
    }
    renamed
}

/// Split a directory path into an ambient base directory and the relative
/// remainder below it.
fn split_at_root(parent: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_parent = parent.as_std_path();
    let (base, relative) = match std_parent.components().next() {
        // Windows drive or UNC prefix.
        Some(Component::Prefix(prefix)) => {
            let prefix = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            let base = Utf8PathBuf::from(prefix).join(std::path::MAIN_SEPARATOR.to_string());
            let relative = parent
                .strip_prefix(&base)
                .or_else(|_| parent.strip_prefix(prefix))
                .map_err(|_| io::Error::other("failed to strip prefix from parent path"))?
                .to_owned();
            (base, relative)
        }
        Some(Component::RootDir) => {
            let base = Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
            let relative = parent
                .strip_prefix(&base)
                .map_err(|_| io::Error::other("failed to strip root from absolute path"))?
                .to_owned();
            (base, relative)
        }
        _ => (Utf8PathBuf::from("."), parent.to_owned()),
    };
    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    Ok((dir, relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn workspace() -> TempDir {
        TempDir::new().expect("create workspace")
    }

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("UTF-8 temp path")
    }

    #[rstest]
    fn atomic_write_creates_parents_and_leaves_no_partial(workspace: TempDir) {
        let target = utf8(&workspace).join("exports/2024/BIRDS_2024-04-01.csv");
        write_file_atomically(&target, b"id,species\n1,wren\n").expect("write export");

        assert_eq!(read_to_string(&target).expect("read back"), "id,species\n1,wren\n");
        let siblings: Vec<_> = std::fs::read_dir(target.parent().expect("parent"))
            .expect("list directory")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(siblings, ["BIRDS_2024-04-01.csv"]);
    }

    #[rstest]
    fn atomic_write_replaces_existing_file(workspace: TempDir) {
        let target = utf8(&workspace).join("form.json");
        write_file_atomically(&target, b"old").expect("first write");
        write_file_atomically(&target, b"new").expect("second write");
        assert_eq!(read_to_string(&target).expect("read back"), "new");
    }

    #[rstest]
    fn is_file_distinguishes_missing_and_directories(workspace: TempDir) {
        let root = utf8(&workspace);
        std::fs::create_dir(root.join("sub")).expect("create dir");
        assert!(!is_file(&root.join("missing.json")).expect("stat"));
        assert!(!is_file(&root.join("sub")).expect("stat"));
        write_file_atomically(&root.join("present.json"), b"{}").expect("write");
        assert!(is_file(&root.join("present.json")).expect("stat"));
    }

    #[rstest]
    fn path_without_file_name_is_rejected() {
        let err = write_file_atomically(Utf8Path::new("/"), b"x").expect_err("no file name");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
