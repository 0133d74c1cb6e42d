//! Capability-based filesystem helpers for the content and user stores.
//!
//! Every operation resolves an ambient directory once via `cap-std` and then
//! works relative to it, so snapshot paths never escape the directory they
//! were opened against. Paths are UTF-8 throughout (`camino`).
#![forbid(unsafe_code)]

use std::io::{self, Write};
use std::path::Component;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

/// Suffix of the scratch file written before an atomic replace.
const TEMP_SUFFIX: &str = ".tmp";

/// Open the parent directory of `path` and return it with the final component.
///
/// # Errors
/// Fails when `path` has no file name or the parent cannot be opened.
pub fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other(format!("{path} should include a file name")))?
        .to_owned();
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}

/// Open `path` as a capability directory.
///
/// # Errors
/// Fails when the directory does not exist or cannot be opened.
pub fn open_dir(path: &Utf8Path) -> io::Result<fs_utf8::Dir> {
    fs_utf8::Dir::open_ambient_dir(path, ambient_authority())
}

/// Create `path` and any missing ancestors.
///
/// # Errors
/// Propagates I/O failures from directory creation.
pub fn ensure_dir(path: &Utf8Path) -> io::Result<()> {
    if path.as_str().is_empty() || path == Utf8Path::new("/") {
        return Ok(());
    }
    let (base_dir, relative) = base_dir_and_relative(path)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    base_dir.create_dir_all(&relative)
}

/// Ensure the parent directory for `path` exists.
///
/// # Errors
/// Propagates I/O failures from directory creation.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    path.parent().map_or(Ok(()), ensure_dir)
}

/// Whether `path` exists and is a regular file.
///
/// A missing parent directory reports `false`.
///
/// # Errors
/// Propagates I/O failures other than "not found".
pub fn is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = match open_dir_and_file(path) {
        Ok(found) => found,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    match dir.metadata(name.as_str()) {
        Ok(meta) => Ok(meta.is_file()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Read a UTF-8 file, returning `None` when it does not exist.
///
/// # Errors
/// Propagates I/O failures other than "not found".
pub fn read_optional_string(path: &Utf8Path) -> io::Result<Option<String>> {
    let (dir, name) = match open_dir_and_file(path) {
        Ok(found) => found,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    match dir.read_to_string(name.as_str()) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Open `path` for reading.
///
/// # Errors
/// Fails when the parent directory or the file cannot be opened.
pub fn open_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.open(name.as_str())
}

/// Replace `path` with `contents` so readers see either the old or the new
/// file, never a partial write.
///
/// The bytes go to a sibling scratch file which is flushed to disk and then
/// renamed over the target; the directory is flushed after the rename.
///
/// # Errors
/// Propagates I/O failures; the target is untouched when any step fails.
pub fn write_file_atomically(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    ensure_parent_dir(path)?;
    let (dir, name) = open_dir_and_file(path)?;
    let scratch = format!("{name}{TEMP_SUFFIX}");
    let written = write_synced(&dir, &scratch, contents);
    if let Err(err) = written.and_then(|()| dir.rename(scratch.as_str(), &dir, name.as_str())) {
        // Best effort; the scratch file may not exist.
        drop(dir.remove_file(scratch.as_str()));
        return Err(err);
    }
    // The target is already replaced; a failed flush must not report otherwise.
    drop(sync_open_dir(dir));
    Ok(())
}

fn write_synced(dir: &fs_utf8::Dir, name: &str, contents: &[u8]) -> io::Result<()> {
    let mut file = dir.create(name)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// Copy one file, creating the destination's parent directory if needed.
///
/// # Errors
/// Propagates I/O failures from opening either directory or copying.
pub fn copy_file(from: &Utf8Path, to: &Utf8Path) -> io::Result<u64> {
    ensure_parent_dir(to)?;
    let (from_dir, from_name) = open_dir_and_file(from)?;
    let (to_dir, to_name) = open_dir_and_file(to)?;
    from_dir.copy(from_name.as_str(), &to_dir, to_name.as_str())
}

/// Rename a file or directory. Both paths must be on the same filesystem.
///
/// Both parent directories are then flushed so the new entry survives a
/// power loss.
///
/// # Errors
/// Propagates I/O failures, including a non-empty directory at `to`.
pub fn rename(from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
    let (from_dir, from_name) = open_dir_and_file(from)?;
    let (to_dir, to_name) = open_dir_and_file(to)?;
    from_dir.rename(from_name.as_str(), &to_dir, to_name.as_str())?;
    // The entry has moved; a failed flush must not report otherwise.
    drop(sync_open_dir(to_dir));
    drop(sync_open_dir(from_dir));
    Ok(())
}

/// Flush the entries of directory `path` to disk.
///
/// # Errors
/// Fails when the directory cannot be opened or flushed.
pub fn sync_dir(path: &Utf8Path) -> io::Result<()> {
    sync_open_dir(open_dir(path)?)
}

#[cfg(unix)]
fn sync_open_dir(dir: fs_utf8::Dir) -> io::Result<()> {
    std::fs::File::from(std::os::fd::OwnedFd::from(dir)).sync_all()
}

// Directory handles cannot be flushed on this platform; renames are
// already durable once they return.
#[cfg(not(unix))]
fn sync_open_dir(dir: fs_utf8::Dir) -> io::Result<()> {
    drop(dir);
    Ok(())
}

/// Remove a directory tree; succeeds when it is already gone.
///
/// # Errors
/// Propagates I/O failures other than "not found".
pub fn remove_dir_all_if_exists(path: &Utf8Path) -> io::Result<()> {
    let (dir, name) = match open_dir_and_file(path) {
        Ok(found) => found,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    match dir.remove_dir_all(name.as_str()) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

/// Names of the entries directly inside `path`, sorted. A missing
/// directory has no entries.
///
/// # Errors
/// Propagates I/O failures other than "not found".
pub fn list_dir_names(path: &Utf8Path) -> io::Result<Vec<String>> {
    let dir = match open_dir(path) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let mut names = dir
        .entries()?
        .map(|entry| entry?.file_name())
        .collect::<io::Result<Vec<_>>>()?;
    names.sort_unstable();
    Ok(names)
}

/// Split an absolute or relative path into an ambient base directory and a
/// relative suffix suitable for capability calls.
///
/// # Errors
/// Fails when the path is not UTF-8 or the base directory cannot be opened.
pub fn base_dir_and_relative(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_path = path.as_std_path();

    let (base, relative) = match std_path.components().next() {
        // Windows drive or UNC prefix.
        Some(Component::Prefix(prefix)) => {
            let prefix_str = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            let base = Utf8PathBuf::from(prefix_str).join(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_path
                .strip_prefix(base.as_std_path())
                .or_else(|_| std_path.strip_prefix(prefix.as_os_str()))
                .map_err(|_| io::Error::other("failed to strip prefix from path"))?
                .to_path_buf();
            (base, relative)
        }
        Some(Component::RootDir) => {
            let base = Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_path
                .strip_prefix(base.as_std_path())
                .map_err(|_| io::Error::other("failed to strip root from absolute path"))?
                .to_path_buf();
            (base, relative)
        }
        _ => (Utf8PathBuf::from("."), std_path.to_path_buf()),
    };

    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    let relative =
        Utf8PathBuf::from_path_buf(relative).map_err(|_| io::Error::other("non-UTF-8 path"))?;
    Ok((dir, relative))
}
