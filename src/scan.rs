use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::RenamerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Dir,
    File,
    Other,
}

pub fn ensure_folder(folder: &Path) -> Result<(), RenamerError> {
    if folder.is_dir() {
        Ok(())
    } else {
        Err(RenamerError::InvalidFolder(folder.to_path_buf()))
    }
}

// Only a failure to list `folder` itself is an error; unreadable
// subdirectories are skipped.
pub fn collect_pdfs(
    folder: &Path,
    recursive: bool,
    exclude: Option<&str>,
) -> Result<Vec<PathBuf>, RenamerError> {
    ensure_folder(folder)?;
    walk(folder, recursive, exclude, list_dir)
}

fn walk<F>(
    folder: &Path,
    recursive: bool,
    exclude: Option<&str>,
    list: F,
) -> Result<Vec<PathBuf>, RenamerError>
where
    F: Fn(&Path) -> io::Result<Vec<(PathBuf, EntryKind)>>,
{
    let excluded = exclude.map(|name| folder.join(name));
    let mut found = Vec::new();
    let mut stack = vec![folder.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match list(&dir) {
            Ok(entries) => entries,
            Err(err) if dir == folder => {
                return Err(RenamerError::Filesystem(format!("{}: {err}", dir.display())));
            }
            Err(err) => {
                warn!("skipping unreadable folder {}: {err}", dir.display());
                continue;
            }
        };
        for (path, kind) in entries {
            match kind {
                EntryKind::Dir => {
                    if recursive && excluded.as_deref() != Some(path.as_path()) {
                        stack.push(path);
                    }
                }
                EntryKind::File if is_pdf(&path) => found.push(path),
                EntryKind::File | EntryKind::Other => {}
            }
        }
    }
    found.sort();
    Ok(found)
}

fn list_dir(dir: &Path) -> io::Result<Vec<(PathBuf, EntryKind)>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("skipping entry in {}: {err}", dir.display());
                continue;
            }
        };
        let kind = match entry.file_type() {
            Ok(kind) if kind.is_dir() => EntryKind::Dir,
            Ok(kind) if kind.is_file() => EntryKind::File,
            Ok(_) => EntryKind::Other,
            Err(err) => {
                debug!("skipping {}: {err}", entry.path().display());
                continue;
            }
        };
        entries.push((entry.path(), kind));
    }
    Ok(entries)
}

pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}
