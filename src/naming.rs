use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::NameStyle;

const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const FALLBACK_STEM: &str = "untitled";

pub fn sanitize_filename(name: &str) -> String {
    let without_nul = name.replace('\0', "");
    let collapsed = without_nul.split_whitespace().collect::<Vec<_>>().join(" ");
    let replaced = collapsed
        .chars()
        .map(|ch| if INVALID_CHARS.contains(&ch) { '_' } else { ch })
        .collect::<String>();
    let trimmed = replaced.trim_end_matches(['.', ' ']).trim();
    if trimmed.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn build_stem(title: &str, year: Option<i32>, style: NameStyle) -> String {
    let title = sanitize_filename(title);
    match (year, style) {
        (Some(year), NameStyle::Prefix) => format!("{year} - {title}"),
        (Some(year), NameStyle::Suffix) => format!("{title} ({year})"),
        (None, _) => title,
    }
}

pub fn clamp_filename(stem: &str, extension: &str, max_len: usize) -> String {
    let max_stem = max_len.saturating_sub(extension.chars().count()).max(1);
    let stem = stem.trim();
    let stem = if stem.chars().count() > max_stem {
        stem.chars().take(max_stem).collect::<String>().trim_end().to_string()
    } else {
        stem.to_string()
    };
    format!("{stem}{extension}")
}

pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(idx) => name.split_at(idx),
    }
}

pub fn disambiguated_name(name: &str, counter: usize) -> String {
    let (stem, extension) = split_extension(name);
    format!("{stem} ({counter}){extension}")
}

#[derive(Debug, Default)]
pub struct ReservedNames {
    by_dir: HashMap<PathBuf, HashSet<String>>,
}

impl ReservedNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, path: &Path) -> PathBuf {
        self.claim_as(path, None)
    }

    pub fn claim_as(&mut self, path: &Path, current: Option<&str>) -> PathBuf {
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let reserved = self
            .by_dir
            .entry(dir.clone())
            .or_insert_with(|| snapshot_dir(&dir));

        let mut candidate = name.clone();
        let mut counter = 2;
        while reserved.contains(&candidate) && current != Some(candidate.as_str()) {
            candidate = disambiguated_name(&name, counter);
            counter += 1;
        }
        reserved.insert(candidate.clone());
        dir.join(candidate)
    }
}

fn snapshot_dir(dir: &Path) -> HashSet<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("cannot list {}: {err}", dir.display());
            return HashSet::new();
        }
    };
    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|kind| kind.is_file()).unwrap_or(false))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect()
}

/// Apply-time fallback: first `"stem (N).ext"` that does not exist on disk.
pub fn next_free_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut counter = 2;
    loop {
        let candidate = dir.join(disambiguated_name(&name, counter));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}
