use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::RenamerError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Doi(String);

impl Doi {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Doi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Doi {
    type Err = RenamerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid = normalized.starts_with("10.")
            && normalized
                .split_once('/')
                .map(|(prefix, suffix)| prefix.len() > 3 && !suffix.is_empty())
                .unwrap_or(false);
        if !is_valid {
            return Err(RenamerError::InvalidDoi(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NameStyle {
    /// `2020 - Title.pdf`
    #[default]
    Prefix,
    /// `Title (2020).pdf`
    Suffix,
}

impl fmt::Display for NameStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameStyle::Prefix => write!(f, "prefix"),
            NameStyle::Suffix => write!(f, "suffix"),
        }
    }
}

impl FromStr for NameStyle {
    type Err = RenamerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "prefix" => Ok(NameStyle::Prefix),
            "suffix" => Ok(NameStyle::Suffix),
            _ => Err(RenamerError::InvalidOption(format!(
                "style must be prefix|suffix, got {value}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewStatus {
    Pending,
    Rename,
    Move,
    Ok,
    Skip,
}

impl PreviewStatus {
    pub fn is_actionable(self) -> bool {
        matches!(self, PreviewStatus::Rename | PreviewStatus::Move)
    }

    pub fn label(self) -> &'static str {
        match self {
            PreviewStatus::Pending => "pending",
            PreviewStatus::Rename => "rename",
            PreviewStatus::Move => "move",
            PreviewStatus::Ok => "ok",
            PreviewStatus::Skip => "skip",
        }
    }
}

impl fmt::Display for PreviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewItem {
    pub source_path: PathBuf,
    pub old_name: String,
    pub target_path: Option<PathBuf>,
    pub doi: Option<Doi>,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub status: PreviewStatus,
    pub reason: String,
    pub apply: bool,
}

impl PreviewItem {
    pub fn pending(source_path: &Path) -> Self {
        Self {
            source_path: source_path.to_path_buf(),
            old_name: file_name_of(source_path),
            target_path: None,
            doi: None,
            title: None,
            year: None,
            status: PreviewStatus::Pending,
            reason: "pending".to_string(),
            apply: false,
        }
    }

    pub fn target_name(&self) -> Option<String> {
        self.target_path.as_deref().map(file_name_of)
    }

    pub fn set_apply(&mut self, apply: bool) -> bool {
        if !self.status.is_actionable() {
            return false;
        }
        self.apply = apply;
        true
    }

    pub fn toggle_apply(&mut self) -> bool {
        let next = !self.apply;
        self.set_apply(next)
    }
}

pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
