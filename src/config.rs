use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::NameStyle;
use crate::error::RenamerError;

pub const DEFAULT_REGISTRY_BASE: &str = "https://api.crossref.org";
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenameOptions {
    pub pages: usize,
    pub maxlen: usize,
    pub style: NameStyle,
    pub no_crossref: bool,
    pub sleep: f64,
    pub timeout: u64,
    pub unmatched_dir: String,
    pub user_agent: String,
    pub registry_base: String,
}

impl Default for RenameOptions {
    fn default() -> Self {
        Self {
            pages: 2,
            maxlen: 140,
            style: NameStyle::Prefix,
            no_crossref: false,
            sleep: 0.2,
            timeout: 20,
            unmatched_dir: String::new(),
            user_agent: default_user_agent(),
            registry_base: DEFAULT_REGISTRY_BASE.to_string(),
        }
    }
}

impl RenameOptions {
    pub fn validate(&self) -> Result<(), RenamerError> {
        if self.maxlen == 0 {
            return Err(RenamerError::InvalidOption(
                "maxlen must be greater than 0".to_string(),
            ));
        }
        if !self.sleep.is_finite() || self.sleep < 0.0 {
            return Err(RenamerError::InvalidOption(format!(
                "sleep must be a non-negative number of seconds, got {}",
                self.sleep
            )));
        }
        if self.timeout == 0 {
            return Err(RenamerError::InvalidOption(
                "timeout must be at least 1 second".to_string(),
            ));
        }
        let unmatched = Path::new(self.unmatched_dir.trim());
        let mut components = unmatched.components();
        let plain = match (components.next(), components.next()) {
            (None, _) => true,
            (Some(Component::Normal(_)), None) => true,
            _ => false,
        };
        if !plain {
            return Err(RenamerError::InvalidOption(format!(
                "unmatched-dir must be a plain directory name, got {}",
                self.unmatched_dir
            )));
        }
        Ok(())
    }

    pub fn sleep_duration(&self) -> Duration {
        Duration::from_secs_f64(self.sleep.max(0.0))
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn unmatched_dir(&self) -> Option<&str> {
        let trimmed = self.unmatched_dir.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    pub fn lookup_enabled(&self) -> bool {
        !self.no_crossref
    }
}

pub fn default_user_agent() -> String {
    format!(
        "pdf-renamer/{} (mailto:unknown@example.com)",
        env!("CARGO_PKG_VERSION")
    )
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub pages: Option<usize>,
    #[serde(default)]
    pub maxlen: Option<usize>,
    #[serde(default)]
    pub style: Option<NameStyle>,
    #[serde(default)]
    pub no_crossref: Option<bool>,
    #[serde(default)]
    pub sleep: Option<f64>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub unmatched_dir: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub registry_base: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub pages: Option<usize>,
    pub maxlen: Option<usize>,
    pub style: Option<NameStyle>,
    pub no_crossref: bool,
    pub sleep: Option<f64>,
    pub timeout: Option<u64>,
    pub unmatched_dir: Option<String>,
    pub user_agent: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(
        path: Option<&Path>,
        overrides: &CliOverrides,
    ) -> Result<RenameOptions, RenamerError> {
        let file = match path {
            Some(path) => Some(Self::load(path)?),
            None => match user_config_path() {
                Some(path) if path.exists() => Some(Self::load(&path)?),
                _ => None,
            },
        };
        Self::resolve_config(file.unwrap_or_default(), overrides)
    }

    pub fn load(path: &Path) -> Result<ConfigFile, RenamerError> {
        let content =
            fs::read_to_string(path).map_err(|_| RenamerError::ConfigRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| RenamerError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(
        file: ConfigFile,
        overrides: &CliOverrides,
    ) -> Result<RenameOptions, RenamerError> {
        let defaults = RenameOptions::default();
        let options = RenameOptions {
            pages: overrides.pages.or(file.pages).unwrap_or(defaults.pages),
            maxlen: overrides.maxlen.or(file.maxlen).unwrap_or(defaults.maxlen),
            style: overrides.style.or(file.style).unwrap_or(defaults.style),
            no_crossref: overrides.no_crossref
                || file.no_crossref.unwrap_or(defaults.no_crossref),
            sleep: overrides.sleep.or(file.sleep).unwrap_or(defaults.sleep),
            timeout: overrides
                .timeout
                .or(file.timeout)
                .unwrap_or(defaults.timeout),
            unmatched_dir: overrides
                .unmatched_dir
                .clone()
                .or(file.unmatched_dir)
                .unwrap_or(defaults.unmatched_dir),
            user_agent: overrides
                .user_agent
                .clone()
                .or(file.user_agent)
                .unwrap_or(defaults.user_agent),
            registry_base: file
                .registry_base
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.registry_base),
        };
        options.validate()?;
        Ok(options)
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "pdf-renamer").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}
