use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{PreviewItem, file_name_of};
use crate::error::RenamerError;
use crate::naming::next_free_path;
use crate::progress::{CancelFlag, ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyAction {
    Renamed,
    DryRun,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    pub index: usize,
    pub source: PathBuf,
    pub target: Option<PathBuf>,
    pub action: ApplyAction,
    pub error: Option<String>,
}

impl ApplyOutcome {
    pub fn describe(&self) -> String {
        let source = file_name_of(&self.source);
        let target = self.target.as_deref().map(file_name_of).unwrap_or_default();
        match self.action {
            ApplyAction::Renamed => format!("[OK] {source} -> {target}"),
            ApplyAction::DryRun => format!("[DRY] {source} -> {target}"),
            ApplyAction::Skipped => format!("[SKIP] {source}"),
            ApplyAction::Failed => format!(
                "[FAIL] {source}: {}",
                self.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplySummary {
    pub total: usize,
    pub renamed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub dry_run: bool,
    pub outcomes: Vec<ApplyOutcome>,
}

impl ApplySummary {
    fn record(&mut self, outcome: ApplyOutcome) {
        match outcome.action {
            ApplyAction::Renamed | ApplyAction::DryRun => self.renamed += 1,
            ApplyAction::Skipped => self.skipped += 1,
            ApplyAction::Failed => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }
}

pub fn apply_changes(
    items: &[PreviewItem],
    dry_run: bool,
    sink: &dyn ProgressSink,
    cancel: &CancelFlag,
) -> ApplySummary {
    let total = items.len();
    let mut summary = ApplySummary {
        total,
        dry_run,
        ..ApplySummary::default()
    };

    for (offset, item) in items.iter().enumerate() {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }
        let index = offset + 1;
        sink.event(ProgressEvent::ItemStarted {
            index,
            total,
            path: item.source_path.clone(),
        });

        let outcome = apply_item(offset, item, dry_run);
        sink.event(ProgressEvent::ItemApplied {
            index,
            total,
            outcome: outcome.clone(),
        });
        summary.record(outcome);
    }

    info!(
        "apply finished: renamed={} skipped={} failed={} cancelled={}",
        summary.renamed, summary.skipped, summary.failed, summary.cancelled
    );
    summary
}

fn apply_item(index: usize, item: &PreviewItem, dry_run: bool) -> ApplyOutcome {
    let mut outcome = ApplyOutcome {
        index,
        source: item.source_path.clone(),
        target: item.target_path.clone(),
        action: ApplyAction::Skipped,
        error: None,
    };
    let Some(target) = item.target_path.as_deref().filter(|_| item.apply) else {
        return outcome;
    };

    if dry_run {
        info!("[DRY] {} -> {}", item.old_name, file_name_of(target));
        outcome.action = ApplyAction::DryRun;
        return outcome;
    }

    match move_file(&item.source_path, target) {
        Ok(final_target) => {
            info!("[OK] {} -> {}", item.old_name, file_name_of(&final_target));
            outcome.target = Some(final_target);
            outcome.action = ApplyAction::Renamed;
        }
        Err(err) => {
            warn!("[FAIL] {}: {err}", item.source_path.display());
            outcome.action = ApplyAction::Failed;
            outcome.error = Some(err.to_string());
        }
    }
    outcome
}

pub fn move_file(source: &Path, target: &Path) -> Result<PathBuf, RenamerError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            RenamerError::Filesystem(format!("create {}: {err}", parent.display()))
        })?;
    }
    let target = next_free_path(target);
    match fs::rename(source, &target) {
        Ok(()) => Ok(target),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            copy_across_devices(source, &target)?;
            Ok(target)
        }
        Err(err) => Err(RenamerError::Filesystem(format!(
            "rename {} -> {}: {err}",
            source.display(),
            target.display()
        ))),
    }
}

fn copy_across_devices(source: &Path, target: &Path) -> Result<(), RenamerError> {
    let parent = target
        .parent()
        .ok_or_else(|| RenamerError::Filesystem("invalid destination path".to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix(".pdf-renamer")
        .tempfile_in(parent)
        .map_err(|err| RenamerError::Filesystem(err.to_string()))?;
    fs::copy(source, temp.path()).map_err(|err| RenamerError::Filesystem(err.to_string()))?;
    temp.persist_noclobber(target)
        .map_err(|err| RenamerError::Filesystem(err.to_string()))?;
    fs::remove_file(source).map_err(|err| RenamerError::Filesystem(err.to_string()))?;
    Ok(())
}
