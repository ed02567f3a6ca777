use std::path::PathBuf;

use crate::apply::{ApplySummary, apply_changes};
use crate::config::RenameOptions;
use crate::domain::PreviewItem;
use crate::error::RenamerError;
use crate::extract::PdfLoader;
use crate::planner::{PlanResult, Planner};
use crate::progress::{CancelFlag, ProgressEvent, ProgressSink};
use crate::providers::crossref::RegistryClient;
use crate::scan::{collect_pdfs, ensure_folder};

#[derive(Debug, Clone)]
pub struct PreviewRequest {
    pub folder: PathBuf,
    pub recursive: bool,
    pub options: RenameOptions,
}

#[derive(Clone)]
pub struct App<L: PdfLoader, C: RegistryClient> {
    planner: Planner<L, C>,
}

impl<L: PdfLoader, C: RegistryClient> App<L, C> {
    pub fn new(loader: L, registry: C) -> Self {
        Self {
            planner: Planner::new(loader, registry),
        }
    }

    pub fn preview(
        &self,
        request: &PreviewRequest,
        sink: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> Result<PlanResult, RenamerError> {
        request.options.validate()?;
        ensure_folder(&request.folder)?;
        let files = collect_pdfs(
            &request.folder,
            request.recursive,
            request.options.unmatched_dir(),
        )?;
        sink.event(ProgressEvent::Log(format!(
            "found {} PDFs in {} (recursive={})",
            files.len(),
            request.folder.display(),
            request.recursive
        )));
        Ok(self
            .planner
            .plan(&request.folder, &files, &request.options, sink, cancel))
    }

    pub fn apply(
        &self,
        items: &[PreviewItem],
        dry_run: bool,
        sink: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> ApplySummary {
        apply_changes(items, dry_run, sink, cancel)
    }
}
