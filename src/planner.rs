use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::config::RenameOptions;
use crate::domain::{PreviewItem, PreviewStatus, file_name_of};
use crate::extract::{self, PdfLoader};
use crate::heuristics;
use crate::naming::{self, ReservedNames};
use crate::progress::{CancelFlag, ProgressEvent, ProgressSink};
use crate::providers::crossref::RegistryClient;
use crate::resolver::DoiResolver;

pub const PDF_EXTENSION: &str = ".pdf";

#[derive(Debug, Clone, Serialize)]
pub struct PlanResult {
    pub total: usize,
    pub cancelled: bool,
    pub lookups: usize,
    pub items: Vec<PreviewItem>,
}

impl PlanResult {
    pub fn count(&self, status: PreviewStatus) -> usize {
        self.items.iter().filter(|item| item.status == status).count()
    }
}

#[derive(Clone)]
pub struct Planner<L: PdfLoader, C: RegistryClient> {
    loader: L,
    registry: C,
}

impl<L: PdfLoader, C: RegistryClient> Planner<L, C> {
    pub fn new(loader: L, registry: C) -> Self {
        Self { loader, registry }
    }

    pub fn plan(
        &self,
        root: &Path,
        files: &[PathBuf],
        options: &RenameOptions,
        sink: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> PlanResult {
        let mut resolver = DoiResolver::new(&self.registry, options.sleep_duration());
        let mut reserved = ReservedNames::new();
        let unmatched_root = options.unmatched_dir().map(|dir| root.join(dir));
        let total = files.len();
        let mut items = Vec::with_capacity(total);
        let mut cancelled = false;

        for (offset, pdf) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let index = offset + 1;
            sink.event(ProgressEvent::FileStarted {
                index,
                total,
                path: pdf.clone(),
            });

            let item = self.plan_file(
                pdf,
                options,
                unmatched_root.as_deref(),
                &mut resolver,
                &mut reserved,
            );
            debug!("planned {}: {} ({})", item.old_name, item.status, item.reason);
            sink.event(ProgressEvent::ItemPlanned {
                index,
                total,
                item: item.clone(),
            });
            items.push(item);
        }

        PlanResult {
            total,
            cancelled,
            lookups: resolver.lookups(),
            items,
        }
    }

    fn plan_file(
        &self,
        pdf: &Path,
        options: &RenameOptions,
        unmatched_root: Option<&Path>,
        resolver: &mut DoiResolver<'_>,
        reserved: &mut ReservedNames,
    ) -> PreviewItem {
        let old_name = file_name_of(pdf);
        let extracted = extract::extract(&self.loader, pdf, options.pages);
        let doi = heuristics::extract_doi(&extracted.text);
        let year_guess = heuristics::extract_year(&extracted.text);

        let mut title = extracted.title;
        let mut year = None;
        if let Some(doi) = doi.as_ref().filter(|_| options.lookup_enabled()) {
            let record = resolver.resolve(doi);
            if record.title.is_some() {
                title = record.title;
            }
            if record.year.is_some() {
                year = record.year;
            }
        }
        let year = year.or(year_guess);

        let mut item = PreviewItem {
            source_path: pdf.to_path_buf(),
            old_name,
            target_path: None,
            doi,
            title: None,
            year,
            status: PreviewStatus::Skip,
            reason: "no title found".to_string(),
            apply: false,
        };

        let Some(title) = title else {
            if let Some(unmatched_root) = unmatched_root {
                item.target_path = Some(reserved.claim(&unmatched_root.join(&item.old_name)));
                item.status = PreviewStatus::Move;
                item.apply = true;
            }
            return item;
        };

        let stem = naming::build_stem(&title, year, options.style);
        let new_name = naming::clamp_filename(&stem, PDF_EXTENSION, options.maxlen);
        item.title = Some(title);

        let target = reserved.claim_as(&pdf.with_file_name(&new_name), Some(&item.old_name));
        if file_name_of(&target) == item.old_name {
            item.status = PreviewStatus::Ok;
            item.reason = "already good name".to_string();
            return item;
        }

        item.target_path = Some(target);
        item.status = PreviewStatus::Rename;
        item.reason = "ready".to_string();
        item.apply = true;
        item
    }
}
