use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;

use pdf_renamer::app::{App, PreviewRequest};
use pdf_renamer::apply::ApplyAction;
use pdf_renamer::config::RenameOptions;
use pdf_renamer::domain::{Doi, NameStyle, PreviewStatus, file_name_of};
use pdf_renamer::error::RenamerError;
use pdf_renamer::extract::{PdfDocument, PdfLoader};
use pdf_renamer::planner::PlanResult;
use pdf_renamer::progress::{CancelFlag, NoopSink, ProgressEvent, ProgressSink};
use pdf_renamer::providers::crossref::{RegistryClient, RegistryRecord};
use pdf_renamer::task::{TaskMessage, spawn_apply, spawn_plan};

#[derive(Clone, Default)]
struct MockPdf {
    title: Option<String>,
    pages: Vec<String>,
}

impl PdfDocument for MockPdf {
    fn title(&self) -> Option<String> {
        self.title.clone()
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, index: usize) -> Result<String, RenamerError> {
        self.pages
            .get(index)
            .cloned()
            .ok_or_else(|| RenamerError::PdfRead(format!("no page {index}")))
    }
}

#[derive(Default)]
struct MockLoader {
    docs: HashMap<String, MockPdf>,
    opens: Mutex<usize>,
}

impl MockLoader {
    fn with(mut self, name: &str, title: Option<&str>, text: &str) -> Self {
        self.docs.insert(
            name.to_string(),
            MockPdf {
                title: title.map(str::to_string),
                pages: vec![text.to_string()],
            },
        );
        self
    }
}

impl PdfLoader for MockLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>, RenamerError> {
        *self.opens.lock().unwrap() += 1;
        self.docs
            .get(&file_name_of(path))
            .cloned()
            .map(|doc| Box::new(doc) as Box<dyn PdfDocument>)
            .ok_or_else(|| RenamerError::PdfRead(path.display().to_string()))
    }
}

#[derive(Default)]
struct MockRegistry {
    records: HashMap<String, RegistryRecord>,
    calls: Mutex<usize>,
}

impl MockRegistry {
    fn with(mut self, doi: &str, title: &str, year: i32) -> Self {
        self.records.insert(
            doi.to_string(),
            RegistryRecord {
                title: Some(title.to_string()),
                year: Some(year),
            },
        );
        self
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl RegistryClient for MockRegistry {
    fn lookup(&self, doi: &Doi) -> Result<RegistryRecord, RenamerError> {
        *self.calls.lock().unwrap() += 1;
        self.records
            .get(doi.as_str())
            .cloned()
            .ok_or_else(|| RenamerError::CrossrefHttp("connection refused".to_string()))
    }
}

impl RegistryClient for &MockRegistry {
    fn lookup(&self, doi: &Doi) -> Result<RegistryRecord, RenamerError> {
        MockRegistry::lookup(self, doi)
    }
}

fn options() -> RenameOptions {
    RenameOptions {
        sleep: 0.0,
        ..RenameOptions::default()
    }
}

fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, name.as_bytes()).unwrap();
    path
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn preview<L: PdfLoader, C: RegistryClient>(
    app: &App<L, C>,
    folder: &Path,
    options: RenameOptions,
) -> PlanResult {
    let request = PreviewRequest {
        folder: folder.to_path_buf(),
        recursive: false,
        options,
    };
    app.preview(&request, &NoopSink, &CancelFlag::new()).unwrap()
}

#[test]
fn untitled_pdf_is_skipped_or_moved() {
    let temp = tempfile::tempdir().unwrap();
    touch(temp.path(), "scan.pdf");
    let loader = MockLoader::default().with("scan.pdf", None, "printed in 2005");
    let app = App::new(loader, MockRegistry::default());

    let plan = preview(&app, temp.path(), options());
    let item = &plan.items[0];
    assert_eq!(item.status, PreviewStatus::Skip);
    assert!(!item.apply);
    assert_eq!(item.target_path, None);
    assert_eq!(item.year, Some(2005));

    let plan = preview(
        &app,
        temp.path(),
        RenameOptions {
            unmatched_dir: "_unmatched".to_string(),
            ..options()
        },
    );
    let item = &plan.items[0];
    assert_eq!(item.status, PreviewStatus::Move);
    assert!(item.apply);
    assert_eq!(
        item.target_path.as_deref(),
        Some(temp.path().join("_unmatched").join("scan.pdf").as_path())
    );
}

#[test]
fn embedded_title_and_text_year_build_the_name() {
    let temp = tempfile::tempdir().unwrap();
    touch(temp.path(), "paper.pdf");
    let loader = MockLoader::default().with(
        "paper.pdf",
        Some("A Study of Widgets"),
        "Received 2019, accepted 2020",
    );
    let app = App::new(loader, MockRegistry::default());

    let plan = preview(&app, temp.path(), options());
    assert_eq!(plan.items[0].status, PreviewStatus::Rename);
    assert_eq!(
        plan.items[0].target_name().as_deref(),
        Some("2020 - A Study of Widgets.pdf")
    );

    let plan = preview(
        &app,
        temp.path(),
        RenameOptions {
            style: NameStyle::Suffix,
            ..options()
        },
    );
    assert_eq!(
        plan.items[0].target_name().as_deref(),
        Some("A Study of Widgets (2020).pdf")
    );
}

#[test]
fn existing_target_name_gets_a_counter() {
    let temp = tempfile::tempdir().unwrap();
    touch(temp.path(), "paper.pdf");
    touch(temp.path(), "2020 - A Study of Widgets.pdf");
    let loader = MockLoader::default().with("paper.pdf", Some("A Study of Widgets"), "2020");
    let app = App::new(loader, MockRegistry::default());

    let plan = preview(&app, temp.path(), options());
    let paper = plan
        .items
        .iter()
        .find(|item| item.old_name == "paper.pdf")
        .unwrap();
    assert_eq!(
        paper.target_name().as_deref(),
        Some("2020 - A Study of Widgets (2).pdf")
    );
    // The other file cannot be read by the loader and keeps its name.
    assert_eq!(plan.count(PreviewStatus::Skip), 1);
}

#[test]
fn registry_values_override_local_guesses() {
    let temp = tempfile::tempdir().unwrap();
    touch(temp.path(), "x.pdf");
    let loader = MockLoader::default().with(
        "x.pdf",
        Some("Embedded Heading Here"),
        "doi:10.1234/abc.def). Copyright 2019",
    );
    let registry = MockRegistry::default().with("10.1234/abc.def", "Better Title", 2021);
    let app = App::new(loader, registry);

    let plan = preview(&app, temp.path(), options());
    let item = &plan.items[0];
    assert_eq!(item.doi.as_ref().map(Doi::as_str), Some("10.1234/abc.def"));
    assert_eq!(item.title.as_deref(), Some("Better Title"));
    assert_eq!(item.year, Some(2021));
    assert_eq!(item.target_name().as_deref(), Some("2021 - Better Title.pdf"));
}

#[test]
fn lookup_failure_falls_back_to_embedded_values() {
    let temp = tempfile::tempdir().unwrap();
    touch(temp.path(), "x.pdf");
    let loader = MockLoader::default().with(
        "x.pdf",
        Some("Embedded Heading Here"),
        "https://doi.org/10.5555/unknown 2018",
    );
    let app = App::new(loader, MockRegistry::default());

    let plan = preview(&app, temp.path(), options());
    assert_eq!(
        plan.items[0].target_name().as_deref(),
        Some("2018 - Embedded Heading Here.pdf")
    );
    assert_eq!(plan.lookups, 1);
}

#[test]
fn no_crossref_skips_the_registry() {
    let temp = tempfile::tempdir().unwrap();
    touch(temp.path(), "x.pdf");
    let loader = MockLoader::default().with("x.pdf", Some("Embedded Heading Here"), "10.1234/abc");
    let registry = MockRegistry::default().with("10.1234/abc", "Better Title", 2021);
    let app = App::new(loader, &registry);

    let plan = preview(
        &app,
        temp.path(),
        RenameOptions {
            no_crossref: true,
            ..options()
        },
    );
    assert_eq!(registry.calls(), 0);
    assert_eq!(plan.items[0].title.as_deref(), Some("Embedded Heading Here"));
}

#[test]
fn one_lookup_per_doi_per_run() {
    let temp = tempfile::tempdir().unwrap();
    touch(temp.path(), "a.pdf");
    touch(temp.path(), "b.pdf");
    let loader = MockLoader::default()
        .with("a.pdf", None, "see 10.1234/shared")
        .with("b.pdf", None, "reprint of 10.1234/shared");
    let registry = MockRegistry::default().with("10.1234/shared", "Shared Paper", 2011);
    let app = App::new(loader, &registry);

    let plan = preview(&app, temp.path(), options());
    assert_eq!(registry.calls(), 1);
    assert_eq!(plan.lookups, 1);
    let names: Vec<Option<String>> = plan.items.iter().map(|item| item.target_name()).collect();
    assert_eq!(
        names,
        vec![
            Some("2011 - Shared Paper.pdf".to_string()),
            Some("2011 - Shared Paper (2).pdf".to_string()),
        ]
    );

    // A new run starts with an empty cache.
    preview(&app, temp.path(), options());
    assert_eq!(registry.calls(), 2);
}

#[test]
fn colliding_names_are_all_distinct() {
    let temp = tempfile::tempdir().unwrap();
    let mut loader = MockLoader::default();
    for index in 0..6 {
        let name = format!("copy-{index}.pdf");
        touch(temp.path(), &name);
        loader = loader.with(&name, Some("Same Name Everywhere"), "2020");
    }
    let app = App::new(loader, MockRegistry::default());

    let plan = preview(&app, temp.path(), options());
    let mut names: Vec<String> = plan
        .items
        .iter()
        .filter_map(|item| item.target_name())
        .collect();
    assert_eq!(names.len(), 6);
    assert_eq!(names[0], "2020 - Same Name Everywhere.pdf");
    assert_eq!(names[5], "2020 - Same Name Everywhere (6).pdf");
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 6);
    let existing = listing(temp.path());
    assert!(names.iter().all(|name| !existing.contains(name)));
}

#[test]
fn already_well_named_file_is_left_alone() {
    let temp = tempfile::tempdir().unwrap();
    let path = touch(temp.path(), "2020 - A Study of Widgets.pdf");
    let loader = MockLoader::default().with(
        "2020 - A Study of Widgets.pdf",
        Some("A Study of Widgets"),
        "2020",
    );
    let app = App::new(loader, MockRegistry::default());

    let plan = preview(&app, temp.path(), options());
    let item = &plan.items[0];
    assert_eq!(item.status, PreviewStatus::Ok);
    assert!(!item.apply);
    assert_eq!(item.target_path, None);

    let summary = app.apply(&plan.items, false, &NoopSink, &CancelFlag::new());
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.renamed, 0);
    assert!(path.exists());
}

#[test]
fn planning_is_deterministic_and_read_only() {
    let temp = tempfile::tempdir().unwrap();
    touch(temp.path(), "a.pdf");
    touch(temp.path(), "b.pdf");
    touch(temp.path(), "c.pdf");
    let loader = MockLoader::default()
        .with("a.pdf", Some("Some Long Heading"), "2001")
        .with("b.pdf", Some("Some Long Heading"), "2001")
        .with("c.pdf", None, "");
    let app = App::new(loader, MockRegistry::default());
    let before = listing(temp.path());

    let first = preview(&app, temp.path(), options());
    let second = preview(&app, temp.path(), options());
    assert_eq!(first.items, second.items);
    assert_eq!(listing(temp.path()), before);
}

#[test]
fn dry_run_touches_nothing() {
    let temp = tempfile::tempdir().unwrap();
    touch(temp.path(), "a.pdf");
    touch(temp.path(), "b.pdf");
    let loader = MockLoader::default()
        .with("a.pdf", Some("Renamed Paper One"), "2001")
        .with("b.pdf", None, "");
    let app = App::new(loader, MockRegistry::default());
    let plan = preview(
        &app,
        temp.path(),
        RenameOptions {
            unmatched_dir: "_unmatched".to_string(),
            ..options()
        },
    );
    let before = listing(temp.path());

    let summary = app.apply(&plan.items, true, &NoopSink, &CancelFlag::new());
    assert!(summary.dry_run);
    assert_eq!(summary.renamed, 2);
    assert!(
        summary
            .outcomes
            .iter()
            .all(|outcome| outcome.action == ApplyAction::DryRun)
    );
    assert_eq!(listing(temp.path()), before);
}

#[test]
fn apply_renames_selected_rows_only() {
    let temp = tempfile::tempdir().unwrap();
    touch(temp.path(), "a.pdf");
    touch(temp.path(), "b.pdf");
    touch(temp.path(), "c.pdf");
    let loader = MockLoader::default()
        .with("a.pdf", Some("First Real Paper"), "2001")
        .with("b.pdf", Some("Second Real Paper"), "2002")
        .with("c.pdf", None, "");
    let app = App::new(loader, MockRegistry::default());
    let mut plan = preview(
        &app,
        temp.path(),
        RenameOptions {
            unmatched_dir: "_unmatched".to_string(),
            ..options()
        },
    );
    assert!(plan.items[1].set_apply(false));

    let summary = app.apply(&plan.items, false, &NoopSink, &CancelFlag::new());
    assert_eq!(summary.renamed, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(
        listing(temp.path()),
        vec!["2001 - First Real Paper.pdf", "_unmatched", "b.pdf"]
    );
    assert!(temp.path().join("_unmatched").join("c.pdf").exists());
}

#[test]
fn recursive_scan_ignores_the_unmatched_folder() {
    let temp = tempfile::tempdir().unwrap();
    fs::create_dir_all(temp.path().join("_unmatched")).unwrap();
    touch(&temp.path().join("_unmatched"), "old.pdf");
    fs::create_dir_all(temp.path().join("2019")).unwrap();
    touch(&temp.path().join("2019"), "nested.pdf");
    let loader = MockLoader::default().with("nested.pdf", Some("Nested Paper Heading"), "2019");
    let app = App::new(loader, MockRegistry::default());
    let request = PreviewRequest {
        folder: temp.path().to_path_buf(),
        recursive: true,
        options: RenameOptions {
            unmatched_dir: "_unmatched".to_string(),
            ..options()
        },
    };

    let plan = app
        .preview(&request, &NoopSink, &CancelFlag::new())
        .unwrap();
    assert_eq!(plan.items.len(), 1);
    assert_eq!(
        plan.items[0].target_path.as_deref(),
        Some(temp.path().join("2019").join("2019 - Nested Paper Heading.pdf").as_path())
    );
}

#[test]
fn missing_folder_is_reported_before_any_work() {
    let temp = tempfile::tempdir().unwrap();
    let loader = MockLoader::default();
    let app = App::new(loader, MockRegistry::default());
    let request = PreviewRequest {
        folder: temp.path().join("nope"),
        recursive: false,
        options: options(),
    };
    let err = app
        .preview(&request, &NoopSink, &CancelFlag::new())
        .unwrap_err();
    assert_matches!(err, RenamerError::InvalidFolder(_));
}

struct CancelAfterFirst {
    cancel: CancelFlag,
    events: Mutex<Vec<String>>,
}

impl ProgressSink for CancelAfterFirst {
    fn event(&self, event: ProgressEvent) {
        if matches!(
            event,
            ProgressEvent::ItemPlanned { .. } | ProgressEvent::ItemApplied { .. }
        ) {
            self.cancel.cancel();
        }
        self.events.lock().unwrap().push(event.message());
    }
}

#[test]
fn cancellation_stops_between_files() {
    let temp = tempfile::tempdir().unwrap();
    let mut loader = MockLoader::default();
    for name in ["a.pdf", "b.pdf", "c.pdf"] {
        touch(temp.path(), name);
        loader = loader.with(name, Some("Cancelled Batch Paper"), "2010");
    }
    let app = App::new(loader, MockRegistry::default());
    let request = PreviewRequest {
        folder: temp.path().to_path_buf(),
        recursive: false,
        options: options(),
    };

    let sink = CancelAfterFirst {
        cancel: CancelFlag::new(),
        events: Mutex::new(Vec::new()),
    };
    let plan = app.preview(&request, &sink, &sink.cancel).unwrap();
    assert!(plan.cancelled);
    assert_eq!(plan.total, 3);
    assert_eq!(plan.items.len(), 1);

    let full = preview(&app, temp.path(), options());
    sink.cancel.reset();
    let summary = app.apply(&full.items, false, &sink, &sink.cancel);
    assert!(summary.cancelled);
    assert_eq!(summary.renamed, 1);
    assert_eq!(
        listing(temp.path()),
        vec!["2010 - Cancelled Batch Paper.pdf", "b.pdf", "c.pdf"]
    );
}

#[test]
fn background_plan_streams_progress_then_result() {
    let temp = tempfile::tempdir().unwrap();
    touch(temp.path(), "a.pdf");
    touch(temp.path(), "b.pdf");
    let loader = MockLoader::default()
        .with("a.pdf", Some("Threaded Paper One"), "2015")
        .with("b.pdf", Some("Threaded Paper Two"), "2016");
    let app = Arc::new(App::new(loader, MockRegistry::default()));
    let request = PreviewRequest {
        folder: temp.path().to_path_buf(),
        recursive: false,
        options: options(),
    };

    let handle = spawn_plan(app, request);
    let mut planned_events = 0;
    let result = loop {
        match handle.recv() {
            Some(TaskMessage::Progress(ProgressEvent::ItemPlanned { .. })) => planned_events += 1,
            Some(TaskMessage::Progress(_)) => {}
            Some(TaskMessage::Planned(result)) => break result.unwrap(),
            Some(TaskMessage::Applied(_) | TaskMessage::Aborted(_)) | None => {
                panic!("plan task ended without a result")
            }
        }
    };
    handle.join();

    assert_eq!(planned_events, 2);
    assert_eq!(result.count(PreviewStatus::Rename), 2);
}

#[test]
fn background_apply_renames_and_reports_summary() {
    let temp = tempfile::tempdir().unwrap();
    touch(temp.path(), "a.pdf");
    touch(temp.path(), "b.pdf");
    let loader = MockLoader::default()
        .with("a.pdf", Some("Threaded Paper One"), "2015")
        .with("b.pdf", Some("Threaded Paper Two"), "2016");
    let app = Arc::new(App::new(loader, MockRegistry::default()));
    let plan = preview(app.as_ref(), temp.path(), options());

    let handle = spawn_apply(Arc::clone(&app), plan.items, false);
    let mut applied_events = 0;
    let summary = loop {
        match handle.recv() {
            Some(TaskMessage::Progress(ProgressEvent::ItemApplied { .. })) => applied_events += 1,
            Some(TaskMessage::Progress(_)) => {}
            Some(TaskMessage::Applied(summary)) => break summary,
            Some(TaskMessage::Planned(_) | TaskMessage::Aborted(_)) | None => {
                panic!("apply task ended without a summary")
            }
        }
    };
    handle.join();

    assert_eq!(applied_events, 2);
    assert_eq!(summary.renamed, 2);
    assert_eq!(summary.failed, 0);
    assert!(!summary.dry_run);
    assert_eq!(
        listing(temp.path()),
        vec!["2015 - Threaded Paper One.pdf", "2016 - Threaded Paper Two.pdf"]
    );
}

struct PanickingLoader;

impl PdfLoader for PanickingLoader {
    fn open(&self, _path: &Path) -> Result<Box<dyn PdfDocument>, RenamerError> {
        panic!("decoder crashed")
    }
}

#[test]
fn crashed_background_plan_still_ends_the_task() {
    let temp = tempfile::tempdir().unwrap();
    touch(temp.path(), "a.pdf");
    let app = Arc::new(App::new(PanickingLoader, MockRegistry::default()));
    let request = PreviewRequest {
        folder: temp.path().to_path_buf(),
        recursive: false,
        options: options(),
    };

    let handle = spawn_plan(app, request);
    let last = std::iter::from_fn(|| handle.recv())
        .find(TaskMessage::is_terminal);
    assert_matches!(
        last,
        Some(TaskMessage::Aborted(RenamerError::TaskAborted(reason))) if reason == "decoder crashed"
    );
    assert_matches!(handle.try_recv(), Err(RenamerError::TaskAborted(_)));
    handle.join();
}
