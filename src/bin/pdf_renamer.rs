use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use pdf_renamer::app::{App, PreviewRequest};
use pdf_renamer::config::{CliOverrides, ConfigLoader, RenameOptions};
use pdf_renamer::domain::NameStyle;
use pdf_renamer::error::RenamerError;
use pdf_renamer::extract::LopdfLoader;
use pdf_renamer::output::{JsonOutput, OutputMode, TextOutput};
use pdf_renamer::progress::{CancelFlag, ProgressSink};
use pdf_renamer::providers::crossref::CrossrefClient;
use pdf_renamer::scan::ensure_folder;
use pdf_renamer::tui::{Settings, Tui};

#[derive(Parser)]
#[command(name = "pdf-renamer")]
#[command(about = "Rename PDFs to \"Year - Title.pdf\" using metadata, DOIs and Crossref")]
#[command(version, author)]
struct Cli {
    /// Folder containing the PDFs (optional with --gui)
    folder: Option<PathBuf>,

    /// Open the interactive preview
    #[arg(long)]
    gui: bool,

    #[arg(long)]
    recursive: bool,

    /// Show what would happen without renaming anything
    #[arg(long)]
    dry_run: bool,

    /// Pages of text to scan for a DOI and year
    #[arg(long)]
    pages: Option<usize>,

    /// Maximum file name length, extension included
    #[arg(long)]
    maxlen: Option<usize>,

    /// Seconds to wait after each Crossref request
    #[arg(long)]
    sleep: Option<f64>,

    /// Crossref request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[arg(long, value_enum)]
    style: Option<NameStyle>,

    #[arg(long)]
    no_crossref: bool,

    /// Move files without a usable title into this subfolder
    #[arg(long)]
    unmatched_dir: Option<String>,

    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the plan and the apply summary as JSON
    #[arg(long)]
    json: bool,

    #[arg(long)]
    user_agent: Option<String>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            pages: self.pages,
            maxlen: self.maxlen,
            style: self.style,
            no_crossref: self.no_crossref,
            sleep: self.sleep,
            timeout: self.timeout,
            unmatched_dir: self.unmatched_dir.clone(),
            user_agent: self.user_agent.clone(),
        }
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<RenamerError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &RenamerError) -> u8 {
    match error {
        error if error.is_configuration() => 2,
        RenamerError::CrossrefHttp(_) | RenamerError::Terminal(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match &cli.folder {
        Some(folder) => ensure_folder(folder)?,
        None if cli.gui => {}
        None => return Err(RenamerError::MissingFolder.into()),
    }
    let options = ConfigLoader::resolve(cli.config.as_deref(), &cli.overrides())?;

    let registry = CrossrefClient::from_options(&options)?;
    let app = App::new(LopdfLoader, registry);

    if cli.gui {
        let settings = Settings {
            folder: cli.folder.clone(),
            recursive: cli.recursive,
            options,
        };
        let summary = Tui::new(app, settings, cli.dry_run).run()?;
        if let Some(summary) = summary {
            TextOutput::print_apply(&summary);
        }
        return Ok(());
    }

    let request = PreviewRequest {
        folder: cli.folder.clone().ok_or(RenamerError::MissingFolder)?,
        recursive: cli.recursive,
        options,
    };

    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    run_batch(&app, &request, cli.dry_run, mode)
}

fn run_batch(
    app: &App<LopdfLoader, CrossrefClient>,
    request: &PreviewRequest,
    dry_run: bool,
    mode: OutputMode,
) -> miette::Result<()> {
    let sink: &dyn ProgressSink = match mode {
        OutputMode::Text => &TextOutput,
        OutputMode::Json => &JsonOutput,
    };
    let cancel = CancelFlag::new();
    print_settings(request, dry_run, mode);

    let plan = app.preview(request, sink, &cancel)?;
    let summary = app.apply(&plan.items, dry_run, sink, &cancel);

    match mode {
        OutputMode::Text => {
            TextOutput::print_plan(&plan);
            TextOutput::print_apply(&summary);
        }
        OutputMode::Json => JsonOutput::print_run(&plan, &summary).into_diagnostic()?,
    }
    Ok(())
}

fn print_settings(request: &PreviewRequest, dry_run: bool, mode: OutputMode) {
    if mode != OutputMode::Text {
        return;
    }
    let RenameOptions {
        style,
        maxlen,
        pages,
        ..
    } = &request.options;
    println!(
        "Folder: {} (recursive={}, dry_run={dry_run})",
        request.folder.display(),
        request.recursive
    );
    println!(
        "Style: {style}, maxlen: {maxlen}, pages: {pages}, crossref: {}",
        if request.options.lookup_enabled() { "on" } else { "off" }
    );
    if let Some(dir) = request.options.unmatched_dir() {
        println!("Unmatched files go to: {dir}");
    }
}
