use std::collections::VecDeque;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, TableState, Wrap};

use crate::app::{App, PreviewRequest};
use crate::apply::ApplySummary;
use crate::config::RenameOptions;
use crate::domain::{NameStyle, PreviewItem, PreviewStatus};
use crate::error::RenamerError;
use crate::extract::PdfLoader;
use crate::progress::ProgressEvent;
use crate::providers::crossref::RegistryClient;
use crate::scan::{collect_pdfs, ensure_folder};
use crate::task::{TaskHandle, TaskMessage, spawn_apply, spawn_plan};

const LOGS_MAX: usize = 200;
const LOGS_VISIBLE: usize = 6;
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const KEYS: [&str; 2] = [
    "p plan  space toggle  a all  n none  i invert  d dry-run  enter apply  esc cancel  q quit",
    "f folder  g pages  m maxlen  u unmatched dir  R recursive  x crossref  s style",
];

type Backend = CrosstermBackend<Stdout>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
    Plan,
    Apply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Folder,
    Pages,
    Maxlen,
    UnmatchedDir,
}

impl Field {
    fn label(self) -> &'static str {
        match self {
            Field::Folder => "folder",
            Field::Pages => "pages",
            Field::Maxlen => "maxlen",
            Field::UnmatchedDir => "unmatched dir",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub folder: Option<PathBuf>,
    pub recursive: bool,
    pub options: RenameOptions,
}

impl Settings {
    pub fn request(&self) -> Option<PreviewRequest> {
        self.folder.as_ref().map(|folder| PreviewRequest {
            folder: folder.clone(),
            recursive: self.recursive,
            options: self.options.clone(),
        })
    }

    pub fn value(&self, field: Field) -> String {
        match field {
            Field::Folder => self
                .folder
                .as_ref()
                .map(|folder| folder.display().to_string())
                .unwrap_or_default(),
            Field::Pages => self.options.pages.to_string(),
            Field::Maxlen => self.options.maxlen.to_string(),
            Field::UnmatchedDir => self.options.unmatched_dir.clone(),
        }
    }

    // Leaves the settings untouched when the input is rejected.
    pub fn edit(&mut self, field: Field, input: &str) -> Result<(), RenamerError> {
        let input = input.trim();
        let mut options = self.options.clone();
        match field {
            Field::Folder => {
                if input.is_empty() {
                    return Err(RenamerError::MissingFolder);
                }
                let folder = PathBuf::from(input);
                ensure_folder(&folder)?;
                self.folder = Some(folder);
                return Ok(());
            }
            Field::Pages => options.pages = parse_count(field, input)?,
            Field::Maxlen => options.maxlen = parse_count(field, input)?,
            Field::UnmatchedDir => options.unmatched_dir = input.to_string(),
        }
        options.validate()?;
        self.options = options;
        Ok(())
    }

    pub fn toggle_recursive(&mut self) {
        self.recursive = !self.recursive;
    }

    pub fn toggle_crossref(&mut self) {
        self.options.no_crossref = !self.options.no_crossref;
    }

    pub fn toggle_style(&mut self) {
        self.options.style = match self.options.style {
            NameStyle::Prefix => NameStyle::Suffix,
            NameStyle::Suffix => NameStyle::Prefix,
        };
    }
}

fn parse_count(field: Field, input: &str) -> Result<usize, RenamerError> {
    input.parse().map_err(|_| {
        RenamerError::InvalidOption(format!(
            "{} must be a whole number, got {input:?}",
            field.label()
        ))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptOutcome {
    Editing,
    Submit,
    Cancel,
}

#[derive(Debug, Clone)]
struct Prompt {
    field: Field,
    input: String,
}

impl Prompt {
    fn new(field: Field, settings: &Settings) -> Self {
        Self {
            field,
            input: settings.value(field),
        }
    }

    fn handle(&mut self, code: KeyCode) -> PromptOutcome {
        match code {
            KeyCode::Enter => PromptOutcome::Submit,
            KeyCode::Esc => PromptOutcome::Cancel,
            KeyCode::Backspace => {
                self.input.pop();
                PromptOutcome::Editing
            }
            KeyCode::Char(ch) => {
                self.input.push(ch);
                PromptOutcome::Editing
            }
            _ => PromptOutcome::Editing,
        }
    }
}

pub struct Tui<L: PdfLoader, C: RegistryClient> {
    app: Arc<App<L, C>>,
    settings: Settings,
    prompt: Option<Prompt>,
    dry_run: bool,
    items: Vec<PreviewItem>,
    table: TableState,
    task: Option<(TaskKind, TaskHandle)>,
    progress: (usize, usize),
    status: String,
    logs: VecDeque<String>,
    last_summary: Option<ApplySummary>,
}

impl<L, C> Tui<L, C>
where
    L: PdfLoader + 'static,
    C: RegistryClient + 'static,
{
    pub fn new(app: App<L, C>, settings: Settings, dry_run: bool) -> Self {
        let prompt = settings
            .folder
            .is_none()
            .then(|| Prompt::new(Field::Folder, &settings));
        Self {
            app: Arc::new(app),
            settings,
            prompt,
            dry_run,
            items: Vec::new(),
            table: TableState::default(),
            task: None,
            progress: (0, 0),
            status: "ready".to_string(),
            logs: VecDeque::new(),
            last_summary: None,
        }
    }

    pub fn run(mut self) -> Result<Option<ApplySummary>, RenamerError> {
        enable_raw_mode().map_err(terminal_error)?;
        let mut stdout = io::stdout();
        if let Err(err) = stdout.execute(EnterAlternateScreen) {
            disable_raw_mode().ok();
            return Err(terminal_error(err));
        }

        let result = Terminal::new(CrosstermBackend::new(stdout))
            .map_err(terminal_error)
            .and_then(|mut terminal| self.event_loop(&mut terminal));

        disable_raw_mode().map_err(terminal_error)?;
        io::stdout()
            .execute(LeaveAlternateScreen)
            .map_err(terminal_error)?;
        result.map(|()| self.last_summary)
    }

    fn event_loop(&mut self, terminal: &mut Terminal<Backend>) -> Result<(), RenamerError> {
        terminal.clear().map_err(terminal_error)?;
        self.start_plan();
        loop {
            self.drain_messages();
            terminal
                .draw(|frame| self.draw(frame))
                .map_err(terminal_error)?;

            if event::poll(POLL_INTERVAL).map_err(terminal_error)? {
                if let Event::Key(key) = event::read().map_err(terminal_error)? {
                    if self.handle_key(key) {
                        break;
                    }
                }
            }
        }
        if let Some((_, task)) = self.task.take() {
            task.cancel();
            task.join();
        }
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.task.is_some()
    }

    fn start_plan(&mut self) {
        if self.is_busy() {
            return;
        }
        let Some(request) = self.settings.request() else {
            self.items.clear();
            self.table.select(None);
            self.status = "no folder selected, press f to choose one".to_string();
            return;
        };
        match collect_pdfs(
            &request.folder,
            request.recursive,
            request.options.unmatched_dir(),
        ) {
            Ok(files) => {
                self.items = files.iter().map(|path| PreviewItem::pending(path)).collect();
            }
            Err(err) => {
                self.items.clear();
                self.table.select(None);
                self.status = err.to_string();
                self.push_log(err.to_string());
                return;
            }
        }
        self.table.select(if self.items.is_empty() { None } else { Some(0) });
        self.progress = (0, self.items.len());
        self.status = format!("planning {} files", self.items.len());
        let handle = spawn_plan(self.app.clone(), request);
        self.task = Some((TaskKind::Plan, handle));
    }

    fn start_apply(&mut self) {
        if self.is_busy() {
            return;
        }
        let selected = self.items.iter().filter(|item| item.apply).count();
        if selected == 0 {
            self.status = "nothing selected".to_string();
            return;
        }
        self.progress = (0, self.items.len());
        self.status = if self.dry_run {
            format!("dry run over {selected} selected files")
        } else {
            format!("applying {selected} selected files")
        };
        let handle = spawn_apply(self.app.clone(), self.items.clone(), self.dry_run);
        self.task = Some((TaskKind::Apply, handle));
    }

    fn cancel(&mut self) {
        if let Some((_, task)) = &self.task {
            task.cancel();
            self.status = "cancelling...".to_string();
        }
    }

    fn drain_messages(&mut self) {
        let Some((kind, task)) = &self.task else {
            return;
        };
        let kind = *kind;
        let mut received = Vec::new();
        let mut finished = false;
        let mut lost = None;
        loop {
            match task.try_recv() {
                Ok(Some(message)) => {
                    finished = message.is_terminal();
                    received.push(message);
                    if finished {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    finished = true;
                    lost = Some(err);
                    break;
                }
            }
        }
        for message in received {
            self.handle_message(message);
        }
        if let Some(err) = lost {
            self.handle_message(TaskMessage::Aborted(err));
        }
        if !finished {
            return;
        }
        if let Some((_, task)) = self.task.take() {
            task.join();
        }
        if kind == TaskKind::Apply && !self.dry_run {
            self.start_plan();
        }
    }

    fn handle_message(&mut self, message: TaskMessage) {
        match message {
            TaskMessage::Progress(event) => {
                match &event {
                    ProgressEvent::FileStarted { index, total, .. }
                    | ProgressEvent::ItemStarted { index, total, .. } => {
                        self.progress = (index.saturating_sub(1), *total);
                    }
                    ProgressEvent::ItemPlanned { index, total, item } => {
                        self.progress = (*index, *total);
                        if let Some(row) = self
                            .items
                            .iter_mut()
                            .find(|row| row.source_path == item.source_path)
                        {
                            *row = item.clone();
                        }
                    }
                    ProgressEvent::ItemApplied { index, total, .. } => {
                        self.progress = (*index, *total);
                    }
                    ProgressEvent::Log(_) => {}
                }
                if !matches!(
                    event,
                    ProgressEvent::FileStarted { .. } | ProgressEvent::ItemStarted { .. }
                ) {
                    self.push_log(event.message());
                }
            }
            TaskMessage::Planned(Ok(result)) => {
                self.status = format!(
                    "planned {}/{}: rename={} move={} ok={} skip={}{}",
                    result.items.len(),
                    result.total,
                    result.count(PreviewStatus::Rename),
                    result.count(PreviewStatus::Move),
                    result.count(PreviewStatus::Ok),
                    result.count(PreviewStatus::Skip),
                    if result.cancelled { " (cancelled)" } else { "" }
                );
                if !result.cancelled {
                    self.items = result.items;
                }
                self.clamp_selection();
            }
            TaskMessage::Planned(Err(err)) | TaskMessage::Aborted(err) => {
                self.status = err.to_string();
                self.push_log(err.to_string());
            }
            TaskMessage::Applied(summary) => {
                self.status = format!(
                    "{}done: renamed={} skipped={} failed={}{}",
                    if summary.dry_run { "dry run " } else { "" },
                    summary.renamed,
                    summary.skipped,
                    summary.failed,
                    if summary.cancelled { " (cancelled)" } else { "" }
                );
                self.push_log(self.status.clone());
                self.last_summary = Some(summary);
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        if let Some(prompt) = self.prompt.as_mut() {
            match prompt.handle(key.code) {
                PromptOutcome::Editing => {}
                PromptOutcome::Cancel => self.prompt = None,
                PromptOutcome::Submit => {
                    if let Some(prompt) = self.prompt.take() {
                        self.submit(prompt);
                    }
                }
            }
            return false;
        }
        match key.code {
            KeyCode::Char('q') => return !self.is_busy(),
            KeyCode::Esc | KeyCode::Char('c') => {
                if self.is_busy() {
                    self.cancel();
                } else if key.code == KeyCode::Esc {
                    return true;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::PageUp => self.move_selection(-10),
            KeyCode::PageDown => self.move_selection(10),
            KeyCode::Char('p') | KeyCode::Char('r') => self.start_plan(),
            KeyCode::Enter => self.start_apply(),
            KeyCode::Char('d') if !self.is_busy() => {
                self.dry_run = !self.dry_run;
                self.status = format!("dry run {}", if self.dry_run { "on" } else { "off" });
            }
            KeyCode::Char(' ') if !self.is_busy() => {
                if let Some(item) = self.table.selected().and_then(|i| self.items.get_mut(i)) {
                    if !item.toggle_apply() {
                        self.status = format!("{} cannot be selected ({})", item.old_name, item.status);
                    }
                }
            }
            KeyCode::Char('a') if !self.is_busy() => select_all(&mut self.items, true),
            KeyCode::Char('n') if !self.is_busy() => select_all(&mut self.items, false),
            KeyCode::Char('i') if !self.is_busy() => invert_selection(&mut self.items),
            KeyCode::Char('f') if !self.is_busy() => self.open_prompt(Field::Folder),
            KeyCode::Char('g') if !self.is_busy() => self.open_prompt(Field::Pages),
            KeyCode::Char('m') if !self.is_busy() => self.open_prompt(Field::Maxlen),
            KeyCode::Char('u') if !self.is_busy() => self.open_prompt(Field::UnmatchedDir),
            KeyCode::Char('R') if !self.is_busy() => {
                self.settings.toggle_recursive();
                self.replan(format!("recursive {}", on_off(self.settings.recursive)));
            }
            KeyCode::Char('x') if !self.is_busy() => {
                self.settings.toggle_crossref();
                self.replan(format!(
                    "crossref {}",
                    on_off(self.settings.options.lookup_enabled())
                ));
            }
            KeyCode::Char('s') if !self.is_busy() => {
                self.settings.toggle_style();
                self.replan(format!("style {}", self.settings.options.style));
            }
            _ => {}
        }
        false
    }

    fn open_prompt(&mut self, field: Field) {
        self.prompt = Some(Prompt::new(field, &self.settings));
    }

    fn submit(&mut self, prompt: Prompt) {
        match self.settings.edit(prompt.field, &prompt.input) {
            Ok(()) => {
                let line = format!(
                    "{} set to {:?}",
                    prompt.field.label(),
                    self.settings.value(prompt.field)
                );
                self.replan(line);
            }
            Err(err) => {
                self.status = err.to_string();
                self.push_log(err.to_string());
            }
        }
    }

    fn replan(&mut self, line: String) {
        self.push_log(line);
        self.start_plan();
    }

    fn move_selection(&mut self, delta: isize) {
        if self.items.is_empty() {
            self.table.select(None);
            return;
        }
        let current = self.table.selected().unwrap_or(0) as isize;
        let last = self.items.len() as isize - 1;
        self.table.select(Some((current + delta).clamp(0, last) as usize));
    }

    fn clamp_selection(&mut self) {
        match self.items.len() {
            0 => self.table.select(None),
            len => {
                let current = self.table.selected().unwrap_or(0).min(len - 1);
                self.table.select(Some(current));
            }
        }
    }

    fn push_log(&mut self, line: String) {
        self.logs.push_back(line);
        while self.logs.len() > LOGS_MAX {
            self.logs.pop_front();
        }
    }

    fn draw(&mut self, frame: &mut ratatui::Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(6),
                Constraint::Length(3),
                Constraint::Length(LOGS_VISIBLE as u16 + 2),
                Constraint::Length(2),
            ])
            .split(frame.area());

        let header = Line::from(vec![
            Span::styled(
                "PDF-RENAMER",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
            Span::raw(format!(
                "   {}   recursive: {}   style: {}   crossref: {}   pages: {}   maxlen: {}   unmatched: {}   ",
                self.settings
                    .folder
                    .as_ref()
                    .map(|folder| folder.display().to_string())
                    .unwrap_or_else(|| "(no folder)".to_string()),
                on_off(self.settings.recursive),
                self.settings.options.style,
                on_off(self.settings.options.lookup_enabled()),
                self.settings.options.pages,
                self.settings.options.maxlen,
                self.settings.options.unmatched_dir().unwrap_or("-"),
            )),
            Span::styled(
                if self.dry_run { "DRY RUN" } else { "LIVE" },
                Style::default().fg(if self.dry_run { Color::Yellow } else { Color::Red }),
            ),
        ]);
        frame.render_widget(
            Paragraph::new(header).block(Block::default().borders(Borders::BOTTOM)),
            chunks[0],
        );

        let rows = self.items.iter().map(|item| {
            Row::new(vec![
                Cell::from(if item.apply { "[x]" } else { "[ ]" }),
                Cell::from(item.old_name.clone()),
                Cell::from(item.target_name().unwrap_or_default()),
                Cell::from(item.status.label())
                    .style(Style::default().fg(status_color(item.status))),
                Cell::from(item.doi.as_ref().map(|doi| doi.to_string()).unwrap_or_default()),
                Cell::from(item.year.map(|year| year.to_string()).unwrap_or_default()),
            ])
        });
        let table = Table::new(
            rows,
            [
                Constraint::Length(3),
                Constraint::Percentage(32),
                Constraint::Percentage(38),
                Constraint::Length(8),
                Constraint::Percentage(18),
                Constraint::Length(4),
            ],
        )
        .header(
            Row::new(vec!["", "Old name", "New name", "Status", "DOI", "Year"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title("Preview"))
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        frame.render_stateful_widget(table, chunks[1], &mut self.table);

        let (done, total) = self.progress;
        let ratio = if total == 0 {
            0.0
        } else {
            (done as f64 / total as f64).clamp(0.0, 1.0)
        };
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title(self.status.clone()))
            .gauge_style(Style::default().fg(Color::Cyan))
            .ratio(ratio)
            .label(format!("{done}/{total}"));
        frame.render_widget(gauge, chunks[2]);

        let start = self.logs.len().saturating_sub(LOGS_VISIBLE);
        let lines: Vec<Line> = self
            .logs
            .iter()
            .skip(start)
            .map(|line| Line::from(line.clone()))
            .collect();
        frame.render_widget(
            Paragraph::new(lines)
                .block(Block::default().borders(Borders::ALL).title("Log"))
                .wrap(Wrap { trim: true }),
            chunks[3],
        );

        let footer: Vec<Line> = match &self.prompt {
            Some(prompt) => vec![
                Line::from(vec![
                    Span::styled(
                        format!("{}: ", prompt.field.label()),
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(format!("{}_", prompt.input)),
                ]),
                Line::from(Span::styled(
                    "enter confirm  esc discard",
                    Style::default().fg(Color::Gray),
                )),
            ],
            None => KEYS
                .iter()
                .map(|keys| Line::from(Span::styled(*keys, Style::default().fg(Color::Gray))))
                .collect(),
        };
        frame.render_widget(Paragraph::new(footer), chunks[4]);
    }
}

pub fn select_all(items: &mut [PreviewItem], value: bool) {
    for item in items {
        item.set_apply(value);
    }
}

pub fn invert_selection(items: &mut [PreviewItem]) {
    for item in items {
        item.toggle_apply();
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

fn status_color(status: PreviewStatus) -> Color {
    match status {
        PreviewStatus::Pending => Color::Gray,
        PreviewStatus::Rename => Color::Green,
        PreviewStatus::Move => Color::Yellow,
        PreviewStatus::Ok => Color::Cyan,
        PreviewStatus::Skip => Color::DarkGray,
    }
}

fn terminal_error(err: io::Error) -> RenamerError {
    RenamerError::Terminal(err.to_string())
}
