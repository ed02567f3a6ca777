use std::io::{self, Write};

use serde::Serialize;

use crate::apply::ApplySummary;
use crate::domain::PreviewStatus;
use crate::planner::PlanResult;
use crate::progress::{ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_plan(result: &PlanResult) {
        println!(
            "planned {} of {} files: rename={} move={} ok={} skip={}{}",
            result.items.len(),
            result.total,
            result.count(PreviewStatus::Rename),
            result.count(PreviewStatus::Move),
            result.count(PreviewStatus::Ok),
            result.count(PreviewStatus::Skip),
            if result.cancelled { " (cancelled)" } else { "" }
        );
    }

    pub fn print_apply(summary: &ApplySummary) {
        let mode = if summary.dry_run { " (dry run)" } else { "" };
        println!("Done{mode}.");
        println!("  total:   {}", summary.total);
        println!("  renamed: {}", summary.renamed);
        println!("  skipped: {}", summary.skipped);
        println!("  failed:  {}", summary.failed);
        if summary.cancelled {
            println!("  cancelled before all items were processed");
        }
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FileStarted { .. } | ProgressEvent::ItemStarted { .. } => {}
            other => println!("{}", other.message()),
        }
    }
}

pub struct JsonOutput;

#[derive(Serialize)]
struct RunReport<'a> {
    plan: &'a PlanResult,
    apply: &'a ApplySummary,
}

impl JsonOutput {
    pub fn print_run(plan: &PlanResult, apply: &ApplySummary) -> io::Result<()> {
        Self::print_json(&RunReport { plan, apply })
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}
