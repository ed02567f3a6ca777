use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::apply::ApplyOutcome;
use crate::domain::PreviewItem;

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    FileStarted {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    ItemPlanned {
        index: usize,
        total: usize,
        item: PreviewItem,
    },
    ItemStarted {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    ItemApplied {
        index: usize,
        total: usize,
        outcome: ApplyOutcome,
    },
    Log(String),
}

impl ProgressEvent {
    pub fn message(&self) -> String {
        match self {
            ProgressEvent::FileStarted { index, total, path } => {
                format!("[{index}/{total}] reading {}", path.display())
            }
            ProgressEvent::ItemPlanned { index, total, item } => match item.target_name() {
                Some(target) => format!(
                    "[{index}/{total}] {} {} -> {target}",
                    item.status, item.old_name
                ),
                None => format!(
                    "[{index}/{total}] {} {} ({})",
                    item.status, item.old_name, item.reason
                ),
            },
            ProgressEvent::ItemStarted { index, total, path } => {
                format!("[{index}/{total}] applying {}", path.display())
            }
            ProgressEvent::ItemApplied {
                index,
                total,
                outcome,
            } => format!("[{index}/{total}] {}", outcome.describe()),
            ProgressEvent::Log(message) => message.clone(),
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
