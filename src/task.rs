use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use tracing::warn;

use crate::app::{App, PreviewRequest};
use crate::apply::ApplySummary;
use crate::domain::PreviewItem;
use crate::error::RenamerError;
use crate::extract::PdfLoader;
use crate::planner::PlanResult;
use crate::progress::{CancelFlag, ProgressEvent, ProgressSink};
use crate::providers::crossref::RegistryClient;

#[derive(Debug)]
pub enum TaskMessage {
    Progress(ProgressEvent),
    Planned(Result<PlanResult, RenamerError>),
    Applied(ApplySummary),
    Aborted(RenamerError),
}

impl TaskMessage {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskMessage::Progress(_))
    }
}

struct ChannelSink {
    sender: Sender<TaskMessage>,
}

impl ProgressSink for ChannelSink {
    fn event(&self, event: ProgressEvent) {
        // The receiver may already be gone if the front end quit.
        let _ = self.sender.send(TaskMessage::Progress(event));
    }
}

pub struct TaskHandle {
    receiver: Receiver<TaskMessage>,
    cancel: CancelFlag,
    handle: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// `Ok(None)` while the worker is still running without news. Once the
    /// channel is drained and the worker is gone, returns `TaskAborted`.
    pub fn try_recv(&self) -> Result<Option<TaskMessage>, RenamerError> {
        match self.receiver.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(RenamerError::TaskAborted(
                "worker exited without a result".to_string(),
            )),
        }
    }

    pub fn recv(&self) -> Option<TaskMessage> {
        self.receiver.recv().ok()
    }

    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

fn spawn<F>(cancel: CancelFlag, work: F) -> TaskHandle
where
    F: FnOnce(&dyn ProgressSink, &CancelFlag) -> TaskMessage + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    let worker_cancel = cancel.clone();
    let handle = thread::spawn(move || {
        let sink = ChannelSink {
            sender: sender.clone(),
        };
        let result = panic::catch_unwind(AssertUnwindSafe(|| work(&sink, &worker_cancel)))
            .unwrap_or_else(|payload| {
                let reason = panic_message(payload.as_ref());
                warn!("background task panicked: {reason}");
                TaskMessage::Aborted(RenamerError::TaskAborted(reason))
            });
        let _ = sender.send(result);
    });
    TaskHandle {
        receiver,
        cancel,
        handle: Some(handle),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}

pub fn spawn_plan<L, C>(app: Arc<App<L, C>>, request: PreviewRequest) -> TaskHandle
where
    L: PdfLoader + 'static,
    C: RegistryClient + 'static,
{
    spawn(CancelFlag::new(), move |sink, cancel| {
        TaskMessage::Planned(app.preview(&request, sink, cancel))
    })
}

pub fn spawn_apply<L, C>(app: Arc<App<L, C>>, items: Vec<PreviewItem>, dry_run: bool) -> TaskHandle
where
    L: PdfLoader + 'static,
    C: RegistryClient + 'static,
{
    spawn(CancelFlag::new(), move |sink, cancel| {
        TaskMessage::Applied(app.apply(&items, dry_run, sink, cancel))
    })
}
