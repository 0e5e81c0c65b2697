//! The asynchronous task queue.
//!
//! A task is a single-shot pairing of a *work* phase and a *completion*
//! phase. Work runs once on the blocking pool and may only touch primitive
//! data and raw resource pointers captured at construction — never script
//! state. Completion runs once on the script thread, strictly after work has
//! returned, converts the work output into script values and invokes the
//! caller's callback; then the task is gone and everything it retained is
//! released.
//!
//! Submission is fire-and-forget. If the scheduler loop is no longer
//! running, the task is destroyed synchronously — retained values and all —
//! and the caller gets an error instead of an orphaned task.
//!
//! Across distinct tasks there is no ordering guarantee; whatever the pool
//! schedules first completes first.

use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use tokio::sync::{Notify, mpsc};

use crate::error::BridgeError;
use crate::persistent::{PendingCompletions, PendingTask, Retained, RetainedCounter};

pub type TaskId = u64;

/// Type-erased output of a work phase.
pub type TaskOutput = Box<dyn Any + Send>;

/// What the completion phase receives.
///
/// `Failed` means the work phase itself was lost (it panicked or never ran);
/// a native operation that merely *returned* an error is an ordinary
/// `Completed` output carrying that error as data.
pub enum TaskOutcome {
    Completed(TaskOutput),
    Failed(String),
}

impl TaskOutcome {
    /// Recover the typed work output, folding loss and type mismatch into
    /// an error message suitable for the failure side of a callback.
    pub fn into_result<T: 'static>(self) -> Result<T, String> {
        match self {
            TaskOutcome::Completed(output) => match output.downcast::<T>() {
                Ok(value) => Ok(*value),
                Err(_) => Err("task produced an unexpected result type".to_string()),
            },
            TaskOutcome::Failed(msg) => Err(msg),
        }
    }
}

pub(crate) type WorkFn = Box<dyn FnOnce() -> TaskOutput + Send>;

pub type CompleteFn =
    Box<dyn for<'s> FnOnce(&mut v8::HandleScope<'s>, TaskOutcome, &[Retained])>;

fn discard_outcome(_: &mut v8::HandleScope, _: TaskOutcome, _: &[Retained]) {}

/// A unit of deferred work, built at submission time and never reused.
pub struct AsyncTask {
    work: WorkFn,
    complete: CompleteFn,
    retained: Vec<Retained>,
}

impl AsyncTask {
    pub fn new<W, O>(work: W) -> Self
    where
        W: FnOnce() -> O + Send + 'static,
        O: Send + 'static,
    {
        Self {
            work: Box::new(move || Box::new(work()) as TaskOutput),
            complete: Box::new(discard_outcome),
            retained: Vec::new(),
        }
    }

    /// Set the completion routine. It runs on the script thread, exactly
    /// once, regardless of how the work phase fared.
    pub fn on_complete<F>(mut self, complete: F) -> Self
    where
        F: for<'s> FnOnce(&mut v8::HandleScope<'s>, TaskOutcome, &[Retained]) + 'static,
    {
        self.complete = Box::new(complete);
        self
    }

    /// Pin a script value for the lifetime of the task. The completion
    /// routine sees retained values in the order they were added.
    pub fn retain(
        mut self,
        scope: &mut v8::HandleScope,
        counter: &RetainedCounter,
        value: v8::Local<v8::Value>,
    ) -> Self {
        self.retained.push(Retained::new(scope, counter, value));
        self
    }
}

pub(crate) enum SchedulerMessage {
    Submit(TaskId, WorkFn),
    Shutdown,
}

pub(crate) enum CompletionMessage {
    TaskDone(TaskId, TaskOutcome),
}

/// Completion channel sender that also wakes the script-thread pump.
#[derive(Clone)]
pub(crate) struct CompletionSender {
    tx: mpsc::UnboundedSender<CompletionMessage>,
    notify: Arc<Notify>,
}

impl CompletionSender {
    pub fn new(tx: mpsc::UnboundedSender<CompletionMessage>, notify: Arc<Notify>) -> Self {
        Self { tx, notify }
    }

    pub fn send(&self, msg: CompletionMessage) {
        if self.tx.send(msg).is_ok() {
            self.notify.notify_one();
        }
    }
}

/// Script-thread handle for submitting tasks. Cloneable; all clones share
/// the same pending map and id sequence.
#[derive(Clone)]
pub struct TaskQueue {
    scheduler_tx: mpsc::UnboundedSender<SchedulerMessage>,
    pending: Rc<PendingCompletions>,
    counter: RetainedCounter,
    next_id: Rc<Cell<TaskId>>,
}

impl TaskQueue {
    pub(crate) fn new(scheduler_tx: mpsc::UnboundedSender<SchedulerMessage>) -> Self {
        Self {
            scheduler_tx,
            pending: Rc::new(PendingCompletions::new()),
            counter: RetainedCounter::new(),
            next_id: Rc::new(Cell::new(1)),
        }
    }

    pub fn retained_counter(&self) -> &RetainedCounter {
        &self.counter
    }

    /// Hand the task to the worker pool.
    ///
    /// `Ok(id)`: the work phase will run exactly once, and the completion
    /// routine will fire exactly once after it. `Err`: the scheduler is
    /// gone; the task was destroyed before returning and its retained
    /// values are already released.
    pub fn submit(&self, task: AsyncTask) -> Result<TaskId, BridgeError> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        self.pending.insert(
            id,
            PendingTask {
                complete: task.complete,
                retained: task.retained,
            },
        );

        if self
            .scheduler_tx
            .send(SchedulerMessage::Submit(id, task.work))
            .is_err()
        {
            // Synchronous destruction: nothing of the task survives a
            // failed enqueue.
            drop(self.pending.remove(id));
            tracing::warn!(task = id, "task queue closed; task destroyed at submit");
            return Err(BridgeError::QueueClosed);
        }

        tracing::trace!(task = id, "task queued");
        Ok(id)
    }

    /// Tasks submitted but not yet completed.
    pub fn pending_tasks(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn pending(&self) -> &Rc<PendingCompletions> {
        &self.pending
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.scheduler_tx.send(SchedulerMessage::Shutdown);
    }
}

/// The scheduler half of the queue: receives submissions, runs each work
/// phase once on the blocking pool, and posts the outcome back to the
/// script thread.
pub(crate) async fn run_task_pool(
    mut scheduler_rx: mpsc::UnboundedReceiver<SchedulerMessage>,
    completion_tx: CompletionSender,
) {
    while let Some(msg) = scheduler_rx.recv().await {
        match msg {
            SchedulerMessage::Submit(id, work) => {
                let completion_tx = completion_tx.clone();

                tokio::spawn(async move {
                    let outcome = match tokio::task::spawn_blocking(work).await {
                        Ok(output) => TaskOutcome::Completed(output),
                        Err(err) => {
                            tracing::error!(task = id, error = %err, "work phase lost");
                            TaskOutcome::Failed(format!("work phase did not finish: {err}"))
                        }
                    };
                    completion_tx.send(CompletionMessage::TaskDone(id, outcome));
                });
            }
            SchedulerMessage::Shutdown => break,
        }
    }
}
