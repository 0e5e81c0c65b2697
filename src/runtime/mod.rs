//! The embeddable host runtime.
//!
//! `Runtime` owns the isolate, the global context and the script-thread half
//! of the task queue. The worker half ([`TaskPool`]) is returned alongside
//! and must be spawned onto a tokio runtime by the embedder:
//!
//! ```ignore
//! let (mut runtime, pool) = Runtime::new(library);
//! tokio::spawn(pool.run());
//! runtime.evaluate(code)?;
//! runtime.run_until_idle().await;
//! ```
//!
//! Script-visible callbacks are dispatched with run-to-completion semantics:
//! `process_callbacks` drains whatever completions have arrived, runs each
//! to the end on this thread, then performs a microtask checkpoint.

pub mod bindings;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use tokio::sync::{Notify, mpsc};

use crate::current::CurrentBindings;
use crate::error::BridgeError;
use crate::finalizer::FinalizerRegistry;
use crate::handle::SlotId;
use crate::media::MediaLibrary;
use crate::persistent::PendingTask;
use crate::platform;
use crate::task::{self, CompletionMessage, CompletionSender, TaskQueue};

/// Shared bridge state: the native library, the finalizer registry and the
/// current-resource record. One per runtime, reference-counted into binding
/// state and finalizer closures.
pub struct BridgeState {
    pub(crate) library: Arc<dyn MediaLibrary>,
    pub(crate) finalizers: FinalizerRegistry,
    pub(crate) current: RefCell<CurrentBindings>,
    next_slot: Cell<SlotId>,
}

impl BridgeState {
    fn new(library: Arc<dyn MediaLibrary>) -> Self {
        Self {
            library,
            finalizers: FinalizerRegistry::new(),
            current: RefCell::new(CurrentBindings::new()),
            next_slot: Cell::new(1),
        }
    }

    pub fn library(&self) -> &Arc<dyn MediaLibrary> {
        &self.library
    }

    pub(crate) fn next_slot_id(&self) -> SlotId {
        let id = self.next_slot.get();
        self.next_slot.set(id + 1);
        id
    }
}

/// The worker half of the task queue. Spawn [`TaskPool::run`] onto a tokio
/// runtime; it exits when the owning `Runtime` is dropped.
pub struct TaskPool {
    scheduler_rx: mpsc::UnboundedReceiver<task::SchedulerMessage>,
    completion_tx: CompletionSender,
}

impl TaskPool {
    pub async fn run(self) {
        task::run_task_pool(self.scheduler_rx, self.completion_tx).await;
    }
}

pub struct Runtime {
    context: v8::Global<v8::Context>,
    queue: TaskQueue,
    state: Rc<BridgeState>,
    callback_rx: mpsc::UnboundedReceiver<CompletionMessage>,
    callback_notify: Arc<Notify>,
    // Declared last: the handles above must drop while the isolate is alive.
    isolate: v8::OwnedIsolate,
}

impl Runtime {
    /// Create a runtime over the given native library, with all bridge
    /// bindings installed in a fresh context.
    pub fn new(library: Arc<dyn MediaLibrary>) -> (Self, TaskPool) {
        platform::init();

        let (scheduler_tx, scheduler_rx) = mpsc::unbounded_channel();
        let (callback_tx, callback_rx) = mpsc::unbounded_channel();
        let callback_notify = Arc::new(Notify::new());

        let queue = TaskQueue::new(scheduler_tx);
        let state = Rc::new(BridgeState::new(library));

        let mut isolate = v8::Isolate::new(Default::default());

        let context = {
            let scope = &mut v8::HandleScope::new(&mut isolate);
            let context = v8::Context::new(scope, Default::default());
            let scope = &mut v8::ContextScope::new(scope, context);

            bindings::install(scope, &state, &queue);

            v8::Global::new(scope, context)
        };

        let pool = TaskPool {
            scheduler_rx,
            completion_tx: CompletionSender::new(callback_tx, callback_notify.clone()),
        };

        let runtime = Self {
            context,
            queue,
            state,
            callback_rx,
            callback_notify,
            isolate,
        };

        (runtime, pool)
    }

    /// Compile and run a script in the runtime's context.
    pub fn evaluate(&mut self, code: &str) -> Result<(), BridgeError> {
        let scope = &mut v8::HandleScope::new(&mut self.isolate);
        let context = v8::Local::new(scope, &self.context);
        let scope = &mut v8::ContextScope::new(scope, context);

        let code_str = v8::String::new(scope, code)
            .ok_or_else(|| BridgeError::Script("failed to create source string".to_string()))?;

        let tc = &mut v8::TryCatch::new(scope);

        let Some(script) = v8::Script::compile(tc, code_str, None) else {
            let msg = tc
                .exception()
                .and_then(|e| e.to_string(tc))
                .map(|s| s.to_rust_string_lossy(tc))
                .unwrap_or_else(|| "compile error".to_string());
            return Err(BridgeError::Script(msg));
        };

        if script.run(tc).is_none() {
            let msg = tc
                .exception()
                .and_then(|e| e.to_string(tc))
                .map(|s| s.to_rust_string_lossy(tc))
                .unwrap_or_else(|| "runtime error".to_string());
            return Err(BridgeError::Script(msg));
        }

        Ok(())
    }

    /// Drain completed tasks and dispatch their completion callbacks, each
    /// exactly once, then run the microtask checkpoint.
    pub fn process_callbacks(&mut self) {
        self.state.finalizers.prune();

        let pending = Rc::clone(self.queue.pending());

        while let Ok(msg) = self.callback_rx.try_recv() {
            let CompletionMessage::TaskDone(id, outcome) = msg;

            // Removal before dispatch is what makes the completion fire at
            // most once, even if the pool misbehaves and reposts an id.
            let Some(task) = pending.remove(id) else {
                tracing::warn!(task = id, "completion for unknown task");
                continue;
            };

            let PendingTask { complete, retained } = task;

            let scope = &mut v8::HandleScope::new(&mut self.isolate);
            let context = v8::Local::new(scope, &self.context);
            let scope = &mut v8::ContextScope::new(scope, context);
            let tc = &mut v8::TryCatch::new(scope);

            complete(tc, outcome, &retained);

            if tc.has_caught() {
                let msg = tc
                    .exception()
                    .and_then(|e| e.to_string(tc))
                    .map(|s| s.to_rust_string_lossy(tc));
                tracing::error!(task = id, error = ?msg, "completion callback threw");
            }

            drop(retained); // the task's pins release here, exactly once
            tracing::trace!(task = id, "task completed");
        }

        // Promises and queued microtasks resolve here, not in the middle of
        // a callback.
        self.isolate.perform_microtask_checkpoint();
    }

    /// Pump completions until no task is in flight.
    pub async fn run_until_idle(&mut self) {
        loop {
            self.process_callbacks();
            if self.queue.pending_tasks() == 0 {
                break;
            }
            self.callback_notify.notified().await;
        }
    }

    /// Ask V8 for a full collection, then prune finalized handles. Weak
    /// callbacks need two passes to both run and be reclaimed.
    pub fn collect_garbage(&mut self) {
        self.isolate.low_memory_notification();
        self.isolate.low_memory_notification();
        self.state.finalizers.prune();
    }

    pub fn pending_tasks(&self) -> usize {
        self.queue.pending_tasks()
    }

    /// Script values currently pinned across the async boundary.
    pub fn live_retained(&self) -> usize {
        self.queue.retained_counter().live()
    }

    /// Handles whose finalizer has not yet run.
    pub fn live_handles(&self) -> usize {
        self.state.finalizers.live_handles()
    }

    pub fn get_global_f64(&mut self, name: &str) -> Option<f64> {
        let scope = &mut v8::HandleScope::new(&mut self.isolate);
        let context = v8::Local::new(scope, &self.context);
        let scope = &mut v8::ContextScope::new(scope, context);

        let global = context.global(scope);
        let key = v8::String::new(scope, name)?;
        let value = global.get(scope, key.into())?;
        if value.is_undefined() {
            return None;
        }
        value.number_value(scope)
    }

    pub fn get_global_string(&mut self, name: &str) -> Option<String> {
        let scope = &mut v8::HandleScope::new(&mut self.isolate);
        let context = v8::Local::new(scope, &self.context);
        let scope = &mut v8::ContextScope::new(scope, context);

        let global = context.global(scope);
        let key = v8::String::new(scope, name)?;
        let value = global.get(scope, key.into())?;
        if value.is_undefined() || value.is_null() {
            return None;
        }
        value.to_string(scope).map(|s| s.to_rust_string_lossy(scope))
    }

    pub fn get_global_bool(&mut self, name: &str) -> Option<bool> {
        let scope = &mut v8::HandleScope::new(&mut self.isolate);
        let context = v8::Local::new(scope, &self.context);
        let scope = &mut v8::ContextScope::new(scope, context);

        let global = context.global(scope);
        let key = v8::String::new(scope, name)?;
        let value = global.get(scope, key.into())?;
        if value.is_undefined() {
            return None;
        }
        Some(value.boolean_value(scope))
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.queue.shutdown();

        // Everything holding V8 handles lets go while the isolate is still
        // alive; resources still owned by live handles are freed now, so
        // the finalizers that fire during isolate teardown find empty slots.
        self.queue.pending().clear();
        self.state.current.borrow_mut().clear();
        self.state.finalizers.release_all(self.state.library.as_ref());
    }
}
