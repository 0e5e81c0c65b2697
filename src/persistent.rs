//! Keep-alive for script values that must survive an asynchronous boundary.
//!
//! A task's callback function, input handles and destination buffers are
//! unreachable from script roots while the task is in flight; [`Retained`]
//! pins each of them with a `v8::Global` until the completion phase is done.
//! The set of retained values is fixed when the task is built and released
//! exactly once, either after the completion callback returns or immediately
//! when submission fails.
//!
//! All of this is script-thread state: `v8::Global<Function>` must not be
//! dropped off-thread, so pending completions live in an `Rc<RefCell<..>>`
//! map rather than anything `Send`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::task::{CompleteFn, TaskId};

/// Shared live-count for retained values; lets embedders and tests assert
/// nothing leaked across the async boundary.
#[derive(Clone, Default)]
pub struct RetainedCounter(Rc<Cell<usize>>);

impl RetainedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live(&self) -> usize {
        self.0.get()
    }
}

/// One pinned script value.
pub struct Retained {
    value: v8::Global<v8::Value>,
    counter: RetainedCounter,
}

impl Retained {
    pub fn new(
        scope: &mut v8::HandleScope,
        counter: &RetainedCounter,
        value: v8::Local<v8::Value>,
    ) -> Self {
        counter.0.set(counter.0.get() + 1);
        Self {
            value: v8::Global::new(scope, value),
            counter: counter.clone(),
        }
    }

    pub fn open<'s>(&self, scope: &mut v8::HandleScope<'s>) -> v8::Local<'s, v8::Value> {
        v8::Local::new(scope, &self.value)
    }

    pub fn as_function<'s>(
        &self,
        scope: &mut v8::HandleScope<'s>,
    ) -> Option<v8::Local<'s, v8::Function>> {
        self.open(scope).try_into().ok()
    }
}

impl Drop for Retained {
    fn drop(&mut self) {
        self.counter.0.set(self.counter.0.get() - 1);
    }
}

/// A submitted task's script-thread half: its completion routine and the
/// values it retains.
pub(crate) struct PendingTask {
    pub complete: CompleteFn,
    pub retained: Vec<Retained>,
}

/// Map of in-flight tasks, keyed by task id. Entries are inserted at submit
/// and removed exactly once — at completion dispatch, or synchronously when
/// submission fails.
#[derive(Default)]
pub(crate) struct PendingCompletions {
    map: RefCell<HashMap<TaskId, PendingTask>>,
}

impl PendingCompletions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: TaskId, task: PendingTask) {
        self.map.borrow_mut().insert(id, task);
    }

    pub fn remove(&self, id: TaskId) -> Option<PendingTask> {
        self.map.borrow_mut().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.map.borrow().len()
    }

    /// Drop every pending entry, releasing its retained values. Used at
    /// runtime shutdown while the isolate is still alive.
    pub fn clear(&self) {
        self.map.borrow_mut().clear();
    }
}
