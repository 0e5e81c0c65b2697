//! Shared state reachable from inside V8 callbacks.
//!
//! Native callbacks cannot capture, so the bridge state and the task queue
//! travel through a `v8::External` stored on the global object. Everything
//! in here is `Rc`, not `Arc`: `v8::Global` handles and the pending map are
//! script-thread only.

use std::rc::Rc;

use crate::runtime::BridgeState;
use crate::task::TaskQueue;

const STATE_KEY: &str = "__bridgeState";

/// State shared by every binding callback.
#[derive(Clone)]
pub struct BindingState {
    pub bridge: Rc<BridgeState>,
    pub queue: TaskQueue,
}

pub(super) fn store(scope: &mut v8::HandleScope, state: BindingState) {
    store_state!(scope, STATE_KEY, state);
}

/// Fetch the binding state stashed on the global object.
pub(crate) fn bridge_state<'s>(scope: &mut v8::HandleScope<'s>) -> Option<&'s BindingState> {
    let global = scope.get_current_context().global(scope);
    let state_key = v8::String::new(scope, STATE_KEY)?;
    let state_val = global.get(scope, state_key.into())?;

    if !state_val.is_external() {
        return None;
    }

    let external: v8::Local<v8::External> = state_val.try_into().ok()?;
    let state_ptr = external.value() as *const BindingState;
    // SAFETY: the pointer was leaked by `store` and stays valid for the
    // life of the context.
    Some(unsafe { &*state_ptr })
}
