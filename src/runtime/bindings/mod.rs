//! Native function bindings.
//!
//! This is the thin glue between script and the bridge core: one registered
//! function per protocol operation, nothing more. Callbacks are
//! zero-capture; shared state comes out of the global object via
//! [`state::bridge_state`].
//!
//! Asynchronous operations follow the error-first callback convention
//! uniformly: `cb(error, result)`, where `error` is `null` on success and a
//! message string on failure, and `result` is `null` whenever `error` isn't.

#[macro_use]
mod macros;

mod pixels;
mod resources;
mod state;
mod streams;

pub use state::BindingState;

use std::rc::Rc;

use crate::error::BridgeError;
use crate::persistent::Retained;
use crate::runtime::BridgeState;
use crate::task::TaskQueue;

/// Install every bridge binding into the current context.
pub(crate) fn install(scope: &mut v8::HandleScope, bridge: &Rc<BridgeState>, queue: &TaskQueue) {
    state::store(
        scope,
        BindingState {
            bridge: Rc::clone(bridge),
            queue: queue.clone(),
        },
    );

    resources::install(scope);
    pixels::install(scope);
    streams::install(scope);
}

/// Surface a bridge error to script as a catchable TypeError.
pub(crate) fn throw_error(scope: &mut v8::HandleScope, err: &BridgeError) {
    let msg = v8::String::new(scope, &err.to_string())
        .unwrap_or_else(|| v8::String::empty(scope));
    let exception = v8::Exception::type_error(scope, msg);
    scope.throw_exception(exception);
}

/// Build the `[error, result]` argument pair for an error-first callback.
pub(crate) fn error_first_args<'s>(
    scope: &mut v8::HandleScope<'s>,
    result: Result<v8::Local<'s, v8::Value>, String>,
) -> [v8::Local<'s, v8::Value>; 2] {
    match result {
        Ok(value) => [v8::null(scope).into(), value],
        Err(msg) => {
            let err = v8::String::new(scope, &msg).unwrap_or_else(|| v8::String::empty(scope));
            [err.into(), v8::null(scope).into()]
        }
    }
}

/// Validate that an argument is a callable, throwing a TypeError otherwise.
pub(crate) fn require_callback<'s>(
    scope: &mut v8::HandleScope,
    value: v8::Local<'s, v8::Value>,
) -> Option<v8::Local<'s, v8::Value>> {
    if value.is_function() {
        return Some(value);
    }
    let msg = v8::String::new(scope, "callback must be a function").unwrap();
    let exception = v8::Exception::type_error(scope, msg);
    scope.throw_exception(exception);
    None
}

/// Invoke a retained callback function with the given arguments. A retained
/// value that is not a function is ignored — callers that omit a callback
/// simply never observe the result.
pub(crate) fn invoke_callback(
    scope: &mut v8::HandleScope,
    callback: &Retained,
    args: &[v8::Local<v8::Value>],
) {
    if let Some(function) = callback.as_function(scope) {
        let recv = v8::undefined(scope);
        function.call(scope, recv.into(), args);
    }
}
