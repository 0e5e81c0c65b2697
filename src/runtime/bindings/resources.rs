//! Window and rendering-context bindings, including the current-target
//! operations that mutate the singleton record.

use crate::handle;
use crate::media::{GlContext, SendPtr, Window};
use crate::v8_helpers::rust_string;

use super::state::bridge_state;
use super::throw_error;

pub(super) fn install(scope: &mut v8::HandleScope) {
    register_fn!(scope, "createWindow", create_window);
    register_fn!(scope, "destroyWindow", destroy_window);
    register_fn!(scope, "windowTitle", window_title);
    register_fn!(scope, "createContext", create_context);
    register_fn!(scope, "deleteContext", delete_context);
    register_fn!(scope, "makeCurrent", make_current);
    register_fn!(scope, "currentWindow", current_window);
    register_fn!(scope, "currentContext", current_context);
}

fn create_window(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    mut rv: v8::ReturnValue,
) {
    let Some(state) = bridge_state(scope) else {
        return;
    };

    let title = rust_string(scope, args.get(0)).unwrap_or_default();
    let width = args.get(1).uint32_value(scope).unwrap_or(0);
    let height = args.get(2).uint32_value(scope).unwrap_or(0);

    match state.bridge.library.create_window(&title, width, height) {
        Ok(ptr) => rv.set(handle::hold(scope, &state.bridge, ptr.get())),
        Err(err) => {
            tracing::warn!(%err, "createWindow failed");
            rv.set(v8::null(scope).into());
        }
    }
}

fn destroy_window(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    _rv: v8::ReturnValue,
) {
    let Some(state) = bridge_state(scope) else {
        return;
    };

    match handle::take::<Window>(scope, &state.bridge, args.get(0)) {
        Ok(ptr) => state.bridge.library.destroy_window(SendPtr::new(ptr)),
        Err(err) => throw_error(scope, &err),
    }
}

fn window_title(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    mut rv: v8::ReturnValue,
) {
    let Some(state) = bridge_state(scope) else {
        return;
    };

    match handle::peek::<Window>(scope, args.get(0)) {
        Ok(ptr) => {
            let title = state.bridge.library.window_title(SendPtr::new(ptr));
            if let Some(title) = v8::String::new(scope, &title) {
                rv.set(title.into());
            }
        }
        Err(err) => throw_error(scope, &err),
    }
}

fn create_context(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    mut rv: v8::ReturnValue,
) {
    let Some(state) = bridge_state(scope) else {
        return;
    };

    let window = match handle::peek::<Window>(scope, args.get(0)) {
        Ok(ptr) => ptr,
        Err(err) => {
            throw_error(scope, &err);
            return;
        }
    };

    match state.bridge.library.create_context(SendPtr::new(window)) {
        Ok(ptr) => rv.set(handle::hold(scope, &state.bridge, ptr.get())),
        Err(err) => {
            tracing::warn!(%err, "createContext failed");
            rv.set(v8::null(scope).into());
        }
    }
}

fn delete_context(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    _rv: v8::ReturnValue,
) {
    let Some(state) = bridge_state(scope) else {
        return;
    };

    let ctx_val = args.get(0);

    // Deleting the bound context unbinds it from its window first.
    if let Some(id) = handle::slot_id_of(scope, ctx_val) {
        let is_current = state.bridge.current.borrow().is_context_current(id);
        if is_current {
            state.bridge.library.clear_current();
            state.bridge.current.borrow_mut().unbind_render();
        }
    }

    match handle::take::<GlContext>(scope, &state.bridge, ctx_val) {
        Ok(ptr) => state.bridge.library.delete_context(SendPtr::new(ptr)),
        Err(err) => throw_error(scope, &err),
    }
}

fn make_current(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    mut rv: v8::ReturnValue,
) {
    let Some(state) = bridge_state(scope) else {
        return;
    };

    let win_val = args.get(0);
    let ctx_val = args.get(1);

    if win_val.is_null_or_undefined() && ctx_val.is_null_or_undefined() {
        state.bridge.library.clear_current();
        state.bridge.current.borrow_mut().unbind_render();
        rv.set_int32(0);
        return;
    }

    let window = match handle::peek::<Window>(scope, win_val) {
        Ok(ptr) => ptr,
        Err(err) => {
            throw_error(scope, &err);
            return;
        }
    };
    let context = match handle::peek::<GlContext>(scope, ctx_val) {
        Ok(ptr) => ptr,
        Err(err) => {
            throw_error(scope, &err);
            return;
        }
    };

    match state
        .bridge
        .library
        .make_current(SendPtr::new(window), SendPtr::new(context))
    {
        Ok(()) => {
            if let (Some(window_ref), Some(context_ref)) = (
                handle::slot_ref_of(scope, win_val),
                handle::slot_ref_of(scope, ctx_val),
            ) {
                state
                    .bridge
                    .current
                    .borrow_mut()
                    .bind_render(window_ref, context_ref);
            }
            rv.set_int32(0);
        }
        Err(err) => {
            tracing::warn!(%err, "makeCurrent failed");
            rv.set_int32(-1);
        }
    }
}

fn current_window(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    rv: v8::ReturnValue,
) {
    current_side(scope, args, rv, true);
}

fn current_context(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    rv: v8::ReturnValue,
) {
    current_side(scope, args, rv, false);
}

fn current_side(
    scope: &mut v8::HandleScope,
    _args: v8::FunctionCallbackArguments,
    mut rv: v8::ReturnValue,
    window_side: bool,
) {
    let Some(state) = bridge_state(scope) else {
        return;
    };

    let mut current = state.bridge.current.borrow_mut();
    let object = current.render().and_then(|binding| {
        let side = if window_side {
            &binding.window
        } else {
            &binding.context
        };
        side.to_local(scope)
    });

    // A dead back-reference means the resource was collected; the record
    // must not keep claiming something is bound.
    if current.render().is_some() && object.is_none() {
        current.unbind_render();
    }
    drop(current);

    match object {
        Some(object) => rv.set(object.into()),
        None => rv.set(v8::null(scope).into()),
    }
}
