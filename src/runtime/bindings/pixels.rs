//! Pixel-surface bindings. Load, save and convert are blocking native
//! operations, so they run as tasks; the callback receives the result on
//! the script thread once the work phase is done.

use std::rc::Rc;
use std::sync::Arc;

use crate::handle;
use crate::media::{MediaError, PixelSurface, SendPtr, Window};
use crate::task::AsyncTask;
use crate::v8_helpers::rust_string;

use super::state::bridge_state;
use super::{error_first_args, invoke_callback, require_callback, throw_error};

pub(super) fn install(scope: &mut v8::HandleScope) {
    register_fn!(scope, "loadPixels", load_pixels);
    register_fn!(scope, "savePixels", save_pixels);
    register_fn!(scope, "convertPixels", convert_pixels);
    register_fn!(scope, "freePixels", free_pixels);
    register_fn!(scope, "surfaceOf", surface_of);
}

fn load_pixels(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    _rv: v8::ReturnValue,
) {
    let Some(state) = bridge_state(scope) else {
        return;
    };
    let Some(path) = rust_string(scope, args.get(0)) else {
        return;
    };
    let Some(callback) = require_callback(scope, args.get(1)) else {
        return;
    };

    let library = Arc::clone(&state.bridge.library);
    let bridge = Rc::clone(&state.bridge);

    let task = AsyncTask::new(move || library.load_surface(&path))
        .on_complete(move |scope, outcome, retained| {
            let result = outcome
                .into_result::<Result<SendPtr<PixelSurface>, MediaError>>()
                .and_then(|r| r.map_err(|e| e.to_string()));

            let result = result.map(|ptr| handle::hold(scope, &bridge, ptr.get()));
            let callback_args = error_first_args(scope, result);
            invoke_callback(scope, &retained[0], &callback_args);
        })
        .retain(scope, state.queue.retained_counter(), callback);

    if let Err(err) = state.queue.submit(task) {
        throw_error(scope, &err);
    }
}

fn save_pixels(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    _rv: v8::ReturnValue,
) {
    let Some(state) = bridge_state(scope) else {
        return;
    };

    let surface_val = args.get(0);
    let surface = match handle::peek::<PixelSurface>(scope, surface_val) {
        Ok(ptr) => SendPtr::new(ptr),
        Err(err) => {
            throw_error(scope, &err);
            return;
        }
    };
    let Some(path) = rust_string(scope, args.get(1)) else {
        return;
    };
    let Some(callback) = require_callback(scope, args.get(2)) else {
        return;
    };

    let library = Arc::clone(&state.bridge.library);

    // The surface handle is retained so the pointer captured above stays
    // alive for the whole work phase.
    let task = AsyncTask::new(move || library.save_surface(surface, &path))
        .on_complete(|scope, outcome, retained| {
            let result = outcome
                .into_result::<Result<(), MediaError>>()
                .and_then(|r| r.map_err(|e| e.to_string()));

            let result = result.map(|()| v8::null(scope).into());
            let callback_args = error_first_args(scope, result);
            invoke_callback(scope, &retained[0], &callback_args);
        })
        .retain(scope, state.queue.retained_counter(), callback)
        .retain(scope, state.queue.retained_counter(), surface_val);

    if let Err(err) = state.queue.submit(task) {
        throw_error(scope, &err);
    }
}

fn convert_pixels(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    _rv: v8::ReturnValue,
) {
    let Some(state) = bridge_state(scope) else {
        return;
    };

    let surface_val = args.get(0);
    let surface = match handle::peek::<PixelSurface>(scope, surface_val) {
        Ok(ptr) => SendPtr::new(ptr),
        Err(err) => {
            throw_error(scope, &err);
            return;
        }
    };
    let format = args.get(1).uint32_value(scope).unwrap_or(0);
    let Some(callback) = require_callback(scope, args.get(2)) else {
        return;
    };

    let library = Arc::clone(&state.bridge.library);
    let bridge = Rc::clone(&state.bridge);

    let task = AsyncTask::new(move || library.convert_surface(surface, format))
        .on_complete(move |scope, outcome, retained| {
            let result = outcome
                .into_result::<Result<SendPtr<PixelSurface>, MediaError>>()
                .and_then(|r| r.map_err(|e| e.to_string()));

            let result = result.map(|ptr| handle::hold(scope, &bridge, ptr.get()));
            let callback_args = error_first_args(scope, result);
            invoke_callback(scope, &retained[0], &callback_args);
        })
        .retain(scope, state.queue.retained_counter(), callback)
        .retain(scope, state.queue.retained_counter(), surface_val);

    if let Err(err) = state.queue.submit(task) {
        throw_error(scope, &err);
    }
}

fn free_pixels(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    _rv: v8::ReturnValue,
) {
    let Some(state) = bridge_state(scope) else {
        return;
    };

    match handle::take::<PixelSurface>(scope, &state.bridge, args.get(0)) {
        Ok(ptr) => state.bridge.library.free_surface(SendPtr::new(ptr)),
        Err(err) => throw_error(scope, &err),
    }
}

fn surface_of(
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

    match state.bridge.library.window_surface(SendPtr::new(window)) {
        Ok(ptr) => rv.set(handle::hold_borrowed(scope, &state.bridge, ptr.get())),
        Err(err) => {
            tracing::warn!(%err, "surfaceOf failed");
            rv.set(v8::null(scope).into());
        }
    }
}
