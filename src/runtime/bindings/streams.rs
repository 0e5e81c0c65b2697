//! Byte-stream and input-device bindings.
//!
//! Streams are owned resources with an asynchronous read path; input
//! devices belong to the library's input subsystem and surface as
//! borrowed-only handles.

use std::sync::Arc;

use bytes::Bytes;

use crate::handle;
use crate::media::{ByteStream, InputDevice, MediaError, SendPtr};
use crate::task::AsyncTask;
use crate::v8_helpers::{create_array_buffer_from_vec, rust_string};

use super::state::bridge_state;
use super::{error_first_args, invoke_callback, require_callback, throw_error};

pub(super) fn install(scope: &mut v8::HandleScope) {
    register_fn!(scope, "openStream", open_stream);
    register_fn!(scope, "readStream", read_stream);
    register_fn!(scope, "closeStream", close_stream);
    register_fn!(scope, "inputDevice", input_device);
    register_fn!(scope, "inputDeviceName", input_device_name);
}

fn open_stream(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    mut rv: v8::ReturnValue,
) {
    let Some(state) = bridge_state(scope) else {
        return;
    };
    let Some(path) = rust_string(scope, args.get(0)) else {
        return;
    };

    match state.bridge.library.open_stream(&path) {
        Ok(ptr) => rv.set(handle::hold(scope, &state.bridge, ptr.get())),
        Err(err) => {
            tracing::warn!(%err, "openStream failed");
            rv.set(v8::null(scope).into());
        }
    }
}

fn read_stream(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    _rv: v8::ReturnValue,
) {
    let Some(state) = bridge_state(scope) else {
        return;
    };

    let stream_val = args.get(0);
    let stream = match handle::peek::<ByteStream>(scope, stream_val) {
        Ok(ptr) => SendPtr::new(ptr),
        Err(err) => {
            throw_error(scope, &err);
            return;
        }
    };
    let len = args.get(1).uint32_value(scope).unwrap_or(0) as usize;
    let Some(callback) = require_callback(scope, args.get(2)) else {
        return;
    };

    let library = Arc::clone(&state.bridge.library);

    let task = AsyncTask::new(move || library.read_stream(stream, len))
        .on_complete(|scope, outcome, retained| {
            let result = outcome
                .into_result::<Result<Bytes, MediaError>>()
                .and_then(|r| r.map_err(|e| e.to_string()));

            let result = result.map(|data| {
                create_array_buffer_from_vec(scope, data.to_vec()).into()
            });
            let callback_args = error_first_args(scope, result);
            invoke_callback(scope, &retained[0], &callback_args);
        })
        .retain(scope, state.queue.retained_counter(), callback)
        .retain(scope, state.queue.retained_counter(), stream_val);

    if let Err(err) = state.queue.submit(task) {
        throw_error(scope, &err);
    }
}

fn close_stream(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    _rv: v8::ReturnValue,
) {
    let Some(state) = bridge_state(scope) else {
        return;
    };

    match handle::take::<ByteStream>(scope, &state.bridge, args.get(0)) {
        Ok(ptr) => state.bridge.library.close_stream(SendPtr::new(ptr)),
        Err(err) => throw_error(scope, &err),
    }
}

fn input_device(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    mut rv: v8::ReturnValue,
) {
    let Some(state) = bridge_state(scope) else {
        return;
    };
    let index = args.get(0).uint32_value(scope).unwrap_or(0);

    match state.bridge.library.input_device(index) {
        Ok(ptr) => rv.set(handle::hold_borrowed(scope, &state.bridge, ptr.get())),
        Err(err) => {
            tracing::warn!(%err, "inputDevice failed");
            rv.set(v8::null(scope).into());
        }
    }
}

fn input_device_name(
    scope: &mut v8::HandleScope,
    args: v8::FunctionCallbackArguments,
    mut rv: v8::ReturnValue,
) {
    let Some(state) = bridge_state(scope) else {
        return;
    };

    match handle::peek::<InputDevice>(scope, args.get(0)) {
        Ok(ptr) => {
            let name = state.bridge.library.input_device_name(SendPtr::new(ptr));
            if let Some(name) = v8::String::new(scope, &name) {
                rv.set(name.into());
            }
        }
        Err(err) => throw_error(scope, &err),
    }
}
