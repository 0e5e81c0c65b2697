//! Small V8 construction helpers shared by the binding modules.

/// Create an ArrayBuffer from a Vec<u8> without copying, by handing the
/// allocation to V8 as a backing store.
pub(crate) fn create_array_buffer_from_vec<'s>(
    scope: &mut v8::HandleScope<'s>,
    data: Vec<u8>,
) -> v8::Local<'s, v8::ArrayBuffer> {
    if data.is_empty() {
        return v8::ArrayBuffer::new(scope, 0);
    }

    let backing_store = v8::ArrayBuffer::new_backing_store_from_vec(data).make_shared();
    v8::ArrayBuffer::with_backing_store(scope, &backing_store)
}

/// Read an argument as a string, with JS ToString coercion.
pub(crate) fn rust_string(
    scope: &mut v8::HandleScope,
    value: v8::Local<v8::Value>,
) -> Option<String> {
    let s = value.to_string(scope)?;
    Some(s.to_rust_string_lossy(scope))
}
