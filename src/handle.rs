//! The resource handle / ownership protocol.
//!
//! Every manually-freed native resource crosses into script space through the
//! same three operations:
//!
//! - [`hold`] wraps a freshly created pointer into a script-visible handle
//!   object and registers its finalizer. A null pointer becomes JS `null`.
//! - [`peek`] borrows the pointer back out without touching ownership.
//! - [`take`] transfers ownership out, emptying the handle's slot so no
//!   later caller (including the finalizer) can obtain the pointer again.
//!
//! A handle object carries exactly one mutable slot, stashed behind a
//! `v8::External` under a private key so script code cannot forge or detach
//! it. The slot goes non-null to null at most once, which is what makes
//! double frees structurally impossible rather than merely guarded against.
//!
//! Borrowed-only resources get the same wrapper via [`hold_borrowed`]; their
//! slots carry no free routine and [`take`] refuses them.

use std::cell::Cell;
use std::ffi::c_void;
use std::rc::Rc;

use crate::error::BridgeError;
use crate::media::MediaLibrary;
use crate::runtime::BridgeState;

pub type SlotId = u64;

/// A native pointee the bridge knows how to identify.
pub trait NativeType: 'static {
    /// Name used for type-checked unwrapping and in error messages.
    const TYPE_NAME: &'static str;
}

/// A native pointee that script code can own, with its type-specific free
/// routine. Types without this impl (borrowed-only resources) can never have
/// ownership taken out of a handle, enforced at compile time.
pub trait OwnedNative: NativeType {
    fn free(library: &dyn MediaLibrary, ptr: *mut Self);
}

type FreeFn = fn(&dyn MediaLibrary, *mut c_void);

fn free_thunk<T: OwnedNative>(library: &dyn MediaLibrary, ptr: *mut c_void) {
    T::free(library, ptr as *mut T);
}

/// The single mutable slot inside a handle object.
///
/// Lives on the heap behind the handle's `v8::External`; released by the
/// handle's guaranteed finalizer, and only there.
pub(crate) struct HandleSlot {
    ptr: Cell<*mut c_void>,
    type_name: &'static str,
    free_fn: Option<FreeFn>,
    id: SlotId,
}

impl HandleSlot {
    pub(crate) fn id(&self) -> SlotId {
        self.id
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Empty the slot, returning what it held. At most one call ever
    /// returns a non-null pointer.
    pub(crate) fn clear(&self) -> *mut c_void {
        self.ptr.replace(std::ptr::null_mut())
    }

    pub(crate) fn free_fn(&self) -> Option<FreeFn> {
        self.free_fn
    }
}

fn slot_key<'s>(scope: &mut v8::HandleScope<'s>) -> v8::Local<'s, v8::Private> {
    let name = v8::String::new(scope, "mediabridge::slot").unwrap();
    v8::Private::for_api(scope, Some(name))
}

/// Wrap an owned native pointer into a handle, or return JS `null` for the
/// library's "no resource" sentinel.
pub fn hold<'s, T: OwnedNative>(
    scope: &mut v8::HandleScope<'s>,
    state: &Rc<BridgeState>,
    ptr: *mut T,
) -> v8::Local<'s, v8::Value> {
    new_handle(scope, state, ptr as *mut c_void, T::TYPE_NAME, Some(free_thunk::<T>))
}

/// Wrap a library-owned pointer. The wrapper mediates access but never
/// ownership: `take` on it fails and the finalizer releases only the
/// wrapper itself.
pub fn hold_borrowed<'s, T: NativeType>(
    scope: &mut v8::HandleScope<'s>,
    state: &Rc<BridgeState>,
    ptr: *mut T,
) -> v8::Local<'s, v8::Value> {
    new_handle(scope, state, ptr as *mut c_void, T::TYPE_NAME, None)
}

fn new_handle<'s>(
    scope: &mut v8::HandleScope<'s>,
    state: &Rc<BridgeState>,
    raw: *mut c_void,
    type_name: &'static str,
    free_fn: Option<FreeFn>,
) -> v8::Local<'s, v8::Value> {
    if raw.is_null() {
        return v8::null(scope).into();
    }

    let id = state.next_slot_id();
    let slot = Box::into_raw(Box::new(HandleSlot {
        ptr: Cell::new(raw),
        type_name,
        free_fn,
        id,
    }));

    let object = v8::Object::new(scope);
    let external = v8::External::new(scope, slot as *mut c_void);
    let key = slot_key(scope);
    object.set_private(scope, key, external.into());

    let finalizer_state = Rc::clone(state);
    let weak = v8::Weak::with_guaranteed_finalizer(
        scope,
        object,
        Box::new(move || finalize_slot(slot, &finalizer_state)),
    );
    state.finalizers.register(id, type_name, slot, weak);

    tracing::trace!(type_name, slot = id, "held native resource");
    object.into()
}

/// The per-handle finalizer body. Runs on the script thread, at GC time or
/// at isolate teardown, exactly once per handle.
///
/// Self-contained: it only touches the captured slot and bridge state, and
/// never assumes other script state is still live.
fn finalize_slot(slot: *mut HandleSlot, state: &Rc<BridgeState>) {
    // SAFETY: the finalizer is the sole owner of the slot box, runs once,
    // and nothing dereferences the slot after it (the handle object is
    // already unreachable).
    let slot = unsafe { Box::from_raw(slot) };
    let ptr = slot.clear();
    if !ptr.is_null()
        && let Some(free) = slot.free_fn()
    {
        state.current.borrow_mut().clear_if_bound(slot.id());
        tracing::debug!(type_name = slot.type_name(), slot = slot.id(), "finalizer freed resource");
        free(state.library.as_ref(), ptr);
    }
    state.finalizers.mark_finalized(slot.id());
}

fn slot_of<'s>(
    scope: &mut v8::HandleScope<'s>,
    value: v8::Local<v8::Value>,
) -> Option<&'s HandleSlot> {
    let object: v8::Local<v8::Object> = value.try_into().ok()?;
    let key = slot_key(scope);
    let slot_val = object.get_private(scope, key)?;
    if !slot_val.is_external() {
        return None;
    }
    let external: v8::Local<v8::External> = slot_val.try_into().ok()?;
    // SAFETY: the private key is crate-internal, so the external can only be
    // one we planted; the slot box outlives the handle object.
    Some(unsafe { &*(external.value() as *const HandleSlot) })
}

fn checked_slot<'s, T: NativeType>(
    scope: &mut v8::HandleScope<'s>,
    value: v8::Local<v8::Value>,
) -> Result<&'s HandleSlot, BridgeError> {
    let slot = slot_of(scope, value).ok_or(BridgeError::InvalidHandle {
        expected: T::TYPE_NAME,
    })?;
    if slot.type_name() != T::TYPE_NAME {
        return Err(BridgeError::InvalidHandle {
            expected: T::TYPE_NAME,
        });
    }
    Ok(slot)
}

/// Borrow the pointer out of a handle. Non-destructive; any number of peeks
/// observe the same pointer.
pub fn peek<T: NativeType>(
    scope: &mut v8::HandleScope,
    value: v8::Local<v8::Value>,
) -> Result<*mut T, BridgeError> {
    let slot = checked_slot::<T>(scope, value)?;
    let ptr = slot.ptr.get();
    if ptr.is_null() {
        return Err(BridgeError::Released {
            type_name: T::TYPE_NAME,
        });
    }
    Ok(ptr as *mut T)
}

/// Transfer ownership out of a handle.
///
/// The slot is emptied before the pointer is returned, so exactly one caller
/// ever receives it; that caller must release it exactly once through the
/// type's free routine (or hand it to a consuming native call). A second
/// `take`, or a `take` after finalization, reports [`BridgeError::Released`].
pub fn take<T: OwnedNative>(
    scope: &mut v8::HandleScope,
    state: &BridgeState,
    value: v8::Local<v8::Value>,
) -> Result<*mut T, BridgeError> {
    let slot = checked_slot::<T>(scope, value)?;
    if slot.free_fn().is_none() {
        return Err(BridgeError::NotOwned {
            type_name: T::TYPE_NAME,
        });
    }
    let ptr = slot.clear();
    if ptr.is_null() {
        return Err(BridgeError::Released {
            type_name: T::TYPE_NAME,
        });
    }
    // A resource leaving script ownership must not linger as the bound
    // "current" one.
    state.current.borrow_mut().clear_if_bound(slot.id());
    tracing::trace!(type_name = T::TYPE_NAME, slot = slot.id(), "took native resource");
    Ok(ptr as *mut T)
}

/// Slot id of a handle value, if it is one.
pub(crate) fn slot_id_of(
    scope: &mut v8::HandleScope,
    value: v8::Local<v8::Value>,
) -> Option<SlotId> {
    slot_of(scope, value).map(|slot| slot.id())
}

/// Slot id plus a weak back-reference to the handle object, for the
/// current-resource record. Lookup only; never an ownership edge.
pub(crate) fn slot_ref_of(
    scope: &mut v8::HandleScope,
    value: v8::Local<v8::Value>,
) -> Option<crate::current::SlotRef> {
    let object: v8::Local<v8::Object> = value.try_into().ok()?;
    let id = slot_of(scope, value)?.id();
    Some(crate::current::SlotRef {
        id,
        object: v8::Weak::new(scope, object),
    })
}
