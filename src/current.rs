//! The process-wide "current resource" record.
//!
//! A rendering context bound to a window is a relationship, not an ownership
//! edge: the record below stores slot ids plus weak back-references to the
//! handle objects, so a bound resource can still be collected or explicitly
//! released. The record is mutated only on the script thread, at exactly
//! three transition points: bind (`make_current`), unbind
//! (`make_current(null, null)`), and release of a bound resource (take or
//! finalizer), which clears it via [`CurrentBindings::clear_if_bound`].
//!
//! The record lives inside the per-runtime bridge state and is passed to the
//! operations that need it; there is no hidden global.

use crate::handle::SlotId;

/// A lookup-only reference to a handle: the slot id identifies the resource,
/// the weak object reference recovers the script-visible wrapper.
pub struct SlotRef {
    pub(crate) id: SlotId,
    pub(crate) object: v8::Weak<v8::Object>,
}

impl SlotRef {
    pub fn id(&self) -> SlotId {
        self.id
    }

    /// The wrapper object, if the collector hasn't reclaimed it.
    pub fn to_local<'s>(&self, scope: &mut v8::HandleScope<'s>) -> Option<v8::Local<'s, v8::Object>> {
        self.object.to_local(scope)
    }
}

/// The active window/context pair, when one is bound.
pub struct RenderBinding {
    pub window: SlotRef,
    pub context: SlotRef,
}

/// Singleton record of current-resource state for one runtime.
#[derive(Default)]
pub struct CurrentBindings {
    render: Option<RenderBinding>,
}

impl CurrentBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_render(&mut self, window: SlotRef, context: SlotRef) {
        tracing::trace!(window = window.id, context = context.id, "bound render target");
        self.render = Some(RenderBinding { window, context });
    }

    pub fn unbind_render(&mut self) -> Option<RenderBinding> {
        self.render.take()
    }

    pub fn render(&self) -> Option<&RenderBinding> {
        self.render.as_ref()
    }

    pub fn is_context_current(&self, id: SlotId) -> bool {
        self.render.as_ref().is_some_and(|r| r.context.id == id)
    }

    /// Clear the binding if either side references the released slot.
    /// Returns whether anything was cleared.
    pub fn clear_if_bound(&mut self, id: SlotId) -> bool {
        let bound = self
            .render
            .as_ref()
            .is_some_and(|r| r.window.id == id || r.context.id == id);
        if bound {
            tracing::debug!(slot = id, "cleared current binding for released resource");
            self.render = None;
        }
        bound
    }

    /// Drop all bindings. Used at runtime shutdown.
    pub fn clear(&mut self) {
        self.render = None;
    }
}
