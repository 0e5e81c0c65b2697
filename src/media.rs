//! The native multimedia library, seen from the bridge.
//!
//! The bridge never implements windowing, rendering or decoding itself; it
//! brokers an external library that hands out manually-freed resources. That
//! collaborator is expressed here as the [`MediaLibrary`] trait over a set of
//! opaque pointee types, so the rest of the crate can stay generic and tests
//! can substitute a counting stub.
//!
//! Resource pointers are raw on purpose: their lifecycle is governed by the
//! handle protocol in [`crate::handle`], not by Rust ownership.

use bytes::Bytes;
use thiserror::Error;

use crate::handle::{NativeType, OwnedNative};

/// An OS window. Freed with [`MediaLibrary::destroy_window`].
pub enum Window {}

/// A rendering context created against a [`Window`].
pub enum GlContext {}

/// A pixel buffer (decoded image, window backing store).
pub enum PixelSurface {}

/// A seekable byte stream.
pub enum ByteStream {}

/// An input device. Owned by the library's input subsystem; script code only
/// ever borrows these.
pub enum InputDevice {}

/// A raw resource pointer that may cross into a work phase.
///
/// Sending the pointer to another thread is safe; dereferencing it is not,
/// and stays the library's business.
pub struct SendPtr<T>(*mut T);

// SAFETY: SendPtr carries the address only. The handle protocol guarantees
// the pointee stays alive for as long as a task that captured it can run
// (the task retains the owning handle), and the library performs the actual
// accesses.
unsafe impl<T> Send for SendPtr<T> {}

impl<T> SendPtr<T> {
    pub fn new(ptr: *mut T) -> Self {
        Self(ptr)
    }

    pub fn null() -> Self {
        Self(std::ptr::null_mut())
    }

    pub fn get(self) -> *mut T {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl<T> Clone for SendPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SendPtr<T> {}

impl<T> std::fmt::Debug for SendPtr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SendPtr({:p})", self.0)
    }
}

/// A failed native operation, as reported by the library.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct MediaError(pub String);

impl MediaError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// The external multimedia library.
///
/// Every method is a blocking native call. Methods that allocate return an
/// owned pointer the caller must eventually release through the matching
/// free method — exactly once. Methods documented as *borrowed* return
/// pointers owned by the library; the bridge must never free those.
pub trait MediaLibrary: Send + Sync + 'static {
    fn create_window(&self, title: &str, width: u32, height: u32)
    -> Result<SendPtr<Window>, MediaError>;
    fn destroy_window(&self, window: SendPtr<Window>);
    fn window_title(&self, window: SendPtr<Window>) -> String;

    fn create_context(&self, window: SendPtr<Window>) -> Result<SendPtr<GlContext>, MediaError>;
    fn delete_context(&self, context: SendPtr<GlContext>);

    /// Bind `context` to `window` as the active rendering target.
    fn make_current(
        &self,
        window: SendPtr<Window>,
        context: SendPtr<GlContext>,
    ) -> Result<(), MediaError>;

    /// Unbind whatever rendering target is active.
    fn clear_current(&self);

    /// Decode a pixel surface from disk. Blocking; runs in a work phase.
    fn load_surface(&self, path: &str) -> Result<SendPtr<PixelSurface>, MediaError>;

    /// Persist a surface to disk. Blocking; runs in a work phase.
    fn save_surface(&self, surface: SendPtr<PixelSurface>, path: &str)
    -> Result<(), MediaError>;

    /// Convert a surface to another pixel format, producing a new surface.
    /// Blocking; runs in a work phase.
    fn convert_surface(
        &self,
        surface: SendPtr<PixelSurface>,
        format: u32,
    ) -> Result<SendPtr<PixelSurface>, MediaError>;

    fn free_surface(&self, surface: SendPtr<PixelSurface>);

    /// Borrowed: the window's backing surface, owned by the window.
    fn window_surface(&self, window: SendPtr<Window>) -> Result<SendPtr<PixelSurface>, MediaError>;

    fn open_stream(&self, path: &str) -> Result<SendPtr<ByteStream>, MediaError>;

    /// Read up to `len` bytes. Blocking; runs in a work phase.
    fn read_stream(&self, stream: SendPtr<ByteStream>, len: usize) -> Result<Bytes, MediaError>;

    fn close_stream(&self, stream: SendPtr<ByteStream>);

    /// Borrowed: a connected input device, owned by the input subsystem.
    fn input_device(&self, index: u32) -> Result<SendPtr<InputDevice>, MediaError>;
    fn input_device_name(&self, device: SendPtr<InputDevice>) -> String;
}

impl NativeType for Window {
    const TYPE_NAME: &'static str = "Window";
}

impl OwnedNative for Window {
    fn free(library: &dyn MediaLibrary, ptr: *mut Self) {
        library.destroy_window(SendPtr::new(ptr));
    }
}

impl NativeType for GlContext {
    const TYPE_NAME: &'static str = "GlContext";
}

impl OwnedNative for GlContext {
    fn free(library: &dyn MediaLibrary, ptr: *mut Self) {
        library.delete_context(SendPtr::new(ptr));
    }
}

impl NativeType for PixelSurface {
    const TYPE_NAME: &'static str = "PixelSurface";
}

impl OwnedNative for PixelSurface {
    fn free(library: &dyn MediaLibrary, ptr: *mut Self) {
        library.free_surface(SendPtr::new(ptr));
    }
}

impl NativeType for ByteStream {
    const TYPE_NAME: &'static str = "ByteStream";
}

impl OwnedNative for ByteStream {
    fn free(library: &dyn MediaLibrary, ptr: *mut Self) {
        library.close_stream(SendPtr::new(ptr));
    }
}

// Input devices are borrowed-only: no OwnedNative impl, so ownership can
// never be taken out of one of their handles.
impl NativeType for InputDevice {
    const TYPE_NAME: &'static str = "InputDevice";
}
