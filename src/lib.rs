//! Bridge a manually-freed native multimedia library into a V8 scripting
//! host: script-visible resource handles with correct ownership transfer and
//! GC-backed cleanup, plus an async task queue that keeps blocking native
//! calls off the script thread.

pub mod current;
pub mod error;
pub mod finalizer;
pub mod handle;
pub mod media;
pub mod persistent;
pub mod platform;
pub mod runtime;
pub mod task;

pub(crate) mod v8_helpers;

pub use error::BridgeError;
pub use handle::{NativeType, OwnedNative, hold, hold_borrowed, peek, take};
pub use media::{
    ByteStream, GlContext, InputDevice, MediaError, MediaLibrary, PixelSurface, SendPtr, Window,
};
pub use persistent::Retained;
pub use runtime::{BridgeState, Runtime, TaskPool};
pub use task::{AsyncTask, TaskId, TaskOutcome, TaskQueue};
