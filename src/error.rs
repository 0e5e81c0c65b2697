//! `BridgeError` taxonomy (§7).
//!
//! Synchronous bridge failures are surfaced to script as catchable
//! `TypeError`s via [`crate::runtime::bindings::throw_error`], which renders a
//! `BridgeError` through its [`Display`] impl. The message wording is part of
//! the observable contract: invalid-handle errors name the expected resource
//! type, and already-released errors are identifiable without structured
//! parsing.

use thiserror::Error;

/// The synchronous error channel for the bridge (§7).
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The value was not a handle, or was a handle of the wrong resource type,
    /// at Peek/Drop. Names the resource type that was expected.
    #[error("expected a {expected} handle")]
    InvalidHandle { expected: &'static str },

    /// The handle's slot was already null (the resource was taken or
    /// finalized). Reported instead of crashing or silently no-op'ing.
    #[error("{type_name} handle already released")]
    Released { type_name: &'static str },

    /// Drop was attempted on a borrowed-only handle, which does not own its
    /// resource and therefore cannot release it.
    #[error("{type_name} handle is borrowed and cannot be released")]
    NotOwned { type_name: &'static str },

    /// Task submission failed because the queue was destroyed (§7, the
    /// negative-status case).
    #[error("task queue is closed")]
    QueueClosed,

    /// A compile or run failure surfaced by the runtime.
    #[error("{0}")]
    Script(String),
}
