//! Global V8 platform initialization.
//!
//! V8 can only be initialized once per process. Every `Runtime` goes through
//! this single entry point; repeated calls are cheap no-ops.

use std::sync::OnceLock;
use v8;

static PLATFORM: OnceLock<v8::SharedRef<v8::Platform>> = OnceLock::new();

/// Initialize the global V8 platform, if it hasn't been already.
///
/// Safe to call from multiple threads; the platform is created once and the
/// same reference is handed to every caller.
pub fn init() -> &'static v8::SharedRef<v8::Platform> {
    PLATFORM.get_or_init(|| {
        // Incremental marking delays weak callbacks unpredictably; full GCs
        // keep handle finalization prompt for small heaps like ours.
        v8::V8::set_flags_from_string("--noincremental-marking");

        let platform = v8::new_default_platform(0, false).make_shared();
        v8::V8::initialize_platform(platform.clone());
        v8::V8::initialize();
        platform
    })
}
