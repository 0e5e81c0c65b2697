mod common;

use common::{count, new_runtime};

#[tokio::test]
async fn hold_peek_take_round_trip() {
    let (mut runtime, stub) = new_runtime();

    runtime
        .evaluate(
            r#"
            globalThis.w = createWindow('main', 640, 480);
            globalThis.wasNull = (w === null);
            globalThis.title1 = windowTitle(w);
            globalThis.title2 = windowTitle(w);
            destroyWindow(w);
        "#,
        )
        .unwrap();

    assert_eq!(runtime.get_global_bool("wasNull"), Some(false));
    // Peek is non-destructive: repeated peeks see the same resource.
    assert_eq!(runtime.get_global_string("title1").as_deref(), Some("main"));
    assert_eq!(runtime.get_global_string("title2").as_deref(), Some("main"));
    assert_eq!(count(&stub.counts.windows_freed), 1);
}

#[tokio::test]
async fn second_release_is_a_catchable_error() {
    let (mut runtime, stub) = new_runtime();

    runtime
        .evaluate(
            r#"
            const w = createWindow('once', 64, 64);
            destroyWindow(w);
            globalThis.second = (() => {
                try { destroyWindow(w); return 'no-error'; }
                catch (e) { return String(e); }
            })();
            globalThis.peekAfter = (() => {
                try { windowTitle(w); return 'no-error'; }
                catch (e) { return String(e); }
            })();
        "#,
        )
        .unwrap();

    let second = runtime.get_global_string("second").unwrap();
    assert!(
        second.contains("already released"),
        "unexpected error: {second}"
    );
    let peek_after = runtime.get_global_string("peekAfter").unwrap();
    assert!(peek_after.contains("already released"));

    // The free routine ran exactly once despite three release attempts.
    assert_eq!(count(&stub.counts.windows_freed), 1);
}

#[tokio::test]
async fn null_sentinel_becomes_script_null_without_a_wrapper() {
    let (mut runtime, _stub) = new_runtime();

    runtime
        .evaluate(
            r#"
            globalThis.missing = inputDevice(99);
            globalThis.isNull = (missing === null);
        "#,
        )
        .unwrap();

    assert_eq!(runtime.get_global_bool("isNull"), Some(true));
    assert_eq!(runtime.live_handles(), 0);
}

#[tokio::test]
async fn wrong_type_is_reported_with_the_expected_name() {
    let (mut runtime, _stub) = new_runtime();

    runtime
        .evaluate(
            r#"
            const s = openStream('data.bin');
            globalThis.err = (() => {
                try { windowTitle(s); return 'no-error'; }
                catch (e) { return String(e); }
            })();
            closeStream(s);
        "#,
        )
        .unwrap();

    let err = runtime.get_global_string("err").unwrap();
    assert!(err.contains("expected a Window handle"), "got: {err}");
}

#[tokio::test]
async fn non_handle_values_are_invalid_not_fatal() {
    let (mut runtime, _stub) = new_runtime();

    runtime
        .evaluate(
            r#"
            globalThis.errs = ['', 42, null, {}].map((v) => {
                try { windowTitle(v); return 'no-error'; }
                catch (e) { return String(e); }
            });
            globalThis.allInvalid = errs.every((e) => e.includes('expected a Window handle'));
        "#,
        )
        .unwrap();

    assert_eq!(runtime.get_global_bool("allInvalid"), Some(true));
}

#[tokio::test]
async fn borrowed_handles_refuse_ownership_transfer() {
    let (mut runtime, stub) = new_runtime();

    runtime
        .evaluate(
            r#"
            const w = createWindow('main', 64, 64);
            const backing = surfaceOf(w);
            globalThis.err = (() => {
                try { freePixels(backing); return 'no-error'; }
                catch (e) { return String(e); }
            })();
            destroyWindow(w);
        "#,
        )
        .unwrap();

    let err = runtime.get_global_string("err").unwrap();
    assert!(err.contains("borrowed"), "got: {err}");
    // The backing surface belongs to the window; only the window free ran.
    assert_eq!(count(&stub.counts.surfaces_freed), 0);
    assert_eq!(count(&stub.counts.windows_freed), 1);
}

#[tokio::test]
async fn take_is_idempotent_on_streams() {
    let (mut runtime, stub) = new_runtime();

    runtime
        .evaluate(
            r#"
            const s = openStream('payload');
            closeStream(s);
            globalThis.errs = [0, 1].map(() => {
                try { closeStream(s); return 'no-error'; }
                catch (e) { return String(e); }
            });
            globalThis.allReleased = errs.every((e) => e.includes('already released'));
        "#,
        )
        .unwrap();

    assert_eq!(runtime.get_global_bool("allReleased"), Some(true));
    assert_eq!(count(&stub.counts.streams_freed), 1);
}

#[tokio::test]
async fn runtime_drop_frees_still_owned_resources() {
    let (mut runtime, stub) = new_runtime();

    runtime
        .evaluate(
            r#"
            globalThis.w = createWindow('leaky', 32, 32);
            globalThis.s = openStream('held');
        "#,
        )
        .unwrap();

    drop(runtime);

    assert_eq!(count(&stub.counts.windows_freed), 1);
    assert_eq!(count(&stub.counts.streams_freed), 1);
}
