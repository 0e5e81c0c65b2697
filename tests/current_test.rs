mod common;

use common::{count, new_runtime};

#[tokio::test]
async fn bind_then_lookup_returns_the_same_objects() {
    let (mut runtime, stub) = new_runtime();

    runtime
        .evaluate(
            r#"
            globalThis.w = createWindow('main', 64, 64);
            globalThis.c = createContext(w);
            globalThis.status = makeCurrent(w, c);
            globalThis.sameWindow = (currentWindow() === w);
            globalThis.sameContext = (currentContext() === c);
        "#,
        )
        .unwrap();

    assert_eq!(runtime.get_global_f64("status"), Some(0.0));
    assert_eq!(runtime.get_global_bool("sameWindow"), Some(true));
    assert_eq!(runtime.get_global_bool("sameContext"), Some(true));
    assert!(stub.current_pair().is_some());
}

#[tokio::test]
async fn unbind_clears_both_sides() {
    let (mut runtime, stub) = new_runtime();

    runtime
        .evaluate(
            r#"
            const w = createWindow('main', 64, 64);
            const c = createContext(w);
            makeCurrent(w, c);
            makeCurrent(null, null);
            globalThis.noWindow = (currentWindow() === null);
            globalThis.noContext = (currentContext() === null);
        "#,
        )
        .unwrap();

    assert_eq!(runtime.get_global_bool("noWindow"), Some(true));
    assert_eq!(runtime.get_global_bool("noContext"), Some(true));
    assert!(stub.current_pair().is_none());
    assert!(count(&stub.counts.current_cleared) >= 1);
}

#[tokio::test]
async fn rebinding_replaces_the_previous_pair() {
    let (mut runtime, _stub) = new_runtime();

    runtime
        .evaluate(
            r#"
            const w1 = createWindow('one', 64, 64);
            const c1 = createContext(w1);
            const w2 = createWindow('two', 64, 64);
            const c2 = createContext(w2);
            makeCurrent(w1, c1);
            makeCurrent(w2, c2);
            globalThis.isSecond = (currentWindow() === w2) && (currentContext() === c2);
        "#,
        )
        .unwrap();

    assert_eq!(runtime.get_global_bool("isSecond"), Some(true));
}

#[tokio::test]
async fn deleting_the_bound_context_unbinds_first() {
    let (mut runtime, stub) = new_runtime();

    runtime
        .evaluate(
            r#"
            const w = createWindow('main', 64, 64);
            const c = createContext(w);
            makeCurrent(w, c);
            deleteContext(c);
            globalThis.noContext = (currentContext() === null);
            globalThis.noWindow = (currentWindow() === null);
        "#,
        )
        .unwrap();

    assert_eq!(runtime.get_global_bool("noContext"), Some(true));
    assert_eq!(runtime.get_global_bool("noWindow"), Some(true));
    assert_eq!(count(&stub.counts.contexts_freed), 1);
    // The native side was unbound before the context was deleted.
    assert!(count(&stub.counts.current_cleared) >= 1);
    assert!(stub.current_pair().is_none());
}

#[tokio::test]
async fn destroying_the_bound_window_clears_the_record() {
    let (mut runtime, stub) = new_runtime();

    runtime
        .evaluate(
            r#"
            const w = createWindow('main', 64, 64);
            const c = createContext(w);
            makeCurrent(w, c);
            destroyWindow(w);
            globalThis.noWindow = (currentWindow() === null);
            globalThis.noContext = (currentContext() === null);
            deleteContext(c);
        "#,
        )
        .unwrap();

    assert_eq!(runtime.get_global_bool("noWindow"), Some(true));
    assert_eq!(runtime.get_global_bool("noContext"), Some(true));
    assert_eq!(count(&stub.counts.windows_freed), 1);
    assert_eq!(count(&stub.counts.contexts_freed), 1);
}

#[tokio::test]
async fn binding_type_mismatch_is_a_catchable_error() {
    let (mut runtime, _stub) = new_runtime();

    runtime
        .evaluate(
            r#"
            const w = createWindow('main', 64, 64);
            globalThis.err = (() => {
                try { makeCurrent(w, w); return 'no-error'; }
                catch (e) { return String(e); }
            })();
        "#,
        )
        .unwrap();

    let err = runtime.get_global_string("err").unwrap();
    assert!(err.contains("expected a GlContext handle"), "got: {err}");
}
