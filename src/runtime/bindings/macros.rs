//! Common macros for the native bindings.

/// Register a native function on the global object.
macro_rules! register_fn {
    ($scope:expr, $name:literal, $callback:expr) => {{
        let func = v8::Function::new($scope, $callback).unwrap();
        let global = $scope.get_current_context().global($scope);
        let key = v8::String::new($scope, $name).unwrap();
        global.set($scope, key.into(), func.into());
    }};
}

/// Stash state on the global object as a `v8::External`.
///
/// The boxed state is intentionally leaked: it must stay valid for every
/// future callback, and the context it hangs off lives as long as the
/// runtime does.
macro_rules! store_state {
    ($scope:expr, $name:expr, $state:expr) => {{
        let state_ptr = Box::into_raw(Box::new($state)) as *mut std::ffi::c_void;
        let external = v8::External::new($scope, state_ptr);
        let global = $scope.get_current_context().global($scope);
        let state_key = v8::String::new($scope, $name).unwrap();
        global.set($scope, state_key.into(), external.into());
    }};
}
