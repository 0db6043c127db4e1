//! Process-wide execution manager
//!
//! The single stable entry point the rest of the application calls to
//! evaluate binding scripts. Owns the set of constructed executors, the
//! active kind, and the library registry (the source of truth replayed onto
//! every executor constructed later).
//!
//! The manager is explicitly constructed and owned; callers that need shared
//! access wrap it in an `Arc`. One mutex guards all state, so registration is
//! serialized with evaluation and a script can never observe a half-applied
//! library swap.

use crate::config::EngineSettings;
use crate::error::{EvalError, ManagerError};
use crate::executor::{Evaluation, Executor, ExecutorKind, SandboxExecutor};
use crate::libraries::{builtin_libraries, Library, LibraryInfo};
use crate::values::{ScriptGlobals, Val};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

pub struct ExecutionManager {
    inner: Mutex<ManagerState>,
}

struct ManagerState {
    settings: EngineSettings,
    active: ExecutorKind,
    executors: HashMap<ExecutorKind, Box<dyn Executor>>,
    libraries: Vec<Library>,
}

impl ExecutionManager {
    /// Construct the default executor, make it active, and register the
    /// built-in library catalog. No evaluation can observe a partially
    /// initialized manager: the value only exists once this returns.
    pub fn new() -> Self {
        Self::with_settings(EngineSettings::default())
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        let default_kind = ExecutorKind::Sandbox;
        let mut executors: HashMap<ExecutorKind, Box<dyn Executor>> = HashMap::new();
        executors.insert(default_kind, construct_backend(default_kind, &settings));

        let manager = ExecutionManager {
            inner: Mutex::new(ManagerState {
                settings,
                active: default_kind,
                executors,
                libraries: Vec::new(),
            }),
        };

        for library in builtin_libraries() {
            manager.register_library(library);
        }

        manager
    }

    /// Evaluate a binding script on the active executor.
    ///
    /// Blocking and synchronous: the call runs to completion (or failure)
    /// before returning, and no other evaluation or registration can
    /// interleave with it.
    pub fn evaluate(
        &self,
        src: &str,
        context: &ScriptGlobals,
        callback_data: Option<&Val>,
    ) -> Result<Evaluation, EvalError> {
        let mut state = self.lock();
        let active = state.active;
        let executor = state
            .executors
            .get_mut(&active)
            .expect("active executor is always constructed");
        executor.execute(src, context, callback_data)
    }

    /// Add or replace a library in the registry, then bind it in every
    /// constructed executor (not only the active one), so a later switch
    /// never sees a scope missing it. Replacement keeps the original
    /// registry position.
    pub fn register_library(&self, library: Library) {
        let mut state = self.lock();
        debug!(
            accessor = %library.accessor,
            version = %library.version,
            "registering library"
        );

        let accessor = library.accessor.clone();
        let value = library.value.clone();
        match state.libraries.iter_mut().find(|l| l.accessor == accessor) {
            Some(slot) => *slot = library,
            None => state.libraries.push(library),
        }

        for executor in state.executors.values_mut() {
            executor.register_library(&accessor, value.clone());
        }
    }

    /// Remove a library from the registry and from every constructed
    /// executor; no-op if the accessor was never registered
    pub fn unregister_library(&self, accessor: &str) {
        let mut state = self.lock();
        debug!(accessor, "unregistering library");

        state.libraries.retain(|l| l.accessor != accessor);
        for executor in state.executors.values_mut() {
            executor.unregister_library(accessor);
        }
    }

    /// Construct the backend for `kind` and replay the full library registry
    /// onto it, making it a valid switch target. Idempotent.
    pub fn install_executor(&self, kind: ExecutorKind) {
        let mut state = self.lock();
        if state.executors.contains_key(&kind) {
            return;
        }
        debug!(?kind, "installing executor");

        let mut executor = construct_backend(kind, &state.settings);
        for library in &state.libraries {
            executor.register_library(&library.accessor, library.value.clone());
        }
        state.executors.insert(kind, executor);
    }

    /// Make `kind` the active executor. Fails, leaving the active kind
    /// unchanged, if no executor of that kind has been installed. Libraries
    /// are not re-registered here: the fan-out policy already keeps every
    /// constructed executor consistent.
    pub fn switch_executor(&self, kind: ExecutorKind) -> Result<(), ManagerError> {
        let mut state = self.lock();
        if !state.executors.contains_key(&kind) {
            return Err(ManagerError::UnknownExecutorKind { kind });
        }
        debug!(from = ?state.active, to = ?kind, "switching active executor");
        state.active = kind;
        Ok(())
    }

    /// Currently active executor kind
    pub fn active_kind(&self) -> ExecutorKind {
        self.lock().active
    }

    /// Metadata snapshot of the registered libraries, in registration order
    pub fn libraries(&self) -> Vec<LibraryInfo> {
        self.lock().libraries.iter().map(Library::info).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManagerState> {
        // A panicking native unwinds out of `execute` before any state in
        // `ManagerState` is touched, so a poisoned guard is still consistent.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for ExecutionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Construct the concrete backend for an executor kind.
///
/// Exhaustive by design: adding a kind forces a decision here.
fn construct_backend(kind: ExecutorKind, settings: &EngineSettings) -> Box<dyn Executor> {
    match kind {
        ExecutorKind::Sandbox => Box::new(SandboxExecutor::with_settings(settings)),
        ExecutorKind::Unbounded => Box::new(SandboxExecutor::unbounded()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::native;
    use maplit::hashmap;

    fn custom_library(accessor: &str, version: &str) -> Library {
        let mut members = hashmap! {
            "version".to_string() => Val::Str(version.to_string()),
        };
        members.insert(
            "double".to_string(),
            native("double", |args| match args.first() {
                Some(Val::Num(n)) => Ok(Val::Num(n * 2.0)),
                _ => Err(EvalError::runtime("double() requires a number")),
            }),
        );
        Library {
            accessor: accessor.to_string(),
            version: version.to_string(),
            display_name: accessor.to_string(),
            docs_url: "https://example.test/docs".to_string(),
            value: Val::Obj(members),
        }
    }

    #[test]
    fn test_evaluate_simple_expression() {
        let manager = ExecutionManager::new();
        let result = manager
            .evaluate("1 + 1", &ScriptGlobals::new(), None)
            .unwrap();
        assert_eq!(result.value, Val::Num(2.0));
        assert!(result.triggers.is_empty());
    }

    #[test]
    fn test_builtins_available_at_startup() {
        let manager = ExecutionManager::new();
        let result = manager
            .evaluate("atob(btoa(\"round trip\"))", &ScriptGlobals::new(), None)
            .unwrap();
        assert_eq!(result.value, Val::Str("round trip".to_string()));

        let accessors: Vec<String> = manager
            .libraries()
            .into_iter()
            .map(|info| info.accessor)
            .collect();
        assert_eq!(accessors, vec!["_", "datetime", "btoa", "atob"]);
    }

    #[test]
    fn test_registered_library_version_readable_in_script() {
        let manager = ExecutionManager::new();
        manager.register_library(custom_library("moment", "2.24.0"));

        let result = manager
            .evaluate("moment.version", &ScriptGlobals::new(), None)
            .unwrap();
        assert_eq!(result.value, Val::Str("2.24.0".to_string()));
    }

    #[test]
    fn test_unregistered_library_fails_lookup() {
        let manager = ExecutionManager::new();
        manager.register_library(custom_library("helpers", "1.0.0"));
        assert!(manager
            .evaluate("helpers.double(2)", &ScriptGlobals::new(), None)
            .is_ok());

        manager.unregister_library("helpers");
        let err = manager
            .evaluate("helpers.double(2)", &ScriptGlobals::new(), None)
            .expect_err("expected lookup failure");
        assert_eq!(
            err,
            EvalError::runtime("helpers is not defined"),
            "stale library must not be silently used"
        );
    }

    #[test]
    fn test_reregistration_replaces_binding_and_keeps_position() {
        let manager = ExecutionManager::new();
        manager.register_library(custom_library("helpers", "1.0.0"));
        manager.register_library(custom_library("other", "0.1.0"));
        manager.register_library(custom_library("helpers", "2.0.0"));

        let result = manager
            .evaluate("helpers.version", &ScriptGlobals::new(), None)
            .unwrap();
        assert_eq!(result.value, Val::Str("2.0.0".to_string()));

        let accessors: Vec<String> = manager
            .libraries()
            .into_iter()
            .map(|info| info.accessor)
            .collect();
        assert_eq!(
            accessors,
            vec!["_", "datetime", "btoa", "atob", "helpers", "other"]
        );
    }

    #[test]
    fn test_switch_to_uninstalled_kind_fails_and_keeps_active() {
        let manager = ExecutionManager::new();
        let err = manager
            .switch_executor(ExecutorKind::Unbounded)
            .expect_err("expected unknown kind failure");
        assert_eq!(
            err,
            ManagerError::UnknownExecutorKind {
                kind: ExecutorKind::Unbounded
            }
        );
        assert_eq!(manager.active_kind(), ExecutorKind::Sandbox);
    }

    #[test]
    fn test_switch_preserves_registered_libraries() {
        let manager = ExecutionManager::new();
        manager.register_library(custom_library("helpers", "1.0.0"));

        // Installed after registration: the registry replays onto it
        manager.install_executor(ExecutorKind::Unbounded);
        manager.switch_executor(ExecutorKind::Unbounded).unwrap();
        assert_eq!(manager.active_kind(), ExecutorKind::Unbounded);

        let result = manager
            .evaluate("helpers.double(21)", &ScriptGlobals::new(), None)
            .unwrap();
        assert_eq!(result.value, Val::Num(42.0));
    }

    #[test]
    fn test_registration_fans_out_to_every_constructed_executor() {
        let manager = ExecutionManager::new();
        manager.install_executor(ExecutorKind::Unbounded);

        // Registered while Sandbox is active; must be visible after a switch
        manager.register_library(custom_library("late", "3.0.0"));
        manager.switch_executor(ExecutorKind::Unbounded).unwrap();

        let result = manager
            .evaluate("late.version", &ScriptGlobals::new(), None)
            .unwrap();
        assert_eq!(result.value, Val::Str("3.0.0".to_string()));

        // And unregistration reaches the non-active executor too
        manager.switch_executor(ExecutorKind::Sandbox).unwrap();
        manager.unregister_library("late");
        manager.switch_executor(ExecutorKind::Unbounded).unwrap();
        assert!(manager
            .evaluate("late.version", &ScriptGlobals::new(), None)
            .is_err());
    }

    #[test]
    fn test_install_executor_is_idempotent() {
        let manager = ExecutionManager::new();
        manager.install_executor(ExecutorKind::Unbounded);
        manager.install_executor(ExecutorKind::Unbounded);
        assert!(manager.switch_executor(ExecutorKind::Unbounded).is_ok());
    }

    #[test]
    fn test_manager_survives_a_panicking_native() {
        use std::sync::Arc;

        let manager = Arc::new(ExecutionManager::new());
        manager.register_library(Library {
            accessor: "boom".to_string(),
            version: "0.0.1".to_string(),
            display_name: "boom".to_string(),
            docs_url: "https://example.test/docs".to_string(),
            value: native("boom", |_args| panic!("native fault")),
        });

        // The panic unwinds on the evaluating thread and poisons the lock
        let worker = Arc::clone(&manager);
        let outcome = std::thread::spawn(move || {
            worker.evaluate("boom()", &ScriptGlobals::new(), None)
        })
        .join();
        assert!(outcome.is_err(), "the native's panic reaches the caller");

        // The manager must keep serving callers afterwards
        let result = manager
            .evaluate("1 + 1", &ScriptGlobals::new(), None)
            .unwrap();
        assert_eq!(result.value, Val::Num(2.0));
        assert_eq!(manager.active_kind(), ExecutorKind::Sandbox);
    }

    #[test]
    fn test_manager_is_shareable_across_threads() {
        use std::sync::Arc;

        let manager = Arc::new(ExecutionManager::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || {
                    let ctx = hashmap! {
                        "i".to_string() => Val::Num(i as f64),
                    };
                    manager.evaluate("i * 2", &ctx, None).unwrap().value
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), Val::Num(i as f64 * 2.0));
        }
    }
}
