//! Per-call scope composition
//!
//! Each evaluation gets a `CallScope` layered on top of a read-only view of
//! the executor's persistent library scope:
//!
//! - `locals` — `let` bindings made by the script
//! - `globals` — a fresh copy of the caller's context (plus `callbackData`)
//! - `libraries` — borrowed from the executor, shared across calls
//!
//! The whole object is dropped when the call returns, so any mutation a script
//! performs lands in the per-call layers and can never leak into the next
//! evaluation. Writes that target a library accessor copy the library value
//! into `globals` first (copy-on-write shadowing) rather than touching the
//! persistent layer.

use crate::values::{ScriptGlobals, Val};
use std::collections::HashMap;

/// Name bound to the auxiliary data argument, when one is supplied
pub const CALLBACK_DATA: &str = "callbackData";

pub struct CallScope<'a> {
    libraries: &'a HashMap<String, Val>,
    globals: HashMap<String, Val>,
    locals: HashMap<String, Val>,
}

impl<'a> CallScope<'a> {
    /// Compose a fresh scope for one evaluation
    pub fn new(
        libraries: &'a HashMap<String, Val>,
        context: &ScriptGlobals,
        callback_data: Option<&Val>,
    ) -> Self {
        let mut globals = context.clone();
        if let Some(data) = callback_data {
            globals.insert(CALLBACK_DATA.to_string(), data.clone());
        }
        CallScope {
            libraries,
            globals,
            locals: HashMap::new(),
        }
    }

    /// Resolve a name: locals, then globals, then the library scope
    pub fn lookup(&self, name: &str) -> Option<Val> {
        self.locals
            .get(name)
            .or_else(|| self.globals.get(name))
            .or_else(|| self.libraries.get(name))
            .cloned()
    }

    /// Bind a `let` declaration; re-declaring overwrites
    pub fn declare(&mut self, name: &str, value: Val) {
        self.locals.insert(name.to_string(), value);
    }

    /// Assign to a name: an existing local wins, otherwise the write goes to
    /// the per-call globals (shadowing any library binding of the same name)
    pub fn assign(&mut self, name: &str, value: Val) {
        if let Some(slot) = self.locals.get_mut(name) {
            *slot = value;
        } else {
            self.globals.insert(name.to_string(), value);
        }
    }

    /// Mutable handle to the value bound at `name`, for path assignment.
    ///
    /// A name only present in the library scope is first copied into the
    /// per-call globals so the persistent layer stays untouched.
    pub fn resolve_mut(&mut self, name: &str) -> Option<&mut Val> {
        if self.locals.contains_key(name) {
            return self.locals.get_mut(name);
        }
        if !self.globals.contains_key(name) {
            let copied = self.libraries.get(name)?.clone();
            self.globals.insert(name.to_string(), copied);
        }
        self.globals.get_mut(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;

    #[test]
    fn test_lookup_order_locals_shadow_globals_shadow_libraries() {
        let libraries = hashmap! {
            "x".to_string() => Val::Str("lib".to_string()),
            "y".to_string() => Val::Str("lib".to_string()),
        };
        let context = hashmap! {
            "x".to_string() => Val::Str("ctx".to_string()),
        };
        let mut scope = CallScope::new(&libraries, &context, None);

        assert_eq!(scope.lookup("x"), Some(Val::Str("ctx".to_string())));
        assert_eq!(scope.lookup("y"), Some(Val::Str("lib".to_string())));

        scope.declare("x", Val::Str("local".to_string()));
        assert_eq!(scope.lookup("x"), Some(Val::Str("local".to_string())));
    }

    #[test]
    fn test_resolve_mut_copies_library_value() {
        let libraries = hashmap! {
            "lib".to_string() => Val::Num(1.0),
        };
        let context = ScriptGlobals::new();
        let mut scope = CallScope::new(&libraries, &context, None);

        *scope.resolve_mut("lib").unwrap() = Val::Num(2.0);
        assert_eq!(scope.lookup("lib"), Some(Val::Num(2.0)));
        // Persistent layer untouched
        assert_eq!(libraries.get("lib"), Some(&Val::Num(1.0)));
    }

    #[test]
    fn test_callback_data_bound_as_global() {
        let libraries = HashMap::new();
        let context = ScriptGlobals::new();
        let data = Val::Str("payload".to_string());
        let scope = CallScope::new(&libraries, &context, Some(&data));
        assert_eq!(scope.lookup(CALLBACK_DATA), Some(data));
    }
}
