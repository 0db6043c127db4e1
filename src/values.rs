//! Runtime value types
//!
//! `Val` is the dynamic value form scripts compute with. It is deliberately
//! host-neutral: null, booleans, doubles, strings, lists, string-keyed objects,
//! plus `Native` for host functions injected through the library scope.

use crate::error::EvalError;
use serde_json::{Map, Number, Value as JsonValue};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Runtime value type
#[derive(Debug, Clone)]
pub enum Val {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Val>),
    Obj(HashMap<String, Val>),
    /// Host function bound into script scope (library members, `btoa`, ...)
    Native(NativeFn),
}

/// Evaluation context passed into every call; copied into the per-call scope.
pub type ScriptGlobals = HashMap<String, Val>;

impl Val {
    /// Check if value is truthy (for conditionals and `&&`/`||`/`!`)
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Null => false,
            Val::Bool(b) => *b,
            Val::Num(n) => *n != 0.0,
            Val::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Short type name used in runtime error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Null => "null",
            Val::Bool(_) => "boolean",
            Val::Num(_) => "number",
            Val::Str(_) => "string",
            Val::List(_) => "list",
            Val::Obj(_) => "object",
            Val::Native(_) => "function",
        }
    }

    /// Convert to a serde_json value for trigger payloads and CLI output.
    ///
    /// Native functions have no data representation; they serialize as null.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Val::Null => JsonValue::Null,
            Val::Bool(b) => JsonValue::Bool(*b),
            Val::Num(n) => {
                // Integral values serialize as JSON integers
                if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n <= i64::MAX as f64 {
                    JsonValue::Number(Number::from(*n as i64))
                } else {
                    Number::from_f64(*n)
                        .map(JsonValue::Number)
                        .unwrap_or(JsonValue::Null)
                }
            }
            Val::Str(s) => JsonValue::String(s.clone()),
            Val::List(items) => JsonValue::Array(items.iter().map(Val::to_json).collect()),
            Val::Obj(map) => {
                let mut out = Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json());
                }
                JsonValue::Object(out)
            }
            Val::Native(_) => JsonValue::Null,
        }
    }

    /// Build a value from JSON (CLI context files, host data trees)
    pub fn from_json(json: &JsonValue) -> Val {
        match json {
            JsonValue::Null => Val::Null,
            JsonValue::Bool(b) => Val::Bool(*b),
            JsonValue::Number(n) => Val::Num(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(s) => Val::Str(s.clone()),
            JsonValue::Array(items) => Val::List(items.iter().map(Val::from_json).collect()),
            JsonValue::Object(map) => Val::Obj(
                map.iter()
                    .map(|(k, v)| (k.clone(), Val::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Val::Null, Val::Null) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Num(a), Val::Num(b)) => a == b,
            (Val::Str(a), Val::Str(b)) => a == b,
            (Val::List(a), Val::List(b)) => a == b,
            (Val::Obj(a), Val::Obj(b)) => a == b,
            // Functions compare by identity
            (Val::Native(a), Val::Native(b)) => Arc::ptr_eq(&a.func, &b.func),
            _ => false,
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Null => write!(f, "null"),
            Val::Bool(b) => write!(f, "{}", b),
            Val::Num(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Val::Str(s) => write!(f, "{}", s),
            Val::List(_) | Val::Obj(_) => write!(f, "{}", self.to_json()),
            Val::Native(native) => write!(f, "[function {}]", native.name),
        }
    }
}

/* ===================== Native Functions ===================== */

/// Signature of a host function callable from scripts
pub type NativeImpl = dyn Fn(&[Val]) -> Result<Val, EvalError> + Send + Sync;

/// A named host function wrapped as a value
#[derive(Clone)]
pub struct NativeFn {
    pub name: String,
    pub func: Arc<NativeImpl>,
}

impl NativeFn {
    pub fn call(&self, args: &[Val]) -> Result<Val, EvalError> {
        (self.func)(args)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").field("name", &self.name).finish()
    }
}

/// Wrap a host closure as a `Val::Native`
pub fn native(name: &str, func: impl Fn(&[Val]) -> Result<Val, EvalError> + Send + Sync + 'static) -> Val {
    Val::Native(NativeFn {
        name: name.to_string(),
        func: Arc::new(func),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!Val::Null.is_truthy());
        assert!(!Val::Bool(false).is_truthy());
        assert!(!Val::Num(0.0).is_truthy());
        assert!(!Val::Str(String::new()).is_truthy());
        assert!(Val::Num(2.5).is_truthy());
        assert!(Val::List(vec![]).is_truthy());
    }

    #[test]
    fn test_display_trims_integral_floats() {
        assert_eq!(Val::Num(2.0).to_string(), "2");
        assert_eq!(Val::Num(2.5).to_string(), "2.5");
    }

    #[test]
    fn test_json_round_trip() {
        let json = json!({"a": [1, "two", null], "b": {"c": true}});
        let val = Val::from_json(&json);
        assert_eq!(val.to_json(), json);
    }

    #[test]
    fn test_native_eq_by_identity() {
        let a = native("f", |_| Ok(Val::Null));
        let b = native("f", |_| Ok(Val::Null));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
