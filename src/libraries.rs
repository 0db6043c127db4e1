//! Utility libraries injected into script scope
//!
//! A `Library` pairs catalog metadata (accessor, version, display name, docs
//! link) with the value bound under the accessor inside every executor. The
//! built-in set mirrors what binding authors expect from the surrounding
//! application: collection helpers under `_`, date/time helpers under
//! `datetime` (chrono), and `btoa`/`atob` codecs (base64). Object-shaped
//! libraries expose a readable `version` member in-script.
//!
//! The catalog is fixed at startup; additional libraries can be registered at
//! runtime through the same manager call used for the built-ins.

use crate::error::EvalError;
use crate::values::{native, Val};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Datelike, Duration, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;

const CHRONO_VERSION: &str = "0.4";
const BASE64_VERSION: &str = "0.22";

/// A named, versioned library and the value it binds into script scope
#[derive(Debug, Clone)]
pub struct Library {
    /// Unique name the library is bound under inside scripts
    pub accessor: String,
    pub version: String,
    pub display_name: String,
    pub docs_url: String,
    /// The capability injected into the executor's persistent scope
    pub value: Val,
}

/// Metadata snapshot of a registered library, for documentation surfaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryInfo {
    pub accessor: String,
    pub version: String,
    pub display_name: String,
    pub docs_url: String,
}

impl Library {
    pub fn info(&self) -> LibraryInfo {
        LibraryInfo {
            accessor: self.accessor.clone(),
            version: self.version.clone(),
            display_name: self.display_name.clone(),
            docs_url: self.docs_url.clone(),
        }
    }
}

/// The fixed built-in catalog, in registration order
pub fn builtin_libraries() -> Vec<Library> {
    vec![
        Library {
            accessor: "_".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            display_name: "collections".to_string(),
            docs_url: "https://docs.rs/bindings-core".to_string(),
            value: collections_library(env!("CARGO_PKG_VERSION")),
        },
        Library {
            accessor: "datetime".to_string(),
            version: CHRONO_VERSION.to_string(),
            display_name: "datetime".to_string(),
            docs_url: format!("https://docs.rs/chrono/{}", CHRONO_VERSION),
            value: datetime_library(CHRONO_VERSION),
        },
        Library {
            accessor: "btoa".to_string(),
            version: BASE64_VERSION.to_string(),
            display_name: "btoa".to_string(),
            docs_url: format!("https://docs.rs/base64/{}", BASE64_VERSION),
            value: native("btoa", btoa),
        },
        Library {
            accessor: "atob".to_string(),
            version: BASE64_VERSION.to_string(),
            display_name: "atob".to_string(),
            docs_url: format!("https://docs.rs/base64/{}", BASE64_VERSION),
            value: native("atob", atob),
        },
    ]
}

/* ===================== Argument Helpers ===================== */

fn arg_str<'a>(func: &str, args: &'a [Val], idx: usize) -> Result<&'a str, EvalError> {
    match args.get(idx) {
        Some(Val::Str(s)) => Ok(s),
        Some(other) => Err(EvalError::runtime(format!(
            "{}() argument {} must be a string, got {}",
            func,
            idx + 1,
            other.type_name()
        ))),
        None => Err(EvalError::runtime(format!(
            "{}() missing argument {}",
            func,
            idx + 1
        ))),
    }
}

fn arg_num(func: &str, args: &[Val], idx: usize) -> Result<f64, EvalError> {
    match args.get(idx) {
        Some(Val::Num(n)) => Ok(*n),
        Some(other) => Err(EvalError::runtime(format!(
            "{}() argument {} must be a number, got {}",
            func,
            idx + 1,
            other.type_name()
        ))),
        None => Err(EvalError::runtime(format!(
            "{}() missing argument {}",
            func,
            idx + 1
        ))),
    }
}

fn arg_list<'a>(func: &str, args: &'a [Val], idx: usize) -> Result<&'a [Val], EvalError> {
    match args.get(idx) {
        Some(Val::List(items)) => Ok(items),
        Some(other) => Err(EvalError::runtime(format!(
            "{}() argument {} must be a list, got {}",
            func,
            idx + 1,
            other.type_name()
        ))),
        None => Err(EvalError::runtime(format!(
            "{}() missing argument {}",
            func,
            idx + 1
        ))),
    }
}

fn arg_obj<'a>(func: &str, args: &'a [Val], idx: usize) -> Result<&'a HashMap<String, Val>, EvalError> {
    match args.get(idx) {
        Some(Val::Obj(map)) => Ok(map),
        Some(other) => Err(EvalError::runtime(format!(
            "{}() argument {} must be an object, got {}",
            func,
            idx + 1,
            other.type_name()
        ))),
        None => Err(EvalError::runtime(format!(
            "{}() missing argument {}",
            func,
            idx + 1
        ))),
    }
}

/* ===================== Collections (`_`) ===================== */

fn collections_library(version: &str) -> Val {
    let mut members = HashMap::new();
    members.insert("version".to_string(), Val::Str(version.to_string()));

    members.insert(
        "uniq".to_string(),
        native("uniq", |args| {
            let items = arg_list("uniq", args, 0)?;
            let mut out: Vec<Val> = Vec::new();
            for item in items {
                if !out.contains(item) {
                    out.push(item.clone());
                }
            }
            Ok(Val::List(out))
        }),
    );

    members.insert(
        "flatten".to_string(),
        native("flatten", |args| {
            let items = arg_list("flatten", args, 0)?;
            let mut out = Vec::new();
            for item in items {
                match item {
                    Val::List(nested) => out.extend(nested.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Ok(Val::List(out))
        }),
    );

    members.insert(
        "compact".to_string(),
        native("compact", |args| {
            let items = arg_list("compact", args, 0)?;
            Ok(Val::List(
                items.iter().filter(|v| v.is_truthy()).cloned().collect(),
            ))
        }),
    );

    members.insert(
        "keys".to_string(),
        native("keys", |args| {
            let map = arg_obj("keys", args, 0)?;
            let mut keys: Vec<String> = map.keys().cloned().collect();
            keys.sort();
            Ok(Val::List(keys.into_iter().map(Val::Str).collect()))
        }),
    );

    members.insert(
        "values".to_string(),
        native("values", |args| {
            let map = arg_obj("values", args, 0)?;
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Ok(Val::List(keys.into_iter().map(|k| map[k].clone()).collect()))
        }),
    );

    members.insert(
        "range".to_string(),
        native("range", |args| {
            let (start, end) = if args.len() >= 2 {
                (arg_num("range", args, 0)?, arg_num("range", args, 1)?)
            } else {
                (0.0, arg_num("range", args, 0)?)
            };
            let mut out = Vec::new();
            let mut n = start;
            while n < end {
                out.push(Val::Num(n));
                n += 1.0;
            }
            Ok(Val::List(out))
        }),
    );

    members.insert(
        "sum".to_string(),
        native("sum", |args| {
            let items = arg_list("sum", args, 0)?;
            let mut total = 0.0;
            for item in items {
                match item {
                    Val::Num(n) => total += n,
                    other => {
                        return Err(EvalError::runtime(format!(
                            "sum() requires numbers, got {}",
                            other.type_name()
                        )))
                    }
                }
            }
            Ok(Val::Num(total))
        }),
    );

    members.insert(
        "chunk".to_string(),
        native("chunk", |args| {
            let items = arg_list("chunk", args, 0)?;
            let size = arg_num("chunk", args, 1)?;
            if size < 1.0 || size.fract() != 0.0 {
                return Err(EvalError::runtime("chunk() size must be a positive integer"));
            }
            Ok(Val::List(
                items
                    .chunks(size as usize)
                    .map(|c| Val::List(c.to_vec()))
                    .collect(),
            ))
        }),
    );

    members.insert(
        "join".to_string(),
        native("join", |args| {
            let items = arg_list("join", args, 0)?;
            let sep = match args.get(1) {
                Some(Val::Str(s)) => s.clone(),
                _ => ",".to_string(),
            };
            let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
            Ok(Val::Str(parts.join(&sep)))
        }),
    );

    Val::Obj(members)
}

/* ===================== Datetime ===================== */

fn parse_rfc3339(func: &str, raw: &str) -> Result<DateTime<Utc>, EvalError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EvalError::runtime(format!("{}(): invalid datetime '{}': {}", func, raw, e)))
}

fn datetime_library(version: &str) -> Val {
    let mut members = HashMap::new();
    members.insert("version".to_string(), Val::Str(version.to_string()));

    members.insert(
        "now".to_string(),
        native("now", |_args| {
            Ok(Val::Str(
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            ))
        }),
    );

    members.insert(
        "parse".to_string(),
        native("parse", |args| {
            let raw = arg_str("parse", args, 0)?;
            let dt = parse_rfc3339("parse", raw)?;
            Ok(Val::Num(dt.timestamp_millis() as f64))
        }),
    );

    members.insert(
        "format".to_string(),
        native("format", |args| {
            let raw = arg_str("format", args, 0)?;
            let fmt = arg_str("format", args, 1)?;
            let dt = parse_rfc3339("format", raw)?;
            // DelayedFormat's Display reports bad specifiers as fmt errors;
            // write! surfaces them instead of aborting like ToString would.
            let mut out = String::new();
            write!(out, "{}", dt.format(fmt)).map_err(|_| {
                EvalError::runtime(format!("format(): invalid format string '{}'", fmt))
            })?;
            Ok(Val::Str(out))
        }),
    );

    members.insert(
        "add_days".to_string(),
        native("add_days", |args| {
            let raw = arg_str("add_days", args, 0)?;
            let days = arg_num("add_days", args, 1)?;
            let delta = Duration::try_days(days as i64).ok_or_else(|| {
                EvalError::runtime(format!("add_days(): day count {} is out of range", days))
            })?;
            let dt = parse_rfc3339("add_days", raw)?
                .checked_add_signed(delta)
                .ok_or_else(|| {
                    EvalError::runtime(format!(
                        "add_days(): adding {} days leaves the representable date range",
                        days
                    ))
                })?;
            Ok(Val::Str(dt.to_rfc3339_opts(SecondsFormat::Millis, true)))
        }),
    );

    members.insert(
        "year".to_string(),
        native("year", |args| {
            let dt = parse_rfc3339("year", arg_str("year", args, 0)?)?;
            Ok(Val::Num(dt.year() as f64))
        }),
    );

    members.insert(
        "month".to_string(),
        native("month", |args| {
            let dt = parse_rfc3339("month", arg_str("month", args, 0)?)?;
            Ok(Val::Num(dt.month() as f64))
        }),
    );

    members.insert(
        "day".to_string(),
        native("day", |args| {
            let dt = parse_rfc3339("day", arg_str("day", args, 0)?)?;
            Ok(Val::Num(dt.day() as f64))
        }),
    );

    Val::Obj(members)
}

/* ===================== Base64 ===================== */

fn btoa(args: &[Val]) -> Result<Val, EvalError> {
    let raw = arg_str("btoa", args, 0)?;
    Ok(Val::Str(BASE64_STANDARD.encode(raw.as_bytes())))
}

fn atob(args: &[Val]) -> Result<Val, EvalError> {
    let raw = arg_str("atob", args, 0)?;
    let bytes = BASE64_STANDARD
        .decode(raw)
        .map_err(|e| EvalError::runtime(format!("atob(): invalid base64: {}", e)))?;
    String::from_utf8(bytes)
        .map(Val::Str)
        .map_err(|e| EvalError::runtime(format!("atob(): decoded bytes are not UTF-8: {}", e)))
}
