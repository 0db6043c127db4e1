//! Executor tests
//!
//! Split by concern, mirroring the behavior contract: expression semantics,
//! per-call isolation, library scope management, and trigger collection.

mod helpers;
mod isolation_tests;
mod trigger_tests;
