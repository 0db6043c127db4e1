pub mod config;
pub mod error;
pub mod executor;
pub mod libraries;
pub mod manager;
pub mod parser;
pub mod triggers;
pub mod values;

// Re-export main types
pub use error::{EvalError, ManagerError};
pub use executor::{Evaluation, Executor, ExecutorKind, SandboxExecutor};
pub use libraries::{builtin_libraries, Library, LibraryInfo};
pub use manager::ExecutionManager;
pub use triggers::TriggerAction;
pub use values::{ScriptGlobals, Val};

// Re-export settings for convenience
pub use config::EngineSettings;
