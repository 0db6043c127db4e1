use anyhow::Context;
use bindings_core::{EngineSettings, ExecutionManager, ScriptGlobals, Val};
use clap::{Parser, Subcommand};
use serde_json::{json, Value as JsonValue};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bindings")]
#[command(about = "Binding expression evaluator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a binding script and print the result as JSON
    Eval {
        /// The script to evaluate
        script: String,
        /// JSON file with the evaluation context (an object of globals)
        #[arg(long)]
        context: Option<PathBuf>,
    },
    /// List the registered libraries
    Libraries,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let settings = EngineSettings::from_env().context("failed to load engine settings")?;
    let manager = ExecutionManager::with_settings(settings);

    match cli.command {
        Commands::Eval { script, context } => {
            let globals = match context {
                Some(path) => load_context(&path)?,
                None => ScriptGlobals::new(),
            };
            let result = manager
                .evaluate(&script, &globals, None)
                .context("evaluation failed")?;
            let out = json!({
                "value": result.value.to_json(),
                "triggers": result.triggers,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Libraries => {
            println!("{}", serde_json::to_string_pretty(&manager.libraries())?);
        }
    }

    Ok(())
}

fn load_context(path: &PathBuf) -> anyhow::Result<ScriptGlobals> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read context file {}", path.display()))?;
    let json: JsonValue = serde_json::from_str(&raw)
        .with_context(|| format!("context file {} is not valid JSON", path.display()))?;
    match json {
        JsonValue::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), Val::from_json(v)))
            .collect()),
        _ => anyhow::bail!("context file {} must contain a JSON object", path.display()),
    }
}
