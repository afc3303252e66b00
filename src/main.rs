use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, PoisonError};
use stepwise::cli::commands::{RunCommand, ValidateCommand};
use stepwise::cli::output::*;
use stepwise::cli::{Cli, Command};
use stepwise::core::config::RunConfig;
use stepwise::core::PipelineState;
use stepwise::execution::ExecutionEvent;
use stepwise::notes::run_notes;
use stepwise::store::{Backend, MemoryStore, StoreDriver};
use stepwise::SequentialPipeline;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_chain(cmd).await?,
        Command::Validate(cmd) => validate_config(cmd)?,
    }

    Ok(())
}

async fn run_chain(cmd: &RunCommand) -> Result<()> {
    let base = match &cmd.config {
        Some(path) => RunConfig::from_file(path).context("Failed to load run config")?,
        None => RunConfig::default(),
    };
    let config = cmd.apply_to(base);
    config.validate().context("Invalid run configuration")?;

    if !cmd.json {
        println!(
            "{} {} backend, {} style, collection {}",
            INFO,
            style(format!("{:?}", config.backend).to_lowercase()).cyan(),
            style(config.style).cyan(),
            style(&config.collection).bold()
        );
    }

    let succeeded = match config.backend {
        Backend::Memory => {
            let driver = MemoryStore::new(config.collection.clone())?;
            execute(&config, Arc::new(driver), cmd.json).await?
        }
        Backend::Sqlite => run_sqlite(&config, cmd.json).await?,
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(feature = "sqlite")]
async fn run_sqlite(config: &RunConfig, json: bool) -> Result<bool> {
    use stepwise::store::SqliteStore;

    let path = config
        .database
        .clone()
        .unwrap_or_else(SqliteStore::default_path);
    let driver = SqliteStore::new(path, config.collection.clone())?;
    execute(config, Arc::new(driver), json).await
}

#[cfg(not(feature = "sqlite"))]
async fn run_sqlite(_config: &RunConfig, _json: bool) -> Result<bool> {
    anyhow::bail!("Backend 'sqlite' requires the 'sqlite' feature")
}

/// Run the chain, print its outcome, report whether it succeeded
async fn execute<D>(config: &RunConfig, driver: Arc<D>, json_output: bool) -> Result<bool>
where
    D: StoreDriver + 'static,
{
    let release_fault: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let final_state: Arc<Mutex<Option<PipelineState>>> = Arc::new(Mutex::new(None));

    let fault_sink = release_fault.clone();
    let state_sink = final_state.clone();
    let pipeline = SequentialPipeline::<Value>::new(config.name.clone()).with_event_handler(
        move |event| {
            match event {
                ExecutionEvent::ReleaseFaulted { error, .. } => {
                    *fault_sink.lock().unwrap_or_else(PoisonError::into_inner) =
                        Some(format!("{:#}", error.cause));
                }
                ExecutionEvent::RunFinished { state, .. } => {
                    *state_sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(*state);
                }
                _ => {}
            }
            if !json_output {
                if let Some(line) = format_execution_event(event) {
                    println!("{}", line);
                }
            }
        },
    );

    let outcome = run_notes(&pipeline, driver, config.note.clone(), config.style).await;

    let release_fault = release_fault
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    let state = final_state
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();

    if json_output {
        let report = match &outcome {
            Ok(results) => json!({
                "style": config.style,
                "state": state,
                "results": results,
                "releaseFault": release_fault,
            }),
            Err(failure) => json!({
                "style": config.style,
                "state": state,
                "failure": {
                    "stage": failure.stage,
                    "step": failure.step,
                    "error": format!("{:#}", failure.cause),
                },
                "releaseFault": release_fault,
            }),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(outcome.is_ok());
    }

    match outcome {
        Ok(results) => {
            println!(
                "\n{} {} completed {} ({} steps)",
                CHECK,
                style(&config.name).bold(),
                style("successfully").green(),
                results.len()
            );
            if release_fault.is_some() {
                println!("{} {}", WARN, style("the connection was not closed cleanly").yellow());
            }
            Ok(true)
        }
        Err(failure) => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&config.name).bold(),
                style("failed").red()
            );
            error!("{}", failure);
            Ok(false)
        }
    }
}

fn validate_config(cmd: &ValidateCommand) -> Result<()> {
    if !cmd.json {
        println!("{} Validating run configuration...", INFO);
    }

    match RunConfig::from_file(&cmd.file) {
        Ok(config) => {
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&json!({ "valid": true, "config": config }))?);
            } else {
                println!("{} Run configuration is valid!", CHECK);
                println!("  Name: {}", style(&config.name).bold());
                println!("  Collection: {}", style(&config.collection).cyan());
                println!("  Style: {}", style(config.style).cyan());
            }
            Ok(())
        }
        Err(e) => {
            if cmd.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({ "valid": false, "error": format!("{:#}", e) }))?
                );
            } else {
                println!("{} Validation failed:", CROSS);
                println!("  {}", style(format!("{:#}", e)).red());
            }
            std::process::exit(1);
        }
    }
}
