//! CLI command definitions

use crate::core::config::RunConfig;
use crate::execution::CallingStyle;
use crate::store::Backend;
use clap::Args;
use std::path::PathBuf;

/// Run the notes chain
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to run configuration YAML file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Store backend
    #[arg(long, value_enum)]
    pub backend: Option<BackendArg>,

    /// SQLite database file
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Collection to count and insert into
    #[arg(long)]
    pub collection: Option<String>,

    /// Calling style used to drive the chain
    #[arg(long, value_enum)]
    pub style: Option<CallingStyleArg>,

    /// Message of the inserted note
    #[arg(long)]
    pub message: Option<String>,

    /// Value of the inserted note
    #[arg(long, allow_hyphen_values = true)]
    pub value: Option<i64>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

impl RunCommand {
    /// Layer command-line overrides over `base`
    pub fn apply_to(&self, mut base: RunConfig) -> RunConfig {
        if let Some(backend) = self.backend {
            base.backend = backend.into();
        }
        if let Some(database) = &self.database {
            base.database = Some(database.clone());
        }
        if let Some(collection) = &self.collection {
            base.collection = collection.clone();
        }
        if let Some(style) = self.style {
            base.style = style.into();
        }
        if let Some(message) = &self.message {
            base.note.message = message.clone();
        }
        if let Some(value) = self.value {
            base.note.value = value;
        }
        base
    }
}

/// Validate a run configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to run configuration YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Calling style argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CallingStyleArg {
    Sequence,
    Callback,
    Chain,
    Coroutine,
}

impl From<CallingStyleArg> for CallingStyle {
    fn from(arg: CallingStyleArg) -> Self {
        match arg {
            CallingStyleArg::Sequence => CallingStyle::Sequence,
            CallingStyleArg::Callback => CallingStyle::Callback,
            CallingStyleArg::Chain => CallingStyle::Chain,
            CallingStyleArg::Coroutine => CallingStyle::Coroutine,
        }
    }
}

/// Backend argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendArg {
    Memory,
    Sqlite,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Memory => Backend::Memory,
            BackendArg::Sqlite => Backend::Sqlite,
        }
    }
}
