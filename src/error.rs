//! Error types for tabsync operations

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

/// Backend round-trip an error occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Inspect,
    Create,
    Alter,
    Stage,
    Merge,
    Count,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Inspect => "inspect",
            Step::Create => "create",
            Step::Alter => "alter",
            Step::Stage => "stage",
            Step::Merge => "merge",
            Step::Count => "count",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("Invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Data processing error: {message}")]
    DataProcessing { message: String },

    #[error("Backend failure during {step}: {source}")]
    Step {
        step: Step,
        #[source]
        source: Box<SyncError>,
    },

    #[error("Import into `{table}` failed after its schema was changed; the schema changes may already be committed, re-run the import: {source}")]
    SchemaDrift {
        table: String,
        #[source]
        source: Box<SyncError>,
    },
}

impl SyncError {
    pub fn invalid_identifier(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn data_processing(msg: impl Into<String>) -> Self {
        Self::DataProcessing {
            message: msg.into(),
        }
    }

    /// Attach the failing backend step. Already-tagged errors keep their original step.
    pub fn at_step(self, step: Step) -> Self {
        match self {
            tagged @ (Self::Step { .. } | Self::SchemaDrift { .. }) => tagged,
            other => Self::Step {
                step,
                source: Box::new(other),
            },
        }
    }

    pub fn schema_drift(table: impl Into<String>, source: SyncError) -> Self {
        Self::SchemaDrift {
            table: table.into(),
            source: Box::new(source),
        }
    }

    /// The backend step this error was raised in, if any
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Step { step, .. } => Some(*step),
            Self::SchemaDrift { source, .. } => source.step(),
            _ => None,
        }
    }
}

/// Extension for tagging backend results with the step they belong to
pub trait StepContext<T> {
    fn step(self, step: Step) -> Result<T>;
}

impl<T> StepContext<T> for Result<T> {
    fn step(self, step: Step) -> Result<T> {
        self.map_err(|e| e.at_step(step))
    }
}
