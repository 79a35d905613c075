//! Error types for the conversion library.

use thiserror::Error;

/// Main error type for conversion operations.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Configuration error (invalid YAML, missing fields, bad identifiers).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection-level database error.
    #[error("Database error: {0}")]
    Db(#[from] tokio_postgres::Error),

    /// Catalog introspection failed (support views or metadata queries).
    #[error("Catalog error: {context}")]
    Catalog {
        context: String,
        #[source]
        source: tokio_postgres::Error,
    },

    /// A DDL statement failed. Fatal for the whole run.
    #[error("Schema mutation failed: {operation} on table {table}")]
    Mutation {
        operation: String,
        table: String,
        #[source]
        source: tokio_postgres::Error,
    },

    /// The planner could not derive a safe conversion for a table.
    #[error("Cannot plan conversion for table {table}: {message}")]
    Planner { table: String, message: String },

    /// IO error (reading the config file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConvertError {
    /// Create a Catalog error with context about which query failed.
    pub fn catalog(context: impl Into<String>, source: tokio_postgres::Error) -> Self {
        ConvertError::Catalog {
            context: context.into(),
            source,
        }
    }

    /// Create a Mutation error identifying the failed operation and table.
    pub fn mutation(
        operation: impl Into<String>,
        table: impl Into<String>,
        source: tokio_postgres::Error,
    ) -> Self {
        ConvertError::Mutation {
            operation: operation.into(),
            table: table.into(),
            source,
        }
    }

    /// Create a Planner error for a specific table.
    pub fn planner(table: impl Into<String>, message: impl Into<String>) -> Self {
        ConvertError::Planner {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error. Config problems exit 2 so callers
    /// can distinguish "fix your YAML" from a failed run.
    pub fn exit_code(&self) -> u8 {
        match self {
            ConvertError::Config(_) | ConvertError::Yaml(_) | ConvertError::Io(_) => 2,
            _ => 1,
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, ConvertError>;
