//! # pg-uuid-convert
//!
//! Convert serial integer primary keys in a live PostgreSQL schema to UUID
//! keys, preserving referential integrity, uniqueness and nullability.
//!
//! The library discovers conversion candidates directly from the system
//! catalogs, plans a dependency-respecting sequence of DDL operations for
//! each master table and its foreign-key dependents, executes the plan
//! transactionally, and finally removes the now-unused sequence generators.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_uuid_convert::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pg_uuid_convert::ConvertError> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run(false).await?;
//!     println!("Converted {} tables", result.tables_converted);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod core;
pub mod error;
pub mod mutator;
pub mod orchestrator;
pub mod planner;

// Re-exports for convenient access
pub use catalog::CatalogReader;
pub use config::{Config, ConvertConfig, DatabaseConfig};
pub use crate::core::schema::{
    ForeignKeyInfo, NotNullInfo, PrimaryKeyInfo, SerialTable, UniqueIndexInfo,
};
pub use error::{ConvertError, Result};
pub use mutator::SchemaMutator;
pub use orchestrator::{ConversionResult, HealthCheckResult, Orchestrator};
pub use planner::{ConversionPlan, DependentPlan};
