//! Conversion orchestrator - main workflow coordinator.
//!
//! Drives the whole run: connect, install the UUID extension (the run's only
//! soft failure), install the catalog support views, convert each
//! serial-keyed master table, then sweep up orphaned sequence generators.
//! Each master-table conversion happens inside a single transaction committed
//! only at its terminal state, so an aborted run never leaves a
//! half-migrated table behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio_postgres::{Client, GenericClient, NoTls};
use tracing::{error, info};
use uuid::Uuid;

use crate::catalog::CatalogReader;
use crate::config::Config;
use crate::error::Result;
use crate::mutator::{SchemaMutator, STAGING_COLUMN};
use crate::planner::{self, ConversionPlan};

/// Conversion orchestrator. Owns the single database session the whole run
/// uses; one DDL statement is in flight at a time.
pub struct Orchestrator {
    config: Config,
    client: Client,
}

/// Result of a conversion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Serial-keyed tables discovered.
    pub tables_total: usize,

    /// Master tables converted.
    pub tables_converted: usize,

    /// Dependent foreign-key columns migrated.
    pub dependents_migrated: usize,

    /// Sequence generators dropped in the final sweep.
    pub sequences_dropped: usize,

    /// Names of the converted master tables.
    pub converted_tables: Vec<String>,

    /// Whether this was a dry run (plans computed, no DDL executed).
    pub dry_run: bool,
}

impl ConversionResult {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Result of a connectivity probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub connected: bool,
    pub latency_ms: u64,
    pub server_version: Option<String>,
}

impl Orchestrator {
    /// Connect and create a new orchestrator. Connection failure is fatal at
    /// startup; nothing can proceed without the session.
    pub async fn new(config: Config) -> Result<Self> {
        let (client, connection) =
            tokio_postgres::connect(&config.database.connection_string(), NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("Database connection error: {}", e);
            }
        });

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.database.host, config.database.port, config.database.database
        );

        Ok(Self { config, client })
    }

    /// Probe the session and report latency and server version.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let start = Instant::now();
        self.client.simple_query("SELECT 1").await?;
        let latency_ms = start.elapsed().as_millis() as u64;

        let server_version = self
            .client
            .query_one("SHOW server_version", &[])
            .await
            .ok()
            .map(|row| row.get(0));

        Ok(HealthCheckResult {
            connected: true,
            latency_ms,
            server_version,
        })
    }

    /// Run the conversion. With `dry_run` set, plans are computed and logged
    /// but no DDL executes (the support views are still installed, since the
    /// planner reads through them).
    pub async fn run(mut self, dry_run: bool) -> Result<ConversionResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let run_id = Uuid::new_v4().to_string();

        info!("Starting conversion run: {}", run_id);

        // Phase 1: UUID generator extension. The single soft error: an
        // already-installed extension fails here and the run continues.
        if !dry_run {
            let mutator = SchemaMutator::new(&self.client);
            let extension = self.config.convert.uuid_extension.clone();
            match mutator.create_extension(&extension).await {
                Ok(()) => info!("Installed extension '{}'", extension),
                Err(e) => info!(
                    "Could not install extension '{}' (usually already present): {}",
                    extension, e
                ),
            }
        }

        // Phase 2: support views.
        info!("Phase 2: Installing catalog support views");
        {
            let tx = self.client.transaction().await?;
            CatalogReader::new(&tx).install_views().await?;
            tx.commit().await?;
        }

        // Phase 3: find conversion candidates. Computed once; the per-table
        // catalog snapshots below are re-read fresh for every master.
        let serial_tables = CatalogReader::new(&self.client).serial_tables().await?;
        let tables_total = serial_tables.len();

        // Phase 4: convert each master, one transaction per table.
        let mut converted_tables = Vec::with_capacity(tables_total);
        let mut dependents_migrated = 0;
        for serial in &serial_tables {
            info!("Converting '{}'", serial.table);

            if dry_run {
                let reader = CatalogReader::new(&self.client);
                let plan = build_plan(&reader, &serial.table).await?;
                for line in plan.describe() {
                    info!("  {}", line);
                }
                dependents_migrated += plan.dependents.len();
                converted_tables.push(serial.table.clone());
                continue;
            }

            let tx = self.client.transaction().await?;
            // Snapshot constraint metadata before any cascading drop can
            // destroy it: the plan is fully built before the first statement.
            let plan = build_plan(&CatalogReader::new(&tx), &serial.table).await?;
            execute_plan(&SchemaMutator::new(&tx), &plan).await?;
            tx.commit().await?;

            info!(
                "Converted '{}' ({} dependent columns)",
                plan.master_table,
                plan.dependents.len()
            );
            dependents_migrated += plan.dependents.len();
            converted_tables.push(serial.table.clone());
        }

        // Phase 5: sweep orphaned sequence generators.
        let mut sequences_dropped = 0;
        if self.config.convert.drop_sequences {
            let sequences = CatalogReader::new(&self.client).sequences().await?;
            info!("Removing {} remaining sequence generators", sequences.len());

            if dry_run {
                for seq in &sequences {
                    info!("  would drop sequence '{}'", seq);
                }
            } else {
                let tx = self.client.transaction().await?;
                let mutator = SchemaMutator::new(&tx);
                for seq in &sequences {
                    mutator.drop_sequence(seq).await?;
                    info!("Dropped sequence '{}'", seq);
                }
                tx.commit().await?;
                sequences_dropped = sequences.len();
            }
        }

        let completed_at = Utc::now();
        let status = if dry_run { "dry-run" } else { "completed" };
        info!("Conversion run {} {}", run_id, status);

        Ok(ConversionResult {
            run_id,
            status: status.to_string(),
            duration_seconds: start.elapsed().as_secs_f64(),
            started_at,
            completed_at,
            tables_total,
            tables_converted: converted_tables.len(),
            dependents_migrated,
            sequences_dropped,
            converted_tables,
            dry_run,
        })
    }
}

/// Read the four catalog projections and derive the plan for one master.
async fn build_plan<C: GenericClient>(
    reader: &CatalogReader<'_, C>,
    master_table: &str,
) -> Result<ConversionPlan> {
    let primary_keys = reader.primary_keys().await?;
    let foreign_keys = reader.foreign_keys().await?;
    let unique_indexes = reader.unique_indexes().await?;
    let not_null_flags = reader.not_null_flags().await?;

    planner::plan_table(
        master_table,
        &primary_keys,
        &foreign_keys,
        &unique_indexes,
        &not_null_flags,
    )
}

/// Execute one master-table plan in the required step order. The caller wraps
/// this in a transaction committed only after the final rename.
async fn execute_plan<C: GenericClient>(
    mutator: &SchemaMutator<'_, C>,
    plan: &ConversionPlan,
) -> Result<()> {
    let master = plan.master_table.as_str();

    mutator.add_uuid_column(master).await?;
    mutator.drop_constraint(master, &plan.pk_constraint).await?;
    mutator
        .add_primary_key(master, &[STAGING_COLUMN.to_string()], &plan.pk_constraint)
        .await?;
    info!("Created UUID primary key on '{}'", master);

    for dep in &plan.dependents {
        mutator.add_column(&dep.table, &dep.new_column, "uuid").await?;
        // Backfill must precede the drop of the old column it resolves through.
        mutator
            .copy_values(&dep.table, &dep.new_column, master, &plan.pk_column, &dep.old_column)
            .await?;
        mutator.drop_column(&dep.table, &dep.old_column).await?;
        mutator
            .rename_column(&dep.table, &dep.new_column, &dep.old_column)
            .await?;
        mutator
            .add_foreign_key(
                &dep.table,
                &dep.old_column,
                master,
                STAGING_COLUMN,
                &dep.fk_constraint,
                true,
                true,
            )
            .await?;

        for idx in &dep.unique_indexes {
            mutator
                .create_unique_index(&idx.name, &dep.table, &idx.columns)
                .await?;
        }
        if let Some(pk) = &dep.primary_key {
            mutator.add_primary_key(&dep.table, &pk.columns, &pk.name).await?;
        }
        if dep.not_null {
            mutator.set_not_null(&dep.table, &dep.old_column).await?;
        }

        info!("Adjusted dependent table '{}'", dep.table);
    }

    mutator.drop_column(master, &plan.pk_column).await?;
    mutator
        .rename_column(master, STAGING_COLUMN, &plan.pk_column)
        .await?;

    Ok(())
}
