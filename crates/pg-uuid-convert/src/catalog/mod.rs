//! Catalog reader: support views over `pg_catalog` and the read-only
//! projections the planner consumes.
//!
//! The reader installs six views at the start of a run and answers four
//! questions from them: which columns are primary keys (and their defaults),
//! which columns are foreign keys and what they reference, which columns sit
//! in a non-primary unique index, and which columns are NOT NULL. Every
//! projection is re-queryable and reflects the catalog as it is *now* -
//! nothing is snapshotted here, because earlier master-table conversions must
//! be visible to later plans.

use tokio_postgres::GenericClient;
use tracing::{debug, info};

use crate::core::schema::{
    ForeignKeyInfo, NotNullInfo, PrimaryKeyInfo, SerialTable, UniqueIndexInfo,
};
use crate::error::{ConvertError, Result};

/// Support views, in creation order. Dropped in reverse order before being
/// recreated so dependent views go first.
const SUPPORT_VIEWS: [(&str, &str); 6] = [
    (
        "raw_pk_view",
        r#"
        CREATE VIEW raw_pk_view AS
        SELECT
            conname, conrelid,
            conkey[i] AS conkey,
            i AS ordinal
        FROM (
            SELECT
                conname, conrelid, conkey,
                generate_series(1, array_upper(conkey, 1)) AS i
            FROM pg_constraint
            WHERE contype = 'p'
        ) AS expanded
        "#,
    ),
    (
        "pk_view",
        r#"
        CREATE VIEW pk_view AS
        SELECT
            t.relname AS table_name,
            p.conname AS pk_name,
            a.attname AS column_name,
            pg_get_expr(d.adbin, d.adrelid) AS default_value,
            p.ordinal AS ordinal
        FROM
            raw_pk_view AS p
            JOIN pg_class AS t        ON t.oid = p.conrelid
            JOIN pg_attribute AS a    ON a.attrelid = t.oid
                                     AND a.attnum = p.conkey
            LEFT JOIN pg_attrdef AS d ON d.adrelid = t.oid
                                     AND d.adnum = a.attnum
        "#,
    ),
    (
        "raw_fk_view",
        r#"
        CREATE VIEW raw_fk_view AS
        SELECT
            conname, conrelid, confrelid,
            conkey[i] AS conkey, confkey[i] AS confkey
        FROM (
            SELECT
                conname, conrelid, confrelid, conkey, confkey,
                generate_series(1, array_upper(conkey, 1)) AS i
            FROM pg_constraint
            WHERE contype = 'f'
        ) AS expanded
        "#,
    ),
    (
        "fk_view",
        r#"
        CREATE VIEW fk_view AS
        SELECT
            tf.relname AS referenced_table,
            af.attname AS referenced_column,
            t.relname  AS referencing_table,
            a.attname  AS referencing_column,
            f.conname  AS fk_name
        FROM
            raw_fk_view AS f
            JOIN pg_attribute AS af ON af.attnum = f.confkey
                                   AND af.attrelid = f.confrelid
            JOIN pg_class AS tf     ON tf.oid = f.confrelid
            JOIN pg_attribute AS a  ON a.attnum = f.conkey
                                   AND a.attrelid = f.conrelid
            JOIN pg_class AS t      ON t.oid = f.conrelid
        "#,
    ),
    (
        "unique_view",
        r#"
        CREATE VIEW unique_view AS
        SELECT
            t.relname AS table_name,
            i.relname AS index_name,
            a.attname AS column_name,
            array_position(ix.indkey::int2[], a.attnum) AS ordinal
        FROM
            pg_class AS t
            JOIN pg_attribute AS a ON a.attrelid = t.oid
            JOIN pg_index AS ix    ON t.oid = ix.indrelid
                                  AND a.attnum = ANY(ix.indkey)
            JOIN pg_class AS i     ON i.oid = ix.indexrelid
        WHERE
            t.relkind = 'r'
            AND ix.indisunique IS TRUE
            AND ix.indisprimary IS FALSE
            AND t.relname NOT LIKE 'pg_%'
        "#,
    ),
    (
        "attribute_view",
        r#"
        CREATE VIEW attribute_view AS
        SELECT
            t.relname    AS table_name,
            a.attname    AS column_name,
            a.attnotnull AS not_null
        FROM
            pg_class AS t
            JOIN pg_attribute AS a ON a.attrelid = t.oid
        WHERE
            t.relkind = 'r'
            AND a.attnum > 0
            AND NOT a.attisdropped
            AND t.relname NOT LIKE 'pg_%'
            AND t.relname NOT LIKE 'sql_%'
        "#,
    ),
];

/// Read-only projections over the system catalogs.
pub struct CatalogReader<'a, C: GenericClient> {
    client: &'a C,
}

impl<'a, C: GenericClient> CatalogReader<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Drop and recreate the support views. Any creation failure is fatal:
    /// the planner cannot make a single decision without them.
    pub async fn install_views(&self) -> Result<()> {
        for (name, _) in SUPPORT_VIEWS.iter().rev() {
            let sql = format!("DROP VIEW IF EXISTS {}", name);
            self.client
                .execute(&sql, &[])
                .await
                .map_err(|e| ConvertError::catalog(format!("dropping view {}", name), e))?;
        }

        for (name, ddl) in SUPPORT_VIEWS {
            self.client
                .execute(ddl, &[])
                .await
                .map_err(|e| ConvertError::catalog(format!("creating view {}", name), e))?;
            info!("Created support view '{}'", name);
        }

        Ok(())
    }

    /// One row per (primary-key constraint, column) pair, with the column's
    /// default expression if any.
    pub async fn primary_keys(&self) -> Result<Vec<PrimaryKeyInfo>> {
        let rows = self
            .client
            .query(
                "SELECT table_name, pk_name, column_name, default_value, ordinal
                 FROM pk_view
                 ORDER BY table_name, pk_name, ordinal",
                &[],
            )
            .await
            .map_err(|e| ConvertError::catalog("querying pk_view", e))?;

        let infos = rows
            .iter()
            .map(|row| PrimaryKeyInfo {
                table: row.get(0),
                constraint: row.get(1),
                column: row.get(2),
                default_expr: row.get(3),
                ordinal: row.get(4),
            })
            .collect::<Vec<_>>();

        debug!("Read {} primary-key columns", infos.len());
        Ok(infos)
    }

    /// One row per (foreign-key constraint, column) pair.
    pub async fn foreign_keys(&self) -> Result<Vec<ForeignKeyInfo>> {
        let rows = self
            .client
            .query(
                "SELECT referenced_table, referenced_column,
                        referencing_table, referencing_column, fk_name
                 FROM fk_view
                 ORDER BY referenced_table, referencing_table, fk_name, referencing_column",
                &[],
            )
            .await
            .map_err(|e| ConvertError::catalog("querying fk_view", e))?;

        let infos = rows
            .iter()
            .map(|row| ForeignKeyInfo {
                referenced_table: row.get(0),
                referenced_column: row.get(1),
                referencing_table: row.get(2),
                referencing_column: row.get(3),
                constraint: row.get(4),
            })
            .collect::<Vec<_>>();

        debug!("Read {} foreign-key columns", infos.len());
        Ok(infos)
    }

    /// One row per (unique index, column) pair, excluding primary-key-backed
    /// and system indexes.
    pub async fn unique_indexes(&self) -> Result<Vec<UniqueIndexInfo>> {
        let rows = self
            .client
            .query(
                "SELECT table_name, index_name, column_name, ordinal
                 FROM unique_view
                 ORDER BY table_name, index_name, ordinal",
                &[],
            )
            .await
            .map_err(|e| ConvertError::catalog("querying unique_view", e))?;

        let infos = rows
            .iter()
            .map(|row| UniqueIndexInfo {
                table: row.get(0),
                index: row.get(1),
                column: row.get(2),
                ordinal: row.get(3),
            })
            .collect::<Vec<_>>();

        debug!("Read {} unique-index columns", infos.len());
        Ok(infos)
    }

    /// Nullability flags for every user column.
    pub async fn not_null_flags(&self) -> Result<Vec<NotNullInfo>> {
        let rows = self
            .client
            .query(
                "SELECT table_name, column_name, not_null
                 FROM attribute_view
                 ORDER BY table_name, column_name",
                &[],
            )
            .await
            .map_err(|e| ConvertError::catalog("querying attribute_view", e))?;

        let infos = rows
            .iter()
            .map(|row| NotNullInfo {
                table: row.get(0),
                column: row.get(1),
                not_null: row.get(2),
            })
            .collect::<Vec<_>>();

        debug!("Read {} attribute flags", infos.len());
        Ok(infos)
    }

    /// Tables whose primary-key default is sequence-backed, ordered by table
    /// name for reproducible runs.
    pub async fn serial_tables(&self) -> Result<Vec<SerialTable>> {
        let rows = self
            .client
            .query(
                "SELECT DISTINCT table_name, pk_name
                 FROM pk_view
                 WHERE default_value LIKE 'nextval(%'
                 ORDER BY table_name",
                &[],
            )
            .await
            .map_err(|e| ConvertError::catalog("querying pk_view for serial tables", e))?;

        let tables = rows
            .iter()
            .map(|row| SerialTable {
                table: row.get(0),
                pk_constraint: row.get(1),
            })
            .collect::<Vec<_>>();

        info!("Found {} serial-keyed tables", tables.len());
        Ok(tables)
    }

    /// Remaining sequence generators in user schemas.
    pub async fn sequences(&self) -> Result<Vec<String>> {
        let rows = self
            .client
            .query(
                "SELECT c.relname
                 FROM pg_class AS c
                 JOIN pg_namespace AS n ON n.oid = c.relnamespace
                 WHERE c.relkind = 'S'
                   AND n.nspname NOT IN ('pg_catalog', 'information_schema')
                 ORDER BY c.relname",
                &[],
            )
            .await
            .map_err(|e| ConvertError::catalog("querying pg_class for sequences", e))?;

        Ok(rows.iter().map(|row| row.get(0)).collect())
    }
}
