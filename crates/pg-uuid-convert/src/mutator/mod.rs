//! Schema mutator: DDL statement builders and their executor.
//!
//! Each operation is a single statement, built by a pure function (so the
//! generated SQL is unit-testable without a database) and executed through a
//! [`SchemaMutator`] that is generic over [`GenericClient`] - the same
//! operations run inside a transaction or on a plain client. Every failure
//! maps to [`ConvertError::Mutation`] identifying the operation and table,
//! which the driver treats as fatal for the whole run.

use tokio_postgres::GenericClient;
use tracing::debug;

use crate::core::identifier::{quote_column_list, quote_ident};
use crate::error::{ConvertError, Result};

/// Name of the staging UUID column added to a master table before its old
/// integer key is dropped and the staging column takes over its name.
pub const STAGING_COLUMN: &str = "uuid";

fn add_uuid_column_sql(table: &str) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} ADD COLUMN {} uuid DEFAULT uuid_generate_v4()",
        quote_ident(table)?,
        quote_ident(STAGING_COLUMN)?
    ))
}

fn drop_constraint_sql(table: &str, constraint: &str) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} DROP CONSTRAINT {} CASCADE",
        quote_ident(table)?,
        quote_ident(constraint)?
    ))
}

fn add_primary_key_sql(table: &str, columns: &[String], constraint: &str) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
        quote_ident(table)?,
        quote_ident(constraint)?,
        quote_column_list(columns)?
    ))
}

fn add_column_sql(table: &str, column: &str, type_name: &str) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_ident(table)?,
        quote_ident(column)?,
        type_name
    ))
}

/// Backfill: set `dest.dest_column` by resolving the old integer foreign-key
/// value in `dest.link_column` against the master's old key column to the
/// master's staging UUID. Must run before `link_column` is dropped.
fn copy_values_sql(
    dest_table: &str,
    dest_column: &str,
    src_table: &str,
    src_key_column: &str,
    link_column: &str,
) -> Result<String> {
    Ok(format!(
        "UPDATE {dest} AS t SET {dest_col} = (SELECT {staging} FROM {src} WHERE {src_key} = t.{link})",
        dest = quote_ident(dest_table)?,
        dest_col = quote_ident(dest_column)?,
        staging = quote_ident(STAGING_COLUMN)?,
        src = quote_ident(src_table)?,
        src_key = quote_ident(src_key_column)?,
        link = quote_ident(link_column)?,
    ))
}

fn drop_column_sql(table: &str, column: &str) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} DROP COLUMN {} CASCADE",
        quote_ident(table)?,
        quote_ident(column)?
    ))
}

fn rename_column_sql(table: &str, old: &str, new: &str) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {}",
        quote_ident(table)?,
        quote_ident(old)?,
        quote_ident(new)?
    ))
}

#[allow(clippy::too_many_arguments)]
fn add_foreign_key_sql(
    table: &str,
    column: &str,
    ref_table: &str,
    ref_column: &str,
    constraint: &str,
    on_update_cascade: bool,
    on_delete_cascade: bool,
) -> Result<String> {
    let on_update = if on_update_cascade {
        "CASCADE"
    } else {
        "NO ACTION"
    };
    let on_delete = if on_delete_cascade {
        "CASCADE"
    } else {
        "NO ACTION"
    };
    Ok(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON UPDATE {} ON DELETE {}",
        quote_ident(table)?,
        quote_ident(constraint)?,
        quote_ident(column)?,
        quote_ident(ref_table)?,
        quote_ident(ref_column)?,
        on_update,
        on_delete
    ))
}

fn create_unique_index_sql(name: &str, table: &str, columns: &[String]) -> Result<String> {
    Ok(format!(
        "CREATE UNIQUE INDEX {} ON {} ({})",
        quote_ident(name)?,
        quote_ident(table)?,
        quote_column_list(columns)?
    ))
}

fn set_not_null_sql(table: &str, column: &str) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} ALTER COLUMN {} SET NOT NULL",
        quote_ident(table)?,
        quote_ident(column)?
    ))
}

fn drop_sequence_sql(name: &str) -> Result<String> {
    Ok(format!("DROP SEQUENCE {}", quote_ident(name)?))
}

fn create_extension_sql(name: &str) -> Result<String> {
    Ok(format!("CREATE EXTENSION {}", quote_ident(name)?))
}

/// Stateless executor for structural changes.
pub struct SchemaMutator<'a, C: GenericClient> {
    client: &'a C,
}

impl<'a, C: GenericClient> SchemaMutator<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    async fn execute(&self, sql: String, operation: &str, table: &str) -> Result<()> {
        self.client
            .execute(&sql, &[])
            .await
            .map_err(|e| ConvertError::mutation(operation, table, e))?;
        debug!("{} on {}", operation, table);
        Ok(())
    }

    /// Add the randomly-defaulted staging UUID column to a master table.
    pub async fn add_uuid_column(&self, table: &str) -> Result<()> {
        self.execute(add_uuid_column_sql(table)?, "ADD COLUMN uuid", table)
            .await
    }

    /// Drop a constraint, cascading to constraints that depend on it.
    pub async fn drop_constraint(&self, table: &str, constraint: &str) -> Result<()> {
        self.execute(
            drop_constraint_sql(table, constraint)?,
            "DROP CONSTRAINT",
            table,
        )
        .await
    }

    /// Add a primary key over one or more columns, reusing `constraint` as
    /// the constraint name.
    pub async fn add_primary_key(
        &self,
        table: &str,
        columns: &[String],
        constraint: &str,
    ) -> Result<()> {
        self.execute(
            add_primary_key_sql(table, columns, constraint)?,
            "ADD PRIMARY KEY",
            table,
        )
        .await
    }

    pub async fn add_column(&self, table: &str, column: &str, type_name: &str) -> Result<()> {
        self.execute(add_column_sql(table, column, type_name)?, "ADD COLUMN", table)
            .await
    }

    /// Backfill a dependent table's new UUID column from the master's staging
    /// column via the old integer key.
    pub async fn copy_values(
        &self,
        dest_table: &str,
        dest_column: &str,
        src_table: &str,
        src_key_column: &str,
        link_column: &str,
    ) -> Result<()> {
        self.execute(
            copy_values_sql(dest_table, dest_column, src_table, src_key_column, link_column)?,
            "BACKFILL",
            dest_table,
        )
        .await
    }

    /// Drop a column, cascading to constraints and indexes built on it.
    pub async fn drop_column(&self, table: &str, column: &str) -> Result<()> {
        self.execute(drop_column_sql(table, column)?, "DROP COLUMN", table)
            .await
    }

    pub async fn rename_column(&self, table: &str, old: &str, new: &str) -> Result<()> {
        self.execute(rename_column_sql(table, old, new)?, "RENAME COLUMN", table)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn add_foreign_key(
        &self,
        table: &str,
        column: &str,
        ref_table: &str,
        ref_column: &str,
        constraint: &str,
        on_update_cascade: bool,
        on_delete_cascade: bool,
    ) -> Result<()> {
        self.execute(
            add_foreign_key_sql(
                table,
                column,
                ref_table,
                ref_column,
                constraint,
                on_update_cascade,
                on_delete_cascade,
            )?,
            "ADD FOREIGN KEY",
            table,
        )
        .await
    }

    pub async fn create_unique_index(
        &self,
        name: &str,
        table: &str,
        columns: &[String],
    ) -> Result<()> {
        self.execute(
            create_unique_index_sql(name, table, columns)?,
            "CREATE UNIQUE INDEX",
            table,
        )
        .await
    }

    pub async fn set_not_null(&self, table: &str, column: &str) -> Result<()> {
        self.execute(set_not_null_sql(table, column)?, "SET NOT NULL", table)
            .await
    }

    pub async fn drop_sequence(&self, name: &str) -> Result<()> {
        self.execute(drop_sequence_sql(name)?, "DROP SEQUENCE", name)
            .await
    }

    /// Install the UUID-generator extension. The caller treats failure here
    /// as the run's only soft error (the extension is usually already
    /// installed).
    pub async fn create_extension(&self, name: &str) -> Result<()> {
        self.execute(create_extension_sql(name)?, "CREATE EXTENSION", name)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_uuid_column_sql() {
        assert_eq!(
            add_uuid_column_sql("customers").unwrap(),
            "ALTER TABLE \"customers\" ADD COLUMN \"uuid\" uuid DEFAULT uuid_generate_v4()"
        );
    }

    #[test]
    fn test_drop_constraint_cascades() {
        assert_eq!(
            drop_constraint_sql("customers", "customers_pkey").unwrap(),
            "ALTER TABLE \"customers\" DROP CONSTRAINT \"customers_pkey\" CASCADE"
        );
    }

    #[test]
    fn test_add_primary_key_reuses_name() {
        assert_eq!(
            add_primary_key_sql("customers", &cols(&["uuid"]), "customers_pkey").unwrap(),
            "ALTER TABLE \"customers\" ADD CONSTRAINT \"customers_pkey\" PRIMARY KEY (\"uuid\")"
        );
    }

    #[test]
    fn test_add_composite_primary_key() {
        assert_eq!(
            add_primary_key_sql("order_items", &cols(&["order_id", "item_no"]), "order_items_pkey")
                .unwrap(),
            "ALTER TABLE \"order_items\" ADD CONSTRAINT \"order_items_pkey\" \
             PRIMARY KEY (\"order_id\", \"item_no\")"
        );
    }

    #[test]
    fn test_copy_values_resolves_via_old_key() {
        assert_eq!(
            copy_values_sql("orders", "customer_uuid", "customers", "id", "customer_id").unwrap(),
            "UPDATE \"orders\" AS t SET \"customer_uuid\" = \
             (SELECT \"uuid\" FROM \"customers\" WHERE \"id\" = t.\"customer_id\")"
        );
    }

    #[test]
    fn test_drop_column_cascades() {
        assert_eq!(
            drop_column_sql("orders", "customer_id").unwrap(),
            "ALTER TABLE \"orders\" DROP COLUMN \"customer_id\" CASCADE"
        );
    }

    #[test]
    fn test_rename_column_sql() {
        assert_eq!(
            rename_column_sql("orders", "customer_uuid", "customer_id").unwrap(),
            "ALTER TABLE \"orders\" RENAME COLUMN \"customer_uuid\" TO \"customer_id\""
        );
    }

    #[test]
    fn test_add_foreign_key_cascading() {
        assert_eq!(
            add_foreign_key_sql(
                "orders",
                "customer_id",
                "customers",
                "uuid",
                "orders_customer_id_fkey",
                true,
                true
            )
            .unwrap(),
            "ALTER TABLE \"orders\" ADD CONSTRAINT \"orders_customer_id_fkey\" \
             FOREIGN KEY (\"customer_id\") REFERENCES \"customers\" (\"uuid\") \
             ON UPDATE CASCADE ON DELETE CASCADE"
        );
    }

    #[test]
    fn test_add_foreign_key_no_action() {
        let sql = add_foreign_key_sql("a", "b", "c", "d", "fk", false, false).unwrap();
        assert!(sql.ends_with("ON UPDATE NO ACTION ON DELETE NO ACTION"));
    }

    #[test]
    fn test_create_unique_index_multi_column() {
        assert_eq!(
            create_unique_index_sql("orders_cust_region_key", "orders", &cols(&["customer_id", "region"]))
                .unwrap(),
            "CREATE UNIQUE INDEX \"orders_cust_region_key\" ON \"orders\" \
             (\"customer_id\", \"region\")"
        );
    }

    #[test]
    fn test_set_not_null_sql() {
        assert_eq!(
            set_not_null_sql("orders", "customer_id").unwrap(),
            "ALTER TABLE \"orders\" ALTER COLUMN \"customer_id\" SET NOT NULL"
        );
    }

    #[test]
    fn test_drop_sequence_sql() {
        assert_eq!(
            drop_sequence_sql("customers_id_seq").unwrap(),
            "DROP SEQUENCE \"customers_id_seq\""
        );
    }

    #[test]
    fn test_create_extension_quotes_hyphenated_name() {
        assert_eq!(
            create_extension_sql("uuid-ossp").unwrap(),
            "CREATE EXTENSION \"uuid-ossp\""
        );
    }

    #[test]
    fn test_builders_reject_hostile_identifiers() {
        assert!(add_uuid_column_sql("t\0able").is_err());
        assert!(drop_sequence_sql("").is_err());
        // Quoting neutralizes embedded quotes rather than rejecting them.
        let sql = drop_column_sql("orders", "x\"; DROP TABLE orders; --").unwrap();
        assert!(sql.contains("\"x\"\"; DROP TABLE orders; --\""));
    }
}
