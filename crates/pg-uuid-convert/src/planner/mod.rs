//! Conversion planner.
//!
//! Derives, for one master table, the full ordered work list: which dependent
//! tables and columns must migrate alongside it, and which constraints
//! (unique indexes, composite primary keys, NOT NULL) must be reapplied to
//! the replacement columns. The planner is a pure function over catalog
//! snapshots - it never touches the database - so every constraint read is
//! guaranteed to happen before the cascading drops that would destroy it.

use serde::Serialize;

use crate::core::schema::{ForeignKeyInfo, NotNullInfo, PrimaryKeyInfo, UniqueIndexInfo};
use crate::error::{ConvertError, Result};

/// Suffix convention for foreign-key columns: `<stem>_id` migrates through a
/// staging column named `<stem>_uuid` and back to `<stem>_id`.
const FK_SUFFIX: &str = "_id";
const STAGING_SUFFIX: &str = "_uuid";

/// A snapshot of one unique index the old column participated in. The
/// cascading column drop destroys the index; it is recreated from this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSnapshot {
    pub name: String,
    pub columns: Vec<String>,
}

/// A snapshot of a (possibly composite) primary key the old column was part of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstraintSnapshot {
    pub name: String,
    pub columns: Vec<String>,
}

/// One dependent table's migration: the foreign-key column to replace and
/// everything that must be reattached to the replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependentPlan {
    pub table: String,
    pub old_column: String,
    pub new_column: String,
    pub fk_constraint: String,
    pub unique_indexes: Vec<IndexSnapshot>,
    pub primary_key: Option<ConstraintSnapshot>,
    pub not_null: bool,
}

/// The full ordered plan for one master table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionPlan {
    pub master_table: String,
    pub pk_constraint: String,
    pub pk_column: String,
    pub dependents: Vec<DependentPlan>,
}

impl ConversionPlan {
    /// Human-readable step list, used for dry runs.
    pub fn describe(&self) -> Vec<String> {
        let mut steps = vec![
            format!("add UUID column to {}", self.master_table),
            format!("drop primary key {} (cascade)", self.pk_constraint),
            format!(
                "add primary key {} on {}.uuid",
                self.pk_constraint, self.master_table
            ),
        ];
        for dep in &self.dependents {
            steps.push(format!(
                "migrate {}.{} -> {} (fk {})",
                dep.table, dep.old_column, dep.new_column, dep.fk_constraint
            ));
            for idx in &dep.unique_indexes {
                steps.push(format!(
                    "  recreate unique index {} on ({})",
                    idx.name,
                    idx.columns.join(", ")
                ));
            }
            if let Some(pk) = &dep.primary_key {
                steps.push(format!(
                    "  recreate primary key {} on ({})",
                    pk.name,
                    pk.columns.join(", ")
                ));
            }
            if dep.not_null {
                steps.push(format!("  reapply NOT NULL on {}.{}", dep.table, dep.old_column));
            }
        }
        steps.push(format!(
            "drop {}.{} and rename uuid -> {}",
            self.master_table, self.pk_column, self.pk_column
        ));
        steps
    }
}

/// Compute the replacement column name for an old foreign-key column. The
/// `_id` suffix convention is a hard assumption; columns that do not follow
/// it are rejected rather than silently mismatched.
fn staging_column_name(table: &str, old_column: &str) -> Result<String> {
    match old_column.strip_suffix(FK_SUFFIX) {
        Some(stem) if !stem.is_empty() => Ok(format!("{}{}", stem, STAGING_SUFFIX)),
        _ => Err(ConvertError::planner(
            table,
            format!(
                "foreign-key column '{}' does not follow the '<name>{}' naming convention",
                old_column, FK_SUFFIX
            ),
        )),
    }
}

/// Plan the conversion of one master table from catalog snapshots.
///
/// Dependents are ordered by (table, constraint, column) so runs are
/// reproducible regardless of catalog scan order. Every unique index the old
/// column participates in is snapshotted - not just the last one observed.
pub fn plan_table(
    master_table: &str,
    primary_keys: &[PrimaryKeyInfo],
    foreign_keys: &[ForeignKeyInfo],
    unique_indexes: &[UniqueIndexInfo],
    not_null_flags: &[NotNullInfo],
) -> Result<ConversionPlan> {
    let pk_rows: Vec<&PrimaryKeyInfo> = primary_keys
        .iter()
        .filter(|pk| pk.table == master_table)
        .collect();

    let first = pk_rows.first().ok_or_else(|| {
        ConvertError::planner(master_table, "table has no primary key")
    })?;

    if pk_rows.len() > 1 {
        return Err(ConvertError::planner(
            master_table,
            format!(
                "composite primary key '{}' spans {} columns; serial-to-UUID \
                 conversion supports single-column keys only",
                first.constraint,
                pk_rows.len()
            ),
        ));
    }

    let pk_column = first.column.clone();
    let pk_constraint = first.constraint.clone();

    let mut dependent_fks: Vec<&ForeignKeyInfo> = foreign_keys
        .iter()
        .filter(|fk| fk.referenced_table == master_table)
        .collect();
    dependent_fks.sort_by(|a, b| {
        (&a.referencing_table, &a.constraint, &a.referencing_column)
            .cmp(&(&b.referencing_table, &b.constraint, &b.referencing_column))
    });

    let mut dependents = Vec::with_capacity(dependent_fks.len());
    for fk in dependent_fks {
        let table = &fk.referencing_table;
        let old_column = &fk.referencing_column;
        let new_column = staging_column_name(table, old_column)?;

        dependents.push(DependentPlan {
            table: table.clone(),
            old_column: old_column.clone(),
            new_column,
            fk_constraint: fk.constraint.clone(),
            unique_indexes: snapshot_unique_indexes(table, old_column, unique_indexes),
            primary_key: snapshot_primary_key(table, old_column, primary_keys),
            not_null: not_null_flags
                .iter()
                .find(|nn| &nn.table == table && &nn.column == old_column)
                .map(|nn| nn.not_null)
                .unwrap_or(false),
        });
    }

    Ok(ConversionPlan {
        master_table: master_table.to_string(),
        pk_constraint,
        pk_column,
        dependents,
    })
}

/// Every unique index covering `column`, each with its full ordered column
/// set. All of them are destroyed by the cascading column drop and all of
/// them are recreated.
fn snapshot_unique_indexes(
    table: &str,
    column: &str,
    unique_indexes: &[UniqueIndexInfo],
) -> Vec<IndexSnapshot> {
    let mut names: Vec<&String> = unique_indexes
        .iter()
        .filter(|ui| ui.table == table && ui.column == column)
        .map(|ui| &ui.index)
        .collect();
    names.sort();
    names.dedup();

    names
        .into_iter()
        .map(|name| {
            let mut members: Vec<&UniqueIndexInfo> = unique_indexes
                .iter()
                .filter(|ui| ui.table == table && &ui.index == name)
                .collect();
            members.sort_by_key(|ui| ui.ordinal);
            IndexSnapshot {
                name: name.clone(),
                columns: members.into_iter().map(|ui| ui.column.clone()).collect(),
            }
        })
        .collect()
}

/// The primary key `column` is part of, if any, with its full ordered column
/// set (dependent tables may have composite keys including the FK column).
fn snapshot_primary_key(
    table: &str,
    column: &str,
    primary_keys: &[PrimaryKeyInfo],
) -> Option<ConstraintSnapshot> {
    let hit = primary_keys
        .iter()
        .find(|pk| pk.table == table && pk.column == column)?;

    let mut members: Vec<&PrimaryKeyInfo> = primary_keys
        .iter()
        .filter(|pk| pk.table == table && pk.constraint == hit.constraint)
        .collect();
    members.sort_by_key(|pk| pk.ordinal);

    Some(ConstraintSnapshot {
        name: hit.constraint.clone(),
        columns: members.into_iter().map(|pk| pk.column.clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pk(table: &str, constraint: &str, column: &str, default: Option<&str>, ordinal: i32) -> PrimaryKeyInfo {
        PrimaryKeyInfo {
            table: table.to_string(),
            constraint: constraint.to_string(),
            column: column.to_string(),
            default_expr: default.map(|d| d.to_string()),
            ordinal,
        }
    }

    fn fk(referenced: &str, ref_col: &str, referencing: &str, col: &str, name: &str) -> ForeignKeyInfo {
        ForeignKeyInfo {
            referenced_table: referenced.to_string(),
            referenced_column: ref_col.to_string(),
            referencing_table: referencing.to_string(),
            referencing_column: col.to_string(),
            constraint: name.to_string(),
        }
    }

    fn uniq(table: &str, index: &str, column: &str, ordinal: i32) -> UniqueIndexInfo {
        UniqueIndexInfo {
            table: table.to_string(),
            index: index.to_string(),
            column: column.to_string(),
            ordinal,
        }
    }

    fn nn(table: &str, column: &str, not_null: bool) -> NotNullInfo {
        NotNullInfo {
            table: table.to_string(),
            column: column.to_string(),
            not_null,
        }
    }

    #[test]
    fn test_master_without_dependents() {
        let pks = vec![pk("customers", "customers_pkey", "id", Some("nextval('customers_id_seq'::regclass)"), 1)];
        let plan = plan_table("customers", &pks, &[], &[], &[]).unwrap();
        assert_eq!(plan.master_table, "customers");
        assert_eq!(plan.pk_constraint, "customers_pkey");
        assert_eq!(plan.pk_column, "id");
        assert!(plan.dependents.is_empty());
    }

    #[test]
    fn test_missing_primary_key_rejected() {
        let err = plan_table("ghost", &[], &[], &[], &[]).unwrap_err();
        assert!(err.to_string().contains("no primary key"));
    }

    #[test]
    fn test_composite_serial_pk_rejected() {
        let pks = vec![
            pk("shipments", "shipments_pkey", "region_id", None, 1),
            pk("shipments", "shipments_pkey", "shipment_id", None, 2),
        ];
        let err = plan_table("shipments", &pks, &[], &[], &[]).unwrap_err();
        assert!(err.to_string().contains("composite primary key"));
    }

    #[test]
    fn test_dependent_column_naming() {
        let pks = vec![pk("customers", "customers_pkey", "id", None, 1)];
        let fks = vec![fk("customers", "id", "orders", "customer_id", "orders_customer_id_fkey")];
        let plan = plan_table("customers", &pks, &fks, &[], &[]).unwrap();
        assert_eq!(plan.dependents.len(), 1);
        let dep = &plan.dependents[0];
        assert_eq!(dep.new_column, "customer_uuid");
        assert_eq!(dep.fk_constraint, "orders_customer_id_fkey");
    }

    #[test]
    fn test_nonconforming_column_name_rejected() {
        let pks = vec![pk("customers", "customers_pkey", "id", None, 1)];
        let fks = vec![fk("customers", "id", "orders", "customer_ref", "orders_customer_ref_fkey")];
        let err = plan_table("customers", &pks, &fks, &[], &[]).unwrap_err();
        assert!(err.to_string().contains("naming convention"));
    }

    #[test]
    fn test_bare_id_column_rejected() {
        // Stripping "_id" from "_id" leaves an empty stem.
        let pks = vec![pk("customers", "customers_pkey", "id", None, 1)];
        let fks = vec![fk("customers", "id", "orders", "_id", "orders_id_fkey")];
        assert!(plan_table("customers", &pks, &fks, &[], &[]).is_err());
    }

    #[test]
    fn test_dependents_sorted_deterministically() {
        let pks = vec![pk("customers", "customers_pkey", "id", None, 1)];
        let fks = vec![
            fk("customers", "id", "shipments", "customer_id", "shipments_customer_id_fkey"),
            fk("customers", "id", "invoices", "customer_id", "invoices_customer_id_fkey"),
            fk("customers", "id", "orders", "customer_id", "orders_customer_id_fkey"),
        ];
        let plan = plan_table("customers", &pks, &fks, &[], &[]).unwrap();
        let tables: Vec<&str> = plan.dependents.iter().map(|d| d.table.as_str()).collect();
        assert_eq!(tables, vec!["invoices", "orders", "shipments"]);
    }

    #[test]
    fn test_unique_index_snapshot_preserves_column_order() {
        let pks = vec![pk("customers", "customers_pkey", "id", None, 1)];
        let fks = vec![fk("customers", "id", "orders", "customer_id", "orders_customer_id_fkey")];
        let uniques = vec![
            uniq("orders", "orders_cust_region_key", "region", 2),
            uniq("orders", "orders_cust_region_key", "customer_id", 1),
        ];
        let plan = plan_table("customers", &pks, &fks, &uniques, &[]).unwrap();
        let idx = &plan.dependents[0].unique_indexes[0];
        assert_eq!(idx.columns, vec!["customer_id", "region"]);
    }

    #[test]
    fn test_all_unique_indexes_kept() {
        // The old column sits in two unique indexes; both must survive, not
        // just the last one observed.
        let pks = vec![pk("customers", "customers_pkey", "id", None, 1)];
        let fks = vec![fk("customers", "id", "orders", "customer_id", "orders_customer_id_fkey")];
        let uniques = vec![
            uniq("orders", "orders_customer_id_key", "customer_id", 1),
            uniq("orders", "orders_cust_region_key", "customer_id", 1),
            uniq("orders", "orders_cust_region_key", "region", 2),
        ];
        let plan = plan_table("customers", &pks, &fks, &uniques, &[]).unwrap();
        let names: Vec<&str> = plan.dependents[0]
            .unique_indexes
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(names, vec!["orders_cust_region_key", "orders_customer_id_key"]);
    }

    #[test]
    fn test_unrelated_unique_index_ignored() {
        let pks = vec![pk("customers", "customers_pkey", "id", None, 1)];
        let fks = vec![fk("customers", "id", "orders", "customer_id", "orders_customer_id_fkey")];
        let uniques = vec![uniq("orders", "orders_number_key", "number", 1)];
        let plan = plan_table("customers", &pks, &fks, &uniques, &[]).unwrap();
        assert!(plan.dependents[0].unique_indexes.is_empty());
    }

    #[test]
    fn test_composite_dependent_pk_snapshot() {
        // orders' own composite PK includes the FK column; the full ordered
        // column set must be captured for recreation.
        let pks = vec![
            pk("customers", "customers_pkey", "id", None, 1),
            pk("orders", "orders_pkey", "customer_id", None, 1),
            pk("orders", "orders_pkey", "order_no", None, 2),
        ];
        let fks = vec![fk("customers", "id", "orders", "customer_id", "orders_customer_id_fkey")];
        let plan = plan_table("customers", &pks, &fks, &[], &[]).unwrap();
        let dep_pk = plan.dependents[0].primary_key.as_ref().unwrap();
        assert_eq!(dep_pk.name, "orders_pkey");
        assert_eq!(dep_pk.columns, vec!["customer_id", "order_no"]);
    }

    #[test]
    fn test_not_null_snapshot() {
        let pks = vec![pk("customers", "customers_pkey", "id", None, 1)];
        let fks = vec![fk("customers", "id", "orders", "customer_id", "orders_customer_id_fkey")];
        let flags = vec![nn("orders", "customer_id", true)];
        let plan = plan_table("customers", &pks, &fks, &[], &flags).unwrap();
        assert!(plan.dependents[0].not_null);
    }

    #[test]
    fn test_nullable_dependent_column() {
        let pks = vec![pk("customers", "customers_pkey", "id", None, 1)];
        let fks = vec![fk("customers", "id", "orders", "customer_id", "orders_customer_id_fkey")];
        let flags = vec![nn("orders", "customer_id", false)];
        let plan = plan_table("customers", &pks, &fks, &[], &flags).unwrap();
        assert!(!plan.dependents[0].not_null);
    }

    #[test]
    fn test_describe_lists_every_step() {
        let pks = vec![
            pk("customers", "customers_pkey", "id", None, 1),
            pk("orders", "orders_pkey", "customer_id", None, 1),
        ];
        let fks = vec![fk("customers", "id", "orders", "customer_id", "orders_customer_id_fkey")];
        let uniques = vec![uniq("orders", "orders_customer_id_key", "customer_id", 1)];
        let flags = vec![nn("orders", "customer_id", true)];
        let plan = plan_table("customers", &pks, &fks, &uniques, &flags).unwrap();
        let text = plan.describe().join("\n");
        assert!(text.contains("add UUID column to customers"));
        assert!(text.contains("migrate orders.customer_id -> customer_uuid"));
        assert!(text.contains("recreate unique index orders_customer_id_key"));
        assert!(text.contains("recreate primary key orders_pkey"));
        assert!(text.contains("reapply NOT NULL on orders.customer_id"));
        assert!(text.contains("rename uuid -> id"));
    }
}
