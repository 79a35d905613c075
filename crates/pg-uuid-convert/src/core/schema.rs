//! Schema metadata records read from the system catalogs.
//!
//! These are transient query results, re-read from the catalog whenever the
//! driver needs them. Nothing here is cached across conversion steps: a
//! previous master-table conversion may have renamed columns or recreated
//! constraints that a later plan must observe.

use serde::Serialize;

/// One (primary-key constraint, column) pair. A composite primary key
/// produces several rows sharing `constraint`; `ordinal` is the column's
/// position within the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimaryKeyInfo {
    pub table: String,
    pub constraint: String,
    pub column: String,
    /// The column's default expression, if any. Serial keys show up here as
    /// `nextval('..._seq'::regclass)`.
    pub default_expr: Option<String>,
    pub ordinal: i32,
}

/// One (foreign-key constraint, column) pair joining a referencing
/// table/column to the table/column it points at. Composite foreign keys
/// share `constraint`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyInfo {
    pub referenced_table: String,
    pub referenced_column: String,
    pub referencing_table: String,
    pub referencing_column: String,
    pub constraint: String,
}

/// One (unique index, column) pair. Composite unique indexes share `index`;
/// `ordinal` is the column's position within the index. Primary-key-backed
/// indexes are excluded by the view that feeds this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniqueIndexInfo {
    pub table: String,
    pub index: String,
    pub column: String,
    pub ordinal: i32,
}

/// Nullability flag for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotNullInfo {
    pub table: String,
    pub column: String,
    pub not_null: bool,
}

/// A table whose primary key default is sequence-backed, i.e. a conversion
/// candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerialTable {
    pub table: String,
    pub pk_constraint: String,
}
