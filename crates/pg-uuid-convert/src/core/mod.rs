//! Core building blocks shared by the catalog reader, planner and mutator.

pub mod identifier;
pub mod schema;
