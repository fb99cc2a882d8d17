//! Translate query options and entity payloads to an ExecutionPlan (SQL) to be run against the database.

pub mod error;
pub mod key;
pub mod mutation;
pub mod query;
pub mod values;
