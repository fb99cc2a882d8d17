//! Query execution against a SQLite database, introspection of its schema and the
//! cache of entity models built from it.

pub mod cache;
pub mod error;
pub mod introspection;
pub mod metrics;
pub mod mutation;
pub mod query;
pub mod value;
