//! The entity model a database connection is exposed as.

pub mod metadata;
