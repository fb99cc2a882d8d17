//! Translate protocol requests into execution plans (SQL) to be run against the database.

pub mod translation;
