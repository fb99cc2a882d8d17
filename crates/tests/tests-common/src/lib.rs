//! Common functions used across test cases.

pub mod database;
pub mod request;
pub mod router;
