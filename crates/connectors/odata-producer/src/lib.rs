//! An OData (version 2) producer over a SQLite database: the entity model, Atom and
//! JSON feeds, single-entity reads and writes, and `$batch` requests.

pub mod batch;
pub mod error;
pub mod format;
pub mod handler;
pub mod payload;
pub mod request;
pub mod routes;
pub mod state;
