//! SQL AST, its low-level string rendering, and parsing of hand-written SELECT lists.

pub mod sql;
