//! Build, render and inspect SQL.

pub mod ast;
pub mod convert;
pub mod execution_plan;
pub mod fields;
pub mod helpers;
pub mod string;
