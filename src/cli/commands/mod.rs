//! CLI command implementations.

pub mod run;
pub mod runs;
pub mod strategies;
pub mod validate;
