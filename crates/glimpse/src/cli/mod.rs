//! CLI command implementations.

pub mod config;
pub mod context;
pub mod models;
pub mod run;
