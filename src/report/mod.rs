//! Report artifact generation.

pub mod generator;

pub use generator::{generate_json_report, generate_tsv_report, write_report};
