//! Data models: parse results and pipeline configuration.

pub mod config;
pub mod document;
