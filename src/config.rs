use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::PipelineError;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub aggregation: AggregationConfig,
    /// Connector label to subgraph tags. Labels absent here resolve to
    /// just the catch-all tag.
    #[serde(default)]
    pub subgraphs: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Postgres connection URL. Credential acquisition is the caller's
    /// problem; this crate only ever reads.
    pub url: String,
    /// Table or view holding chunk rows, e.g. `foundry.chunk_embeddings_view`.
    pub table: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AggregationConfig {
    /// Minimum token sum before a group closes.
    #[serde(default = "default_min_tokens")]
    pub min_tokens: u64,
    /// Rows fetched per page in corpus mode.
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_max_connections() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_min_tokens() -> u64 {
    1200
}
fn default_page_size() -> i64 {
    100
}

impl Config {
    /// Reject values that would make a pipeline misbehave before any
    /// stream starts.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.aggregation.min_tokens == 0 {
            return Err(PipelineError::config("aggregation.min_tokens must be >= 1"));
        }
        if self.aggregation.page_size < 1 {
            return Err(PipelineError::config("aggregation.page_size must be >= 1"));
        }
        if self.store.timeout_secs == 0 {
            return Err(PipelineError::config("store.timeout_secs must be >= 1"));
        }
        check_table_identifier(&self.store.table)?;
        Ok(())
    }
}

/// The table name is interpolated into queries, so it must stay a
/// plain (optionally schema-qualified) identifier.
pub fn check_table_identifier(table: &str) -> Result<(), PipelineError> {
    let ok = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if ok {
        Ok(())
    } else {
        Err(PipelineError::config(format!(
            "store.table is not a valid identifier: '{table}'"
        )))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
