//! Configuration file loading.
//!
//! The core never reads files; this loader deserializes the TOML into
//! the canonical `PipelineConfig`, fills empty keyword tables with the
//! built-in baselines, and validates before anything starts.

use anyhow::{Context, Result};
use leadflow_classify::tables;
use leadflow_types::PipelineConfig;
use std::path::Path;

pub fn load(path: &Path) -> Result<PipelineConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let mut config: PipelineConfig = toml::from_str(&raw).context("parsing configuration")?;

    if config.classify.sector_keywords.is_empty() {
        config.classify.sector_keywords = tables::default_sector_keywords();
    }
    if config.classify.stage_keywords.is_empty() {
        config.classify.stage_keywords = tables::default_stage_keywords();
    }
    if config.classify.target_regions.is_empty() {
        config.classify.target_regions = tables::default_target_regions();
    }

    config.validate().context("validating configuration")?;
    Ok(config)
}
