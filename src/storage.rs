//! Persistence layer.
//!
//! Saves and loads the price cache to/from a JSON file. The format is an
//! implementation detail — nothing outside this process reads it.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::types::PriceBasis;

/// Default cache file path.
const DEFAULT_CACHE_FILE: &str = "haggler_prices.json";

/// Save the price cache to a JSON file.
pub fn save_cache(entries: &HashMap<String, PriceBasis>, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_CACHE_FILE);
    let json = serde_json::to_string_pretty(entries)
        .context("Failed to serialise price cache")?;

    std::fs::write(path, &json)
        .context(format!("Failed to write price cache to {path}"))?;

    debug!(path, entries = entries.len(), "Price cache saved");
    Ok(())
}

/// Load the price cache from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_cache(path: Option<&str>) -> Result<Option<HashMap<String, PriceBasis>>> {
    let path = path.unwrap_or(DEFAULT_CACHE_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved price cache found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read price cache from {path}"))?;

    let entries: HashMap<String, PriceBasis> = serde_json::from_str(&json)
        .context(format!("Failed to parse price cache from {path}"))?;

    info!(path, entries = entries.len(), "Price cache loaded from disk");
    Ok(Some(entries))
}

/// Delete the cache file (for testing or reset).
pub fn delete_cache(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_CACHE_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path)
            .context(format!("Failed to delete price cache file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
