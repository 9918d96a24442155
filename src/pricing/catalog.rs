//! Catalog (shop) price source.
//!
//! Fetches the authoritative reference price for an item name from the item
//! catalog service. Many item variants share one canonical catalog entry —
//! "Siegel von Largok" and "Siegel von Mentoran" are priced as the same
//! seal — so names are normalized through a fixed pattern table before the
//! lookup.
//!
//! Auth: none. Missing items are an expected outcome, not an error.

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

// ---------------------------------------------------------------------------
// Name canonicalization
// ---------------------------------------------------------------------------

/// Pattern → canonical catalog name. The first matching rule wins; names
/// matching no rule are already canonical.
const CANON_PATTERNS: &[(&str, &str)] = &[
    (r"^Siegel von .+$", "Siegel von Narubia"),
    (r"^Seelenkapsel von .+$", "Seelenkapsel von Anatubien"),
    (r"^Kristall von .+$", "Kristall von Duria"),
    (r"^Foliant (des|der) .+$", "Foliant des Wissens"),
    (r"^Ring (des|der) .+$", "Ring der Gezeiten"),
];

/// Compiled canonicalization rules.
///
/// Constructed once and passed where needed; no global state.
#[derive(Debug)]
pub struct NameCanonicalizer {
    rules: Vec<(Regex, &'static str)>,
}

impl NameCanonicalizer {
    pub fn new() -> Self {
        let rules = CANON_PATTERNS
            .iter()
            .map(|(pattern, canonical)| {
                let re = Regex::new(pattern).expect("canonicalization pattern is valid");
                (re, *canonical)
            })
            .collect();
        Self { rules }
    }

    /// Map an item name to its canonical catalog name.
    pub fn canonicalize(&self, name: &str) -> String {
        for (re, canonical) in &self.rules {
            if re.is_match(name) {
                return (*canonical).to_string();
            }
        }
        name.to_string()
    }
}

impl Default for NameCanonicalizer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(default)]
    shop_price: Option<i64>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct CatalogClient {
    http: Client,
    base_url: String,
    canonicalizer: NameCanonicalizer,
}

impl CatalogClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent("HAGGLER/0.1.0")
            .build()
            .context("Failed to build catalog HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            canonicalizer: NameCanonicalizer::new(),
        })
    }

    /// The canonical catalog name for an item.
    pub fn canonical_name(&self, name: &str) -> String {
        self.canonicalizer.canonicalize(name)
    }

    /// The catalog reference price for an item, or `None` if the catalog
    /// does not know it.
    pub async fn shop_price(&self, name: &str) -> Result<Option<i64>> {
        let canonical = self.canonical_name(name);
        let url = format!(
            "{}/items?name={}",
            self.base_url,
            urlencoding::encode(&canonical)
        );

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Catalog request failed: {url}"))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(item = %canonical, "Item not in catalog");
            return Ok(None);
        }

        let entry: CatalogEntry = response
            .error_for_status()
            .with_context(|| format!("Bad status from catalog: {url}"))?
            .json()
            .await
            .context("Failed to parse catalog response")?;

        debug!(item = %canonical, price = ?entry.shop_price, "Catalog price resolved");
        Ok(entry.shop_price)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_collapses_variants() {
        let canon = NameCanonicalizer::new();
        assert_eq!(canon.canonicalize("Siegel von Largok"), "Siegel von Narubia");
        assert_eq!(canon.canonicalize("Siegel von Mentoran"), "Siegel von Narubia");
        assert_eq!(canon.canonicalize("Siegel von Konlir"), "Siegel von Narubia");
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let canon = NameCanonicalizer::new();
        let once = canon.canonicalize("Foliant der Verdammnis");
        let twice = canon.canonicalize(&once);
        assert_eq!(once, "Foliant des Wissens");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_canonicalize_leaves_plain_names_alone() {
        let canon = NameCanonicalizer::new();
        assert_eq!(canon.canonicalize("Heiltrank"), "Heiltrank");
        assert_eq!(canon.canonicalize("Rostiges Schwert"), "Rostiges Schwert");
    }

    #[test]
    fn test_canonicalize_requires_full_match() {
        let canon = NameCanonicalizer::new();
        // "von" in the middle of an unrelated name must not trigger a rule.
        assert_eq!(
            canon.canonicalize("Altes Siegel von gestern und heute II"),
            "Altes Siegel von gestern und heute II"
        );
    }

    #[test]
    fn test_client_construction() {
        let client = CatalogClient::new("https://catalog.example/api/").unwrap();
        assert_eq!(client.base_url, "https://catalog.example/api");
        assert_eq!(client.canonical_name("Ring des Zorns"), "Ring der Gezeiten");
    }
}
