use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use pickup_core::RegionLookup;
use serde::Serialize;
use thiserror::Error;

/// Built-in labels for the two region codes the pickup rules know about.
pub const BUILTIN_SA_REGIONS: &[(&str, &str)] = &[("SAMKJI", "Jeddah"), ("SAMDYB", "Yanbu")];

#[derive(Debug, Error)]
pub enum RegionTableError {
    #[error("failed to read region table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed region table json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionTableStats {
    pub countries: usize,
    pub labels: usize,
}

/// Region code to label table, keyed per upper-case country code.
///
/// Clones share the same underlying map, so labels upserted through one
/// handle are visible to every filter holding another.
#[derive(Debug, Clone, Default)]
pub struct RegionTable {
    countries: Arc<RwLock<HashMap<String, HashMap<String, String>>>>,
}

impl RegionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let table = Self::new();
        for (code, label) in BUILTIN_SA_REGIONS {
            table.upsert("SA", code, label);
        }
        table
    }

    /// Expects `{ "SA": { "CODE": "Label", .. }, .. }`.
    pub fn from_json_str(raw: &str) -> Result<Self, RegionTableError> {
        let parsed: BTreeMap<String, BTreeMap<String, String>> = serde_json::from_str(raw)?;

        let table = Self::new();
        for (country, regions) in parsed {
            for (code, label) in regions {
                table.upsert(&country, &code, &label);
            }
        }
        Ok(table)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RegionTableError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| RegionTableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn upsert(&self, country: &str, code: &str, label: &str) -> Option<String> {
        self.countries
            .write()
            .entry(country.to_uppercase())
            .or_default()
            .insert(code.to_string(), label.to_string())
    }

    pub fn label(&self, country: &str, code: &str) -> Option<String> {
        self.countries
            .read()
            .get(&country.to_uppercase())
            .and_then(|regions| regions.get(code))
            .cloned()
    }

    pub fn stats(&self) -> RegionTableStats {
        let guard = self.countries.read();
        RegionTableStats {
            countries: guard.len(),
            labels: guard.values().map(HashMap::len).sum(),
        }
    }
}

impl RegionLookup for RegionTable {
    fn region_label(&self, country: &str, code: &str) -> Option<String> {
        self.label(country, code)
    }
}
