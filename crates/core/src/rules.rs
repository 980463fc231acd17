use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RulesError};
use crate::normalize::normalize_place;

pub const DESIGNATED_COUNTRY: &str = "SA";
pub const PICKUP_METHOD_PREFIX: &str = "local_pickup";

/// Jeddah and Yanbu in the spellings shoppers actually type.
pub const DEFAULT_PLACES: &[&str] = &[
    "جدة",
    "جده",
    "ينبع",
    "ينبع البحر",
    "jeddah",
    "jiddah",
    "jaddah",
    "yanbu",
    "yanbu al bahr",
    "yanbu al-bahr",
    "yanbualbahr",
];

pub const DEFAULT_REGION_CODES: &[&str] = &["SAMKJI", "SAMDYB"];

static SHARED_DEFAULT: Lazy<Arc<PickupRules>> = Lazy::new(|| Arc::new(PickupRules::default()));

/// Rules file contents; every key falls back to the built-in value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub country: Option<String>,
    pub method_prefix: Option<String>,
    pub places: Option<Vec<String>>,
    pub region_codes: Option<Vec<String>>,
}

/// Immutable allow-list the pickup filter decides against.
///
/// Place names are stored in their normalized form and region codes in
/// upper case, so lookups are plain set membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickupRules {
    country: String,
    method_prefix: String,
    places: BTreeSet<String>,
    region_codes: BTreeSet<String>,
}

impl PickupRules {
    pub fn new<P, C>(
        country: &str,
        method_prefix: &str,
        places: P,
        region_codes: C,
    ) -> Result<Self>
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let country = country.trim().to_uppercase();
        if country.is_empty() {
            return Err(RulesError::EmptyCountry);
        }

        let method_prefix = method_prefix.trim().to_string();
        if method_prefix.is_empty() {
            return Err(RulesError::EmptyMethodPrefix);
        }

        Ok(Self::build(country, method_prefix, places, region_codes))
    }

    pub fn from_config(config: RulesConfig) -> Result<Self> {
        let country = config.country.as_deref().unwrap_or(DESIGNATED_COUNTRY);
        let method_prefix = config
            .method_prefix
            .as_deref()
            .unwrap_or(PICKUP_METHOD_PREFIX);

        match (config.places, config.region_codes) {
            (Some(places), Some(codes)) => Self::new(country, method_prefix, places, codes),
            (Some(places), None) => Self::new(country, method_prefix, places, DEFAULT_REGION_CODES),
            (None, Some(codes)) => Self::new(country, method_prefix, DEFAULT_PLACES, codes),
            (None, None) => Self::new(
                country,
                method_prefix,
                DEFAULT_PLACES,
                DEFAULT_REGION_CODES,
            ),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Self::from_config(serde_json::from_str(raw)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| RulesError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Process-wide default rules, derived once on first use.
    pub fn shared_default() -> Arc<Self> {
        SHARED_DEFAULT.clone()
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn method_prefix(&self) -> &str {
        &self.method_prefix
    }

    pub fn places(&self) -> impl Iterator<Item = &str> {
        self.places.iter().map(String::as_str)
    }

    pub fn region_codes(&self) -> impl Iterator<Item = &str> {
        self.region_codes.iter().map(String::as_str)
    }

    pub fn applies_to(&self, country_code: &str) -> bool {
        country_code == self.country
    }

    /// Exact match against the normalized allow-list; empty keys never match.
    pub fn is_allowed_place(&self, key: &str) -> bool {
        !key.is_empty() && self.places.contains(key)
    }

    pub fn is_allowed_region_code(&self, code: &str) -> bool {
        !code.is_empty() && self.region_codes.contains(&code.to_uppercase())
    }

    pub fn is_pickup_method(&self, method_id: &str) -> bool {
        method_id.starts_with(&self.method_prefix)
    }

    fn build<P, C>(country: String, method_prefix: String, places: P, region_codes: C) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let places = places
            .into_iter()
            .map(|place| normalize_place(place.as_ref()))
            .filter(|place| !place.is_empty())
            .collect();
        let region_codes = region_codes
            .into_iter()
            .map(|code| code.as_ref().trim().to_uppercase())
            .filter(|code| !code.is_empty())
            .collect();

        Self {
            country,
            method_prefix,
            places,
            region_codes,
        }
    }
}

impl Default for PickupRules {
    fn default() -> Self {
        Self::build(
            DESIGNATED_COUNTRY.to_string(),
            PICKUP_METHOD_PREFIX.to_string(),
            DEFAULT_PLACES,
            DEFAULT_REGION_CODES,
        )
    }
}
