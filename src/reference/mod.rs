//! Read-only country and subdivision reference data.
//!
//! City records point at a subdivision through an ISO 3166-2 style key such as
//! `CA-AB`. The dataset is bundled into the binary and can be replaced at
//! startup with `reference.dataset_path`; it never changes while the process
//! runs, so lookups need no locking.

use anyhow::{Context, Result};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::info;

const BUNDLED_DATASET: &str = "iso3166.json";

/// Longest key the `cities.subdivision` column stores.
pub const MAX_SUBDIVISION_KEY_LEN: usize = 6;

#[derive(RustEmbed)]
#[folder = "data/reference"]
struct BundledReference;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Country {
    pub alpha_2: String,
    pub alpha_3: String,
    pub name: String,
    pub numeric: String,
    #[serde(default)]
    pub official_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subdivision {
    pub code: String,
    pub country_code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub subdivision_type: String,
    #[serde(default)]
    pub parent_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Dataset {
    countries: Vec<Country>,
    subdivisions: Vec<Subdivision>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("Malformed subdivision code: {0}")]
    Malformed(String),

    #[error("Unknown subdivision: {0}")]
    Unknown(String),
}

/// Normalised `"{country}-{subdivision}"` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubdivisionKey {
    country: String,
    code: String,
}

impl SubdivisionKey {
    /// Builds a key from its two halves, upper-casing both.
    pub fn new(country_alpha2: &str, subdivision_code: &str) -> Result<Self, ReferenceError> {
        let country = country_alpha2.trim().to_ascii_uppercase();
        let code = subdivision_code.trim().to_ascii_uppercase();

        let country_ok = country.len() == 2 && country.chars().all(|c| c.is_ascii_alphabetic());
        let code_ok = !code.is_empty()
            && country.len() + 1 + code.len() <= MAX_SUBDIVISION_KEY_LEN
            && code.chars().all(|c| c.is_ascii_alphanumeric());

        if !country_ok || !code_ok {
            return Err(ReferenceError::Malformed(format!(
                "{country_alpha2}-{subdivision_code}"
            )));
        }

        Ok(Self { country, code })
    }

    /// Parses a full key such as `CA-AB`.
    pub fn parse(key: &str) -> Result<Self, ReferenceError> {
        let (country, code) = key
            .split_once('-')
            .ok_or_else(|| ReferenceError::Malformed(key.to_string()))?;
        Self::new(country, code)
    }
}

impl fmt::Display for SubdivisionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.country, self.code)
    }
}

/// Lookup contract the city registry and HTTP layer consume.
pub trait ReferenceLookup: Send + Sync {
    fn countries(&self) -> &[Country];

    fn country(&self, alpha2: &str) -> Option<&Country>;

    /// Subdivisions of a country, or `None` when the country is unknown.
    fn subdivisions(&self, alpha2: &str) -> Option<Vec<&Subdivision>>;

    fn subdivision(&self, key: &SubdivisionKey) -> Option<&Subdivision>;

    /// Resolves a full key, treating malformed and absent codes alike to callers
    /// that only care whether the reference is usable.
    fn check_subdivision(&self, key: &str) -> Result<SubdivisionKey, ReferenceError> {
        let parsed = SubdivisionKey::parse(key)?;
        if self.subdivision(&parsed).is_some() {
            Ok(parsed)
        } else {
            Err(ReferenceError::Unknown(parsed.to_string()))
        }
    }
}

/// In-memory dataset indexed by country and subdivision code.
#[derive(Debug)]
pub struct StaticReference {
    countries: Vec<Country>,
    subdivisions: Vec<Subdivision>,
    country_index: HashMap<String, usize>,
    subdivision_index: HashMap<String, usize>,
}

impl StaticReference {
    /// Loads the dataset compiled into the binary.
    pub fn bundled() -> Result<Self> {
        let file = BundledReference::get(BUNDLED_DATASET)
            .context("Bundled reference dataset is missing")?;
        let json = std::str::from_utf8(&file.data).context("Bundled dataset is not UTF-8")?;
        Self::from_json(json)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read reference dataset: {}", path.display()))?;
        Self::from_json(&json)
    }

    /// Loads from `dataset_path` when given, otherwise the bundled dataset.
    pub fn load(dataset_path: Option<&str>) -> Result<Self> {
        let reference = match dataset_path {
            Some(path) => Self::from_path(Path::new(path))?,
            None => Self::bundled()?,
        };

        info!(
            countries = reference.countries.len(),
            subdivisions = reference.subdivisions.len(),
            "Reference dataset loaded"
        );

        Ok(reference)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let dataset: Dataset =
            serde_json::from_str(json).context("Failed to parse reference dataset")?;

        let country_index = dataset
            .countries
            .iter()
            .enumerate()
            .map(|(i, c)| (c.alpha_2.to_ascii_uppercase(), i))
            .collect();

        let subdivision_index = dataset
            .subdivisions
            .iter()
            .enumerate()
            .map(|(i, s)| (s.code.to_ascii_uppercase(), i))
            .collect();

        Ok(Self {
            countries: dataset.countries,
            subdivisions: dataset.subdivisions,
            country_index,
            subdivision_index,
        })
    }
}

impl ReferenceLookup for StaticReference {
    fn countries(&self) -> &[Country] {
        &self.countries
    }

    fn country(&self, alpha2: &str) -> Option<&Country> {
        self.country_index
            .get(&alpha2.trim().to_ascii_uppercase())
            .map(|&i| &self.countries[i])
    }

    fn subdivisions(&self, alpha2: &str) -> Option<Vec<&Subdivision>> {
        let country = self.country(alpha2)?;
        Some(
            self.subdivisions
                .iter()
                .filter(|s| s.country_code.eq_ignore_ascii_case(&country.alpha_2))
                .collect(),
        )
    }

    fn subdivision(&self, key: &SubdivisionKey) -> Option<&Subdivision> {
        self.subdivision_index
            .get(&key.to_string())
            .map(|&i| &self.subdivisions[i])
    }
}
