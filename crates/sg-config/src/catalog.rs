//! Parameter catalog: declared type and range of every configurable
//! model parameter.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

/// Row type kept when reading a catalog file.
pub const PARAMETER_TYPE: &str = "parameter";

const REQUIRED_COLUMNS: [&str; 8] = [
    "Name",
    "Type",
    "Lag",
    "Format",
    "Value",
    "Minimum",
    "Maximum",
    "Description",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueFormat {
    Integer,
    Real,
}

impl ValueFormat {
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("integer") {
            ValueFormat::Integer
        } else {
            ValueFormat::Real
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub format: ValueFormat,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub description: String,
}

impl ParamSpec {
    pub fn new(name: &str, format: ValueFormat, min: f64, max: f64) -> Self {
        Self {
            name: name.to_string(),
            format,
            default: min,
            min,
            max,
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    params: BTreeMap<String, ParamSpec>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, spec: ParamSpec) {
        self.params.insert(spec.name.clone(), spec);
    }

    pub fn with(mut self, spec: ParamSpec) -> Self {
        self.insert(spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.get(name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.values()
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Read a catalog CSV. Columns may come in any order; only rows of type
    /// `parameter` are kept.
    pub fn from_reader<R: Read>(reader: R) -> ConfigResult<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let header = rdr.headers()?.clone();
        let mut idx = [0usize; REQUIRED_COLUMNS.len()];
        for (slot, column) in idx.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = header
                .iter()
                .position(|h| h == column)
                .ok_or(ConfigError::MissingColumn { column })?;
        }
        let [name_i, type_i, _lag_i, format_i, value_i, min_i, max_i, desc_i] = idx;

        let mut catalog = Catalog::new();
        for row in rdr.records() {
            let row = row?;
            if row.get(type_i) != Some(PARAMETER_TYPE) {
                continue;
            }
            let name = row.get(name_i).unwrap_or_default();
            if name.is_empty() {
                continue;
            }

            let number = |i: usize, what: &str| -> ConfigResult<f64> {
                row.get(i)
                    .and_then(|s| s.parse::<f64>().ok())
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| ConfigError::InvalidCatalogEntry {
                        name: name.to_string(),
                        reason: format!("{what} is not a number"),
                    })
            };

            let min = number(min_i, "Minimum")?;
            let max = number(max_i, "Maximum")?;
            if min > max {
                return Err(ConfigError::InvalidCatalogEntry {
                    name: name.to_string(),
                    reason: format!("Minimum {min} exceeds Maximum {max}"),
                });
            }

            catalog.insert(ParamSpec {
                name: name.to_string(),
                format: ValueFormat::from_label(row.get(format_i).unwrap_or_default()),
                default: number(value_i, "Value")?,
                min,
                max,
                description: row.get(desc_i).unwrap_or_default().to_string(),
            });
        }

        Ok(catalog)
    }
}
