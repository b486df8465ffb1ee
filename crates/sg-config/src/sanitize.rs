//! Validation and clamping of user-submitted configurations.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, ValueFormat};

/// Reserved configuration entries understood by the engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaParam {
    TimeSteps,
    RandomSeed,
    NumRuns,
}

impl MetaParam {
    pub const ALL: [MetaParam; 3] = [MetaParam::TimeSteps, MetaParam::RandomSeed, MetaParam::NumRuns];

    pub fn name(self) -> &'static str {
        match self {
            MetaParam::TimeSteps => "_timeSteps_",
            MetaParam::RandomSeed => "_rndSeed_",
            MetaParam::NumRuns => "_numRuns_",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Closed range; `None` upper bound means unbounded.
    pub fn range(self) -> (i64, Option<i64>) {
        match self {
            MetaParam::TimeSteps => (10, Some(10_000)),
            MetaParam::RandomSeed => (1, None),
            MetaParam::NumRuns => (1, Some(100)),
        }
    }

    pub fn default_value(self) -> i64 {
        match self {
            MetaParam::TimeSteps => 100,
            MetaParam::RandomSeed => 1,
            MetaParam::NumRuns => 1,
        }
    }

    fn clamp(self, value: i64) -> i64 {
        let (lo, hi) = self.range();
        let value = value.max(lo);
        match hi {
            Some(hi) => value.min(hi),
            None => value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Integer(i64),
    Real(f64),
}

impl ConfigValue {
    pub fn as_f64(self) -> f64 {
        match self {
            ConfigValue::Integer(v) => v as f64,
            ConfigValue::Real(v) => v,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Integer(v) => write!(f, "{v}"),
            ConfigValue::Real(v) => write!(f, "{v}"),
        }
    }
}

/// Sanitized configuration: catalog parameters within range plus the
/// meta-parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CleanConfig {
    values: BTreeMap<String, ConfigValue>,
}

impl CleanConfig {
    pub fn get(&self, name: &str) -> Option<ConfigValue> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ConfigValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    fn meta(&self, meta: MetaParam) -> i64 {
        match self.get(meta.name()) {
            Some(ConfigValue::Integer(v)) => v,
            Some(ConfigValue::Real(v)) => v as i64,
            None => meta.default_value(),
        }
    }

    pub fn time_steps(&self) -> i64 {
        self.meta(MetaParam::TimeSteps)
    }

    pub fn seed(&self) -> i64 {
        self.meta(MetaParam::RandomSeed)
    }

    pub fn runs(&self) -> i64 {
        self.meta(MetaParam::NumRuns)
    }
}

/// Clean a raw name -> string mapping against `catalog`.
///
/// Unknown names and unparseable catalog values are dropped; catalog values
/// are clamped into their declared range and meta-parameters into their
/// fixed range. Never fails.
pub fn sanitize<I, K, V>(raw: I, catalog: &Catalog) -> CleanConfig
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut clean = CleanConfig::default();

    for (name, value) in raw {
        let name = name.as_ref().trim();
        if name.is_empty() {
            continue;
        }
        let value = value.as_ref();

        if let Some(meta) = MetaParam::from_name(name) {
            // An unreadable meta value falls to the bottom of its range.
            let parsed = parse_number(value, ValueFormat::Integer)
                .map(|v| v.round() as i64)
                .unwrap_or(i64::MIN);
            clean
                .values
                .insert(name.to_string(), ConfigValue::Integer(meta.clamp(parsed)));
            continue;
        }

        let Some(spec) = catalog.get(name) else {
            continue;
        };
        let Some(parsed) = parse_number(value, spec.format) else {
            continue;
        };

        let cleaned = match spec.format {
            ValueFormat::Integer => {
                let (lo, hi) = (spec.min.ceil(), spec.max.floor());
                if lo > hi {
                    continue;
                }
                ConfigValue::Integer(parsed.round().clamp(lo, hi) as i64)
            }
            ValueFormat::Real => ConfigValue::Real(parsed.clamp(spec.min, spec.max)),
        };
        clean.values.insert(name.to_string(), cleaned);
    }

    clean
}

/// Parse a user-entered number; when the literal does not parse as is,
/// retry with only the characters a number of `format` may contain.
fn parse_number(raw: &str, format: ValueFormat) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(v) = raw.parse::<f64>() {
        return v.is_finite().then_some(v);
    }

    let allowed: &[char] = match format {
        ValueFormat::Integer => &['+', '-'],
        ValueFormat::Real => &['+', '-', '.', 'e', 'E'],
    };
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || allowed.contains(c))
        .collect();
    kept.parse::<f64>().ok().filter(|v| v.is_finite())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::catalog::ParamSpec;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn catalog_values_stay_in_range(
            min in -1.0e6_f64..1.0e6,
            width in 0.0_f64..1.0e6,
            value in prop::num::f64::ANY,
            integer in any::<bool>(),
        ) {
            let format = if integer { ValueFormat::Integer } else { ValueFormat::Real };
            let max = min + width;
            let catalog = Catalog::new().with(ParamSpec::new("p", format, min, max));
            let text = value.to_string();

            let clean = sanitize([("p", text.as_str()), ("other", "1")], &catalog);

            prop_assert!(clean.get("other").is_none());
            if let Some(v) = clean.get("p") {
                prop_assert!(v.as_f64() >= min && v.as_f64() <= max);
            }
        }

        #[test]
        fn arbitrary_text_never_escapes_range(text in ".*") {
            let catalog = Catalog::new().with(ParamSpec::new("p", ValueFormat::Real, -2.0, 2.0));
            let clean = sanitize([("p", text.as_str()), ("_numRuns_", text.as_str())], &catalog);
            if let Some(v) = clean.get("p") {
                prop_assert!((-2.0..=2.0).contains(&v.as_f64()));
            }
            prop_assert!((1..=100).contains(&clean.runs()));
        }
    }
}
