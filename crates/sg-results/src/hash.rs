//! Content digest of a sanitized configuration.

use sg_config::CleanConfig;
use sha2::{Digest, Sha256};

/// SHA-256 of the configuration's canonical JSON form (keys sorted).
pub fn config_digest(config: &CleanConfig) -> String {
    let mut hasher = Sha256::new();

    let config_json = serde_json::to_string(config).unwrap_or_default();
    hasher.update(config_json.as_bytes());

    let result = hasher.finalize();
    format!("{:x}", result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sg_config::{sanitize, Catalog, ParamSpec, ValueFormat};

    fn catalog() -> Catalog {
        Catalog::new()
            .with(ParamSpec::new("alpha", ValueFormat::Real, 0.0, 1.0))
            .with(ParamSpec::new("N", ValueFormat::Integer, 1.0, 100.0))
    }

    #[test]
    fn digest_stability() {
        let a = sanitize([("alpha", "0.5"), ("N", "10")], &catalog());
        let b = sanitize([("N", "10"), ("alpha", "0.5")], &catalog());

        assert_eq!(config_digest(&a), config_digest(&b));
        assert_eq!(config_digest(&a).len(), 64);
    }

    #[test]
    fn digest_differs_for_different_values() {
        let a = sanitize([("alpha", "0.5")], &catalog());
        let b = sanitize([("alpha", "0.6")], &catalog());

        assert_ne!(config_digest(&a), config_digest(&b));
    }
}
