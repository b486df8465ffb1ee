//! sg-config: parameter catalog, configuration sanitizing, the Name,Value
//! record format and server settings.

pub mod catalog;
pub mod record;
pub mod sanitize;
pub mod settings;

pub use catalog::{Catalog, ParamSpec, ValueFormat};
pub use record::{read_record, read_record_file, write_record, write_record_file, RECORD_HEADER};
pub use sanitize::{sanitize, CleanConfig, ConfigValue, MetaParam};
pub use settings::{PathSettings, RunLimits, ServerSettings, ToolSettings};

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Catalog is missing column: {column}")]
    MissingColumn { column: &'static str },

    #[error("Invalid catalog entry for {name}: {reason}")]
    InvalidCatalogEntry { name: String, reason: String },

    #[error("Invalid record: {reason}")]
    InvalidRecord { reason: String },

    #[error("Invalid settings: {field} ({reason})")]
    InvalidSettings { field: &'static str, reason: String },
}

pub fn load_settings(path: &std::path::Path) -> ConfigResult<ServerSettings> {
    let content = std::fs::read_to_string(path)?;
    let settings = ServerSettings::from_yaml_str(&content)?;
    Ok(settings)
}

pub fn save_settings(path: &std::path::Path, settings: &ServerSettings) -> ConfigResult<()> {
    settings.validate()?;
    let content = serde_yaml::to_string(settings)?;
    std::fs::write(path, content)?;
    Ok(())
}
