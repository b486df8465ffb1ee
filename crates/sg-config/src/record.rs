//! Two-column `Name,Value` configuration record.
//!
//! This is the format handed to the configuration generator and the one
//! users download and upload.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use crate::sanitize::CleanConfig;
use crate::{ConfigError, ConfigResult};

pub const RECORD_HEADER: [&str; 2] = ["Name", "Value"];

pub fn write_record<W: Write>(writer: W, config: &CleanConfig) -> ConfigResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(RECORD_HEADER)?;
    for (name, value) in config.iter() {
        wtr.write_record([name, value.to_string().as_str()])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_record_file(path: &Path, config: &CleanConfig) -> ConfigResult<()> {
    let file = std::fs::File::create(path)?;
    write_record(file, config)
}

/// Read a record back into a raw name -> value mapping.
///
/// The header must be exactly `Name,Value`; rows with fewer than two fields
/// are skipped and every value must be numeric.
pub fn read_record<R: Read>(reader: R) -> ConfigResult<BTreeMap<String, String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(reader);

    let mut rows = rdr.records();
    let header = match rows.next() {
        Some(row) => row?,
        None => {
            return Err(ConfigError::InvalidRecord {
                reason: "empty file".to_string(),
            });
        }
    };
    if header.get(0) != Some(RECORD_HEADER[0]) || header.get(1) != Some(RECORD_HEADER[1]) {
        return Err(ConfigError::InvalidRecord {
            reason: "header must be Name,Value".to_string(),
        });
    }

    let mut values = BTreeMap::new();
    for row in rows {
        let row = row?;
        let (Some(name), Some(value)) = (row.get(0), row.get(1)) else {
            continue;
        };
        if value.trim().parse::<f64>().is_err() {
            return Err(ConfigError::InvalidRecord {
                reason: format!("value of '{name}' is not numeric"),
            });
        }
        values.insert(name.to_string(), value.trim().to_string());
    }

    Ok(values)
}

pub fn read_record_file(path: &Path) -> ConfigResult<BTreeMap<String, String>> {
    let file = std::fs::File::open(path)?;
    read_record(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_header() {
        let err = read_record("Key,Value\na,1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRecord { .. }));
    }

    #[test]
    fn rejects_non_numeric_values() {
        assert!(read_record("Name,Value\na,one\n".as_bytes()).is_err());
    }

    #[test]
    fn skips_short_rows() {
        let values = read_record("Name,Value\na,1\nlonely\n".as_bytes()).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values["a"], "1");
    }
}
