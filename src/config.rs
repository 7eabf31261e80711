// ⚙️ Configuration - JSON file with defaults
//
// Every key is optional; missing keys take the defaults below. CLI flags
// override individual values after loading.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::entities::LoanConvention;
use crate::ingest::IngestOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the metadata file and one data file per table
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Metadata file name, relative to `data_dir` unless absolute
    #[serde(default = "default_metadata_file")]
    pub metadata_file: PathBuf,

    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Where attached schema databases live (default: next to `database_path`)
    #[serde(default)]
    pub schema_dir: Option<PathBuf>,

    /// Schema the account queries read from
    #[serde(default = "default_schema")]
    pub default_schema: String,

    #[serde(default = "default_data_file_extension")]
    pub data_file_extension: String,

    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    #[serde(default)]
    pub empty_as_null: bool,

    #[serde(default)]
    pub loan_convention: LoanConvention,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_metadata_file() -> PathBuf {
    PathBuf::from("INFORMATION_SCHEMA.csv")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/ledger.db")
}

fn default_schema() -> String {
    "dbo".to_string()
}

fn default_data_file_extension() -> String {
    "csv".to_string()
}

fn default_delimiter() -> char {
    ','
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            metadata_file: default_metadata_file(),
            database_path: default_database_path(),
            schema_dir: None,
            default_schema: default_schema(),
            data_file_extension: default_data_file_extension(),
            delimiter: default_delimiter(),
            empty_as_null: false,
            loan_convention: LoanConvention::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_schema.trim().is_empty() {
            bail!("default_schema must not be empty");
        }
        if self.data_file_extension.trim().is_empty() {
            bail!("data_file_extension must not be empty");
        }
        if !self.delimiter.is_ascii() || self.delimiter == '"' || self.delimiter == '\n' {
            bail!(
                "delimiter must be one ASCII character other than a quote or newline, got {:?}",
                self.delimiter
            );
        }
        Ok(())
    }

    pub fn metadata_path(&self) -> PathBuf {
        if self.metadata_file.is_absolute() {
            self.metadata_file.clone()
        } else {
            self.data_dir.join(&self.metadata_file)
        }
    }

    pub fn schema_dir(&self) -> PathBuf {
        match &self.schema_dir {
            Some(dir) => dir.clone(),
            None => self
                .database_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    pub fn delimiter_byte(&self) -> u8 {
        // validate() guarantees ASCII
        self.delimiter as u8
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            extension: self.data_file_extension.clone(),
            delimiter: self.delimiter_byte(),
            empty_as_null: self.empty_as_null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.default_schema, "dbo");
        assert_eq!(config.metadata_path(), PathBuf::from("data/INFORMATION_SCHEMA.csv"));
        assert_eq!(config.schema_dir(), PathBuf::from("data"));
        assert_eq!(config.ingest_options(), IngestOptions::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_takes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(
            &path,
            r#"{ "data_dir": "/srv/bank", "delimiter": ";", "loan_convention": "payments_increase_debt" }"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/bank"));
        assert_eq!(config.delimiter_byte(), b';');
        assert_eq!(config.loan_convention, LoanConvention::PaymentsIncreaseDebt);
        assert_eq!(config.data_file_extension, "csv");
        assert_eq!(
            config.metadata_path(),
            PathBuf::from("/srv/bank/INFORMATION_SCHEMA.csv")
        );
    }

    #[test]
    fn test_invalid_delimiter_rejected() {
        let config = Config {
            delimiter: 'é',
            ..Default::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unreadable_file_is_error() {
        let dir = TempDir::new().unwrap();

        assert!(Config::from_file(&dir.path().join("missing.json")).is_err());
    }
}
