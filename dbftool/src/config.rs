//! Optional TOML configuration
//!
//! ```toml
//! encoding = "latin1"
//!
//! [save]
//! version = "vfp"
//! codepage = 3
//! block_size = 64
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use dbase_engine::SaveOptions;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Text codec name (`latin1`, `utf8`)
    pub encoding: Option<String>,
    /// Options applied when writing tables
    pub save: SaveOptions,
}

impl ToolConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbase_engine::DbfVersion;

    #[test]
    fn test_parse_config() {
        let config = ToolConfig::parse(
            r#"
            encoding = "utf8"

            [save]
            version = "0x30"
            flag = 2
            last_update = "2023-12-31"
            "#,
        )
        .unwrap();

        assert_eq!(config.encoding.as_deref(), Some("utf8"));
        assert_eq!(config.save.version, Some(DbfVersion::VisualFoxPro));
        assert_eq!(config.save.flag, Some(2));
        assert_eq!(config.save.codepage, None);
        assert_eq!(
            config.save.last_update,
            chrono::NaiveDate::from_ymd_opt(2023, 12, 31)
        );
    }

    #[test]
    fn test_version_by_byte_and_name() {
        let config = ToolConfig::parse("[save]\nversion = 245").unwrap();
        assert_eq!(config.save.version, Some(DbfVersion::FoxPro2WithMemo));

        let config = ToolConfig::parse("[save]\nversion = \"dbase3\"").unwrap();
        assert_eq!(config.save.version, Some(DbfVersion::FoxBaseDBase3NoMemo));
    }

    #[test]
    fn test_bad_config_rejected() {
        assert!(ToolConfig::parse("[save]\nversion = \"0x99\"").is_err());
        assert!(ToolConfig::parse("colour = \"blue\"").is_err());
        assert!(ToolConfig::parse("").unwrap().encoding.is_none());
    }
}
