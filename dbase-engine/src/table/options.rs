//! Save options
//!
//! Every option is optional; anything left unset keeps the value the table
//! already carries. Options deserialize from TOML/JSON so front ends can load
//! them from a config file:
//!
//! ```toml
//! version = "vfp"
//! flag = 2
//! codepage = 3
//! block_size = 64
//! last_update = "2024-03-01"
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use crate::storage::header::{DbfVersion, TableFlags};
use crate::storage::memo::MemoHeader;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SaveOptions {
    /// Dialect to write
    #[serde(deserialize_with = "deserialize_version")]
    pub version: Option<DbfVersion>,
    /// Table flag byte (0x1C)
    pub flag: Option<u8>,
    /// Code page byte (0x1D)
    pub codepage: Option<u8>,
    /// Last-update date; today when unset
    pub last_update: Option<NaiveDate>,
    /// Memo block size in bytes
    pub block_size: Option<u32>,
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, version: DbfVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn flag(mut self, flag: u8) -> Self {
        self.flag = Some(flag);
        self
    }

    pub fn flags(mut self, flags: TableFlags) -> Self {
        self.flag = Some(flags.bits());
        self
    }

    pub fn codepage(mut self, codepage: u8) -> Self {
        self.codepage = Some(codepage);
        self
    }

    pub fn last_update(mut self, date: NaiveDate) -> Self {
        self.last_update = Some(date);
        self
    }

    pub fn block_size(mut self, block_size: u32) -> Self {
        self.block_size = Some(block_size);
        self
    }

    /// Layer `other` on top of `self`: values set in `other` win
    pub fn merge(self, other: SaveOptions) -> SaveOptions {
        SaveOptions {
            version: other.version.or(self.version),
            flag: other.flag.or(self.flag),
            codepage: other.codepage.or(self.codepage),
            last_update: other.last_update.or(self.last_update),
            block_size: other.block_size.or(self.block_size),
        }
    }

    /// Memo block size to allocate with
    pub fn effective_block_size(&self) -> u32 {
        self.block_size.unwrap_or(MemoHeader::DEFAULT_BLOCK_SIZE)
    }

    /// Options matching what a Visual FoxPro table with memo carries:
    /// version 0x30, flag "has memo", DOS multilingual code page.
    pub fn visual_foxpro() -> Self {
        SaveOptions::new()
            .version(DbfVersion::VisualFoxPro)
            .flags(TableFlags::WITH_MEMO)
            .codepage(0x02)
    }
}

/// Accept a dialect name (`"vfp"`), a hex string (`"0x30"`) or a bare byte
fn deserialize_version<'de, D>(deserializer: D) -> Result<Option<DbfVersion>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Byte(u8),
        Text(String),
    }

    let raw = Option::<Raw>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(Raw::Byte(b)) => DbfVersion::from_raw(b)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unsupported table version 0x{:02X}", b))),
        Some(Raw::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let opts = SaveOptions::new()
            .version(DbfVersion::FoxPro2WithMemo)
            .codepage(3)
            .block_size(512);
        assert_eq!(opts.version, Some(DbfVersion::FoxPro2WithMemo));
        assert_eq!(opts.codepage, Some(3));
        assert_eq!(opts.flag, None);
        assert_eq!(opts.effective_block_size(), 512);
        assert_eq!(SaveOptions::default().effective_block_size(), 64);
    }

    #[test]
    fn test_merge_prefers_other() {
        let base = SaveOptions::visual_foxpro();
        let merged = base.merge(SaveOptions::new().codepage(0x03));
        assert_eq!(merged.version, Some(DbfVersion::VisualFoxPro));
        assert_eq!(merged.flag, Some(0x02));
        assert_eq!(merged.codepage, Some(0x03));
    }
}
