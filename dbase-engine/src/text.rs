//! Text codecs and the FoxPro code page table
//!
//! The engine treats text encoding as an opaque byte <-> string codec handed in
//! by the caller. Two codecs ship with the crate; anything else can be plugged
//! in through [`TextCodec`].

use std::fmt;

/// Byte <-> text conversion used for character data, memo content and field names
pub trait TextCodec: fmt::Debug + Send + Sync {
    /// Codec name, for diagnostics
    fn name(&self) -> &str;

    /// Encode text into bytes; unmappable characters are replaced
    fn encode(&self, text: &str) -> Vec<u8>;

    /// Decode bytes into text; invalid sequences are replaced
    fn decode(&self, bytes: &[u8]) -> String;
}

/// ISO-8859-1: every byte maps to the code point of the same value
#[derive(Debug, Clone, Copy, Default)]
pub struct Latin1;

impl TextCodec for Latin1 {
    fn name(&self) -> &str {
        "latin1"
    }

    fn encode(&self, text: &str) -> Vec<u8> {
        text.chars()
            .map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' })
            .collect()
    }

    fn decode(&self, bytes: &[u8]) -> String {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// UTF-8, lossy on decode
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8;

impl TextCodec for Utf8 {
    fn name(&self) -> &str {
        "utf8"
    }

    fn encode(&self, text: &str) -> Vec<u8> {
        text.as_bytes().to_vec()
    }

    fn decode(&self, bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Look up a bundled codec by name
pub fn codec_by_name(name: &str) -> Option<std::sync::Arc<dyn TextCodec>> {
    match name.to_ascii_lowercase().as_str() {
        "latin1" | "latin-1" | "iso-8859-1" | "iso8859-1" => Some(std::sync::Arc::new(Latin1)),
        "utf8" | "utf-8" => Some(std::sync::Arc::new(Utf8)),
        _ => None,
    }
}

/// Code page identifiers stored in the header's language driver byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FoxProCodepage {
    DosUsa = 0x01,
    DosMultilingual = 0x02,
    WindowsAnsi = 0x03,
    StandardMacintosh = 0x04,
    EeMsDos = 0x64,
    NordicMsDos = 0x65,
    RussianMsDos = 0x66,
    IcelandicMsDos = 0x67,
    KamenickyCzechMsDos = 0x68,
    MazoviaPolishMsDos = 0x69,
    GreekMsDos437G = 0x6A,
    TurkishMsDos = 0x6B,
    RussianMacintosh = 0x96,
    EasternEuropeanMacintosh = 0x97,
    GreekMacintosh = 0x98,
    WindowsEe = 0xC8,
    RussianWindows = 0xC9,
    TurkishWindows = 0xCA,
    GreekWindows = 0xCB,
}

impl FoxProCodepage {
    pub fn from_raw(value: u8) -> Option<Self> {
        use FoxProCodepage::*;
        Some(match value {
            0x01 => DosUsa,
            0x02 => DosMultilingual,
            0x03 => WindowsAnsi,
            0x04 => StandardMacintosh,
            0x64 => EeMsDos,
            0x65 => NordicMsDos,
            0x66 => RussianMsDos,
            0x67 => IcelandicMsDos,
            0x68 => KamenickyCzechMsDos,
            0x69 => MazoviaPolishMsDos,
            0x6A => GreekMsDos437G,
            0x6B => TurkishMsDos,
            0x96 => RussianMacintosh,
            0x97 => EasternEuropeanMacintosh,
            0x98 => GreekMacintosh,
            0xC8 => WindowsEe,
            0xC9 => RussianWindows,
            0xCA => TurkishWindows,
            0xCB => GreekWindows,
            _ => return None,
        })
    }

    pub fn as_raw(&self) -> u8 {
        *self as u8
    }

    /// Windows/DOS code page number, where one is well defined
    pub fn code_page(&self) -> Option<u16> {
        use FoxProCodepage::*;
        match self {
            DosUsa => Some(437),
            DosMultilingual => Some(850),
            WindowsAnsi => Some(1252),
            StandardMacintosh => Some(10000),
            EeMsDos => Some(852),
            NordicMsDos => Some(865),
            RussianMsDos => Some(866),
            IcelandicMsDos => Some(861),
            KamenickyCzechMsDos => Some(895),
            MazoviaPolishMsDos => Some(620),
            GreekMsDos437G => Some(737),
            TurkishMsDos => Some(857),
            RussianMacintosh => Some(10007),
            EasternEuropeanMacintosh => Some(10029),
            GreekMacintosh => Some(10006),
            WindowsEe => Some(1250),
            RussianWindows => Some(1251),
            TurkishWindows => Some(1254),
            GreekWindows => Some(1253),
        }
    }
}

impl fmt::Display for FoxProCodepage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code_page() {
            Some(cp) => write!(f, "{:?} (cp{})", self, cp),
            None => write!(f, "{:?}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin1_roundtrip_high_bytes() {
        let bytes: Vec<u8> = vec![b'A', 0xE9, 0xFC, b' '];
        let text = Latin1.decode(&bytes);
        assert_eq!(text, "Aéü ");
        assert_eq!(Latin1.encode(&text), bytes);
    }

    #[test]
    fn test_latin1_replaces_unmappable() {
        assert_eq!(Latin1.encode("a€b"), b"a?b".to_vec());
    }

    #[test]
    fn test_codec_lookup() {
        assert_eq!(codec_by_name("UTF-8").unwrap().name(), "utf8");
        assert_eq!(codec_by_name("latin1").unwrap().name(), "latin1");
        assert!(codec_by_name("ebcdic").is_none());
    }

    #[test]
    fn test_codepage_table() {
        let cp = FoxProCodepage::from_raw(0x03).unwrap();
        assert_eq!(cp, FoxProCodepage::WindowsAnsi);
        assert_eq!(cp.code_page(), Some(1252));
        assert_eq!(cp.as_raw(), 0x03);
        assert!(FoxProCodepage::from_raw(0x00).is_none());
    }
}
