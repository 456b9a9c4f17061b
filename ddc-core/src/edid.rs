//! EDID validation and identity parsing
//!
//! Only the fields used to tell monitors apart are decoded: manufacturer,
//! product code, serial numbers, model name and manufacture date. Timing
//! data is left alone.

use serde::Serialize;
use std::fmt;

use crate::constants::edid::*;

/// Sum of the first 128 bytes, mod 256. Zero for an intact block.
pub fn edid_checksum(block: &[u8]) -> u8 {
    block
        .iter()
        .take(BLOCK_SIZE)
        .fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// At least 128 bytes, the base block header, and the first 128 bytes
/// summing to 0 mod 256
pub fn is_valid_raw_edid(bytes: &[u8]) -> bool {
    bytes.len() >= BLOCK_SIZE
        && bytes[..HEADER.len()] == HEADER
        && edid_checksum(&bytes[..BLOCK_SIZE]) == 0
}

/// A checksummed block carrying the CEA-861 extension tag
pub fn is_valid_cea861_extension(bytes: &[u8]) -> bool {
    bytes.len() >= BLOCK_SIZE
        && bytes[0] == CEA861_EXTENSION_TAG
        && edid_checksum(&bytes[..BLOCK_SIZE]) == 0
}

/// Hex of bytes 124..128, used to label an EDID in logs and reports
pub fn edid_tag(raw: &[u8]) -> String {
    raw.get(TAG_OFFSET..BLOCK_SIZE)
        .map(|tail| tail.iter().map(|b| format!("{:02X}", b)).collect())
        .unwrap_or_default()
}

/// Raw EDID bytes as read off the bus: empty, one block, or two blocks
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RawEdid(Vec<u8>);

impl RawEdid {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Zero-length result of a failed acquisition
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// First 128 bytes, if present
    pub fn base_block(&self) -> Option<&[u8; BLOCK_SIZE]> {
        self.0.get(..BLOCK_SIZE)?.try_into().ok()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for RawEdid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawEdid({} bytes, tag {})", self.0.len(), edid_tag(&self.0))
    }
}

/// How the EDID bytes were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdidSource {
    I2c,
    Sysfs,
    Test,
}

/// Identity fields decoded from an EDID base block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedEdid {
    #[serde(serialize_with = "serialize_hex")]
    pub raw: [u8; BLOCK_SIZE],
    /// Extension block, kept when a 256-byte read returned one
    #[serde(skip)]
    pub extension: Option<Vec<u8>>,
    pub source: EdidSource,
    /// Three-letter PNP id
    pub mfg_id: String,
    pub product_code: u16,
    pub serial_binary: u32,
    pub model_name: String,
    pub serial_ascii: String,
    pub extra_descriptor: String,
    pub manufacture_week: u8,
    /// Year of manufacture, or model year when `is_model_year` is set
    pub year: u16,
    pub is_model_year: bool,
    pub version_major: u8,
    pub version_minor: u8,
    pub video_input_definition: u8,
    pub supported_features: u8,
    pub extension_count: u8,
    pub tag: String,
}

fn serialize_hex<S: serde::Serializer>(bytes: &[u8; BLOCK_SIZE], s: S) -> Result<S::Ok, S::Error> {
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    s.serialize_str(&hex)
}

impl ParsedEdid {
    /// Decode a raw EDID. Returns None unless the first 128 bytes validate.
    pub fn parse(bytes: &[u8], source: EdidSource) -> Option<Self> {
        if !is_valid_raw_edid(bytes) {
            return None;
        }
        let mut raw = [0u8; BLOCK_SIZE];
        raw.copy_from_slice(&bytes[..BLOCK_SIZE]);

        let mut model_name = String::new();
        let mut serial_ascii = String::new();
        let mut extra_descriptor = String::new();
        for i in 0..DESCRIPTOR_COUNT {
            let start = DESCRIPTORS_START + i * DESCRIPTOR_SIZE;
            let d = &raw[start..start + DESCRIPTOR_SIZE];
            // Display descriptors have a zero pixel clock
            if d[0] != 0 || d[1] != 0 || d[2] != 0 || d[4] != 0 {
                continue;
            }
            let target = match d[3] {
                DESCRIPTOR_NAME => &mut model_name,
                DESCRIPTOR_SERIAL => &mut serial_ascii,
                DESCRIPTOR_TEXT => &mut extra_descriptor,
                _ => continue,
            };
            if target.is_empty() {
                *target = descriptor_text(&d[5..5 + DESCRIPTOR_TEXT_MAX]);
            }
        }

        let week = raw[16];
        let extension = (bytes.len() >= DOUBLE_BLOCK_SIZE)
            .then(|| bytes[BLOCK_SIZE..DOUBLE_BLOCK_SIZE].to_vec());

        Some(Self {
            mfg_id: pnp_id(raw[8], raw[9]),
            product_code: u16::from_le_bytes([raw[10], raw[11]]),
            serial_binary: u32::from_le_bytes([raw[12], raw[13], raw[14], raw[15]]),
            model_name,
            serial_ascii,
            extra_descriptor,
            manufacture_week: week,
            year: raw[17] as u16 + 1990,
            is_model_year: week == 0xFF,
            version_major: raw[18],
            version_minor: raw[19],
            video_input_definition: raw[0x14],
            supported_features: raw[0x18],
            extension_count: raw[0x7E],
            tag: edid_tag(&raw),
            extension,
            source,
            raw,
        })
    }
}

impl fmt::Display for ParsedEdid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (product 0x{:04x}, sn \"{}\", tag {})",
            self.mfg_id, self.model_name, self.product_code, self.serial_ascii, self.tag
        )
    }
}

/// Packed 5-bit letters, 'A' == 1
fn pnp_id(hi: u8, lo: u8) -> String {
    let packed = u16::from_be_bytes([hi, lo]);
    [10u16, 5, 0]
        .iter()
        .map(|shift| char::from((((packed >> shift) & 0x1F) as u8) + b'@'))
        .collect()
}

fn descriptor_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0x0A).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
}
