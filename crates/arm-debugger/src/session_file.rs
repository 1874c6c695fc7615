//! JSON session-file format: emulator options, symbol/SWI name maps,
//! annotations, and memory view display flags, all loaded and saved as one
//! document per debugging session.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmulatorOptions {
    #[serde(rename = "Architecture")]
    pub architecture: String,
    #[serde(rename = "Processor")]
    pub processor: String,
    #[serde(rename = "ProcessorSpeed")]
    pub processor_speed_mhz: u32,
    #[serde(rename = "RAMSize")]
    pub ram_size: String,
    #[serde(rename = "SystemROM")]
    pub system_rom: String,
    #[serde(rename = "SystemROMPath", skip_serializing_if = "Option::is_none", default)]
    pub system_rom_path: Option<String>,
}

/// One entry of a `{Key: "0xNNNNNNNN", Value: "name"}` ordinal map, used
/// for both the SWI-comment and label name tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrdinalEntry {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl OrdinalEntry {
    #[must_use]
    pub fn new(ordinal: u32, name: impl Into<String>) -> Self {
        Self {
            key: format!("{ordinal:#010x}"),
            value: name.into(),
        }
    }

    #[must_use]
    pub fn ordinal(&self) -> Option<u32> {
        self.key.strip_prefix("0x").and_then(|hex| u32::from_str_radix(hex, 16).ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MemoryViewOptions {
    #[serde(rename = "FormatFlags")]
    pub format_flags: u32,
    #[serde(rename = "DisasmFlags")]
    pub disasm_flags: u32,
    #[serde(rename = "DisplayFlags")]
    pub display_flags: u32,
}

/// An annotation record. Only `Type`, `Start`, and `Length` are common to
/// every kind; type-specific fields are preserved opaquely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    #[serde(rename = "Type")]
    pub annotation_type: String,
    #[serde(rename = "Start")]
    pub start: u32,
    #[serde(rename = "Length")]
    pub length: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionFile {
    #[serde(rename = "EmulatorOptions")]
    pub emulator_options: EmulatorOptions,
    #[serde(rename = "Annotations", default)]
    pub annotations: Vec<Annotation>,
    #[serde(rename = "SWIs", default)]
    pub swis: Vec<OrdinalEntry>,
    #[serde(rename = "Labels", default)]
    pub labels: Vec<OrdinalEntry>,
    #[serde(rename = "MemoryViewOptions", default)]
    pub memory_view_options: MemoryViewOptions,
}

impl SessionFile {
    /// # Errors
    /// Returns an error if `text` is not valid JSON or does not match the
    /// session-file shape.
    pub fn from_json_str(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| e.to_string())
    }

    /// # Errors
    /// Returns an error if serialisation fails (should not happen for a
    /// value built from this type's own fields).
    pub fn to_json_string(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SessionFile {
        SessionFile {
            emulator_options: EmulatorOptions {
                architecture: "Archimedes".into(),
                processor: "ARM2".into(),
                processor_speed_mhz: 8,
                ram_size: "1024K".into(),
                system_rom: "Custom".into(),
                system_rom_path: Some("MemcTestRom.bin".into()),
            },
            annotations: Vec::new(),
            swis: vec![OrdinalEntry::new(0x11, "OS_WriteC")],
            labels: vec![OrdinalEntry::new(0x8000, "entry")],
            memory_view_options: MemoryViewOptions {
                format_flags: 1,
                disasm_flags: 2,
                display_flags: 3,
            },
        }
    }

    #[test]
    fn round_trips_through_json() {
        let file = sample();
        let text = file.to_json_string().unwrap();
        let parsed = SessionFile::from_json_str(&text).unwrap();
        assert_eq!(file, parsed);
    }

    #[test]
    fn ordinal_entry_formats_and_parses_hex_keys() {
        let entry = OrdinalEntry::new(0x8000, "entry");
        assert_eq!(entry.key, "0x00008000");
        assert_eq!(entry.ordinal(), Some(0x8000));
    }

    #[test]
    fn uses_recognised_top_level_keys() {
        let text = sample().to_json_string().unwrap();
        for key in ["EmulatorOptions", "Annotations", "SWIs", "Labels", "MemoryViewOptions"] {
            assert!(text.contains(key), "missing key {key}");
        }
    }
}
