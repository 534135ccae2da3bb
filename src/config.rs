use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AsmError, Result};

pub const DEFAULT_STACK_SIZE: u32 = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsmConfig {
    pub stack_size: u32, // bytes, rounded up to a multiple of 256
    pub rom_signature: bool, // "GGAS" word right after the header
}

impl Default for AsmConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            rom_signature: true,
        }
    }
}

impl AsmConfig {
    /// Reads a JSON config; missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| AsmError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| AsmError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })
    }
}
