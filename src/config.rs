//! Runtime configuration types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Runtime configuration for the JIT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Dump the annotated disassembly of every compiled code block
    pub show_disassembly: bool,
    /// Where dumps go (None = standard error)
    pub data_file: Option<PathBuf>,
    /// Report code at a fixed address instead of placing it in executable
    /// memory. Makes dumps reproducible.
    pub base_address: Option<u64>,
    /// Maximum value stack height accepted by the verifier
    pub max_stack: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_disassembly: false,
            data_file: None,
            base_address: None,
            max_stack: 1024,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid base address '{0}'")]
    InvalidBaseAddress(String),
}

/// On-disk form (`jitdump.toml`).
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    jit: JitSection,
    log: LogSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct JitSection {
    show_disassembly: Option<bool>,
    base_address: Option<String>,
    max_stack: Option<usize>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LogSection {
    data_file: Option<PathBuf>,
}

impl RuntimeConfig {
    /// Load a config file. Keys missing from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;

        // Relative data files are relative to the config file.
        if let (Some(file), Some(dir)) = (&config.data_file, path.parent()) {
            if file.is_relative() {
                config.data_file = Some(dir.join(file));
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        let defaults = Self::default();

        Ok(Self {
            show_disassembly: file.jit.show_disassembly.unwrap_or(defaults.show_disassembly),
            data_file: file.log.data_file,
            base_address: file
                .jit
                .base_address
                .as_deref()
                .map(parse_address)
                .transpose()?,
            max_stack: file.jit.max_stack.unwrap_or(defaults.max_stack),
        })
    }
}

/// Parse an address given as hex (`0x10000`) or decimal.
pub fn parse_address(text: &str) -> Result<u64, ConfigError> {
    let trimmed = text.trim().replace('_', "");
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => trimmed.parse(),
    };
    parsed.map_err(|_| ConfigError::InvalidBaseAddress(text.to_string()))
}
