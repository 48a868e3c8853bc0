//! TOML target description parsing

use std::fs;
use std::path::Path;
use std::string::String;
use std::format;

use super::{ConfigError, UpdateConfig, DEFAULT_PAGE_SIZE};

/// Default size of the internal program memory (ATmega2560)
const DEFAULT_PROGRAM_SIZE: u32 = 256 * 1024;

/// Everything a host tool needs to know about a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetConfig {
    /// Engine configuration
    pub update: UpdateConfig,
    /// Programming granularity of the internal flash
    pub page_size: usize,
    /// Total size of the internal program memory
    pub program_size: u32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            update: UpdateConfig::default(),
            page_size: DEFAULT_PAGE_SIZE,
            program_size: DEFAULT_PROGRAM_SIZE,
        }
    }
}

impl TargetConfig {
    /// Check the whole target description
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.update.validate(self.page_size)?;
        if self.update.protected_start > self.program_size {
            return Err(ConfigError::ProtectedStartOutOfBounds);
        }
        Ok(())
    }
}

/// TOML file structure
#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfigFile {
    #[serde(default)]
    flash: TomlFlash,
    #[serde(default)]
    target: TomlTarget,
}

/// External flash section
#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlFlash {
    size: Option<TomlNumber>,
    sector_size: Option<TomlNumber>,
    magic: Option<String>,
}

/// Internal flash section
#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlTarget {
    page_size: Option<TomlNumber>,
    protected_start: Option<TomlNumber>,
    program_size: Option<TomlNumber>,
}

/// A number written as an integer or as a string ("0x3F000", "2 MiB")
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum TomlNumber {
    Int(u32),
    Str(String),
}

impl TomlNumber {
    fn resolve(&self, field: &str) -> Result<u32, ConfigError> {
        match self {
            Self::Int(n) => Ok(*n),
            Self::Str(s) => parse_size(s).map_err(|e| {
                log::error!("{}: {}", field, e);
                ConfigError::ParseError
            }),
        }
    }
}

/// Parse a size string like "2 MiB", "0x3F000" or "4096"
fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();

    if let Ok(n) = s.parse::<u32>() {
        return Ok(n);
    }

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u32::from_str_radix(hex.trim(), 16).map_err(|e| format!("invalid hex: {}", e));
    }

    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix('b') {
        (n.trim(), 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num_str.parse().map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

/// Parse a target description from a TOML string
///
/// Missing keys keep their [`TargetConfig::default`] values.
pub fn parse_config(content: &str) -> Result<TargetConfig, ConfigError> {
    let file: TomlConfigFile = ::toml::from_str(content).map_err(|e| {
        log::error!("config: {}", e);
        ConfigError::ParseError
    })?;

    let mut config = TargetConfig::default();

    if let Some(size) = &file.flash.size {
        config.update.flash_size = size.resolve("flash.size")?;
    }
    if let Some(size) = &file.flash.sector_size {
        config.update.sector_size = size.resolve("flash.sector_size")?;
    }
    if let Some(magic) = &file.flash.magic {
        config.update.magic = magic
            .as_bytes()
            .try_into()
            .map_err(|_| ConfigError::InvalidMagic)?;
    }
    if let Some(size) = &file.target.page_size {
        config.page_size = size.resolve("target.page_size")? as usize;
    }
    if let Some(addr) = &file.target.protected_start {
        config.update.protected_start = addr.resolve("target.protected_start")?;
    }
    if let Some(size) = &file.target.program_size {
        config.program_size = size.resolve("target.program_size")?;
    }

    config.validate()?;
    log::debug!(
        "config: flash {} bytes, footer at 0x{:X}, page {} bytes, protected from 0x{:X}",
        config.update.flash_size,
        config.update.footer_addr(),
        config.page_size,
        config.update.protected_start
    );
    Ok(config)
}

/// Load a target description from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<TargetConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|_| ConfigError::IoError)?;
    parse_config(&content)
}
