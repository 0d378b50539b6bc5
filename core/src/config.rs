// Bridge configuration
//
// Stored as pretty-printed JSON. Every field has a default so partial files
// load cleanly.

use crate::codec::MAX_ATTR_LEN;
use crate::error::BridgeError;
use crate::router::ADV_REPORT_LEN;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Upper bound applied to outbound server response values
    pub max_attribute_len: usize,

    /// Length scan result advertisement data is normalised to
    pub adv_report_len: usize,

    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_filter: String,

    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,

    /// Directory for a daily rolling log file; stderr only when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_attribute_len: MAX_ATTR_LEN,
            adv_report_len: ADV_REPORT_LEN,
            log_filter: "info".to_string(),
            log_json: false,
            log_dir: None,
        }
    }
}

impl BridgeConfig {
    /// Load from `path`, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: BridgeConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), BridgeError> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.max_attribute_len == 0 || self.max_attribute_len > MAX_ATTR_LEN {
            return Err(BridgeError::Config(format!(
                "max_attribute_len must be within 1..={}",
                MAX_ATTR_LEN
            )));
        }
        if self.adv_report_len == 0 {
            return Err(BridgeError::Config(
                "adv_report_len must be non-zero".to_string(),
            ));
        }
        if self.log_filter.trim().is_empty() {
            return Err(BridgeError::Config("log_filter must not be empty".to_string()));
        }
        Ok(())
    }

    /// Set a field from its textual form. Leaves `self` untouched on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), BridgeError> {
        let invalid = |what: &str| {
            BridgeError::Config(format!("Invalid {} for {}: {}", what, key, value))
        };
        let mut next = self.clone();
        match key {
            "max_attribute_len" => {
                next.max_attribute_len = value.parse().map_err(|_| invalid("number"))?;
            }
            "adv_report_len" => {
                next.adv_report_len = value.parse().map_err(|_| invalid("number"))?;
            }
            "log_filter" => next.log_filter = value.to_string(),
            "log_json" => {
                next.log_json = value.parse().map_err(|_| invalid("boolean"))?;
            }
            "log_dir" => {
                next.log_dir = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            _ => return Err(BridgeError::Config(format!("Unknown config key: {}", key))),
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "max_attribute_len" => Some(self.max_attribute_len.to_string()),
            "adv_report_len" => Some(self.adv_report_len.to_string()),
            "log_filter" => Some(self.log_filter.clone()),
            "log_json" => Some(self.log_json.to_string()),
            "log_dir" => self.log_dir.as_ref().map(|p| p.display().to_string()),
            _ => None,
        }
    }

    pub fn keys() -> &'static [&'static str] {
        &[
            "max_attribute_len",
            "adv_report_len",
            "log_filter",
            "log_json",
            "log_dir",
        ]
    }
}
