//! Named rate configurations for the seven-level model.
//!
//! Presets are stored as TOML tables keyed by name, each with a description,
//! a list of references, and a `rates` sub-table deserialized into
//! [`SevenLevelRates`]. The built-in table is compiled into the crate.

use std::{ collections::BTreeMap, path::Path };
use serde::{ Deserialize, Serialize };
use odmr_sim::{ Error, RateResult, SevenLevelModel, SevenLevelRates };

const BUILTIN: &str = include_str!("presets.toml");

/// A single named configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Preset {
    pub description: String,
    #[serde(default)]
    pub references: Vec<String>,
    pub rates: SevenLevelRates,
}

/// A collection of presets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Presets {
    presets: BTreeMap<String, Preset>,
}

/// Lower-case a preset name and replace `-`, `@`, and spaces with `_`.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if matches!(c, '-' | '@' | ' ') { '_' } else { c })
        .collect()
}

impl Presets {
    /// Load the presets shipped with this crate.
    pub fn builtin() -> RateResult<Self> { Self::from_toml_str(BUILTIN) }

    /// Parse presets from a TOML document.
    pub fn from_toml_str(content: &str) -> RateResult<Self> {
        let presets: BTreeMap<String, Preset>
            = toml::from_str(content)
            .map_err(|e| Error::Configuration(
                format!("failed to parse presets: {}", e)))?;
        let presets = presets.into_iter()
            .map(|(name, preset)| (normalize_name(&name), preset))
            .collect();
        Ok(Self { presets })
    }

    /// Read and parse presets from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> RateResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(
                format!("failed to read presets from '{}': {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Map of preset names to descriptions.
    pub fn list(&self) -> BTreeMap<&str, &str> {
        self.presets.iter()
            .map(|(name, preset)| (name.as_str(), preset.description.as_str()))
            .collect()
    }

    /// Look up a preset by name.
    ///
    /// Fails with [`Error::Configuration`] listing the available names if no
    /// preset matches.
    pub fn info(&self, name: &str) -> RateResult<&Preset> {
        self.presets.get(&normalize_name(name))
            .ok_or_else(|| {
                let available: Vec<&str>
                    = self.presets.keys().map(String::as_str).collect();
                Error::Configuration(format!(
                    "unknown preset '{}'; available presets: {}",
                    name,
                    available.join(", "),
                ))
            })
    }

    /// Build the seven-level model for a preset.
    pub fn model(&self, name: &str) -> RateResult<SevenLevelModel> {
        SevenLevelModel::new(self.info(name)?.rates.clone())
    }
}
