use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Temperature presets exposed in the composer: 0 = precise, 1 = balanced,
/// 2 = creative. Any other index falls back to balanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureMode {
    Precise,
    Balanced,
    Creative,
}

impl TemperatureMode {
    pub fn from_index(index: i64) -> Self {
        match index {
            0 => TemperatureMode::Precise,
            2 => TemperatureMode::Creative,
            _ => TemperatureMode::Balanced,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "precise" => Some(TemperatureMode::Precise),
            "balanced" => Some(TemperatureMode::Balanced),
            "creative" => Some(TemperatureMode::Creative),
            _ => None,
        }
    }

    pub fn temperature(self) -> f64 {
        match self {
            TemperatureMode::Precise => 0.2,
            TemperatureMode::Balanced => 0.7,
            TemperatureMode::Creative => 0.9,
        }
    }
}

/// Response length presets: 0 = short, 1 = medium, 2 = long. Any other index
/// falls back to medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseLength {
    Short,
    Medium,
    Long,
}

impl ResponseLength {
    pub fn from_index(index: i64) -> Self {
        match index {
            0 => ResponseLength::Short,
            2 => ResponseLength::Long,
            _ => ResponseLength::Medium,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "short" => Some(ResponseLength::Short),
            "medium" => Some(ResponseLength::Medium),
            "long" => Some(ResponseLength::Long),
            _ => None,
        }
    }

    pub fn max_tokens(self) -> u32 {
        match self {
            ResponseLength::Short => 500,
            ResponseLength::Medium => 1000,
            ResponseLength::Long => 2000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamOrigin {
    Preset,
    Custom,
}

/// Concrete request configuration sent to the generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f64,
    pub max_tokens: u32,
    pub origin: ParamOrigin,
}

impl GenerationParams {
    pub fn resolve(mode: TemperatureMode, length: ResponseLength) -> Self {
        Self {
            temperature: mode.temperature(),
            max_tokens: length.max_tokens(),
            origin: ParamOrigin::Preset,
        }
    }

    /// Explicit overrides win over the preset tables and are used verbatim;
    /// the composer sliders bound them to 0..=1 and 100..=4000.
    pub fn custom(temperature: f64, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
            origin: ParamOrigin::Custom,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            origin: ParamOrigin::Preset,
        }
    }
}
