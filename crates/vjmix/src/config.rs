use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use renderer::{Antialiasing, ColorSpaceMode, RendererConfig};
use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::cli::parse_surface_size;

pub const CONFIG_FILE_NAME: &str = "vjmix.toml";
pub const DEFAULT_WATCH_DEBOUNCE: Duration = Duration::from_millis(50);
const MAX_WATCH_DEBOUNCE: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Optional settings from `vjmix.toml`; every key may be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VjmixConfig {
    /// Seconds added to the shader clock per frame.
    pub time_step: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_antialias_opt")]
    pub antialias: Option<Antialiasing>,
    #[serde(default, deserialize_with = "deserialize_color_space_opt")]
    pub color_space: Option<ColorSpaceMode>,
    #[serde(default, deserialize_with = "deserialize_size_opt")]
    pub inline_size: Option<(u32, u32)>,
    #[serde(default, deserialize_with = "deserialize_size_opt")]
    pub secondary_size: Option<(u32, u32)>,
    pub fallback_color: Option<[f32; 3]>,
    /// Quiet period after a file event before the shader is re-read.
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub watch_debounce: Option<Duration>,
}

impl VjmixConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: VjmixConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads `path` when it exists; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(step) = self.time_step {
            if !step.is_finite() || step <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "time_step must be a positive number of seconds, got {step}"
                )));
            }
        }

        if let Some(color) = self.fallback_color {
            if color.iter().any(|channel| !(0.0..=1.0).contains(channel)) {
                return Err(ConfigError::Invalid(
                    "fallback_color channels must be between 0.0 and 1.0".into(),
                ));
            }
        }

        if self
            .watch_debounce
            .is_some_and(|debounce| debounce > MAX_WATCH_DEBOUNCE)
        {
            return Err(ConfigError::Invalid(format!(
                "watch_debounce must be at most {}",
                humantime::format_duration(MAX_WATCH_DEBOUNCE)
            )));
        }

        Ok(())
    }

    pub fn watch_debounce(&self) -> Duration {
        self.watch_debounce.unwrap_or(DEFAULT_WATCH_DEBOUNCE)
    }

    /// Overlays the file settings onto `config`.
    pub fn apply(&self, config: &mut RendererConfig) {
        if let Some(step) = self.time_step {
            config.time_step = step;
        }
        if let Some(antialias) = self.antialias {
            config.antialiasing = antialias;
        }
        if let Some(color_space) = self.color_space {
            config.color_space = color_space;
        }
        if let Some(size) = self.inline_size {
            config.inline_size = size;
        }
        if let Some(size) = self.secondary_size {
            config.secondary_size = size;
        }
        if let Some(color) = self.fallback_color {
            config.fallback_color = color;
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StrOrNum {
    Str(String),
    Num(i64),
}

fn deserialize_antialias_opt<'de, D>(deserializer: D) -> Result<Option<Antialiasing>, D::Error>
where
    D: Deserializer<'de>,
{
    let helper: Option<StrOrNum> = Option::deserialize(deserializer)?;
    let raw = match helper {
        None => return Ok(None),
        Some(StrOrNum::Str(raw)) => raw,
        Some(StrOrNum::Num(value)) if value < 0 => {
            return Err(de::Error::custom("antialias value must be non-negative"));
        }
        Some(StrOrNum::Num(value)) => value.to_string(),
    };
    raw.parse().map(Some).map_err(de::Error::custom)
}

fn deserialize_color_space_opt<'de, D>(deserializer: D) -> Result<Option<ColorSpaceMode>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|raw| raw.parse().map_err(de::Error::custom))
        .transpose()
}

fn deserialize_size_opt<'de, D>(deserializer: D) -> Result<Option<(u32, u32)>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|raw| parse_surface_size(&raw).map_err(de::Error::custom))
        .transpose()
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }
    }

    deserializer.deserialize_any(Visitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_keeps_defaults() {
        let config = VjmixConfig::from_toml_str("").unwrap();
        let mut renderer = RendererConfig::default();
        config.apply(&mut renderer);
        assert_eq!(renderer.secondary_size, (800, 600));
        assert_eq!(config.watch_debounce(), DEFAULT_WATCH_DEBOUNCE);
    }

    #[test]
    fn parses_every_key() {
        let config = VjmixConfig::from_toml_str(
            r#"
time_step = 0.01
antialias = 4
color_space = "linear"
inline_size = "320x240"
secondary_size = "1024x768"
fallback_color = [1.0, 0.0, 1.0]
watch_debounce = "500ms"
"#,
        )
        .unwrap();

        let mut renderer = RendererConfig::default();
        config.apply(&mut renderer);
        assert_eq!(renderer.time_step, 0.01);
        assert_eq!(renderer.antialiasing, Antialiasing::Samples(4));
        assert_eq!(renderer.color_space, ColorSpaceMode::Linear);
        assert_eq!(renderer.inline_size, (320, 240));
        assert_eq!(renderer.secondary_size, (1024, 768));
        assert_eq!(renderer.fallback_color, [1.0, 0.0, 1.0]);
        assert_eq!(config.watch_debounce(), Duration::from_millis(500));
    }

    #[test]
    fn numeric_watch_debounce_is_seconds() {
        let config = VjmixConfig::from_toml_str("watch_debounce = 2").unwrap();
        assert_eq!(config.watch_debounce(), Duration::from_secs(2));
    }

    #[test]
    fn antialias_accepts_keywords() {
        let config = VjmixConfig::from_toml_str("antialias = \"off\"").unwrap();
        assert_eq!(config.antialias, Some(Antialiasing::Off));
        assert!(VjmixConfig::from_toml_str("antialias = 3").is_err());
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            VjmixConfig::from_toml_str("time_step = 0.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            VjmixConfig::from_toml_str("fallback_color = [2.0, 0.0, 0.0]"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            VjmixConfig::from_toml_str("watch_debounce = \"1m\""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            VjmixConfig::from_toml_str("inline_size = \"big\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            VjmixConfig::from_toml_str("color_space = \"hdr\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            VjmixConfig::from_toml_str("unknown = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = VjmixConfig::load(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert!(config.time_step.is_none());
    }
}
