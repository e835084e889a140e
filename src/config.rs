//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/treemark/treemark.toml` (or an explicit `--config` file)
//! 3. Environment variables: `TREEMARK_*` prefix, `__` for nesting

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;
use crate::infrastructure::traits::FileSystem;

/// Named CSS font stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontFamily {
    pub name: &'static str,
    pub stack: &'static str,
}

pub const FONT_FAMILIES: [FontFamily; 5] = [
    FontFamily {
        name: "Arial",
        stack: "Arial, Helvetica, Sans-Serif",
    },
    FontFamily {
        name: "Impact",
        stack: "Impact, Charcoal, Sans-Serif",
    },
    FontFamily {
        name: "Georgia",
        stack: "Georgia, Times New Roman, Times, Serif",
    },
    FontFamily {
        name: "Lucida Console",
        stack: "Lucida Console, Monaco, Monospace",
    },
    FontFamily {
        name: "Comic Sans MS",
        stack: "Comic Sans MS, Textile, Cursive",
    },
];

/// Parse a `#rrggbb` color.
pub fn parse_hex_color(value: &str) -> Option<(u8, u8, u8)> {
    let hex = value.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Cosmetic preferences for tree rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Appearance {
    /// CSS-style size, e.g. "14px"
    pub font_size: String,
    /// Font stack, one of [`FONT_FAMILIES`]
    pub font_family: String,
    pub default_color: String,
    pub positive_color: String,
    pub negative_color: String,
    pub skipped_color: String,
    pub debug_color: String,
    /// Color values by sign; when off, positive and negative use `default_color`
    pub use_positive_negative_colors: bool,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            font_size: "14px".into(),
            font_family: FONT_FAMILIES[0].stack.into(),
            default_color: "#213547".into(),
            positive_color: "#008000".into(),
            negative_color: "#ff0000".into(),
            skipped_color: "#213547".into(),
            debug_color: "#cea309".into(),
            use_positive_negative_colors: false,
        }
    }
}

impl Appearance {
    /// Name of the configured font family, if it is a known stack.
    pub fn font_family_name(&self) -> Option<&'static str> {
        FONT_FAMILIES
            .iter()
            .find(|f| f.stack == self.font_family || f.name == self.font_family)
            .map(|f| f.name)
    }

    /// Font size in pixels.
    pub fn font_size_px(&self) -> Option<u32> {
        self.font_size.trim().trim_end_matches("px").trim().parse().ok()
    }

    fn colors(&self) -> [(&'static str, &str); 5] {
        [
            ("default_color", &self.default_color),
            ("positive_color", &self.positive_color),
            ("negative_color", &self.negative_color),
            ("skipped_color", &self.skipped_color),
            ("debug_color", &self.debug_color),
        ]
    }

    fn merge(&self, overlay: &RawAppearance) -> Self {
        let pick = |o: &Option<String>, base: &String| o.clone().unwrap_or_else(|| base.clone());
        Self {
            font_size: pick(&overlay.font_size, &self.font_size),
            font_family: pick(&overlay.font_family, &self.font_family),
            default_color: pick(&overlay.default_color, &self.default_color),
            positive_color: pick(&overlay.positive_color, &self.positive_color),
            negative_color: pick(&overlay.negative_color, &self.negative_color),
            skipped_color: pick(&overlay.skipped_color, &self.skipped_color),
            debug_color: pick(&overlay.debug_color, &self.debug_color),
            use_positive_negative_colors: overlay
                .use_positive_negative_colors
                .unwrap_or(self.use_positive_negative_colors),
        }
    }
}

/// Raw appearance for intermediate parsing (None → not specified, inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawAppearance {
    pub font_size: Option<String>,
    pub font_family: Option<String>,
    pub default_color: Option<String>,
    pub positive_color: Option<String>,
    pub negative_color: Option<String>,
    pub skipped_color: Option<String>,
    pub debug_color: Option<String>,
    pub use_positive_negative_colors: Option<bool>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub data_dir: Option<PathBuf>,
    pub min_query_len: Option<usize>,
    pub appearance: RawAppearance,
}

/// Unified configuration for treemark.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Directory holding `*.json` datasets (default: current directory)
    pub data_dir: PathBuf,
    /// Shorter search queries are ignored
    pub min_query_len: usize,
    pub appearance: Appearance,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            min_query_len: 2,
            appearance: Appearance::default(),
        }
    }
}

/// Get the XDG config directory for treemark.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "treemark").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("treemark.toml"))
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(fs: &dyn FileSystem, path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = fs.read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Expand shell variables and tilde in `data_dir`.
    fn expand_paths(&mut self) {
        let raw = self.data_dir.to_string_lossy().into_owned();
        let expanded = shellexpand::full(&raw)
            .map(|s| s.into_owned())
            .unwrap_or(raw);
        self.data_dir = PathBuf::from(expanded);
    }

    /// Overlay wins where it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            data_dir: overlay
                .data_dir
                .clone()
                .unwrap_or_else(|| self.data_dir.clone()),
            min_query_len: overlay.min_query_len.unwrap_or(self.min_query_len),
            appearance: self.appearance.merge(&overlay.appearance),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `fs` - Filesystem the config files are read from
    /// * `config_file` - Explicit config file replacing the global one; must exist
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. `config_file`, else global config `$XDG_CONFIG_HOME/treemark/treemark.toml`
    /// 3. Environment variables: `TREEMARK_*` prefix
    pub fn load(fs: &dyn FileSystem, config_file: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        match config_file {
            Some(path) => {
                if !fs.is_file(path) {
                    return Err(ApplicationError::Config {
                        message: format!("config file not found: {}", path.display()),
                    });
                }
                current = current.merge_with(&load_raw_settings(fs, path)?);
            }
            None => {
                if let Some(global_path) = global_config_path() {
                    if fs.is_file(&global_path) {
                        debug!("load: global config {}", global_path.display());
                        current = current.merge_with(&load_raw_settings(fs, &global_path)?);
                    }
                }
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        current.validate()?;

        Ok(current)
    }

    /// Apply TREEMARK_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("TREEMARK").separator("__"))
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("data_dir") {
            settings.data_dir = PathBuf::from(val);
        }
        if let Ok(val) = config.get_int("min_query_len") {
            settings.min_query_len = usize::try_from(val).unwrap_or(settings.min_query_len);
        }

        let appearance = &mut settings.appearance;
        let strings: [(&str, &mut String); 7] = [
            ("appearance.font_size", &mut appearance.font_size),
            ("appearance.font_family", &mut appearance.font_family),
            ("appearance.default_color", &mut appearance.default_color),
            ("appearance.positive_color", &mut appearance.positive_color),
            ("appearance.negative_color", &mut appearance.negative_color),
            ("appearance.skipped_color", &mut appearance.skipped_color),
            ("appearance.debug_color", &mut appearance.debug_color),
        ];
        for (key, field) in strings {
            if let Ok(val) = config.get_string(key) {
                *field = val;
            }
        }
        if let Ok(val) = config.get_bool("appearance.use_positive_negative_colors") {
            appearance.use_positive_negative_colors = val;
        }

        Ok(settings)
    }

    /// Reject colors, font sizes and font families outside the supported set.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        for (key, value) in self.appearance.colors() {
            if parse_hex_color(value).is_none() {
                return Err(ApplicationError::Config {
                    message: format!("{key}: expected #rrggbb, got '{value}'"),
                });
            }
        }
        if self.appearance.font_size_px().is_none() {
            return Err(ApplicationError::Config {
                message: format!(
                    "font_size: expected pixels like '14px', got '{}'",
                    self.appearance.font_size
                ),
            });
        }
        if self.appearance.font_family_name().is_none() {
            let known = FONT_FAMILIES.iter().map(|f| f.name).collect::<Vec<_>>().join(", ");
            return Err(ApplicationError::Config {
                message: format!(
                    "font_family: expected one of {known}, got '{}'",
                    self.appearance.font_family
                ),
            });
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r##"# treemark configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/treemark/treemark.toml  (or --config <file>)
#   Env:    TREEMARK_* environment variables, e.g. TREEMARK_APPEARANCE__DEBUG_COLOR

# Directory holding *.json datasets
# data_dir = "~/datasets"

# Search queries shorter than this are ignored
# min_query_len = 2

[appearance]
# font_size = "14px"
# font_family = "Arial, Helvetica, Sans-Serif"
# default_color = "#213547"
# positive_color = "#008000"
# negative_color = "#ff0000"
# skipped_color = "#213547"
# debug_color = "#cea309"
# use_positive_negative_colors = false
"##
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn given_defaults_when_validating_then_ok() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.appearance.font_family_name(), Some("Arial"));
        assert_eq!(settings.appearance.font_size_px(), Some(14));
    }

    #[rstest]
    #[case("#213547", Some((0x21, 0x35, 0x47)))]
    #[case("#FF0000", Some((255, 0, 0)))]
    #[case("213547", None)]
    #[case("#fff", None)]
    #[case("#gg0000", None)]
    fn test_parse_hex_color(#[case] input: &str, #[case] expected: Option<(u8, u8, u8)>) {
        assert_eq!(parse_hex_color(input), expected);
    }

    #[test]
    fn given_raw_overlay_when_merging_then_only_specified_fields_change() {
        let raw: RawSettings = toml::from_str(
            r##"
min_query_len = 3
[appearance]
negative_color = "#aa0000"
use_positive_negative_colors = true
"##,
        )
        .unwrap();

        let merged = Settings::default().merge_with(&raw);

        assert_eq!(merged.min_query_len, 3);
        assert_eq!(merged.data_dir, PathBuf::from("."));
        assert_eq!(merged.appearance.negative_color, "#aa0000");
        assert_eq!(merged.appearance.positive_color, "#008000");
        assert!(merged.appearance.use_positive_negative_colors);
    }

    #[test]
    fn given_tilde_in_data_dir_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings {
            data_dir: PathBuf::from("~/datasets"),
            ..Settings::default()
        };

        settings.expand_paths();

        let home = std::env::var("HOME").expect("HOME should be set");
        let dir = settings.data_dir.to_string_lossy();
        assert!(dir.starts_with(&home), "data_dir should start with home: {}", dir);
        assert!(!dir.contains('~'));
    }

    #[rstest]
    #[case("Impact", true)]
    #[case("Lucida Console, Monaco, Monospace", true)]
    #[case("Papyrus", false)]
    fn test_validate_font_family(#[case] family: &str, #[case] valid: bool) {
        let mut settings = Settings::default();
        settings.appearance.font_family = family.to_string();
        assert_eq!(settings.validate().is_ok(), valid);
    }

    #[test]
    fn given_template_when_parsed_then_is_valid_toml() {
        let raw: RawSettings = toml::from_str(&Settings::template()).unwrap();
        assert!(raw.data_dir.is_none());
    }
}
