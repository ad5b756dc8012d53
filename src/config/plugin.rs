//! Runtime plugin settings
//!
//! Settings are persisted as loosely typed strings (they are edited by
//! operators) and validated into [`PluginConfig`] each time a request needs
//! them. Out-of-range values surface as [`TimeshiftError::ConfigError`].

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use super::defaults::*;
use crate::errors::{TimeshiftError, TimeshiftResult};
use crate::utils::time::validate_timezone;

/// Persisted settings as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPluginSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(default = "default_url_dialect")]
    pub url_dialect: String,
    #[serde(default)]
    pub custom_template: String,
}

fn default_enabled() -> bool {
    DEFAULT_ENABLED
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_url_dialect() -> String {
    DEFAULT_URL_DIALECT.to_string()
}

impl Default for RawPluginSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            timezone: default_timezone(),
            language: default_language(),
            debug_mode: false,
            url_dialect: default_url_dialect(),
            custom_template: String::new(),
        }
    }
}

/// EPG languages offered to clients
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EpgLanguage {
    Bg,
    Cs,
    Da,
    De,
    El,
    En,
    Es,
    Et,
    Fi,
    Fr,
    Hr,
    Hu,
    It,
    Lt,
    Lv,
    Nl,
    No,
    Pl,
    Pt,
    Ro,
    Ru,
    Sk,
    Sl,
    Sr,
    Sv,
    Tr,
    Uk,
}

/// Configured catch-up URL dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum UrlDialect {
    #[strum(serialize = "auto")]
    Auto,
    #[strum(serialize = "A")]
    A,
    #[strum(serialize = "B")]
    B,
    #[strum(serialize = "custom")]
    Custom,
}

/// Validated plugin settings for a single request
#[derive(Debug, Clone, PartialEq)]
pub struct PluginConfig {
    pub enabled: bool,
    pub provider_timezone: Tz,
    pub epg_language: EpgLanguage,
    pub debug_mode: bool,
    pub url_dialect: UrlDialect,
    /// Present only when `url_dialect` is [`UrlDialect::Custom`]
    pub custom_template: Option<String>,
}

impl PluginConfig {
    pub fn from_raw(raw: &RawPluginSettings) -> TimeshiftResult<Self> {
        let provider_timezone = validate_timezone(&raw.timezone).map_err(TimeshiftError::config)?;

        let lang_str = raw.language.trim();
        let epg_language = lang_str.parse::<EpgLanguage>().map_err(|_| {
            TimeshiftError::config(format!("Unsupported EPG language: '{lang_str}'"))
        })?;

        let dialect_str = raw.url_dialect.trim();
        let url_dialect = dialect_str.parse::<UrlDialect>().map_err(|_| {
            TimeshiftError::config(format!(
                "Unknown URL dialect '{dialect_str}', expected auto, A, B or custom"
            ))
        })?;

        let custom_template = match url_dialect {
            UrlDialect::Custom => {
                let template = raw.custom_template.trim();
                if template.is_empty() {
                    return Err(TimeshiftError::config(
                        "URL dialect 'custom' requires a non-empty custom_template",
                    ));
                }
                Some(template.to_string())
            }
            _ => None,
        };

        Ok(Self {
            enabled: raw.enabled,
            provider_timezone,
            epg_language,
            debug_mode: raw.debug_mode,
            url_dialect,
            custom_template,
        })
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_ENABLED,
            provider_timezone: chrono_tz::Europe::Brussels,
            epg_language: EpgLanguage::En,
            debug_mode: false,
            url_dialect: UrlDialect::Auto,
            custom_template: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    fn raw() -> RawPluginSettings {
        RawPluginSettings::default()
    }

    #[test]
    fn test_defaults_validate() {
        let config = PluginConfig::from_raw(&raw()).unwrap();
        assert_eq!(config, PluginConfig::default());
    }

    #[test]
    fn test_fields_are_trimmed() {
        let settings = RawPluginSettings {
            timezone: "  America/New_York ".into(),
            language: " NL ".into(),
            url_dialect: " b ".into(),
            ..raw()
        };
        let config = PluginConfig::from_raw(&settings).unwrap();
        assert_eq!(config.provider_timezone, chrono_tz::America::New_York);
        assert_eq!(config.epg_language, EpgLanguage::Nl);
        assert_eq!(config.url_dialect, UrlDialect::B);
    }

    #[rstest]
    #[case("Mars/Olympus_Mons")]
    #[case("")]
    fn test_invalid_timezone(#[case] tz: &str) {
        let settings = RawPluginSettings {
            timezone: tz.into(),
            ..raw()
        };
        let err = PluginConfig::from_raw(&settings).unwrap_err();
        assert_eq!(err.kind(), "config_error");
    }

    #[rstest]
    #[case("xx")]
    #[case("english")]
    fn test_invalid_language(#[case] lang: &str) {
        let settings = RawPluginSettings {
            language: lang.into(),
            ..raw()
        };
        assert!(PluginConfig::from_raw(&settings).is_err());
    }

    #[test]
    fn test_all_languages_round_trip() {
        assert_eq!(EpgLanguage::iter().count(), 27);
        for lang in EpgLanguage::iter() {
            assert_eq!(lang.to_string().parse::<EpgLanguage>().unwrap(), lang);
        }
    }

    #[test]
    fn test_custom_requires_template() {
        let settings = RawPluginSettings {
            url_dialect: "custom".into(),
            custom_template: "   ".into(),
            ..raw()
        };
        assert!(PluginConfig::from_raw(&settings).is_err());
    }

    #[test]
    fn test_template_ignored_unless_custom() {
        let settings = RawPluginSettings {
            url_dialect: "A".into(),
            custom_template: "{server_url}/anything".into(),
            ..raw()
        };
        let config = PluginConfig::from_raw(&settings).unwrap();
        assert_eq!(config.url_dialect, UrlDialect::A);
        assert!(config.custom_template.is_none());
    }

    #[test]
    fn test_unknown_dialect() {
        let settings = RawPluginSettings {
            url_dialect: "C".into(),
            ..raw()
        };
        assert!(PluginConfig::from_raw(&settings).is_err());
    }

    #[test]
    fn test_parses_from_toml() {
        let settings: RawPluginSettings = toml::from_str(
            r#"
            enabled = false
            timezone = "UTC"
            debug_mode = true
            "#,
        )
        .unwrap();
        let config = PluginConfig::from_raw(&settings).unwrap();
        assert!(!config.enabled);
        assert!(config.debug_mode);
        assert_eq!(config.provider_timezone, chrono_tz::UTC);
        assert_eq!(config.epg_language, EpgLanguage::En);
    }
}
