//! Client-supplied settings.
//!
//! Settings arrive as `initializationOptions` and again with every
//! `workspace/didChangeConfiguration`. Clients either send the section on its
//! own or wrapped under [`SETTINGS_SECTION`]. Every field is optional; absent
//! fields leave the current value untouched.

use std::path::PathBuf;

use frg_core::BridgeConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Configuration section name on the client side.
pub const SETTINGS_SECTION: &str = "forgeLanguageServer";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettings {
    pub racket_path: Option<String>,
    pub source_extension: Option<String>,
    pub syntax_error_exit_code: Option<i32>,
    pub check_args: Option<Vec<String>>,
    pub run_args: Option<Vec<String>>,
    pub scratch_dir: Option<PathBuf>,
}

impl ClientSettings {
    /// Parse a settings payload. `null` yields empty settings.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let section = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(mut map) if map.contains_key(SETTINGS_SECTION) => map
                .remove(SETTINGS_SECTION)
                .unwrap_or(Value::Null),
            other => other,
        };
        if section.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(section)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay these settings onto `config`.
    pub fn apply(&self, config: &mut BridgeConfig) {
        if let Some(path) = self.racket_path.as_ref().filter(|p| !p.trim().is_empty()) {
            config.racket_path = path.clone();
        }
        if let Some(extension) = &self.source_extension {
            let extension = extension.trim_start_matches('.');
            if !extension.is_empty() {
                config.source_extension = extension.to_string();
            }
        }
        if let Some(code) = self.syntax_error_exit_code {
            config.syntax_error_exit_code = code;
        }
        if let Some(args) = &self.check_args {
            config.check_args = args.clone();
        }
        if let Some(args) = &self.run_args {
            config.run_args = args.clone();
        }
        if let Some(dir) = &self.scratch_dir {
            config.scratch_dir = Some(dir.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_section() {
        let settings = ClientSettings::from_value(json!({
            "forgeLanguageServer": { "racketPath": "/opt/racket/bin/racket" }
        }))
        .unwrap();
        assert_eq!(settings.racket_path.as_deref(), Some("/opt/racket/bin/racket"));
    }

    #[test]
    fn test_bare_section() {
        let settings = ClientSettings::from_value(json!({
            "syntaxErrorExitCode": 3,
            "runArgs": ["-l", "forge", "{file}"]
        }))
        .unwrap();
        assert_eq!(settings.syntax_error_exit_code, Some(3));
        assert_eq!(settings.run_args.unwrap().len(), 3);
    }

    #[test]
    fn test_null_is_empty() {
        assert!(ClientSettings::from_value(Value::Null).unwrap().is_empty());
        assert!(
            ClientSettings::from_value(json!({ "forgeLanguageServer": null }))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_wrong_type_is_error() {
        assert!(ClientSettings::from_value(json!({ "syntaxErrorExitCode": "two" })).is_err());
    }

    #[test]
    fn test_apply_overlays_only_present_fields() {
        let mut config = BridgeConfig::default();
        let settings = ClientSettings {
            racket_path: Some("/usr/bin/racket".to_string()),
            source_extension: Some(".forge".to_string()),
            scratch_dir: Some(PathBuf::from("/tmp/frg-scratch")),
            ..Default::default()
        };
        settings.apply(&mut config);

        assert_eq!(config.racket_path, "/usr/bin/racket");
        assert_eq!(config.source_extension, "forge");
        assert_eq!(config.scratch_dir(), PathBuf::from("/tmp/frg-scratch"));
        assert_eq!(config.check_args, BridgeConfig::default().check_args);
        assert_eq!(config.syntax_error_exit_code, 2);
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let mut config = BridgeConfig::default();
        ClientSettings {
            racket_path: Some("  ".to_string()),
            source_extension: Some(String::new()),
            ..Default::default()
        }
        .apply(&mut config);
        assert_eq!(config, BridgeConfig::default());
    }
}
