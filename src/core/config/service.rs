use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::settings::AppSettings;
use super::validation::validate_config;
use crate::core::errors::ApiError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 8] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 3] = ["max_tokens_per_chunk", "max_overlap_tokens", "tokens"];

/// Environment variables that override the file-based configuration.
const ENV_OVERRIDES: [(&str, &[&str]); 5] = [
    ("GEMINI_API_KEY", &["provider", "api_key"]),
    ("GEMINI_MODEL", &["provider", "model"]),
    ("GEMINI_BASE_URL", &["provider", "base_url"]),
    ("HOST", &["server", "host"]),
    ("PORT", &["server", "port"]),
];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("FILESEARCH_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Loads `config.yml` merged with `secrets.yaml`, without env overrides.
    pub fn load_config(&self) -> Result<Value, ApiError> {
        let public_config = load_yaml_file(&self.config_path())?;
        let secrets_config = load_yaml_file(&self.secrets_path())?;
        Ok(deep_merge(&public_config, &secrets_config))
    }

    /// Loads, overrides from the process environment, validates and types the config.
    pub fn load_settings(&self) -> Result<AppSettings, ApiError> {
        let mut config = self.load_config()?;
        apply_env_overrides(&mut config, |key| env::var(key).ok());
        settings_from_value(&config)
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

pub fn settings_from_value(config: &Value) -> Result<AppSettings, ApiError> {
    validate_config(config)?;
    serde_json::from_value(config.clone())
        .map_err(|err| ApiError::Validation(format!("Invalid config: {}", err)))
}

fn load_yaml_file(path: &Path) -> Result<Value, ApiError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(ApiError::internal)?;
    if contents.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    match serde_yaml::from_str::<Value>(&contents) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(Value::Null) => Ok(Value::Object(Map::new())),
        Ok(_) => Err(ApiError::Validation(format!(
            "{} must contain a mapping at the top level",
            path.display()
        ))),
        Err(err) => Err(ApiError::Validation(format!(
            "Failed to parse {}: {}",
            path.display(),
            err
        ))),
    }
}

pub(crate) fn apply_env_overrides<F>(config: &mut Value, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for (var, path) in ENV_OVERRIDES {
        let Some(raw) = lookup(var) else {
            continue;
        };
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let value = match raw.parse::<u64>() {
            Ok(number) if var == "PORT" => Value::from(number),
            _ => Value::String(raw.to_string()),
        };
        ensure_object_path(config, path, value);
    }
}

fn ensure_object_path(config: &mut Value, path: &[&str], value: Value) {
    if path.is_empty() {
        return;
    }

    let mut current = config;
    for (index, key) in path.iter().enumerate() {
        if index == path.len() - 1 {
            if let Some(map) = current.as_object_mut() {
                map.insert(key.to_string(), value);
            }
            return;
        }

        if !current.get(*key).map(|v| v.is_object()).unwrap_or(false) {
            let Some(map) = current.as_object_mut() else {
                return;
            };
            map.insert((*key).to_string(), Value::Object(Map::new()));
        }

        let Some(next) = current.get_mut(*key) else {
            return;
        };
        current = next;
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "provider": { "model": "a", "request_timeout_secs": 10 },
            "server": { "cors_allowed_origins": ["http://a"] }
        });
        let secrets = json!({
            "provider": { "api_key": "k" },
            "server": { "cors_allowed_origins": ["http://b"] }
        });

        let merged = deep_merge(&base, &secrets);

        assert_eq!(
            merged,
            json!({
                "provider": { "model": "a", "request_timeout_secs": 10, "api_key": "k" },
                "server": { "cors_allowed_origins": ["http://b"] }
            })
        );
    }

    #[test]
    fn env_overrides_fill_missing_sections() {
        let mut config = json!({});
        apply_env_overrides(&mut config, |key| match key {
            "GEMINI_API_KEY" => Some("abc".to_string()),
            "PORT" => Some("9100".to_string()),
            "HOST" => Some("   ".to_string()),
            _ => None,
        });

        assert_eq!(
            config,
            json!({
                "provider": { "api_key": "abc" },
                "server": { "port": 9100 }
            })
        );
    }

    #[test]
    fn settings_from_value_applies_defaults() {
        let settings = settings_from_value(&json!({
            "provider": { "api_key": "abc" },
            "upload": { "wait_for_indexing": false }
        }))
        .unwrap();

        assert_eq!(settings.provider.api_key.as_deref(), Some("abc"));
        assert_eq!(settings.provider.model, "gemini-2.5-flash");
        assert_eq!(settings.server.port, 8000);
        assert!(!settings.upload.wait_for_indexing);
        assert_eq!(settings.upload.max_upload_bytes, 100 * 1024 * 1024);
        assert_eq!(settings.chunking.max_tokens_per_chunk, 800);
        assert_eq!(settings.chunking.max_overlap_tokens, 100);
    }

    #[test]
    fn redact_sensitive_values_replaces_secrets_only() {
        let input = json!({
            "provider": { "api_key": "secret", "model": "m" },
            "chunking": { "max_tokens_per_chunk": 800 }
        });

        let redacted = redact_sensitive_values(&input);

        assert_eq!(
            redacted,
            json!({
                "provider": { "api_key": "****", "model": "m" },
                "chunking": { "max_tokens_per_chunk": 800 }
            })
        );
    }

    #[test]
    fn load_config_merges_files_from_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = AppPaths::with_dirs(tmp.path().to_path_buf(), tmp.path().join("data"));
        fs::write(
            paths.user_data_dir.join("config.yml"),
            "provider:\n  model: custom-model\n",
        )
        .unwrap();
        fs::write(&paths.secrets_path, "provider:\n  api_key: from-secrets\n").unwrap();

        let service = ConfigService::new(Arc::new(paths));
        let config = service.load_config().unwrap();

        assert_eq!(config["provider"]["model"], "custom-model");
        assert_eq!(config["provider"]["api_key"], "from-secrets");
    }

    #[test]
    fn load_config_rejects_non_mapping_yaml() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = AppPaths::with_dirs(tmp.path().to_path_buf(), tmp.path().join("data"));
        fs::write(paths.user_data_dir.join("config.yml"), "- a\n- b\n").unwrap();

        let service = ConfigService::new(Arc::new(paths));
        assert!(matches!(service.load_config(), Err(ApiError::Validation(_))));
    }
}
