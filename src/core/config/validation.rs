use serde_json::{Map, Value};

use crate::core::errors::ApiError;

/// Hard ceiling for a single upload accepted by the File Search API.
pub const PROVIDER_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65535)?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
        validate_optional_string_field(server, "server.static_dir", "static_dir")?;
    }

    if let Some(provider) = expect_optional_object(root, "provider")? {
        validate_optional_string_field(provider, "provider.base_url", "base_url")?;
        validate_optional_string_field(provider, "provider.api_key", "api_key")?;
        validate_optional_string_field(provider, "provider.model", "model")?;
        validate_u64_field(
            provider,
            "provider.request_timeout_secs",
            "request_timeout_secs",
            1,
            86_400,
        )?;
        validate_u64_field(
            provider,
            "provider.upload_timeout_secs",
            "upload_timeout_secs",
            1,
            86_400,
        )?;
        validate_u64_field(provider, "provider.page_size", "page_size", 1, 100)?;
    }

    if let Some(upload) = expect_optional_object(root, "upload")? {
        validate_u64_field(
            upload,
            "upload.max_upload_bytes",
            "max_upload_bytes",
            1,
            PROVIDER_MAX_UPLOAD_BYTES,
        )?;
        validate_bool_field(upload, "upload.wait_for_indexing", "wait_for_indexing")?;
        validate_u64_field(
            upload,
            "upload.poll_interval_secs",
            "poll_interval_secs",
            0,
            3_600,
        )?;
        validate_u64_field(
            upload,
            "upload.max_poll_attempts",
            "max_poll_attempts",
            1,
            10_000,
        )?;
    }

    if let Some(chunking) = expect_optional_object(root, "chunking")? {
        validate_u64_field(
            chunking,
            "chunking.max_tokens_per_chunk",
            "max_tokens_per_chunk",
            1,
            u32::MAX as u64,
        )?;
        validate_u64_field(
            chunking,
            "chunking.max_overlap_tokens",
            "max_overlap_tokens",
            1,
            u32::MAX as u64,
        )?;
        let max = chunking.get("max_tokens_per_chunk").and_then(Value::as_u64);
        let overlap = chunking.get("max_overlap_tokens").and_then(Value::as_u64);
        if let (Some(max), Some(overlap)) = (max, overlap) {
            if overlap >= max {
                return Err(ApiError::Validation(
                    "Invalid config at 'chunking': max_overlap_tokens must be smaller than max_tokens_per_chunk"
                        .to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::Validation(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::Validation(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::Validation(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}
