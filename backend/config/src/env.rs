//! `${NAME}` references in config strings, and `DEVAUTH_*` overrides.
//!
//! References are replaced before the tree is deserialized. Names are
//! uppercase (`[A-Z_][A-Z0-9_]*`); `$${NAME}` keeps the text `${NAME}`.
//! The overrides are applied to the typed config once defaults are in place.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::warn;

use crate::schema::{DevAuthConfig, ServerConfig, StorageConfig};

static REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static env var pattern"));

/// A referenced variable is unset or empty.
#[derive(Debug, thiserror::Error)]
#[error("{config_path}: environment variable {var_name} is not set")]
pub struct UnsetVarError {
    pub var_name: String,
    /// Dotted location in the config tree, e.g. `jwt.privateKeyPath` or `list[2]`.
    pub config_path: String,
}

/// Replace every `${NAME}` in the string leaves of `value` from `env`.
pub fn substitute_env(value: &Value, env: &HashMap<String, String>) -> Result<Value, UnsetVarError> {
    substitute_at(value, env, String::new())
}

fn child(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}

fn substitute_at(
    value: &Value,
    env: &HashMap<String, String>,
    path: String,
) -> Result<Value, UnsetVarError> {
    Ok(match value {
        Value::String(text) => Value::String(expand(text, env, &path)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| substitute_at(item, env, format!("{path}[{i}]")))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, field)| -> Result<(String, Value), UnsetVarError> {
                    Ok((key.clone(), substitute_at(field, env, child(&path, key))?))
                })
                .collect::<Result<Map<_, _>, _>>()?,
        ),
        scalar => scalar.clone(),
    })
}

fn expand(text: &str, env: &HashMap<String, String>, path: &str) -> Result<String, UnsetVarError> {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for caps in REFERENCE.captures_iter(text) {
        let Some(reference) = caps.get(0) else { continue };
        let start = reference.start();
        if text[..start].ends_with('$') {
            // `$${NAME}`: drop one `$`, keep the reference text
            out.push_str(&text[cursor..start - 1]);
            out.push_str(reference.as_str());
        } else {
            out.push_str(&text[cursor..start]);
            let name = &caps[1];
            let resolved = env.get(name).filter(|v| !v.is_empty()).ok_or_else(|| UnsetVarError {
                var_name: name.to_string(),
                config_path: path.to_string(),
            })?;
            out.push_str(resolved);
        }
        cursor = reference.end();
    }
    out.push_str(&text[cursor..]);
    Ok(out)
}

/// Apply `DEVAUTH_BIND`, `DEVAUTH_PORT` and `DEVAUTH_DB` on top of the file config.
pub fn apply_env_overrides(config: &mut DevAuthConfig, env: &HashMap<String, String>) {
    let non_empty = |name: &str| env.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(bind) = non_empty("DEVAUTH_BIND") {
        config.server.get_or_insert_with(ServerConfig::default).bind = Some(bind.to_string());
    }
    if let Some(port) = non_empty("DEVAUTH_PORT") {
        match port.parse::<u16>() {
            Ok(port) => {
                config.server.get_or_insert_with(ServerConfig::default).port = Some(port)
            }
            Err(_) => warn!(value = %port, "Ignoring unparseable DEVAUTH_PORT"),
        }
    }
    if let Some(db) = non_empty("DEVAUTH_DB") {
        config.storage.get_or_insert_with(StorageConfig::default).path = Some(db.to_string());
    }
}

/// Names referenced anywhere in `value`, sorted and deduplicated.
pub fn collect_referenced_vars(value: &Value) -> Vec<String> {
    fn visit(value: &Value, names: &mut Vec<String>) {
        match value {
            Value::String(text) => {
                names.extend(REFERENCE.captures_iter(text).map(|caps| caps[1].to_string()))
            }
            Value::Array(items) => items.iter().for_each(|item| visit(item, names)),
            Value::Object(fields) => fields.values().for_each(|field| visit(field, names)),
            _ => {}
        }
    }

    let mut names = Vec::new();
    visit(value, &mut names);
    names.sort();
    names.dedup();
    names
}
