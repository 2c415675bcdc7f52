//! Patch-layer configuration documents and the structural merge.
//!
//! When the patch layer upgrades, upstream may add, rename, or re-nest
//! config keys. The merge is a deep union biased toward the user's current
//! document: user-set scalars survive, newly introduced defaults appear,
//! and keys upstream dropped are retained for forward compatibility.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::UpdateError;

/// Structurally merge `defaults` with `current`, biased toward `current`.
///
/// For overlapping keys the current value wins unless the winner is a
/// mapping, in which case the merge recurses over the corresponding
/// sub-mappings (an absent side recurses as an empty mapping). Keys present
/// on only one side are carried over as-is. Pure; no I/O.
pub fn merge(defaults: &Value, current: &Value) -> Value {
    match (defaults, current) {
        (Value::Object(d), Value::Object(c)) => Value::Object(merge_maps(d, c)),
        // Not a mapping on the user side: the user's value stands.
        _ => current.clone(),
    }
}

fn merge_maps(defaults: &Map<String, Value>, current: &Map<String, Value>) -> Map<String, Value> {
    static EMPTY: std::sync::LazyLock<Map<String, Value>> = std::sync::LazyLock::new(Map::new);

    let mut out = Map::new();
    let keys = defaults
        .keys()
        .chain(current.keys().filter(|k| !defaults.contains_key(*k)));

    for key in keys {
        let d = defaults.get(key);
        let c = current.get(key);
        let winner = c.or(d).cloned().unwrap_or(Value::Null);
        let merged = if winner.is_object() || d.is_some_and(Value::is_object) {
            let d_map = d.and_then(Value::as_object).unwrap_or(&EMPTY);
            let c_map = c.and_then(Value::as_object);
            match c_map {
                Some(c_map) => Value::Object(merge_maps(d_map, c_map)),
                // User overrode a mapping with a scalar; keep the scalar.
                None if c.is_some() => winner,
                None => Value::Object(d_map.clone()),
            }
        } else {
            winner
        };
        out.insert(key.clone(), merged);
    }
    out
}

/// Read and parse a config document from disk.
///
/// # Errors
///
/// [`UpdateError::Filesystem`] when the file cannot be read,
/// [`UpdateError::Format`] when it is not valid JSON. A corrupt config is
/// surfaced, never silently overwritten with a wrong merge.
pub async fn load(path: &Path) -> Result<Value, UpdateError> {
    let raw = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&raw)
        .map_err(|e| UpdateError::Format(format!("config {}: {e}", path.display())))
}

/// Write a config document with stable 2-space indentation.
///
/// # Errors
///
/// [`UpdateError::Filesystem`] when the file cannot be written.
pub async fn save(path: &Path, document: &Value) -> Result<(), UpdateError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut pretty = serde_json::to_string_pretty(document)?;
    pretty.push('\n');
    tokio::fs::write(path, pretty).await?;
    Ok(())
}

/// Seed an empty config document when none exists yet.
///
/// # Errors
///
/// [`UpdateError::Filesystem`] when the seed cannot be written.
pub async fn ensure_exists(path: &Path) -> Result<(), UpdateError> {
    if tokio::fs::metadata(path).await.is_err() {
        tracing::info!(path = %path.display(), "seeding empty config file");
        save(path, &Value::Object(Map::new())).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_is_idempotent() {
        let d = json!({"a": 1, "b": {"c": true, "d": "x"}});
        assert_eq!(merge(&d, &d), d);
    }

    #[test]
    fn merge_with_empty_current_yields_defaults() {
        let d = json!({"a": 1, "b": {"c": 2}});
        assert_eq!(merge(&d, &json!({})), d);
    }

    #[test]
    fn current_scalars_win_and_new_defaults_appear() {
        let d = json!({"a": 1, "b": {"c": 2}});
        let c = json!({"b": {"c": 9, "d": 4}});
        assert_eq!(merge(&d, &c), json!({"a": 1, "b": {"c": 9, "d": 4}}));
    }

    #[test]
    fn keys_only_in_current_are_retained() {
        let d = json!({"a": 1});
        let c = json!({"legacy": {"enabled": false}});
        assert_eq!(merge(&d, &c), json!({"a": 1, "legacy": {"enabled": false}}));
    }

    #[test]
    fn no_invented_keys() {
        let merged = merge(&json!({"a": 1}), &json!({"b": 2}));
        let obj = merged.as_object().unwrap();
        assert_eq!(obj.len(), 2);
    }

    #[test]
    fn user_scalar_over_default_mapping_stands() {
        let d = json!({"feature": {"enabled": true}});
        let c = json!({"feature": false});
        assert_eq!(merge(&d, &c), json!({"feature": false}));
    }

    #[test]
    fn default_mapping_over_user_scalar_recurses_from_empty() {
        // Upstream turned a scalar into a mapping: defaults win the shape.
        let d = json!({"feature": true});
        let c = json!({"feature": {"level": 3}});
        assert_eq!(merge(&d, &c), json!({"feature": {"level": 3}}));
    }

    #[tokio::test]
    async fn save_writes_two_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        save(&path, &json!({"a": {"b": 1}})).await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("  \"a\""));
        assert!(raw.ends_with('\n'));
    }

    #[tokio::test]
    async fn load_rejects_corrupt_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load(&path).await, Err(UpdateError::Format(_))));
    }

    #[tokio::test]
    async fn ensure_exists_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        ensure_exists(&path).await.unwrap();
        std::fs::write(&path, "{\"keep\": 1}").unwrap();
        ensure_exists(&path).await.unwrap();
        assert_eq!(load(&path).await.unwrap(), json!({"keep": 1}));
    }
}
