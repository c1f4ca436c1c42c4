use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::FinderConfig;

const APP_NAME: &str = "FileFinder";
const CONFIG_FILE: &str = "config.json";

/// Returns the platform-specific configuration directory for the application.
fn get_config_directory() -> Option<PathBuf> {
    ProjectDirs::from("com", "filefinder", APP_NAME)
        .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
}

/// Returns the full path to the configuration file.
pub fn get_config_file_path() -> Option<PathBuf> {
    get_config_directory().map(|dir| dir.join(CONFIG_FILE))
}

fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => get_config_file_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory")),
    }
}

/// Loads the search settings from `path`, or from the platform config file.
///
/// A missing file is created with defaults. A file that cannot be parsed is
/// migrated from the legacy layout if possible, otherwise the defaults are used.
pub fn load_config(path: Option<&Path>) -> Result<FinderConfig> {
    let config_path = resolve_path(path)?;

    if !config_path.exists() {
        tracing::info!(
            "Config file not found, creating default config at {:?}",
            config_path
        );
        let default_config = FinderConfig::default();
        save_config(&default_config, Some(&config_path))?;
        return Ok(default_config);
    }

    let config_content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file {:?}", config_path))?;

    match serde_json::from_str::<FinderConfig>(&config_content) {
        Ok(config) => {
            tracing::info!("Loaded config from {:?}", config_path);
            Ok(config)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse config file at {:?}: {}. Falling back to default config.",
                config_path,
                e
            );
            migrate_legacy_config(&config_content).or_else(|_| Ok(FinderConfig::default()))
        }
    }
}

/// Converts the older flat settings layout into a `FinderConfig`.
///
/// Legacy files stored a single `root` directory, a `strict` flag instead of
/// a match mode, the extension under `format` and sizes as `min_size` /
/// `max_size` in kilobytes. Missing or null keys take their default values.
fn migrate_legacy_config(config_content: &str) -> Result<FinderConfig> {
    let mut value: Value = serde_json::from_str(config_content)?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("Config is not a JSON object"))?;

    let defaults = FinderConfig::default();

    if let Some(root) = obj.remove("root") {
        if root.is_string() && obj.get("roots").map_or(true, Value::is_null) {
            obj.insert("roots".to_string(), Value::Array(vec![root]));
        }
    }
    if let Some(strict) = obj.remove("strict").and_then(|v| v.as_bool()) {
        let mode = if strict { "exact" } else { "substring" };
        obj.insert("match_mode".to_string(), Value::String(mode.to_string()));
    }
    if let Some(name) = obj.remove("name") {
        obj.entry("name_pattern").or_insert(name);
    }
    if let Some(format) = obj.remove("format") {
        obj.entry("extension").or_insert(format);
    }
    if let Some(min) = obj.remove("min_size") {
        obj.entry("min_size_kb").or_insert(min);
    }
    if let Some(max) = obj.remove("max_size") {
        obj.entry("max_size_kb").or_insert(max);
    }

    let ensure_field = |obj: &mut serde_json::Map<String, Value>, key: &str, default_val: Value| {
        if !obj.contains_key(key) || obj.get(key) == Some(&Value::Null) {
            obj.insert(key.to_string(), default_val);
        }
    };

    ensure_field(obj, "roots", serde_json::to_value(&defaults.roots)?);
    ensure_field(
        obj,
        "name_pattern",
        Value::String(defaults.name_pattern.clone()),
    );
    ensure_field(obj, "match_mode", serde_json::to_value(defaults.match_mode)?);
    ensure_field(
        obj,
        "min_size_kb",
        serde_json::to_value(defaults.min_size_kb)?,
    );
    ensure_field(
        obj,
        "skip_patterns",
        serde_json::to_value(&defaults.skip_patterns)?,
    );
    ensure_field(obj, "follow_links", Value::Bool(defaults.follow_links));
    ensure_field(
        obj,
        "event_buffer",
        serde_json::to_value(defaults.event_buffer)?,
    );

    let migrated_config: FinderConfig = serde_json::from_value(Value::Object(obj.clone()))?;
    tracing::info!("Successfully migrated legacy config");
    Ok(migrated_config)
}

/// Saves the provided configuration to `path`, or to the platform config file.
pub fn save_config(config: &FinderConfig, path: Option<&Path>) -> Result<()> {
    let config_path = resolve_path(path)?;

    if let Some(config_dir) = config_path.parent() {
        if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
            fs::create_dir_all(config_dir)?;
            tracing::info!("Created config directory: {:?}", config_dir);
        }
    }

    let config_json = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, config_json)
        .with_context(|| format!("Failed to write config file {:?}", config_path))?;
    tracing::info!("Saved config to {:?}", config_path);

    Ok(())
}

/// Exports the current configuration to a user-specified JSON file.
pub fn export_config(config: &FinderConfig, export_path: &Path) -> Result<()> {
    let config_json = serde_json::to_string_pretty(config)?;
    fs::write(export_path, config_json)?;
    tracing::info!("Exported config to {:?}", export_path);
    Ok(())
}

/// Imports a configuration from a user-specified JSON file.
pub fn import_config(import_path: &Path) -> Result<FinderConfig> {
    let config_content = fs::read_to_string(import_path)?;
    match serde_json::from_str::<FinderConfig>(&config_content) {
        Ok(config) => {
            tracing::info!("Imported config from {:?}", import_path);
            Ok(config)
        }
        Err(_) => {
            tracing::info!("Importing legacy config format from {:?}", import_path);
            migrate_legacy_config(&config_content)
        }
    }
}

// Platform-specific configuration paths for reference:
// macOS:   ~/Library/Application Support/com.filefinder.FileFinder/
// Linux:   ~/.config/filefinder/
// Windows: %APPDATA%/filefinder/FileFinder/config/
