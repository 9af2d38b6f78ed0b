use crate::overlay::settings::OverlaySettings;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE_NAME: &str = "overlay_settings.json";
const CONFIG_DIR_NAME: &str = "boresight";

pub fn settings_path_from_exe_path(exe_path: &Path) -> Result<PathBuf> {
    let parent = exe_path
        .parent()
        .ok_or_else(|| anyhow!("executable path has no parent: {}", exe_path.display()))?;
    Ok(parent.join(SETTINGS_FILE_NAME))
}

pub fn settings_path_in_config_dir(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_DIR_NAME).join(SETTINGS_FILE_NAME)
}

/// Per-user config directory when the platform has one, otherwise next to the
/// executable.
pub fn resolve_settings_path() -> Result<PathBuf> {
    if let Some(config_dir) = dirs_next::config_dir() {
        return Ok(settings_path_in_config_dir(&config_dir));
    }
    let exe_path = std::env::current_exe().context("resolve current executable")?;
    settings_path_from_exe_path(&exe_path)
}

pub fn load() -> Result<OverlaySettings> {
    let path = resolve_settings_path()?;
    load_from_path(&path)
}

pub fn save(settings: &OverlaySettings) -> Result<PathBuf> {
    let path = resolve_settings_path()?;
    save_to_path(&path, settings)?;
    Ok(path)
}

/// Missing and empty files both yield the defaults.
pub fn load_from_path(settings_path: &Path) -> Result<OverlaySettings> {
    Ok(load_existing_from_path(settings_path)?.unwrap_or_default())
}

pub fn load_existing_from_path(settings_path: &Path) -> Result<Option<OverlaySettings>> {
    if !settings_path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(settings_path)
        .with_context(|| format!("read overlay settings file {}", settings_path.display()))?;

    if content.trim().is_empty() {
        return Ok(Some(OverlaySettings::default()));
    }

    let mut loaded: OverlaySettings = serde_json::from_str(&content).with_context(|| {
        format!(
            "deserialize overlay settings file {}",
            settings_path.display()
        )
    })?;
    if loaded.sanitize() {
        tracing::warn!(path = %settings_path.display(), "overlay settings contained out-of-range values");
    }
    Ok(Some(loaded))
}

pub fn save_to_path(settings_path: &Path, settings: &OverlaySettings) -> Result<()> {
    if let Some(parent) = settings_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create overlay settings folder {}", parent.display()))?;
    }

    let mut sanitized = settings.clone();
    sanitized.sanitize();
    let json =
        serde_json::to_string_pretty(&sanitized).context("serialize overlay settings")?;
    std::fs::write(settings_path, json)
        .with_context(|| format!("write overlay settings file {}", settings_path.display()))
}
