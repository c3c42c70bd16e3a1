use log::{LevelFilter, debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::io;

use crate::assets::AssetNames;
use crate::pdf::{DEFAULT_CACHE_SIZE, DEFAULT_STAMP_SIZE};
use crate::widget::StampConfig;

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "pdfstamp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory the document and stamp are fetched from
    #[serde(default = "default_asset_dir")]
    pub asset_dir: PathBuf,

    #[serde(default = "default_document_asset")]
    pub document_asset: String,

    #[serde(default = "default_stamp_asset")]
    pub stamp_asset: String,

    /// Stamp edge length in page points
    #[serde(default = "default_stamp_size")]
    pub stamp_size: u32,

    #[serde(default = "default_render_scale")]
    pub render_scale: f32,

    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_asset_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_document_asset() -> String {
    AssetNames::default().document
}

fn default_stamp_asset() -> String {
    AssetNames::default().stamp
}

fn default_stamp_size() -> u32 {
    DEFAULT_STAMP_SIZE
}

fn default_render_scale() -> f32 {
    1.0
}

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            asset_dir: default_asset_dir(),
            document_asset: default_document_asset(),
            stamp_asset: default_stamp_asset(),
            stamp_size: default_stamp_size(),
            render_scale: default_render_scale(),
            cache_size: default_cache_size(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Widget configuration described by these settings
    #[must_use]
    pub fn stamp_config(&self) -> StampConfig {
        StampConfig {
            scale: self.render_scale,
            stamp_size: self.stamp_size.max(1),
            cache_size: self.cache_size,
            assets: AssetNames {
                document: self.document_asset.clone(),
                stamp: self.stamp_asset.clone(),
            },
        }
    }

    /// Parsed log level, `Info` when unrecognised
    #[must_use]
    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or_else(|_| {
            warn!("Unknown log level {:?}, using info", self.log_level);
            LevelFilter::Info
        })
    }
}

/// Why a settings file could not be used
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse settings file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from the platform config dir, creating the file with
/// defaults when it does not exist yet
pub fn load_settings() -> Result<(), SettingsError> {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return Ok(());
    };

    if path.exists() {
        load_settings_from_path(&path)
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, &path);
        }
        Ok(())
    }
}

/// Replace the global settings with the contents of `path`.
///
/// Unreadable or invalid files leave the current settings in place.
pub fn load_settings_from_path(path: &Path) -> Result<(), SettingsError> {
    let content = fs::read_to_string(path).map_err(|source| {
        error!("Failed to read settings file {path:?}: {source}");
        SettingsError::Read {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let mut settings = serde_yaml::from_str::<Settings>(&content).map_err(|source| {
        error!("Failed to parse settings file {path:?}: {source}");
        SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        }
    })?;
    debug!("Loaded settings from {path:?}");

    if settings.version < CURRENT_VERSION {
        migrate_settings(&mut settings);
        save_settings_to_file(&settings, path);
    }

    if let Ok(mut global) = SETTINGS.write() {
        *global = settings;
    }
    Ok(())
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // Future migrations go here:
    // if settings.version < 2 {
    //     migrate_v1_to_v2(settings);
    // }

    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let content = generate_settings_yaml(settings);

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(SETTINGS_HEADER);
    content.push_str(&format!("version: {}\n", settings.version));
    content.push_str(&format!(
        "asset_dir: \"{}\"\n",
        settings.asset_dir.display()
    ));
    content.push_str(&format!(
        "document_asset: \"{}\"\n",
        settings.document_asset
    ));
    content.push_str(&format!("stamp_asset: \"{}\"\n", settings.stamp_asset));
    content.push_str(&format!("stamp_size: {}\n", settings.stamp_size));
    content.push_str(&format!("render_scale: {}\n", settings.render_scale));
    content.push_str(&format!("cache_size: {}\n", settings.cache_size));
    content.push_str(&format!("log_level: \"{}\"\n", settings.log_level));

    content
}

const SETTINGS_HEADER: &str = r#"# ============================================================================
# pdfstamp settings
# ============================================================================
# asset_dir       directory holding the document and the stamp image
# stamp_size      stamp edge length in PDF points
# render_scale    canvas pixels per PDF point
# cache_size      rendered pages kept in memory
# log_level       off, error, warn, info, debug or trace

"#;

// Public API for accessing settings

/// Snapshot of the current settings
pub fn current() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

pub fn get_asset_dir() -> PathBuf {
    SETTINGS
        .read()
        .map(|s| s.asset_dir.clone())
        .unwrap_or_else(|_| default_asset_dir())
}

pub fn get_log_level() -> LevelFilter {
    SETTINGS
        .read()
        .map(|s| s.level_filter())
        .unwrap_or(LevelFilter::Info)
}

/// Widget configuration from the current settings
pub fn stamp_config() -> StampConfig {
    current().stamp_config()
}

/// Apply command-line overrides on top of the loaded settings
pub fn update(f: impl FnOnce(&mut Settings)) {
    if let Ok(mut settings) = SETTINGS.write() {
        f(&mut settings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn reset() {
        update(|s| *s = Settings::default());
    }

    #[test]
    fn defaults_match_widget_defaults() {
        let config = Settings::default().stamp_config();
        assert_eq!(config, StampConfig::default());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: Settings = serde_yaml::from_str("stamp_size: 64\n").unwrap();

        assert_eq!(settings.stamp_size, 64);
        assert_eq!(settings.document_asset, "document.pdf");
        assert_eq!(settings.version, CURRENT_VERSION);
    }

    #[test]
    fn generated_yaml_parses_back() {
        let settings = Settings {
            asset_dir: PathBuf::from("/srv/assets"),
            render_scale: 1.5,
            stamp_size: 96,
            ..Settings::default()
        };

        let parsed: Settings = serde_yaml::from_str(&generate_settings_yaml(&settings)).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn unknown_log_level_falls_back_to_info() {
        let settings = Settings {
            log_level: "chatty".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.level_filter(), LevelFilter::Info);
    }

    #[test]
    #[serial]
    fn load_from_path_replaces_global_settings() {
        reset();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "version: 1\nstamp_size: 96\nrender_scale: 2\n").unwrap();

        load_settings_from_path(&path).unwrap();

        let settings = current();
        assert_eq!(settings.stamp_size, 96);
        assert_eq!(settings.render_scale, 2.0);
        assert_eq!(stamp_config().stamp_size, 96);
        reset();
    }

    #[test]
    #[serial]
    fn invalid_file_keeps_current_settings() {
        reset();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "stamp_size: [not, a, number]\n").unwrap();

        let err = load_settings_from_path(&path).unwrap_err();

        assert!(matches!(err, SettingsError::Parse { .. }));
        assert_eq!(current(), Settings::default());
    }

    #[test]
    #[serial]
    fn missing_file_is_reported() {
        reset();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        let err = load_settings_from_path(&path).unwrap_err();

        assert!(matches!(err, SettingsError::Read { .. }));
        assert!(err.to_string().contains("absent.yaml"));
        assert_eq!(current(), Settings::default());
    }

    #[test]
    #[serial]
    fn unversioned_file_is_rewritten_at_current_version() {
        reset();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "version: 0\nstamp_size: 256\nrender_scale: 2\n").unwrap();

        load_settings_from_path(&path).unwrap();

        // unversioned files carry their values over unchanged
        assert_eq!(current().stamp_size, 256);
        assert_eq!(current().version, CURRENT_VERSION);
        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("version: 1"));
        assert!(rewritten.contains("stamp_size: 256"));
        reset();
    }
}
