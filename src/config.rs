use chrono::{Datelike, NaiveDate};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::format::Locale;
use crate::layout::Theme;
use crate::store::{KvStore, StoreError};

pub const THEME_KEY: &str = "devis-generator-theme";
pub const DEFAULT_DATA_ROOT: &str = "~/Documents/Devis";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access settings at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub data_root: String,
    pub locale: Locale,
    pub logo_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_root: DEFAULT_DATA_ROOT.to_string(),
            locale: Locale::default(),
            logo_timeout_ms: 3000,
        }
    }
}

impl Settings {
    pub fn root(&self) -> PathBuf {
        PathBuf::from(expand_home_dir(&self.data_root))
    }

    /// Where the key-value store keeps its files.
    pub fn store_dir(&self) -> PathBuf {
        self.root().join("store")
    }

    pub fn logo_timeout(&self) -> Duration {
        Duration::from_millis(self.logo_timeout_ms)
    }
}

pub fn config_path() -> PathBuf {
    match ProjectDirs::from("com", "devis-maker", "app") {
        Some(dirs) => dirs.config_dir().join("settings.toml"),
        None => PathBuf::from("settings.toml"),
    }
}

/// Missing file means defaults.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Settings::default()),
        Err(source) => return Err(ConfigError::Io { path: path.to_path_buf(), source }),
    };
    Ok(toml::from_str(&content)?)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| ConfigError::Io { path: dir.to_path_buf(), source })?;
    }
    let toml_str = toml::to_string_pretty(settings)?;
    fs::write(path, toml_str).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

/// `{root}/output/{year}/{client-slug}`; quotes without a client go to `sans-client`.
pub fn output_dir(root: &Path, date: NaiveDate, client_name: &str) -> PathBuf {
    let client = slug::slugify(client_name);
    let client = if client.is_empty() { "sans-client".to_string() } else { client };
    root.join("output").join(date.year().to_string()).join(client)
}

/// The saved PDF theme, `light` when unset or unreadable. The slot holds a
/// JSON string like every other store entry; a bare word is still accepted.
pub fn stored_theme(store: &impl KvStore) -> Theme {
    match store.get(THEME_KEY) {
        Ok(Some(raw)) => serde_json::from_str::<Theme>(&raw)
            .ok()
            .or_else(|| raw.trim().parse().ok())
            .unwrap_or_else(|| {
                log::warn!("unknown stored theme {:?}, using light", raw);
                Theme::default()
            }),
        Ok(None) => Theme::default(),
        Err(e) => {
            log::warn!("cannot read theme preference: {}", e);
            Theme::default()
        }
    }
}

pub fn store_theme(store: &impl KvStore, theme: Theme) -> Result<(), StoreError> {
    store.set(THEME_KEY, &serde_json::to_string(&theme)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileStore, MemoryStore};

    #[test]
    fn missing_settings_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&dir.path().join("settings.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.logo_timeout(), Duration::from_millis(3000));
    }

    #[test]
    fn settings_round_trip_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/settings.toml");
        let settings = Settings {
            data_root: "/srv/devis".into(),
            locale: Locale::EnUs,
            logo_timeout_ms: 500,
        };
        save_settings(&path, &settings).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("locale = \"en-US\""));
        assert_eq!(load_settings(&path).unwrap(), settings);
    }

    #[test]
    fn partial_settings_fill_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "data_root = \"/tmp/q\"\n").unwrap();
        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.data_root, "/tmp/q");
        assert_eq!(settings.locale, Locale::FrFr);
        assert_eq!(settings.store_dir(), PathBuf::from("/tmp/q/store"));
    }

    #[test]
    fn broken_settings_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "data_root = [").unwrap();
        assert!(matches!(load_settings(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn home_expansion_only_touches_leading_tilde() {
        assert_eq!(expand_home_dir("/abs/~x"), "/abs/~x");
        if let Some(base) = BaseDirs::new() {
            let expanded = expand_home_dir("~/Documents/Devis");
            assert!(expanded.starts_with(&*base.home_dir().to_string_lossy()));
            assert!(expanded.ends_with("/Documents/Devis"));
        }
    }

    #[test]
    fn output_dir_uses_year_and_client_slug() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(
            output_dir(Path::new("/data"), date, "Mairie de Lyon"),
            PathBuf::from("/data/output/2026/mairie-de-lyon")
        );
        assert_eq!(output_dir(Path::new("/data"), date, "  "), PathBuf::from("/data/output/2026/sans-client"));
    }

    #[test]
    fn theme_preference_defaults_to_light() {
        let store = MemoryStore::new();
        assert_eq!(stored_theme(&store), Theme::Light);
        store_theme(&store, Theme::Dark).unwrap();
        assert_eq!(stored_theme(&store), Theme::Dark);
        store.set(THEME_KEY, "sepia").unwrap();
        assert_eq!(stored_theme(&store), Theme::Light);
    }

    #[test]
    fn theme_is_stored_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store_theme(&store, Theme::Dark).unwrap();

        let raw = store.get(THEME_KEY).unwrap().unwrap();
        assert_eq!(raw, "\"dark\"");
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!("dark"));
        assert_eq!(stored_theme(&store), Theme::Dark);

        store.set(THEME_KEY, "sombre").unwrap();
        assert_eq!(stored_theme(&store), Theme::Dark);
    }
}
