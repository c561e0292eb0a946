use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use log::warn;

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// HTTP port for the app itself.
    pub port: u16,
    /// WebSocket event-bridge port; 0 means pick a free one at startup.
    pub events_port: u16,
    /// External headless-browser render service (html in, PDF bytes out).
    pub pdf_service_url: String,
    pub pdf_page_format: String,
    /// Applied to all four page margins.
    pub pdf_margin: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8350,
            events_port: 0,
            pdf_service_url: "http://127.0.0.1:9350/api/generate-pdf".to_string(),
            pdf_page_format: "A4".to_string(),
            pdf_margin: "10mm".to_string(),
        }
    }
}

impl Settings {
    pub fn path_in(data_dir: &Path) -> PathBuf {
        data_dir.join(SETTINGS_FILE)
    }

    pub fn load(data_dir: &Path) -> Self {
        let path = Self::path_in(data_dir);
        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    warn!("[Settings] Failed to parse settings: {}, returning defaults", e);
                    Self::default()
                }),
                Err(e) => {
                    warn!("[Settings] Failed to read file: {}, returning defaults", e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        }
    }

    pub fn save(&self, data_dir: &Path) -> Result<(), String> {
        let path = Self::path_in(data_dir);
        let tmp_path = path.with_extension("tmp");

        fs::create_dir_all(data_dir).map_err(|e| e.to_string())?;

        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;

        // Atomic Write Strategy: Write to tmp, then rename.
        // This ensures we never have a half-written file if the app crashes.
        fs::write(&tmp_path, json).map_err(|e| e.to_string())?;
        fs::rename(tmp_path, path).map_err(|e| e.to_string())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_no_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Settings::load(dir.path()), Settings::default());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.port = 9000;
        settings.pdf_page_format = "Letter".to_string();

        settings.save(dir.path()).unwrap();
        assert_eq!(Settings::load(dir.path()), settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(Settings::path_in(dir.path()), r#"{"port": 4000}"#).unwrap();

        let settings = Settings::load(dir.path());
        assert_eq!(settings.port, 4000);
        assert_eq!(settings.pdf_page_format, "A4");
    }

    #[test]
    fn test_corrupt_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(Settings::path_in(dir.path()), "oops").unwrap();
        assert_eq!(Settings::load(dir.path()), Settings::default());
    }
}
