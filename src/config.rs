use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EditorError, Result};

/// Options the editor receives at construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub use_color_palette: bool,
    pub flat_editor_ui: bool,
    pub block_hotkeys_after_call: bool,
    pub close_editor_on_done: bool,
    pub use_cbor_else_json: bool,
    pub antialiasing_and_smooth_pixmaps: bool,
    pub dark_pictures: bool,
    pub show_background: bool,
    pub screenshot_folder: PathBuf,
    pub projects_folder: PathBuf,
    pub add_meta: bool,
    pub save_to_memory_mode: bool,
    pub draw_datetime_stamp: bool,
    pub default_tool: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            use_color_palette: false,
            flat_editor_ui: false,
            block_hotkeys_after_call: false,
            close_editor_on_done: true,
            use_cbor_else_json: true,
            antialiasing_and_smooth_pixmaps: true,
            dark_pictures: true,
            show_background: true,
            screenshot_folder: PathBuf::from("screenshots"),
            projects_folder: PathBuf::from("projects"),
            add_meta: false,
            save_to_memory_mode: false,
            draw_datetime_stamp: false,
            default_tool: "arrow".to_string(),
        }
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "toml")
}

/// Reads a config, trying the format named by the extension first.
pub fn load_config(path: &Path) -> Option<EditorConfig> {
    let s = std::fs::read_to_string(path).ok()?;
    if is_toml(path) {
        toml::from_str::<EditorConfig>(&s)
            .ok()
            .or_else(|| serde_json::from_str::<EditorConfig>(&s).ok())
    } else {
        serde_json::from_str::<EditorConfig>(&s)
            .ok()
            .or_else(|| toml::from_str::<EditorConfig>(&s).ok())
    }
}

pub fn save_config(path: &Path, config: &EditorConfig) -> Result<()> {
    let text = if is_toml(path) {
        toml::to_string_pretty(config).map_err(|e| EditorError::decode("settings", e))?
    } else {
        serde_json::to_string_pretty(config).map_err(|e| EditorError::decode("settings", e))?
    };
    std::fs::write(path, text).map_err(|e| EditorError::io(path, e))
}

/// Candidate settings files in lookup order.
pub fn config_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(PathBuf::from(home).join(".config").join("oxxxy.toml"));
    }
    paths.push(PathBuf::from("settings.toml"));
    paths.push(PathBuf::from("settings.json"));
    paths
}

/// First readable candidate, or defaults.
pub fn load_or_default() -> (EditorConfig, Option<PathBuf>) {
    for path in config_candidates() {
        if let Some(config) = load_config(&path) {
            log::info!("settings loaded from {}", path.display());
            return (config, Some(path));
        }
    }
    (EditorConfig::default(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_and_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = EditorConfig {
            dark_pictures: false,
            default_tool: "text".to_string(),
            ..EditorConfig::default()
        };
        for name in ["settings.toml", "settings.json"] {
            let path = dir.path().join(name);
            save_config(&path, &config).unwrap();
            assert_eq!(load_config(&path), Some(config.clone()));
        }
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: EditorConfig = toml::from_str("add_meta = true").unwrap();
        assert!(config.add_meta);
        assert!(config.antialiasing_and_smooth_pixmaps);
        assert_eq!(config.default_tool, "arrow");
    }
}
