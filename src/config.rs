use crate::error::{PrepError, Result};
use crate::loader::LoadOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Field separator used when none is given on the command line
    pub separator: char,
    pub encoding: String,
    /// Extra strings read as missing, on top of the built-in tokens
    pub na_tokens: Vec<String>,
    /// Rows shown by `inspect` and other previews (default: 10)
    pub preview_rows: usize,
    /// Maximum undo depth; `None` keeps every step
    pub history_limit: Option<usize>,
    /// Whether exports replace existing files without being asked
    pub overwrite_exports: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            separator: ',',
            encoding: "utf-8".to_owned(),
            na_tokens: Vec::new(),
            preview_rows: 10,
            history_limit: None,
            overwrite_exports: false,
        }
    }
}

impl Settings {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions::default()
            .with_separator(self.separator)
            .with_encoding(self.encoding.clone())
            .with_na_tokens(self.na_tokens.iter().cloned())
    }
}

pub fn get_settings_path() -> Option<PathBuf> {
    dirs::data_dir().map(|base| base.join("tabprep").join("settings.json"))
}

/// Settings from the standard location, or defaults when the file is
/// absent or unreadable.
pub fn load_settings() -> Settings {
    let Some(path) = get_settings_path() else {
        return Settings::default();
    };
    if !path.exists() {
        return Settings::default();
    }
    load_settings_from(&path).unwrap_or_else(|err| {
        tracing::warn!("Ignoring settings file {}: {}", path.display(), err);
        Settings::default()
    })
}

/// # Errors
///
/// `Io` when the file cannot be read, `Config` when it is not valid JSON.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| PrepError::Config(format!("{}: {e}", path.display())))
}

/// # Errors
///
/// `Io` when the directory or file cannot be written.
pub fn save_settings_to(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, content)?;
    Ok(())
}
