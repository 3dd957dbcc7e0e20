//! Session preferences.
//!
//! Preferences are plain data passed to the session at construction. They can
//! be read from a TOML file; missing keys fall back to defaults.
//!
//! ```toml
//! confirm-delete = true
//! create-backups = true
//! backup-dir = "/home/me/.local/share/shelf/backups"
//!
//! [autosave]
//! enabled = true
//! debounce-ms = 2000
//! max-delay-ms = 30000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reading a preferences file.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error reading {path}: {error}")]
	Io { path: PathBuf, error: std::io::Error },

	#[error("invalid preferences: {0}")]
	Toml(#[from] toml::de::Error),
}

/// Auto-save behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AutosaveConfig {
	/// Whether local libraries are auto-saved. Shared libraries always are.
	pub enabled: bool,

	/// Quiet period after the last change before saving.
	pub debounce_ms: u64,

	/// Upper bound on how long a save may be postponed by continuous edits,
	/// measured from the first unsaved change.
	pub max_delay_ms: u64,
}

impl Default for AutosaveConfig {
	fn default() -> Self {
		Self {
			enabled: false,
			debounce_ms: 2000,
			max_delay_ms: 30_000,
		}
	}
}

impl AutosaveConfig {
	pub fn debounce(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}

	pub fn max_delay(&self) -> Duration {
		Duration::from_millis(self.max_delay_ms.max(self.debounce_ms))
	}
}

/// Preferences consulted by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SessionPreferences {
	pub autosave: AutosaveConfig,

	/// Keep a rolling backup next to local libraries.
	pub create_backups: bool,

	pub backup_dir: PathBuf,

	/// Ask before deleting entries (cut is never confirmed).
	pub confirm_delete: bool,
}

impl Default for SessionPreferences {
	fn default() -> Self {
		Self {
			autosave: AutosaveConfig::default(),
			create_backups: true,
			backup_dir: default_backup_dir(),
			confirm_delete: true,
		}
	}
}

impl SessionPreferences {
	/// Parses preferences from TOML text.
	pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(text)?)
	}

	/// Reads preferences from a TOML file.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&text)
	}
}

fn default_backup_dir() -> PathBuf {
	dirs::data_dir().unwrap_or_else(std::env::temp_dir).join("shelf").join("backups")
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn empty_toml_yields_defaults() {
		let prefs = SessionPreferences::from_toml_str("").expect("empty is valid");
		assert_eq!(prefs, SessionPreferences::default());
		assert!(prefs.backup_dir.ends_with("shelf/backups"));
	}

	#[test]
	fn partial_toml_overrides_only_given_keys() {
		let prefs = SessionPreferences::from_toml_str(
			r#"
			confirm-delete = false

			[autosave]
			enabled = true
			debounce-ms = 500
			"#,
		)
		.expect("valid toml");

		assert!(!prefs.confirm_delete);
		assert!(prefs.create_backups);
		assert!(prefs.autosave.enabled);
		assert_eq!(prefs.autosave.debounce(), Duration::from_millis(500));
		assert_eq!(prefs.autosave.max_delay_ms, 30_000);
	}

	#[test]
	fn max_delay_never_undercuts_debounce() {
		let config = AutosaveConfig {
			enabled: true,
			debounce_ms: 5000,
			max_delay_ms: 100,
		};
		assert_eq!(config.max_delay(), Duration::from_millis(5000));
	}

	#[test]
	fn invalid_toml_is_reported() {
		let err = SessionPreferences::from_toml_str("confirm-delete = \"maybe\"").unwrap_err();
		assert!(matches!(err, ConfigError::Toml(_)));
	}

	#[test]
	fn load_reads_file() {
		let mut file = tempfile::NamedTempFile::new().expect("temp file");
		writeln!(file, "create-backups = false").expect("write prefs");
		let prefs = SessionPreferences::load(file.path()).expect("load prefs");
		assert!(!prefs.create_backups);

		let missing = SessionPreferences::load(Path::new("/nonexistent/shelf.toml")).unwrap_err();
		assert!(matches!(missing, ConfigError::Io { .. }));
	}
}
