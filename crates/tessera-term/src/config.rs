// SPDX-License-Identifier: MIT
//
// Driver configuration.
//
// A small TOML table, every key optional:
//
//   force_16_colors    = false
//   alternate_screen   = true
//   mouse              = "drag"       # off | click | drag | motion
//   cursor             = "default"    # see CursorVisibility
//   response_timeout_ms = 500
//   stale_request_ms   = 2000
//
// `TESSERA_FORCE_16_COLORS` overrides `force_16_colors` when loading from
// disk, so a user stuck on a 16-color terminal can fix it without editing
// files.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ansi::MouseMode;
use crate::cursor::CursorVisibility;
use crate::error::{Error, Result};

/// Environment variable that overrides [`DriverConfig::force_16_colors`].
pub const FORCE_16_COLORS_ENV: &str = "TESSERA_FORCE_16_COLORS";

/// Settings shared by every console driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Render through the 16 named colors instead of true color.
    pub force_16_colors: bool,
    /// Switch to the alternate screen while the driver is alive.
    pub alternate_screen: bool,
    /// Mouse reporting granularity.
    pub mouse: MouseMode,
    /// Cursor visibility applied at startup.
    pub cursor: CursorVisibility,
    /// How long a synchronous query waits for its reply.
    pub response_timeout_ms: u64,
    /// Age after which an unanswered asynchronous query is dropped.
    pub stale_request_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            force_16_colors: false,
            alternate_screen: true,
            mouse: MouseMode::Drag,
            cursor: CursorVisibility::Default,
            response_timeout_ms: 500,
            stale_request_ms: 2000,
        }
    }
}

impl DriverConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the document is not valid TOML or a value has
    /// the wrong type.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read and parse a config file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env();
        Ok(config)
    }

    /// Apply `TESSERA_FORCE_16_COLORS` from the process environment.
    pub fn apply_env(&mut self) {
        let value = std::env::var(FORCE_16_COLORS_ENV).ok();
        self.apply_force_16_override(value.as_deref());
    }

    /// Apply an override value: `1`/`true`/`yes`/`on` enable, `0`/`false`/
    /// `no`/`off` disable, anything else is ignored.
    pub fn apply_force_16_override(&mut self, value: Option<&str>) {
        let Some(value) = value else { return };
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => self.force_16_colors = true,
            "0" | "false" | "no" | "off" => self.force_16_colors = false,
            other => tracing::warn!(value = other, "ignoring {FORCE_16_COLORS_ENV}"),
        }
    }

    /// [`response_timeout_ms`](Self::response_timeout_ms) as a duration.
    #[must_use]
    pub const fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// [`stale_request_ms`](Self::stale_request_ms) as a duration.
    #[must_use]
    pub const fn stale_request_timeout(&self) -> Duration {
        Duration::from_millis(self.stale_request_ms)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(DriverConfig::from_toml_str("").unwrap(), DriverConfig::default());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let cfg = DriverConfig::from_toml_str(
            "force_16_colors = true\nmouse = \"motion\"\ncursor = \"box-fix\"\n",
        )
        .unwrap();
        assert!(cfg.force_16_colors);
        assert_eq!(cfg.mouse, MouseMode::Motion);
        assert_eq!(cfg.cursor, CursorVisibility::BoxFix);
        assert!(cfg.alternate_screen);
        assert_eq!(cfg.response_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn bad_type_is_config_error() {
        let err = DriverConfig::from_toml_str("response_timeout_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn unknown_mouse_mode_is_rejected() {
        assert!(DriverConfig::from_toml_str("mouse = \"hover\"").is_err());
    }

    #[test]
    fn override_values() {
        let mut cfg = DriverConfig::default();
        cfg.apply_force_16_override(Some("TRUE"));
        assert!(cfg.force_16_colors);
        cfg.apply_force_16_override(Some("maybe"));
        assert!(cfg.force_16_colors);
        cfg.apply_force_16_override(Some("0"));
        assert!(!cfg.force_16_colors);
        cfg.apply_force_16_override(None);
        assert!(!cfg.force_16_colors);
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let err = DriverConfig::load("/nonexistent/tessera.toml").unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("tessera.toml")));
    }

    #[test]
    fn load_reads_file() {
        let path = std::env::temp_dir().join(format!("tessera-config-{}.toml", std::process::id()));
        std::fs::write(&path, "stale_request_ms = 10\n").unwrap();
        let cfg = DriverConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(cfg.stale_request_timeout(), Duration::from_millis(10));
    }

    #[test]
    fn serializes_back_to_toml() {
        let text = toml::to_string(&DriverConfig::default()).unwrap();
        assert_eq!(DriverConfig::from_toml_str(&text).unwrap(), DriverConfig::default());
    }
}
