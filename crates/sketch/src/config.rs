//! `sketch.toml`: display settings, sandbox limits and the settle delay.

use crate::error::ConfigError;
use crate::sandbox::SandboxLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "sketch.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaygroundConfig {
    #[serde(default)]
    pub display: DisplaySettings,
    #[serde(default)]
    pub sandbox: SandboxLimits,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySettings {
    /// Place output on the line that produced it instead of stacking it.
    #[serde(default = "default_true")]
    pub match_lines: bool,
    #[serde(default = "default_true")]
    pub show_line_numbers: bool,
    #[serde(default = "default_true")]
    pub highlight_active_line: bool,
    #[serde(default = "default_font_size")]
    pub font_size: u16,
    #[serde(default = "default_font_family")]
    pub font_family: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            match_lines: true,
            show_line_numbers: true,
            highlight_active_line: true,
            font_size: default_font_size(),
            font_family: default_font_family(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl SchedulerConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn default_true() -> bool {
    true
}

fn default_font_size() -> u16 {
    14
}

fn default_font_family() -> String {
    "Menlo, Monaco, \"Courier New\", monospace".to_string()
}

fn default_settle_delay_ms() -> u64 {
    500
}

impl PlaygroundConfig {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The nearest `sketch.toml` in `start` or one of its ancestors.
    pub fn discover(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|directory| directory.join(CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Reads `explicit` if given, else the discovered file, else the defaults.
    pub fn load(explicit: Option<&Path>, start: &Path) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover(start),
        };
        match path {
            Some(path) => {
                let config = Self::from_file(&path)?;
                log::debug!("Loaded config from {}", path.display());
                Ok((config, Some(path)))
            }
            None => Ok((Self::default(), None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScratchDir(PathBuf);

    impl ScratchDir {
        fn new() -> Self {
            let path = std::env::temp_dir().join(format!("sketch-config-{}", ulid::Ulid::new()));
            std::fs::create_dir_all(&path).unwrap();
            Self(path)
        }
    }

    impl Drop for ScratchDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn empty_file_takes_defaults() {
        let config = PlaygroundConfig::from_toml("").unwrap();
        assert_eq!(config, PlaygroundConfig::default());
        assert!(config.display.match_lines);
        assert_eq!(config.display.font_size, 14);
        assert_eq!(config.sandbox.max_steps, 1_000_000);
        assert_eq!(config.sandbox.max_call_depth, 128);
        assert_eq!(config.scheduler.settle_delay(), Duration::from_millis(500));
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = PlaygroundConfig::from_toml(
            "[display]\nmatch_lines = false\n\n[sandbox]\nmax_steps = 10\n\n[scheduler]\nsettle_delay_ms = 50\n",
        )
        .unwrap();
        assert!(!config.display.match_lines);
        assert!(config.display.show_line_numbers);
        assert_eq!(config.sandbox.max_steps, 10);
        assert_eq!(config.sandbox.max_call_depth, 128);
        assert_eq!(config.scheduler.settle_delay_ms, 50);
    }

    #[test]
    fn wrong_types_are_rejected() {
        assert!(PlaygroundConfig::from_toml("[display]\nfont_size = \"big\"").is_err());
    }

    #[test]
    fn discovers_the_nearest_file_upwards() {
        let root = ScratchDir::new();
        let nested = root.0.join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.0.join(CONFIG_FILE), "[display]\nfont_size = 20\n").unwrap();

        let (config, path) = PlaygroundConfig::load(None, &nested).unwrap();
        assert_eq!(path, Some(root.0.join(CONFIG_FILE)));
        assert_eq!(config.display.font_size, 20);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let root = ScratchDir::new();
        let missing = root.0.join("nope.toml");
        let error = PlaygroundConfig::load(Some(&missing), &root.0).unwrap_err();
        assert!(matches!(error, ConfigError::Io { .. }));
    }

    #[test]
    fn invalid_file_reports_its_path() {
        let root = ScratchDir::new();
        let path = root.0.join(CONFIG_FILE);
        std::fs::write(&path, "[sandbox\n").unwrap();
        let error = PlaygroundConfig::from_file(&path).unwrap_err();
        assert!(error.to_string().contains(CONFIG_FILE));
    }
}
