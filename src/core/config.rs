//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::arbiter::input_mode::InputMode;
use crate::core::errors::{Result, UiError};

/// Full configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub confirm: ConfirmConfig,
    pub toast: ToastConfig,
    pub video: VideoConfig,
    pub screens: ScreensConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub scenes: Vec<SceneProfile>,
    pub paths: PathsConfig,
}

/// Input-mode arbitration defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InputConfig {
    /// Mode in effect while no screen holds an input claim.
    pub base_mode: InputMode,
}

/// Confirm gate defaults, including the display "keep or revert" countdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConfirmConfig {
    pub display_timeout_secs: f64,
    pub timeout_triggers_cancel: bool,
    pub confirm_label: String,
    pub cancel_label: String,
}

/// Toast timing on the unscaled clock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToastConfig {
    pub fade_in_secs: f64,
    pub fade_out_secs: f64,
    pub min_hold_secs: f64,
    pub default_hold_secs: f64,
    pub channel: String,
}

/// Display clamping limits and the resolution list offered by the settings screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VideoConfig {
    pub min_width: u32,
    pub min_height: u32,
    pub quality_levels: u32,
    pub resolutions: Vec<[u32; 2]>,
}

/// Wiring between built-in screens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScreensConfig {
    /// Scene loaded by the pause menu's quit action.
    pub menu_scene: String,
    /// Scene loaded by the main menu's start action.
    pub game_scene: String,
    /// Whether the settings screen holds its own pause claim while open.
    pub settings_pause_on_open: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub dir: PathBuf,
    pub settings_key: String,
    pub progress_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub jsonl_path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
    pub fsync_interval_secs: u64,
    pub channel_capacity: usize,
}

/// What a scene installs once its load completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SceneProfile {
    pub name: String,
    /// New input base mode, if the scene sets one.
    pub base_mode: Option<InputMode>,
    /// Screen kinds pushed onto the modal stack, bottom first.
    pub push: Vec<String>,
    /// Overlay channel -> screen kind.
    pub overlays: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            base_mode: InputMode::Gameplay,
        }
    }
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            display_timeout_secs: 10.0,
            timeout_triggers_cancel: true,
            confirm_label: "OK".to_string(),
            cancel_label: "Cancel".to_string(),
        }
    }
}

impl Default for ToastConfig {
    fn default() -> Self {
        Self {
            fade_in_secs: 0.12,
            fade_out_secs: 0.18,
            min_hold_secs: 0.5,
            default_hold_secs: 2.0,
            channel: "Toast".to_string(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            min_width: 640,
            min_height: 360,
            quality_levels: 6,
            resolutions: Vec::new(),
        }
    }
}

impl Default for ScreensConfig {
    fn default() -> Self {
        Self {
            menu_scene: "MainMenu".to_string(),
            game_scene: "Game".to_string(),
            settings_pause_on_open: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathsConfig::default().data_dir.join("saves"),
            settings_key: "settings_main".to_string(),
            progress_key: "progress_main".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jsonl_path: PathsConfig::default().data_dir.join("activity.jsonl"),
            fallback_path: None,
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 3,
            fsync_interval_secs: 5,
            channel_capacity: 1024,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[UIA-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir.join(".config").join("uiarb").join("config.toml"),
            data_dir: home_dir.join(".local").join("share").join("uiarb"),
        }
    }
}

/// Scene profiles used when the config file does not list any.
#[must_use]
pub fn default_scene_profiles() -> Vec<SceneProfile> {
    vec![
        SceneProfile {
            name: "MainMenu".to_string(),
            base_mode: Some(InputMode::Ui),
            push: vec!["main_menu".to_string()],
            overlays: BTreeMap::new(),
        },
        SceneProfile {
            name: "Game".to_string(),
            base_mode: Some(InputMode::Gameplay),
            push: Vec::new(),
            overlays: BTreeMap::from([("HUD".to_string(), "hud".to_string())]),
        },
    ]
}

impl Config {
    /// Default configuration path, `UIARB_CONFIG` wins when set.
    #[must_use]
    pub fn default_path() -> PathBuf {
        env_var("UIARB_CONFIG").map_or_else(|| PathsConfig::default().config_file, PathBuf::from)
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| UiError::Io {
                path: path_buf.clone(),
                source,
            })?;
            Self::from_toml_str(&raw)?
        } else if is_explicit_path {
            return Err(UiError::MissingConfig { path: path_buf });
        } else {
            Self::with_default_scenes()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document; an absent `[[scenes]]` list gets the built-in profiles.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut parsed: Self = toml::from_str(raw)?;
        if parsed.scenes.is_empty() {
            parsed.scenes = default_scene_profiles();
        }
        Ok(parsed)
    }

    /// Defaults plus the built-in scene profiles.
    #[must_use]
    pub fn with_default_scenes() -> Self {
        Self {
            scenes: default_scene_profiles(),
            ..Self::default()
        }
    }

    /// Profile for `scene`, if configured.
    #[must_use]
    pub fn scene_profile(&self, scene: &str) -> Option<&SceneProfile> {
        self.scenes.iter().find(|profile| profile.name == scene)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("UIARB_INPUT_BASE_MODE") {
            self.input.base_mode = raw.parse().map_err(|details| UiError::ConfigParse {
                context: "env",
                details: format!("UIARB_INPUT_BASE_MODE={raw:?}: {details}"),
            })?;
        }

        set_f64(
            &mut lookup,
            "UIARB_CONFIRM_DISPLAY_TIMEOUT_SECS",
            &mut self.confirm.display_timeout_secs,
        )?;
        set_bool(
            &mut lookup,
            "UIARB_CONFIRM_TIMEOUT_TRIGGERS_CANCEL",
            &mut self.confirm.timeout_triggers_cancel,
        )?;

        set_f64(
            &mut lookup,
            "UIARB_TOAST_DEFAULT_HOLD_SECS",
            &mut self.toast.default_hold_secs,
        )?;
        set_f64(
            &mut lookup,
            "UIARB_TOAST_MIN_HOLD_SECS",
            &mut self.toast.min_hold_secs,
        )?;

        set_u32(
            &mut lookup,
            "UIARB_VIDEO_QUALITY_LEVELS",
            &mut self.video.quality_levels,
        )?;

        if let Some(raw) = lookup("UIARB_STORAGE_DIR") {
            self.storage.dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("UIARB_STORAGE_SETTINGS_KEY") {
            self.storage.settings_key = raw;
        }
        if let Some(raw) = lookup("UIARB_STORAGE_PROGRESS_KEY") {
            self.storage.progress_key = raw;
        }

        set_bool(&mut lookup, "UIARB_LOG_ENABLED", &mut self.logging.enabled)?;
        if let Some(raw) = lookup("UIARB_LOG_PATH") {
            self.logging.jsonl_path = PathBuf::from(raw);
        }

        Ok(())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if !self.confirm.display_timeout_secs.is_finite() {
            return Err(UiError::InvalidConfig {
                details: format!(
                    "confirm.display_timeout_secs must be finite, got {}",
                    self.confirm.display_timeout_secs
                ),
            });
        }

        for (name, value) in [
            ("toast.fade_in_secs", self.toast.fade_in_secs),
            ("toast.fade_out_secs", self.toast.fade_out_secs),
            ("toast.min_hold_secs", self.toast.min_hold_secs),
            ("toast.default_hold_secs", self.toast.default_hold_secs),
        ] {
            validate_non_negative(name, value)?;
        }
        if self.toast.default_hold_secs < self.toast.min_hold_secs {
            return Err(UiError::InvalidConfig {
                details: format!(
                    "toast.default_hold_secs ({}) must be >= toast.min_hold_secs ({})",
                    self.toast.default_hold_secs, self.toast.min_hold_secs
                ),
            });
        }
        if self.toast.channel.trim().is_empty() {
            return Err(UiError::InvalidConfig {
                details: "toast.channel must not be empty".to_string(),
            });
        }

        if self.video.quality_levels == 0 {
            return Err(UiError::InvalidConfig {
                details: "video.quality_levels must be >= 1".to_string(),
            });
        }
        if self.video.min_width == 0 || self.video.min_height == 0 {
            return Err(UiError::InvalidConfig {
                details: "video.min_width and video.min_height must be >= 1".to_string(),
            });
        }

        validate_key("storage.settings_key", &self.storage.settings_key)?;
        validate_key("storage.progress_key", &self.storage.progress_key)?;
        if self.storage.settings_key == self.storage.progress_key {
            return Err(UiError::InvalidConfig {
                details: format!(
                    "storage.settings_key and storage.progress_key must differ, both are '{}'",
                    self.storage.settings_key
                ),
            });
        }

        if self.logging.channel_capacity == 0 {
            return Err(UiError::InvalidConfig {
                details: "logging.channel_capacity must be >= 1".to_string(),
            });
        }

        let mut seen = std::collections::BTreeSet::new();
        for profile in &self.scenes {
            if profile.name.trim().is_empty() {
                return Err(UiError::InvalidConfig {
                    details: "scene profile name must not be empty".to_string(),
                });
            }
            if !seen.insert(profile.name.as_str()) {
                return Err(UiError::InvalidConfig {
                    details: format!("scene profile '{}' listed twice", profile.name),
                });
            }
        }

        Ok(())
    }
}

/// Storage keys become file names; keep them to a single plain path segment.
pub(crate) fn validate_key(name: &str, key: &str) -> Result<()> {
    let ok = !key.is_empty()
        && key != "."
        && key != ".."
        && !key.contains(['/', '\\', '\0']);
    if ok {
        Ok(())
    } else {
        Err(UiError::InvalidConfig {
            details: format!("{name} must be a single path segment, got {key:?}"),
        })
    }
}

fn validate_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(UiError::InvalidConfig {
            details: format!("{name} must be finite and >= 0, got {value}"),
        });
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_f64<F>(lookup: &mut F, name: &str, slot: &mut f64) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw.trim().parse::<f64>().map_err(|error| UiError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_u32<F>(lookup: &mut F, name: &str, slot: &mut u32) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw.trim().parse::<u32>().map_err(|error| UiError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_bool<F>(lookup: &mut F, name: &str, slot: &mut bool) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = parse_env_bool(name, &raw)?;
    }
    Ok(())
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.trim().parse::<bool>().map_err(|error| UiError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

#[cfg(test)]
mod tests {
    use super::{Config, UiError, default_scene_profiles};
    use crate::arbiter::input_mode::InputMode;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::with_default_scenes();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.confirm.display_timeout_secs, 10.0);
        assert!(cfg.confirm.timeout_triggers_cancel);
        assert_eq!(cfg.storage.settings_key, "settings_main");
        assert_eq!(cfg.input.base_mode, InputMode::Gameplay);
    }

    #[test]
    fn partial_toml_keeps_section_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            [confirm]
            display_timeout_secs = 4.5

            [input]
            base_mode = "ui"
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.confirm.display_timeout_secs, 4.5);
        assert_eq!(cfg.confirm.cancel_label, "Cancel");
        assert_eq!(cfg.input.base_mode, InputMode::Ui);
        assert_eq!(cfg.scenes, default_scene_profiles());
    }

    #[test]
    fn explicit_scene_list_replaces_builtins() {
        let cfg = Config::from_toml_str(
            r#"
            [[scenes]]
            name = "Arena"
            base_mode = "gameplay"
            overlays = { HUD = "hud" }
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.scenes.len(), 1);
        let arena = cfg.scene_profile("Arena").expect("arena profile");
        assert_eq!(arena.base_mode, Some(InputMode::Gameplay));
        assert_eq!(arena.overlays.get("HUD").map(String::as_str), Some("hud"));
        assert!(cfg.scene_profile("MainMenu").is_none());
    }

    #[test]
    fn duplicate_scene_profiles_rejected() {
        let mut cfg = Config::with_default_scenes();
        cfg.scenes.push(cfg.scenes[0].clone());
        let err = cfg.validate().expect_err("duplicate scene");
        assert!(matches!(err, UiError::InvalidConfig { .. }));
    }

    #[test]
    fn toast_hold_ordering_enforced() {
        let mut cfg = Config::default();
        cfg.toast.default_hold_secs = 0.2;
        cfg.toast.min_hold_secs = 0.5;
        let err = cfg.validate().expect_err("default below min");
        match err {
            UiError::InvalidConfig { details } => assert!(details.contains("default_hold_secs")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_quality_levels_rejected() {
        let mut cfg = Config::default();
        cfg.video.quality_levels = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn settings_key_with_separator_rejected() {
        let mut cfg = Config::default();
        cfg.storage.settings_key = "../escape".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn shared_settings_and_progress_key_rejected() {
        let mut cfg = Config::default();
        cfg.storage.progress_key = cfg.storage.settings_key.clone();
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.code(), "UIA-1001");
    }

    #[test]
    fn non_finite_display_timeout_rejected() {
        let mut cfg = Config::default();
        cfg.confirm.display_timeout_secs = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn negative_display_timeout_is_valid_and_means_disabled() {
        let mut cfg = Config::default();
        cfg.confirm.display_timeout_secs = -1.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn env_overrides_apply() {
        let env = vars(&[
            ("UIARB_INPUT_BASE_MODE", "ui"),
            ("UIARB_CONFIRM_DISPLAY_TIMEOUT_SECS", "3"),
            ("UIARB_CONFIRM_TIMEOUT_TRIGGERS_CANCEL", "false"),
            ("UIARB_STORAGE_DIR", "/var/tmp/saves"),
            ("UIARB_LOG_ENABLED", "false"),
        ]);
        let mut cfg = Config::default();
        cfg.apply_env_overrides_from(|name| env.get(name).cloned())
            .expect("env overrides");
        assert_eq!(cfg.input.base_mode, InputMode::Ui);
        assert_eq!(cfg.confirm.display_timeout_secs, 3.0);
        assert!(!cfg.confirm.timeout_triggers_cancel);
        assert_eq!(cfg.storage.dir, PathBuf::from("/var/tmp/saves"));
        assert!(!cfg.logging.enabled);
    }

    #[test]
    fn env_invalid_values_rejected() {
        let env = vars(&[("UIARB_CONFIRM_TIMEOUT_TRIGGERS_CANCEL", "sometimes")]);
        let mut cfg = Config::default();
        let err = cfg
            .apply_env_overrides_from(|name| env.get(name).cloned())
            .expect_err("bad bool");
        assert_eq!(err.code(), "UIA-1003");

        let env = vars(&[("UIARB_INPUT_BASE_MODE", "keyboard")]);
        let err = cfg
            .apply_env_overrides_from(|name| env.get(name).cloned())
            .expect_err("bad mode");
        assert_eq!(err.code(), "UIA-1003");
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let missing = Path::new("/definitely/not/here/uiarb.toml");
        let err = Config::load(Some(missing)).expect_err("missing explicit path");
        assert!(matches!(err, UiError::MissingConfig { .. }));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("uiarb.toml");
        std::fs::write(&path, "[toast]\ndefault_hold_secs = 3.0\n").expect("write");
        let cfg = Config::load(Some(&path)).expect("load");
        assert_eq!(cfg.toast.default_hold_secs, 3.0);
        assert_eq!(cfg.paths.config_file, path);
    }

    #[test]
    fn stable_hash_deterministic_and_sensitive() {
        let cfg = Config::default();
        let first = cfg.stable_hash().expect("hash");
        assert_eq!(first, cfg.stable_hash().expect("hash"));
        let mut changed = cfg;
        changed.toast.default_hold_secs = 2.5;
        assert_ne!(first, changed.stable_hash().expect("hash"));
    }
}
