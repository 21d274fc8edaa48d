//! Persisted settings value and its clamping rules.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::core::config::VideoConfig;

/// Current schema version written with every save.
pub const SETTINGS_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsData {
    /// False for blobs that were never written by a completed first run.
    /// Absent in the blob means false, unlike the other fields.
    #[serde(default)]
    pub initialized: bool,
    pub version: u32,
    pub audio: AudioSettings,
    pub video: VideoSettings,
    pub controls: ControlsSettings,
}

/// Volumes in [0, 1]. Mute is a separate flag layered over the level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub master: f32,
    pub bgm: f32,
    pub sfx: f32,
    pub master_muted: bool,
    pub bgm_muted: bool,
    pub sfx_muted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub fullscreen: bool,
    pub width: u32,
    pub height: u32,
    pub quality_index: i32,
}

/// Input binding overrides as an opaque JSON document owned by the binding backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ControlsSettings {
    pub binding_overrides_json: String,
}

/// Levels actually handed to the audio applier, mute already folded in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AudioLevels {
    pub master: f32,
    pub bgm: f32,
    pub sfx: f32,
}

/// Display bounds used when clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoLimits {
    pub min_width: u32,
    pub min_height: u32,
    pub quality_levels: u32,
}

impl Default for SettingsData {
    fn default() -> Self {
        Self {
            initialized: true,
            version: SETTINGS_VERSION,
            audio: AudioSettings::default(),
            video: VideoSettings::default(),
            controls: ControlsSettings::default(),
        }
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            master: 1.0,
            bgm: 1.0,
            sfx: 1.0,
            master_muted: false,
            bgm_muted: false,
            sfx_muted: false,
        }
    }
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            fullscreen: true,
            width: 1920,
            height: 1080,
            quality_index: 0,
        }
    }
}

impl Default for VideoLimits {
    fn default() -> Self {
        Self::from(&VideoConfig::default())
    }
}

impl From<&VideoConfig> for VideoLimits {
    fn from(cfg: &VideoConfig) -> Self {
        Self {
            min_width: cfg.min_width,
            min_height: cfg.min_height,
            quality_levels: cfg.quality_levels.max(1),
        }
    }
}

impl SettingsData {
    /// Bring every field into its valid range.
    pub fn clamp(&mut self, limits: &VideoLimits) {
        self.audio.clamp();
        self.video.clamp(limits);
    }

    /// Upgrade older blobs in place. Version 1 is the only schema so far.
    pub fn migrate(&mut self) {
        if self.version < SETTINGS_VERSION {
            self.version = SETTINGS_VERSION;
        }
    }
}

impl AudioSettings {
    pub fn clamp(&mut self) {
        self.master = clamp01(self.master);
        self.bgm = clamp01(self.bgm);
        self.sfx = clamp01(self.sfx);
    }

    /// Levels with each muted channel forced to 0.
    #[must_use]
    pub fn effective_levels(&self) -> AudioLevels {
        let level = |value: f32, muted: bool| if muted { 0.0 } else { clamp01(value) };
        AudioLevels {
            master: level(self.master, self.master_muted),
            bgm: level(self.bgm, self.bgm_muted),
            sfx: level(self.sfx, self.sfx_muted),
        }
    }
}

impl VideoSettings {
    pub fn clamp(&mut self, limits: &VideoLimits) {
        self.width = self.width.max(limits.min_width);
        self.height = self.height.max(limits.min_height);
        let max_index = i32::try_from(limits.quality_levels.saturating_sub(1)).unwrap_or(i32::MAX);
        self.quality_index = self.quality_index.clamp(0, max_index);
    }
}

fn clamp01(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_first_run_values() {
        let data = SettingsData::default();
        assert!(data.initialized);
        assert_eq!(data.version, SETTINGS_VERSION);
        assert!(data.video.fullscreen);
        assert_eq!((data.video.width, data.video.height), (1920, 1080));
        assert_eq!(data.audio.master, 1.0);
    }

    #[test]
    fn clamp_bounds_every_field() {
        let mut data = SettingsData::default();
        data.audio.master = 1.7;
        data.audio.bgm = -0.3;
        data.audio.sfx = f32::NAN;
        data.video.width = 320;
        data.video.height = 200;
        data.video.quality_index = 42;
        data.clamp(&VideoLimits::default());
        assert_eq!(data.audio.master, 1.0);
        assert_eq!(data.audio.bgm, 0.0);
        assert_eq!(data.audio.sfx, 0.0);
        assert_eq!((data.video.width, data.video.height), (640, 360));
        assert_eq!(data.video.quality_index, 5);

        data.video.quality_index = -3;
        data.clamp(&VideoLimits::default());
        assert_eq!(data.video.quality_index, 0);
    }

    #[test]
    fn mute_forces_effective_level_to_zero_but_keeps_volume() {
        let audio = AudioSettings {
            master: 0.8,
            bgm_muted: true,
            ..AudioSettings::default()
        };
        let levels = audio.effective_levels();
        assert_eq!(levels.master, 0.8);
        assert_eq!(levels.bgm, 0.0);
        assert_eq!(audio.bgm, 1.0);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let data: SettingsData =
            serde_json::from_str(r#"{"initialized":true,"audio":{"master":0.25}}"#).unwrap();
        assert_eq!(data.audio.master, 0.25);
        assert_eq!(data.audio.sfx, 1.0);
        assert_eq!(data.video, VideoSettings::default());
    }

    #[test]
    fn blob_without_marker_is_uninitialized() {
        let data: SettingsData = serde_json::from_str("{}").unwrap();
        assert!(!data.initialized);
        assert_eq!(data.video, VideoSettings::default());
    }

    #[test]
    fn migrate_bumps_old_versions() {
        let mut data = SettingsData {
            version: 0,
            ..SettingsData::default()
        };
        data.migrate();
        assert_eq!(data.version, SETTINGS_VERSION);
    }
}
