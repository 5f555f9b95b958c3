use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::control::bands::{BandRule, BandTable, Preset};
use crate::control::engine::Tuning;
use crate::error::{Result, TuneError};
use crate::output::keys::Keymap;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub control: ControlConfig,
    /// Replaces the preset's band table when non-empty.
    #[serde(default)]
    pub bands: Vec<BandRule>,
    #[serde(default)]
    pub keys: Keymap,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,
    #[serde(default = "default_frames_per_fft")]
    pub frames_per_fft: usize,
    #[serde(default = "default_note_min")]
    pub note_min: i32,
    #[serde(default = "default_note_max")]
    pub note_max: i32,
    /// Peak |sample| that must be exceeded for a cycle to count as played.
    #[serde(default = "default_noise_gate")]
    pub noise_gate: u16,
    #[serde(default)]
    pub block_policy: BlockPolicy,
}

/// What to do with a malformed block in the middle of a stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockPolicy {
    #[default]
    Skip,
    Abort,
}

#[derive(Debug, Deserialize)]
pub struct ControlConfig {
    /// Falls back to the preset matching the output mode.
    #[serde(default)]
    pub preset: Option<Preset>,
    #[serde(default = "default_max")]
    pub max: u16,
    #[serde(default = "default_throttle_step")]
    pub throttle_step: u16,
    #[serde(default = "default_brake_step")]
    pub brake_step: u16,
    #[serde(default = "default_release_step")]
    pub release_step: u16,
    #[serde(default = "default_steer_step")]
    pub steer_step: u16,
    #[serde(default = "default_steer_cross_multiplier")]
    pub steer_cross_multiplier: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            frame_size: default_frame_size(),
            frames_per_fft: default_frames_per_fft(),
            note_min: default_note_min(),
            note_max: default_note_max(),
            noise_gate: default_noise_gate(),
            block_policy: BlockPolicy::default(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            preset: None,
            max: default_max(),
            throttle_step: default_throttle_step(),
            brake_step: default_brake_step(),
            release_step: default_release_step(),
            steer_step: default_steer_step(),
            steer_cross_multiplier: default_steer_cross_multiplier(),
        }
    }
}

const MIDI_NOTES: std::ops::RangeInclusive<i32> = 0..=127;

fn default_sample_rate() -> u32 { 44100 }
fn default_frame_size() -> usize { 1024 }
fn default_frames_per_fft() -> usize { 8 }
fn default_note_min() -> i32 { 56 } // G#3
fn default_note_max() -> i32 { 65 } // F4
fn default_noise_gate() -> u16 { 1000 }
fn default_max() -> u16 { Tuning::default().max }
fn default_throttle_step() -> u16 { Tuning::default().throttle_step }
fn default_brake_step() -> u16 { Tuning::default().brake_step }
fn default_release_step() -> u16 { Tuning::default().release_step }
fn default_steer_step() -> u16 { Tuning::default().steer_step }
fn default_steer_cross_multiplier() -> f32 { Tuning::default().steer_cross_multiplier }

impl AudioConfig {
    pub fn fft_size(&self) -> usize {
        self.frame_size * self.frames_per_fft
    }
}

impl ControlConfig {
    pub fn tuning(&self) -> Tuning {
        Tuning {
            max: self.max,
            throttle_step: self.throttle_step,
            brake_step: self.brake_step,
            release_step: self.release_step,
            steer_step: self.steer_step,
            steer_cross_multiplier: self.steer_cross_multiplier,
        }
    }
}

impl Config {
    /// Band table in effect: explicit `[[bands]]` or the named preset.
    pub fn band_table(&self) -> BandTable {
        if self.bands.is_empty() {
            self.control.preset.unwrap_or(Preset::Device).table()
        } else {
            BandTable::new(self.bands.clone())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(TuneError::InvalidConfig(msg)) };
        let a = &self.audio;
        let c = &self.control;

        if a.sample_rate == 0 {
            return invalid("sample_rate must be positive".into());
        }
        if a.frame_size == 0 || a.frames_per_fft == 0 {
            return invalid("frame_size and frames_per_fft must be positive".into());
        }
        if !a.fft_size().is_power_of_two() {
            return invalid(format!(
                "frame_size * frames_per_fft = {} is not a power of two",
                a.fft_size()
            ));
        }
        if !(MIDI_NOTES.contains(&a.note_min) && MIDI_NOTES.contains(&a.note_max)) {
            return invalid(format!(
                "note range {}..={} must lie within MIDI notes 0..=127",
                a.note_min, a.note_max
            ));
        }
        if a.note_min >= a.note_max {
            return invalid(format!("note_min {} must be below note_max {}", a.note_min, a.note_max));
        }
        if c.max < 2 {
            return invalid("control max must be at least 2".into());
        }
        if [c.throttle_step, c.brake_step, c.release_step, c.steer_step].contains(&0) {
            return invalid("control steps must be positive".into());
        }
        if !(c.steer_cross_multiplier.is_finite() && c.steer_cross_multiplier >= 1.0) {
            return invalid(format!(
                "steer_cross_multiplier {} must be at least 1",
                c.steer_cross_multiplier
            ));
        }
        for rule in &self.bands {
            if !(rule.low_hz < rule.high_hz) {
                return invalid(format!("band {:?} has an empty range", rule));
            }
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            log::warn!("Ignoring {}: {}", path.display(), e);
            None
        }
    }
}

/// `tunedrive.toml` in the working directory, then the platform config dir.
pub fn find_config() -> Option<PathBuf> {
    let local = PathBuf::from("tunedrive.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("tunedrive").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::bands::BandEffect;

    #[test]
    fn defaults_validate() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.audio.fft_size(), 8192);
        assert_eq!(config.control.tuning(), Tuning::default());
        assert_eq!(config.band_table(), Preset::Device.table());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [audio]
            noise_gate = 2500
            block_policy = "abort"

            [control]
            preset = "keys"
            steer_cross_multiplier = 1.5

            [keys]
            terminator = "{ENTER}"
            "#,
        )
        .unwrap();
        assert_eq!(config.audio.noise_gate, 2500);
        assert_eq!(config.audio.block_policy, BlockPolicy::Abort);
        assert_eq!(config.audio.sample_rate, 44100);
        assert_eq!(config.control.preset, Some(Preset::Keys));
        assert_eq!(config.control.tuning().steer_cross_multiplier, 1.5);
        assert_eq!(config.keys.terminator, "{ENTER}");
        assert_eq!(config.keys.brake, "b");
        assert_eq!(config.band_table(), Preset::Keys.table());
    }

    #[test]
    fn custom_bands_replace_preset() {
        let config: Config = toml::from_str(
            r#"
            [[bands]]
            high_hz = 250.0
            effect = "brake"

            [[bands]]
            low_hz = 250.0
            effect = "accelerate"
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        let table = config.band_table();
        assert_eq!(table.rules().len(), 2);
        assert_eq!(table.classify(300.0).speed, Some(BandEffect::Accelerate));
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = Config::default();
        config.audio.frame_size = 1000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.audio.note_min = 70;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.audio.note_max = i32::MAX;
        assert!(matches!(config.validate(), Err(TuneError::InvalidConfig(_))));

        let mut config = Config::default();
        config.audio.note_min = -1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.control.steer_step = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.control.steer_cross_multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.bands.push(BandRule::new(300.0, 200.0, BandEffect::Brake));
        assert!(config.validate().is_err());
    }

    #[test]
    fn unreadable_config_is_none() {
        assert!(load_config(Path::new("/no/such/tunedrive.toml")).is_none());
    }
}
