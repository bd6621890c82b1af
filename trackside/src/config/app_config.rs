//! TOML configuration file loading and validation.
//!
//! The file is parsed into loosely typed raw structs first so that every
//! invalid or missing field can be reported at once, each with its path.

use crate::config::{RenderDesc, SoundDefinition};
use crate::error::{ConfigIssue, ConfigValidationError, Result};
use crate::math::Vec3;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

const COORDINATE_MIN: f64 = -32768.0;
const COORDINATE_MAX: f64 = 32767.0;
const ADMIN_MAX_LEN: usize = 16;

/// Connection settings for the simulation host's telemetry interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsimConfig {
    pub host: String,
    pub port: u16,
    pub admin: String,
}

/// Sound definitions keyed by exact track code and by two-letter family code
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoundsConfig {
    pub family: BTreeMap<String, Vec<SoundDefinition>>,
    pub track: BTreeMap<String, Vec<SoundDefinition>>,
}

/// Fully validated application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub insim: InsimConfig,
    pub render: RenderDesc,
    pub sounds: SoundsConfig,
}

impl AppConfig {
    /// Read and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn from_toml_str(text: &str) -> std::result::Result<Self, ConfigValidationError> {
        let raw: RawConfig = toml::from_str(text)
            .map_err(|e| ConfigValidationError::single(&[], e.message().to_string()))?;
        let mut v = Validator::default();
        let insim = v.insim(&raw.insim);
        let render = v.audio(&raw.audio);
        let sounds = v.sounds(&raw.sounds);
        v.finish()?;
        Ok(Self {
            insim,
            render,
            sounds,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    insim: RawInsim,
    #[serde(default)]
    audio: RawAudio,
    #[serde(default)]
    sounds: RawSounds,
}

#[derive(Debug, Default, Deserialize)]
struct RawInsim {
    host: Option<String>,
    port: Option<i64>,
    admin: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAudio {
    sound_dir: Option<PathBuf>,
    sample_rate: Option<i64>,
    block_size: Option<i64>,
    channels: Option<i64>,
    loader_threads: Option<i64>,
    interpolation_ms: Option<i64>,
    settle_delay_ms: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSounds {
    #[serde(default)]
    family: BTreeMap<String, Vec<RawSound>>,
    #[serde(default)]
    track: BTreeMap<String, Vec<RawSound>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSound {
    file: Option<String>,
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    gain: Option<f64>,
    ref_distance: Option<f64>,
    max_distance: Option<f64>,
    rolloff_factor: Option<f64>,
    cone_inner_angle: Option<f64>,
    cone_outer_angle: Option<f64>,
    cone_outer_gain: Option<f64>,
    rotation: Option<f64>,
}

#[derive(Default)]
struct Validator {
    issues: Vec<ConfigIssue>,
}

impl Validator {
    fn issue(&mut self, path: &[&str], message: impl Into<String>) {
        self.issues.push(ConfigIssue {
            path: path.iter().map(|s| s.to_string()).collect(),
            message: message.into(),
        });
    }

    fn finish(self) -> std::result::Result<(), ConfigValidationError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigValidationError {
                issues: self.issues,
            })
        }
    }

    fn int_in_range(
        &mut self,
        path: &[&str],
        value: Option<i64>,
        default: i64,
        min: i64,
        max: i64,
    ) -> i64 {
        let value = value.unwrap_or(default);
        if value < min || value > max {
            self.issue(path, format!("must be between {} and {}", min, max));
            return default;
        }
        value
    }

    fn insim(&mut self, raw: &RawInsim) -> InsimConfig {
        let host = raw.host.clone().unwrap_or_else(|| "127.0.0.1".to_string());
        if host.is_empty() {
            self.issue(&["insim", "host"], "must not be empty");
        }

        let port = match raw.port {
            None => {
                self.issue(&["insim", "port"], "required");
                0
            }
            Some(port) if !(1..=65535).contains(&port) => {
                self.issue(&["insim", "port"], "must be between 1 and 65535");
                0
            }
            Some(port) => port as u16,
        };

        let admin = raw.admin.clone().unwrap_or_default();
        if admin.chars().count() > ADMIN_MAX_LEN {
            self.issue(
                &["insim", "admin"],
                format!("must be at most {} characters", ADMIN_MAX_LEN),
            );
        }

        InsimConfig { host, port, admin }
    }

    fn audio(&mut self, raw: &RawAudio) -> RenderDesc {
        let defaults = RenderDesc::default();
        let sample_rate = self.int_in_range(
            &["audio", "sample_rate"],
            raw.sample_rate,
            defaults.sample_rate as i64,
            8000,
            384000,
        );
        let block_size = self.int_in_range(
            &["audio", "block_size"],
            raw.block_size,
            defaults.block_size as i64,
            16,
            16384,
        );
        let channels = self.int_in_range(
            &["audio", "channels"],
            raw.channels,
            defaults.channels as i64,
            1,
            8,
        );
        let loader_threads = self.int_in_range(
            &["audio", "loader_threads"],
            raw.loader_threads,
            defaults.loader_threads as i64,
            1,
            64,
        );
        let interpolation_ms = self.int_in_range(
            &["audio", "interpolation_ms"],
            raw.interpolation_ms,
            defaults.interpolation_window.as_millis() as i64,
            0,
            1000,
        );
        let settle_delay_ms = self.int_in_range(
            &["audio", "settle_delay_ms"],
            raw.settle_delay_ms,
            defaults.settle_delay.as_millis() as i64,
            0,
            60000,
        );

        RenderDesc {
            sample_rate: sample_rate as u32,
            block_size: block_size as usize,
            channels: channels as u16,
            sound_dir: raw.sound_dir.clone().unwrap_or(defaults.sound_dir),
            loader_threads: loader_threads as usize,
            interpolation_window: Duration::from_millis(interpolation_ms as u64),
            settle_delay: Duration::from_millis(settle_delay_ms as u64),
        }
    }

    fn sounds(&mut self, raw: &RawSounds) -> SoundsConfig {
        let mut sounds = SoundsConfig::default();

        for (code, list) in &raw.family {
            if code.chars().count() != 2 {
                self.issue(
                    &["sounds", "family", code.as_str()],
                    "family codes must be exactly 2 characters",
                );
            }
            let defs = self.sound_list(&["sounds", "family", code.as_str()], list);
            sounds.family.insert(code.clone(), defs);
        }

        for (code, list) in &raw.track {
            if code.is_empty() {
                self.issue(&["sounds", "track"], "track codes must not be empty");
            }
            let defs = self.sound_list(&["sounds", "track", code.as_str()], list);
            sounds.track.insert(code.clone(), defs);
        }

        sounds
    }

    fn sound_list(&mut self, prefix: &[&str], list: &[RawSound]) -> Vec<SoundDefinition> {
        list.iter()
            .enumerate()
            .filter_map(|(index, raw)| {
                let index = index.to_string();
                let mut path: Vec<&str> = prefix.to_vec();
                path.push(&index);
                self.sound(&path, raw)
            })
            .collect()
    }

    fn sound(&mut self, path: &[&str], raw: &RawSound) -> Option<SoundDefinition> {
        let before = self.issues.len();
        let field = |name: &'static str| -> Vec<&str> {
            let mut p = path.to_vec();
            p.push(name);
            p
        };
        let defaults = SoundDefinition::default();

        let file = raw.file.clone().unwrap_or_default();
        if file.is_empty() {
            self.issue(&field("file"), "required");
        }

        let coords = [("x", raw.x), ("y", raw.y), ("z", raw.z)];
        for (name, value) in coords {
            if let Some(value) = value {
                if !(COORDINATE_MIN..=COORDINATE_MAX).contains(&value) {
                    self.issue(
                        &field(name),
                        format!("must be between {} and {}", COORDINATE_MIN, COORDINATE_MAX),
                    );
                }
            }
        }
        let position = match (raw.x, raw.y, raw.z) {
            (Some(x), Some(y), Some(z)) => Some(Vec3::new(x as f32, y as f32, z as f32)),
            (None, None, None) => None,
            _ => {
                self.issue(path, "x, y and z must all be set or all be omitted");
                None
            }
        };

        let gain = raw.gain.unwrap_or(defaults.gain as f64);
        if gain < 0.0 {
            self.issue(&field("gain"), "must be >= 0");
        }
        let ref_distance = raw.ref_distance.unwrap_or(defaults.ref_distance as f64);
        if ref_distance <= 0.0 {
            self.issue(&field("ref_distance"), "must be > 0");
        }
        let max_distance = raw.max_distance.unwrap_or(defaults.max_distance as f64);
        if max_distance < ref_distance {
            self.issue(&field("max_distance"), "must be >= ref_distance");
        }
        let rolloff_factor = raw.rolloff_factor.unwrap_or(defaults.rolloff_factor as f64);
        if rolloff_factor < 0.0 {
            self.issue(&field("rolloff_factor"), "must be >= 0");
        }
        let cone_inner_angle = raw
            .cone_inner_angle
            .unwrap_or(defaults.cone_inner_angle as f64);
        let cone_outer_angle = raw
            .cone_outer_angle
            .unwrap_or(defaults.cone_outer_angle as f64);
        for (name, angle) in [
            ("cone_inner_angle", cone_inner_angle),
            ("cone_outer_angle", cone_outer_angle),
        ] {
            if !(0.0..=360.0).contains(&angle) {
                self.issue(&field(name), "must be between 0 and 360");
            }
        }
        if cone_inner_angle > cone_outer_angle {
            self.issue(&field("cone_inner_angle"), "must be <= cone_outer_angle");
        }
        let cone_outer_gain = raw
            .cone_outer_gain
            .unwrap_or(defaults.cone_outer_gain as f64);
        if !(0.0..=1.0).contains(&cone_outer_gain) {
            self.issue(&field("cone_outer_gain"), "must be between 0 and 1");
        }
        let rotation = raw.rotation.unwrap_or(defaults.rotation as f64);

        if self.issues.len() > before {
            return None;
        }

        Some(SoundDefinition {
            file: PathBuf::from(file),
            position,
            gain: gain as f32,
            ref_distance: ref_distance as f32,
            max_distance: max_distance as f32,
            rolloff_factor: rolloff_factor as f32,
            cone_inner_angle: cone_inner_angle as f32,
            cone_outer_angle: cone_outer_angle as f32,
            cone_outer_gain: cone_outer_gain as f32,
            rotation: rotation as f32,
        })
    }
}
