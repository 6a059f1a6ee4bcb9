//! Startup configuration with silent fallback to defaults
//!
//! Values arrive untyped, from a YAML file and from CLI flags, and are
//! resolved leniently: anything missing, unparseable, non-finite or zero
//! is replaced by the documented default. Fallback is never an error.

use std::num::NonZeroU32;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PipelineResult;

/// Default particle count on desktop-class devices
pub const DEFAULT_PARTICLE_COUNT_DESKTOP: u32 = 200_000;

/// Default particle count on mobile-class devices
pub const DEFAULT_PARTICLE_COUNT_MOBILE: u32 = 100_000;

/// Default frame-rate ceiling
pub const DEFAULT_FPS: u32 = 60;

const DEFAULT_FRAME_RATE: NonZeroU32 = match NonZeroU32::new(DEFAULT_FPS) {
    Some(rate) => rate,
    None => NonZeroU32::MIN,
};

/// Default gravitational strength
pub const DEFAULT_G: f32 = 9.0;

/// Default per-step velocity damping
pub const DEFAULT_RESISTANCE: f32 = 0.99;

/// Device class, used only to pick the default particle count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceClass {
    #[default]
    Desktop,
    Mobile,
}

impl DeviceClass {
    pub fn default_particle_count(self) -> u32 {
        match self {
            DeviceClass::Desktop => DEFAULT_PARTICLE_COUNT_DESKTOP,
            DeviceClass::Mobile => DEFAULT_PARTICLE_COUNT_MOBILE,
        }
    }
}

/// A configuration value before validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Whole value as a number, truncated toward zero
    fn as_integer(&self) -> Option<f64> {
        let n = match self {
            RawValue::Number(n) => *n,
            RawValue::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return None;
                }
                s.parse::<f64>().ok()?
            }
        };
        n.is_finite().then(|| n.trunc())
    }

    /// Longest numeric prefix, so `"9px"` reads as 9
    fn as_float(&self) -> Option<f64> {
        let n = match self {
            RawValue::Number(n) => *n,
            RawValue::Text(s) => leading_float(s)?,
        };
        n.is_finite().then_some(n)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

fn leading_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    // Reject words `f64::from_str` accepts but a numeric prefix never is
    if !s.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '.' | '-' | '+')) {
        return None;
    }
    (1..=s.len())
        .rev()
        .filter(|&end| s.is_char_boundary(end))
        .find_map(|end| s[..end].parse::<f64>().ok())
}

/// Unvalidated startup parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub particle_count: Option<RawValue>,
    pub fps: Option<RawValue>,
    pub g: Option<RawValue>,
    pub resistance: Option<RawValue>,
}

impl RawConfig {
    /// Read a YAML configuration file
    pub fn from_yaml_file(path: &Path) -> PipelineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> PipelineResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Fields set in `overrides` replace fields in `self`
    pub fn merge(self, overrides: RawConfig) -> Self {
        Self {
            particle_count: overrides.particle_count.or(self.particle_count),
            fps: overrides.fps.or(self.fps),
            g: overrides.g.or(self.g),
            resistance: overrides.resistance.or(self.resistance),
        }
    }

    /// Validate every field, substituting defaults where needed
    pub fn resolve(&self, device: DeviceClass) -> SimConfig {
        SimConfig {
            particle_count: resolve_count(
                "particle_count",
                self.particle_count.as_ref(),
                device.default_particle_count(),
            ),
            fps: resolve_count("fps", self.fps.as_ref(), DEFAULT_FPS),
            g: resolve_float("g", self.g.as_ref(), DEFAULT_G),
            resistance: resolve_float("resistance", self.resistance.as_ref(), DEFAULT_RESISTANCE),
        }
    }
}

fn resolve_count(name: &str, raw: Option<&RawValue>, default: u32) -> u32 {
    match raw.and_then(RawValue::as_integer) {
        Some(n) if n >= 1.0 && n <= u32::MAX as f64 => n as u32,
        _ => {
            if raw.is_some() {
                debug!(field = name, value = ?raw, default, "invalid value, using default");
            }
            default
        }
    }
}

fn resolve_float(name: &str, raw: Option<&RawValue>, default: f32) -> f32 {
    match raw.and_then(RawValue::as_float) {
        Some(n) if n != 0.0 => n as f32,
        _ => {
            if raw.is_some() {
                debug!(field = name, value = ?raw, default, "invalid value, using default");
            }
            default
        }
    }
}

/// Validated startup configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimConfig {
    pub particle_count: u32,
    /// Frame-rate ceiling for the scheduler
    pub fps: u32,
    pub g: f32,
    pub resistance: f32,
}

impl SimConfig {
    /// Defaults for the given device class
    pub fn defaults(device: DeviceClass) -> Self {
        RawConfig::default().resolve(device)
    }

    /// `fps` as the scheduler takes it. A zero written directly into the
    /// field falls back to the default like any other invalid rate.
    pub fn frame_rate(&self) -> NonZeroU32 {
        NonZeroU32::new(self.fps).unwrap_or(DEFAULT_FRAME_RATE)
    }

    /// Minimum interval between accepted frames
    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.frame_rate().get() as f64
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::defaults(DeviceClass::Desktop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn raw(particle_count: &str, fps: &str, g: &str, resistance: &str) -> RawConfig {
        RawConfig {
            particle_count: Some(particle_count.into()),
            fps: Some(fps.into()),
            g: Some(g.into()),
            resistance: Some(resistance.into()),
        }
    }

    #[test]
    fn default_config() {
        insta::assert_debug_snapshot!(SimConfig::default(), @r"
        SimConfig {
            particle_count: 200000,
            fps: 60,
            g: 9.0,
            resistance: 0.99,
        }
        ");
    }

    #[test]
    fn frame_rate_is_never_zero() {
        let resolved = RawConfig {
            fps: Some(RawValue::Number(0.0)),
            ..RawConfig::default()
        }
        .resolve(DeviceClass::Desktop);
        assert_eq!(resolved.frame_rate().get(), 60);

        let handmade = SimConfig {
            fps: 0,
            ..SimConfig::default()
        };
        assert_eq!(handmade.frame_rate().get(), 60);
        assert_eq!(SimConfig { fps: 144, ..handmade }.frame_rate().get(), 144);
    }

    #[test]
    fn mobile_devices_default_to_fewer_particles() {
        assert_eq!(SimConfig::defaults(DeviceClass::Mobile).particle_count, 100_000);
    }

    #[test]
    fn valid_values_are_kept() {
        let config = raw("1000", "30", "4.5", "0.95").resolve(DeviceClass::Desktop);
        assert_eq!(config.particle_count, 1000);
        assert_eq!(config.fps, 30);
        assert_eq!(config.g, 4.5);
        assert_eq!(config.resistance, 0.95);
    }

    #[test]
    fn non_numeric_values_fall_back() {
        let config = raw("lots", "fast", "heavy", "sticky").resolve(DeviceClass::Mobile);
        assert_eq!(config, SimConfig::defaults(DeviceClass::Mobile));
    }

    #[test]
    fn zero_falls_back() {
        let config = raw("0", "0", "0", "0.0").resolve(DeviceClass::Desktop);
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn integers_truncate() {
        let config = raw(" 1500.9 ", "59.99", "9", "0.99").resolve(DeviceClass::Desktop);
        assert_eq!(config.particle_count, 1500);
        assert_eq!(config.fps, 59);
    }

    #[test]
    fn integers_require_the_whole_text_to_be_numeric() {
        let config = raw("12abc", "", "9", "0.99").resolve(DeviceClass::Desktop);
        assert_eq!(config.particle_count, DEFAULT_PARTICLE_COUNT_DESKTOP);
        assert_eq!(config.fps, DEFAULT_FPS);
    }

    #[test]
    fn negative_counts_fall_back() {
        let config = raw("-5", "-60", "9", "0.99").resolve(DeviceClass::Desktop);
        assert_eq!(config.particle_count, DEFAULT_PARTICLE_COUNT_DESKTOP);
        assert_eq!(config.fps, DEFAULT_FPS);
    }

    #[test]
    fn floats_read_numeric_prefix() {
        let config = raw("10", "60", "12.5px", "  0.5abc").resolve(DeviceClass::Desktop);
        assert_eq!(config.g, 12.5);
        assert_eq!(config.resistance, 0.5);
    }

    #[test]
    fn floats_reject_non_finite() {
        let config = raw("10", "60", "NaN", "inf").resolve(DeviceClass::Desktop);
        assert_eq!(config.g, DEFAULT_G);
        assert_eq!(config.resistance, DEFAULT_RESISTANCE);
    }

    #[test]
    fn negative_floats_are_kept() {
        // No bounds are enforced; a negative g repels
        let config = raw("10", "60", "-9", "1.2").resolve(DeviceClass::Desktop);
        assert_eq!(config.g, -9.0);
        assert_eq!(config.resistance, 1.2);
    }

    #[test]
    fn overrides_win_per_field() {
        let file = RawConfig {
            particle_count: Some(RawValue::Number(5000.0)),
            g: Some(RawValue::Number(3.0)),
            ..Default::default()
        };
        let cli = RawConfig {
            g: Some("7".into()),
            ..Default::default()
        };
        let config = file.merge(cli).resolve(DeviceClass::Desktop);
        assert_eq!(config.particle_count, 5000);
        assert_eq!(config.g, 7.0);
        assert_eq!(config.fps, DEFAULT_FPS);
    }

    #[test]
    fn yaml_accepts_numbers_and_strings() {
        let raw = RawConfig::from_yaml_str("particle_count: 2500\nfps: \"30\"\ng: 4.0\n").unwrap();
        let config = raw.resolve(DeviceClass::Desktop);
        assert_eq!(config.particle_count, 2500);
        assert_eq!(config.fps, 30);
        assert_eq!(config.g, 4.0);
        assert_eq!(config.resistance, DEFAULT_RESISTANCE);
    }

    #[test]
    fn empty_yaml_is_all_defaults() {
        let raw = RawConfig::from_yaml_str("   \n").unwrap();
        assert_eq!(raw, RawConfig::default());
    }

    #[test]
    fn loads_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "particle_count: 1000\nresistance: 0.9").unwrap();

        let config = RawConfig::from_yaml_file(file.path())
            .unwrap()
            .resolve(DeviceClass::Desktop);
        assert_eq!(config.particle_count, 1000);
        assert_eq!(config.resistance, 0.9);
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let err = RawConfig::from_yaml_str("particle_count: [1, 2").unwrap_err();
        assert!(err.is_initialization());
    }

    #[test]
    fn frame_interval_from_fps() {
        let config = SimConfig {
            fps: 50,
            ..SimConfig::default()
        };
        assert_eq!(config.frame_interval_ms(), 20.0);
    }
}
