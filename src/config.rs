use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::frame::MAX_SCAN_WIDTH;
use crate::ingest::{CameraRequest, FacingMode};
use crate::record::KeyProfile;
use crate::scanner::{ScannerSettings, DEFAULT_DETECT_INTERVAL_MS};

pub const DEFAULT_DUPLICATE_WINDOW_MS: u64 = 1200;

#[derive(Debug, Deserialize, Default)]
struct ScannerConfigFile {
    detect_interval_ms: Option<u64>,
    duplicate_window_ms: Option<u64>,
    max_scan_width: Option<u32>,
    key_profile: Option<String>,
    snapshot_path: Option<PathBuf>,
    camera: Option<CameraConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    facing_mode: Option<FacingMode>,
    ideal_width: Option<u32>,
    ideal_height: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub detect_interval_ms: u64,
    pub duplicate_window_ms: u64,
    pub max_scan_width: u32,
    pub key_profile: KeyProfile,
    /// SQLite snapshot location. `None` keeps records in memory only.
    pub snapshot_path: Option<PathBuf>,
    pub camera: CameraRequest,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            detect_interval_ms: DEFAULT_DETECT_INTERVAL_MS,
            duplicate_window_ms: DEFAULT_DUPLICATE_WINDOW_MS,
            max_scan_width: MAX_SCAN_WIDTH,
            key_profile: KeyProfile::default(),
            snapshot_path: None,
            camera: CameraRequest::default(),
        }
    }
}

impl ScannerConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("IDSCAN_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ScannerConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let key_profile = match file.key_profile.as_deref() {
            Some(value) => parse_key_profile(value)?,
            None => defaults.key_profile,
        };
        let camera = CameraRequest {
            facing_mode: file
                .camera
                .as_ref()
                .and_then(|camera| camera.facing_mode)
                .unwrap_or(defaults.camera.facing_mode),
            ideal_width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.ideal_width)
                .unwrap_or(defaults.camera.ideal_width),
            ideal_height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.ideal_height)
                .unwrap_or(defaults.camera.ideal_height),
            audio: false,
        };
        Ok(Self {
            detect_interval_ms: file
                .detect_interval_ms
                .unwrap_or(defaults.detect_interval_ms),
            duplicate_window_ms: file
                .duplicate_window_ms
                .unwrap_or(defaults.duplicate_window_ms),
            max_scan_width: file.max_scan_width.unwrap_or(defaults.max_scan_width),
            key_profile,
            snapshot_path: file.snapshot_path,
            camera,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("IDSCAN_DETECT_INTERVAL_MS") {
            self.detect_interval_ms = value.trim().parse().map_err(|_| {
                anyhow!("IDSCAN_DETECT_INTERVAL_MS must be an integer number of milliseconds")
            })?;
        }
        if let Ok(value) = std::env::var("IDSCAN_DUPLICATE_WINDOW_MS") {
            self.duplicate_window_ms = value.trim().parse().map_err(|_| {
                anyhow!("IDSCAN_DUPLICATE_WINDOW_MS must be an integer number of milliseconds")
            })?;
        }
        if let Ok(value) = std::env::var("IDSCAN_MAX_SCAN_WIDTH") {
            self.max_scan_width = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("IDSCAN_MAX_SCAN_WIDTH must be an integer pixel width"))?;
        }
        if let Ok(value) = std::env::var("IDSCAN_KEY_PROFILE") {
            if !value.trim().is_empty() {
                self.key_profile = parse_key_profile(&value)?;
            }
        }
        if let Ok(path) = std::env::var("IDSCAN_SNAPSHOT_PATH") {
            if !path.trim().is_empty() {
                self.snapshot_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.detect_interval_ms == 0 {
            return Err(anyhow!("detect interval must be greater than zero"));
        }
        if self.max_scan_width == 0 {
            return Err(anyhow!("max scan width must be greater than zero"));
        }
        if self.max_scan_width > MAX_SCAN_WIDTH {
            log::warn!(
                "max scan width {} exceeds {}; clamping",
                self.max_scan_width,
                MAX_SCAN_WIDTH
            );
            self.max_scan_width = MAX_SCAN_WIDTH;
        }
        if self.camera.ideal_width == 0 || self.camera.ideal_height == 0 {
            return Err(anyhow!("camera resolution must be non-zero"));
        }
        Ok(())
    }

    /// Frame scanner tuning derived from this config.
    pub fn scanner_settings(&self) -> ScannerSettings {
        ScannerSettings {
            detect_interval_ms: self.detect_interval_ms,
            max_scan_width: self.max_scan_width,
            camera: self.camera.clone(),
        }
    }
}

fn parse_key_profile(value: &str) -> Result<KeyProfile> {
    KeyProfile::parse(value)
        .ok_or_else(|| anyhow!("unknown key profile {:?} (expected identity or contact)", value))
}

fn read_config_file(path: &Path) -> Result<ScannerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let mut cfg = ScannerConfig::from_file(ScannerConfigFile::default()).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.detect_interval_ms, 200);
        assert_eq!(cfg.duplicate_window_ms, 1200);
        assert_eq!(cfg.max_scan_width, 640);
        assert_eq!(cfg.key_profile, KeyProfile::Identity);
        assert_eq!(cfg.camera, CameraRequest::default());
        assert!(cfg.snapshot_path.is_none());
    }

    #[test]
    fn file_values_are_used() {
        let file: ScannerConfigFile = serde_json::from_str(
            r#"{"detect_interval_ms": 350, "key_profile": "contact",
                "camera": {"facing_mode": "user", "ideal_width": 640, "ideal_height": 480}}"#,
        )
        .unwrap();
        let cfg = ScannerConfig::from_file(file).unwrap();
        assert_eq!(cfg.detect_interval_ms, 350);
        assert_eq!(cfg.key_profile, KeyProfile::Contact);
        assert_eq!(cfg.camera.facing_mode, FacingMode::User);
        assert_eq!(cfg.scanner_settings().camera.ideal_height, 480);
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let file = ScannerConfigFile {
            key_profile: Some("badge".to_string()),
            ..Default::default()
        };
        assert!(ScannerConfig::from_file(file).is_err());
    }

    #[test]
    fn validation_rejects_zero_and_clamps_width() {
        let mut cfg = ScannerConfig {
            detect_interval_ms: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let mut cfg = ScannerConfig {
            max_scan_width: 1920,
            ..Default::default()
        };
        cfg.validate().unwrap();
        assert_eq!(cfg.max_scan_width, 640);
    }
}
