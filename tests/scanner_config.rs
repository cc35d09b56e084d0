use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use identity_scanner::config::ScannerConfig;
use identity_scanner::{FacingMode, KeyProfile};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "IDSCAN_CONFIG",
        "IDSCAN_DETECT_INTERVAL_MS",
        "IDSCAN_DUPLICATE_WINDOW_MS",
        "IDSCAN_MAX_SCAN_WIDTH",
        "IDSCAN_KEY_PROFILE",
        "IDSCAN_SNAPSHOT_PATH",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "detect_interval_ms": 250,
        "duplicate_window_ms": 2000,
        "max_scan_width": 480,
        "key_profile": "identity",
        "snapshot_path": "records_file.db",
        "camera": {
            "facing_mode": "user",
            "ideal_width": 1920,
            "ideal_height": 1080
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("IDSCAN_CONFIG", file.path());
    std::env::set_var("IDSCAN_KEY_PROFILE", "contact");
    std::env::set_var("IDSCAN_SNAPSHOT_PATH", "records_env.db");
    std::env::set_var("IDSCAN_DUPLICATE_WINDOW_MS", "900");

    let cfg = ScannerConfig::load().expect("load config");
    assert_eq!(cfg.detect_interval_ms, 250);
    assert_eq!(cfg.duplicate_window_ms, 900);
    assert_eq!(cfg.max_scan_width, 480);
    assert_eq!(cfg.key_profile, KeyProfile::Contact);
    assert_eq!(cfg.snapshot_path, Some(PathBuf::from("records_env.db")));
    assert_eq!(cfg.camera.facing_mode, FacingMode::User);
    assert_eq!(cfg.camera.ideal_width, 1920);
    assert!(!cfg.camera.audio);

    let settings = cfg.scanner_settings();
    assert_eq!(settings.detect_interval_ms, 250);
    assert_eq!(settings.max_scan_width, 480);

    clear_env();
}

#[test]
fn defaults_without_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ScannerConfig::load().expect("load config");
    assert_eq!(cfg.detect_interval_ms, 200);
    assert_eq!(cfg.duplicate_window_ms, 1200);
    assert_eq!(cfg.max_scan_width, 640);
    assert_eq!(cfg.key_profile, KeyProfile::Identity);
    assert_eq!(cfg.camera.facing_mode, FacingMode::Environment);
    assert_eq!((cfg.camera.ideal_width, cfg.camera.ideal_height), (1280, 720));
    assert!(cfg.snapshot_path.is_none());
}

#[test]
fn rejects_invalid_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("IDSCAN_DETECT_INTERVAL_MS", "fast");
    assert!(ScannerConfig::load().is_err());
    clear_env();

    std::env::set_var("IDSCAN_DETECT_INTERVAL_MS", "0");
    assert!(ScannerConfig::load().is_err());
    clear_env();

    std::env::set_var("IDSCAN_KEY_PROFILE", "badge");
    assert!(ScannerConfig::load().is_err());
    clear_env();
}

#[test]
fn rejects_malformed_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ not json").expect("write config");
    std::env::set_var("IDSCAN_CONFIG", file.path());
    let err = ScannerConfig::load().unwrap_err();
    assert!(err.to_string().contains("invalid config file"));

    clear_env();
}
