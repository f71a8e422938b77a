//! Configuration Vault – reads/writes `~/.pathscan/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use pathscan_runtime::DetectorConfig;
use pathscan_types::{Axis, ScanError};

/// Persisted user configuration stored in `~/.pathscan/config.toml`.
///
/// ```toml
/// frame_id = "kinect_frame"
///
/// [detector]
/// voxel_resolution = 64.0
/// axis = "x"
/// cluster_size = 2
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Frame stamped on scans read from plain-text files.
    #[serde(default = "default_frame_id")]
    pub frame_id: String,

    /// Sequence detector settings.
    #[serde(default)]
    pub detector: DetectorConfig,
}

fn default_frame_id() -> String {
    "scan".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame_id: default_frame_id(),
            detector: DetectorConfig::default(),
        }
    }
}

/// Return the path to `~/.pathscan/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".pathscan").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, ScanError> {
    load_from(&config_path())
}

/// Load the config from a specific path, applying env overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, ScanError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| ScanError::Io(format!("failed to read config at {}: {e}", path.display())))?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| ScanError::Parse(format!("failed to parse config: {e}")))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `PATHSCAN_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `PATHSCAN_AXIS` | `detector.axis` |
/// | `PATHSCAN_CLUSTER_SIZE` | `detector.cluster_size` |
/// | `PATHSCAN_VOXEL_RESOLUTION` | `detector.voxel_resolution` |
///
/// Values that do not parse are ignored with a warning.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides_from(cfg, |name| std::env::var(name).ok());
}

/// Override source abstracted so tests need not mutate the environment.
pub(crate) fn apply_overrides_from(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("PATHSCAN_AXIS") {
        match v.parse::<Axis>() {
            Ok(axis) => cfg.detector.axis = axis,
            Err(e) => warn!(error = %e, "ignoring PATHSCAN_AXIS"),
        }
    }
    if let Some(v) = lookup("PATHSCAN_CLUSTER_SIZE") {
        match v.trim().parse::<usize>() {
            Ok(k) => cfg.detector.cluster_size = k,
            Err(e) => warn!(value = %v, error = %e, "ignoring PATHSCAN_CLUSTER_SIZE"),
        }
    }
    if let Some(v) = lookup("PATHSCAN_VOXEL_RESOLUTION") {
        match v.trim().parse::<f32>() {
            Ok(res) => cfg.detector.voxel_resolution = res,
            Err(e) => warn!(value = %v, error = %e, "ignoring PATHSCAN_VOXEL_RESOLUTION"),
        }
    }
}

/// Save the config to disk, creating `~/.pathscan/` if necessary.
pub fn save(cfg: &Config) -> Result<(), ScanError> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), ScanError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ScanError::Io(format!("failed to create config directory: {e}")))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| ScanError::Parse(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| ScanError::Io(format!("failed to write config at {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn config_path_points_to_pathscan_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".pathscan"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let mut cfg = Config::default();
        cfg.frame_id = "kinect_frame".to_string();
        cfg.detector.cluster_size = 4;
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.frame_id, "kinect_frame");
        assert_eq!(loaded.detector.cluster_size, 4);
        assert_eq!(loaded.detector.voxel_resolution, 64.0);
    }

    #[test]
    fn save_creates_missing_directories_and_overwrites() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("nested").join("deeper").join("config.toml");

        let mut cfg = Config::default();
        cfg.detector.axis = Axis::Z;
        save_to(&cfg, &path).expect("first save");

        cfg.detector.axis = Axis::Y;
        save_to(&cfg, &path).expect("second save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.detector.axis, Axis::Y);
    }

    #[test]
    fn save_into_a_file_path_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "x").expect("write");

        let err = save_to(&Config::default(), &blocker.join("config.toml")).unwrap_err();
        assert!(matches!(err, ScanError::Io(_)), "{err}");
    }

    #[test]
    fn missing_sections_use_defaults() {
        let cfg: Config = toml::from_str("[detector]\naxis = \"y\"\n").expect("parse");
        assert_eq!(cfg.frame_id, "scan");
        assert_eq!(cfg.detector.axis, Axis::Y);
        assert_eq!(cfg.detector.cluster_size, 2);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "detector = [").expect("write");
        assert!(matches!(load_from(&path), Err(ScanError::Parse(_))));
    }

    #[test]
    fn overrides_replace_detector_fields() {
        let mut cfg = Config::default();
        apply_overrides_from(
            &mut cfg,
            lookup(&[
                ("PATHSCAN_AXIS", "Z"),
                ("PATHSCAN_CLUSTER_SIZE", "3"),
                ("PATHSCAN_VOXEL_RESOLUTION", "0.25"),
            ]),
        );
        assert_eq!(cfg.detector.axis, Axis::Z);
        assert_eq!(cfg.detector.cluster_size, 3);
        assert_eq!(cfg.detector.voxel_resolution, 0.25);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut cfg = Config::default();
        apply_overrides_from(
            &mut cfg,
            lookup(&[
                ("PATHSCAN_AXIS", "w"),
                ("PATHSCAN_CLUSTER_SIZE", "many"),
                ("PATHSCAN_VOXEL_RESOLUTION", "fine"),
            ]),
        );
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn override_can_produce_an_invalid_config_caught_by_validate() {
        let mut cfg = Config::default();
        apply_overrides_from(&mut cfg, lookup(&[("PATHSCAN_CLUSTER_SIZE", "0")]));
        assert!(cfg.detector.validate().is_err());
    }
}
