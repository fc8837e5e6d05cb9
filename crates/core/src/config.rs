//! Engine configuration
//!
//! Tolerances, capture options and persistence timing. Configuration can be
//! built programmatically, loaded from `PAGEMARK_*` environment variables or
//! read from a simple `key = value` file.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::selection::HitTestConfig;
use crate::stroke::CaptureOptions;

/// Prefix of every environment variable read by [`EngineConfig::from_env`]
const ENV_PREFIX: &str = "PAGEMARK_";

/// Keys understood by the file and environment loaders
const KEYS: [&str; 11] = [
    "min_shape_size_px",
    "snap_radius_px",
    "stroke_hit_radius_px",
    "shape_hit_padding_px",
    "text_hit_padding_px",
    "smoothing",
    "snap_to_text",
    "autosave_interval_ms",
    "history_limit",
    "stamp_width_px",
    "stamp_height_px",
];

/// Errors that can occur during configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for configuration key {key}")]
    InvalidValue { key: String, value: String },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Annotation engine settings
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Shapes smaller than this on both axes are discarded
    pub min_shape_size_px: f64,
    /// Distance within which the pen snaps to a text line
    pub snap_radius_px: f64,
    pub stroke_hit_radius_px: f64,
    pub shape_hit_padding_px: f64,
    pub text_hit_padding_px: f64,
    pub smoothing: bool,
    pub snap_to_text: bool,
    /// Autosave period; zero disables the autosave thread
    pub autosave_interval: Duration,
    /// Undo frames kept per page
    pub history_limit: usize,
    /// Stamp size in page pixels (width, height)
    pub stamp_size_px: (f64, f64),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_shape_size_px: 5.0,
            snap_radius_px: 15.0,
            stroke_hit_radius_px: 20.0,
            shape_hit_padding_px: 10.0,
            text_hit_padding_px: 10.0,
            smoothing: true,
            snap_to_text: false,
            autosave_interval: Duration::from_secs(30),
            history_limit: DEFAULT_HISTORY_LIMIT,
            stamp_size_px: (160.0, 48.0),
        }
    }
}

impl EngineConfig {
    pub fn with_smoothing(mut self, enabled: bool) -> Self {
        self.smoothing = enabled;
        self
    }

    pub fn with_snap_to_text(mut self, enabled: bool) -> Self {
        self.snap_to_text = enabled;
        self
    }

    pub fn with_autosave_interval(mut self, interval: Duration) -> Self {
        self.autosave_interval = interval;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_min_shape_size_px(mut self, px: f64) -> Self {
        self.min_shape_size_px = px;
        self
    }

    pub fn with_stamp_size_px(mut self, width: f64, height: f64) -> Self {
        self.stamp_size_px = (width, height);
        self
    }

    /// Hit-test tolerances for the select tool
    pub fn hit_test(&self) -> HitTestConfig {
        HitTestConfig {
            stroke_radius: self.stroke_hit_radius_px,
            shape_padding: self.shape_hit_padding_px,
            text_padding: self.text_hit_padding_px,
        }
    }

    /// Options applied to captured stroke points
    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            smoothing: self.smoothing,
            snap_to_text: self.snap_to_text,
            snap_radius_px: self.snap_radius_px,
        }
    }

    /// Load configuration from environment variables
    ///
    /// Each key maps to `PAGEMARK_<KEY>`, e.g. `PAGEMARK_SNAP_TO_TEXT=true`.
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for key in KEYS {
            let var = format!("{ENV_PREFIX}{}", key.to_uppercase());
            if let Ok(value) = std::env::var(&var) {
                config.apply(key, &value)?;
            }
        }

        Ok(config)
    }

    /// Load configuration from a `key = value` file
    ///
    /// Blank lines and `#` comments are skipped, unknown keys are ignored.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::parse(&contents)
    }

    /// Write configuration in the format read by [`EngineConfig::from_file`]
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_file_string())?;
        Ok(())
    }

    fn parse(contents: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if KEYS.contains(&key) {
                    config.apply(key, value.trim().trim_matches('"'))?;
                }
            }
        }

        Ok(config)
    }

    fn to_file_string(&self) -> String {
        format!(
            "# pagemark engine configuration\n\
             min_shape_size_px = {}\n\
             snap_radius_px = {}\n\
             stroke_hit_radius_px = {}\n\
             shape_hit_padding_px = {}\n\
             text_hit_padding_px = {}\n\
             smoothing = {}\n\
             snap_to_text = {}\n\
             autosave_interval_ms = {}\n\
             history_limit = {}\n\
             stamp_width_px = {}\n\
             stamp_height_px = {}\n",
            self.min_shape_size_px,
            self.snap_radius_px,
            self.stroke_hit_radius_px,
            self.shape_hit_padding_px,
            self.text_hit_padding_px,
            self.smoothing,
            self.snap_to_text,
            self.autosave_interval.as_millis(),
            self.history_limit,
            self.stamp_size_px.0,
            self.stamp_size_px.1,
        )
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "min_shape_size_px" => self.min_shape_size_px = parse_px(key, value)?,
            "snap_radius_px" => self.snap_radius_px = parse_px(key, value)?,
            "stroke_hit_radius_px" => self.stroke_hit_radius_px = parse_px(key, value)?,
            "shape_hit_padding_px" => self.shape_hit_padding_px = parse_px(key, value)?,
            "text_hit_padding_px" => self.text_hit_padding_px = parse_px(key, value)?,
            "smoothing" => self.smoothing = parse_value(key, value)?,
            "snap_to_text" => self.snap_to_text = parse_value(key, value)?,
            "autosave_interval_ms" => {
                self.autosave_interval = Duration::from_millis(parse_value(key, value)?);
            }
            "history_limit" => self.history_limit = parse_value(key, value)?,
            "stamp_width_px" => self.stamp_size_px.0 = parse_px(key, value)?,
            "stamp_height_px" => self.stamp_size_px.1 = parse_px(key, value)?,
            _ => {}
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| invalid(key, value))
}

/// Non-negative finite pixel distance
fn parse_px(key: &str, value: &str) -> Result<f64, ConfigError> {
    let px: f64 = parse_value(key, value)?;
    if !px.is_finite() || px < 0.0 {
        return Err(invalid(key, value));
    }
    Ok(px)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    // Helper to save and restore environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.min_shape_size_px, 5.0);
        assert_eq!(config.snap_radius_px, 15.0);
        assert_eq!(config.hit_test(), HitTestConfig::default());
        assert_eq!(config.capture_options(), CaptureOptions::default());
        assert_eq!(config.autosave_interval, Duration::from_secs(30));
        assert_eq!(config.history_limit, 200);
    }

    #[test]
    fn test_builder_methods() {
        let config = EngineConfig::default()
            .with_smoothing(false)
            .with_snap_to_text(true)
            .with_history_limit(10)
            .with_stamp_size_px(100.0, 30.0);
        assert!(!config.capture_options().smoothing);
        assert!(config.capture_options().snap_to_text);
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.stamp_size_px, (100.0, 30.0));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::new(&["PAGEMARK_SNAP_TO_TEXT", "PAGEMARK_AUTOSAVE_INTERVAL_MS", "PAGEMARK_SNAP_RADIUS_PX"]);

        env::set_var("PAGEMARK_SNAP_TO_TEXT", "true");
        env::set_var("PAGEMARK_AUTOSAVE_INTERVAL_MS", "5000");
        env::remove_var("PAGEMARK_SNAP_RADIUS_PX");

        let config = EngineConfig::from_env().unwrap();
        assert!(config.snap_to_text);
        assert_eq!(config.autosave_interval, Duration::from_secs(5));
        assert_eq!(config.snap_radius_px, 15.0);
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(&["PAGEMARK_MIN_SHAPE_SIZE_PX"]);

        env::set_var("PAGEMARK_MIN_SHAPE_SIZE_PX", "-3");
        let result = EngineConfig::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_parse_partial() {
        let config = EngineConfig::parse(
            r#"
            # comment
            history_limit = 50
            smoothing = false
            unknown_key = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.history_limit, 50);
        assert!(!config.smoothing);
        assert_eq!(config.min_shape_size_px, 5.0);
    }

    #[test]
    fn test_file_save_and_load() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("pagemark.conf");

        let config = EngineConfig::default()
            .with_snap_to_text(true)
            .with_autosave_interval(Duration::from_millis(1500))
            .with_min_shape_size_px(7.5);
        config.save_to_file(&path).unwrap();

        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
