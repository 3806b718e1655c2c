//! Worker configuration.
//!
//! Queue, API and storage settings are read by their own crates; this holds
//! what the render pipeline itself needs.

use std::path::PathBuf;

use reel_media::DEFAULT_WATERMARK_TEXT;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root for locally stored media and local exports
    pub uploads_dir: PathBuf,
    /// Parent directory for per-job workspaces
    pub work_dir: PathBuf,
    /// Kill an encoder invocation after this many seconds
    pub encoder_timeout_secs: Option<u64>,
    /// Fail the job when an intermediate progress update cannot be delivered
    pub strict_progress_reporting: bool,
    /// Overlay text for watermarked exports
    pub watermark_text: String,
    /// Font for the overlay; FFmpeg's default when unset
    pub watermark_font_file: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("./uploads"),
            work_dir: std::env::temp_dir(),
            encoder_timeout_secs: None,
            strict_progress_reporting: false,
            watermark_text: DEFAULT_WATERMARK_TEXT.to_string(),
            watermark_font_file: None,
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn env_flag(key: &str) -> bool {
    env_opt(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            uploads_dir: env_opt("UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.uploads_dir),
            work_dir: env_opt("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            encoder_timeout_secs: env_opt("ENCODER_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0),
            strict_progress_reporting: env_flag("STRICT_PROGRESS_REPORTING"),
            watermark_text: env_opt("WATERMARK_TEXT").unwrap_or(defaults.watermark_text),
            watermark_font_file: env_opt("WATERMARK_FONT_FILE").map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: [&str; 6] = [
        "UPLOADS_DIR",
        "WORKER_WORK_DIR",
        "ENCODER_TIMEOUT_SECS",
        "STRICT_PROGRESS_REPORTING",
        "WATERMARK_TEXT",
        "WATERMARK_FONT_FILE",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = WorkerConfig::from_env();
        assert_eq!(config.uploads_dir, PathBuf::from("./uploads"));
        assert_eq!(config.work_dir, std::env::temp_dir());
        assert_eq!(config.encoder_timeout_secs, None);
        assert!(!config.strict_progress_reporting);
        assert_eq!(config.watermark_text, "Made with Reel");
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        std::env::set_var("UPLOADS_DIR", "/srv/uploads");
        std::env::set_var("ENCODER_TIMEOUT_SECS", "900");
        std::env::set_var("STRICT_PROGRESS_REPORTING", "TRUE");
        std::env::set_var("WATERMARK_TEXT", "Reel Free");

        let config = WorkerConfig::from_env();
        assert_eq!(config.uploads_dir, PathBuf::from("/srv/uploads"));
        assert_eq!(config.encoder_timeout_secs, Some(900));
        assert!(config.strict_progress_reporting);
        assert_eq!(config.watermark_text, "Reel Free");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_timeout_is_ignored() {
        clear_env();
        std::env::set_var("ENCODER_TIMEOUT_SECS", "soon");
        assert_eq!(WorkerConfig::from_env().encoder_timeout_secs, None);
        std::env::set_var("ENCODER_TIMEOUT_SECS", "0");
        assert_eq!(WorkerConfig::from_env().encoder_timeout_secs, None);
        clear_env();
    }
}
