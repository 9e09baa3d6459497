use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_project_id")]
    pub project_id: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub dedup: DedupConfig,

    #[serde(default)]
    pub notices: NoticeConfig,
}

fn default_project_id() -> String {
    "default".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            project_id: default_project_id(),
            logging: LoggingConfig::default(),
            backend: BackendConfig::default(),
            polling: PollingConfig::default(),
            dedup: DedupConfig::default(),
            notices: NoticeConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.polling.interval_ms == 0 {
            anyhow::bail!("polling.interval_ms must be at least 1");
        }
        if self.polling.max_consecutive_failures == 0 {
            anyhow::bail!("polling.max_consecutive_failures must be at least 1");
        }
        let t = self.dedup.threshold;
        if !t.is_finite() || !(0.0..=1.0).contains(&t) {
            anyhow::bail!("dedup.threshold must be within [0, 1], got {t}");
        }
        if self.backend.base_url.trim().is_empty() {
            anyhow::bail!("backend.base_url must not be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "qualcode_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: false,
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000/api".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Consecutive failed polls after which the session is torn down.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

fn default_interval_ms() -> u64 {
    2_000
}

fn default_max_consecutive_failures() -> u32 {
    3
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn failure_cap(&self) -> u32 {
        self.max_consecutive_failures.max(1)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

fn default_threshold() -> f32 {
    0.85
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticeConfig {
    /// How many error notices the tray keeps visible.
    #[serde(default = "default_max_visible")]
    pub max_visible: usize,
}

fn default_max_visible() -> usize {
    3
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            max_visible: default_max_visible(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.polling.interval_ms, 2_000);
        assert_eq!(cfg.polling.max_consecutive_failures, 3);
        assert_eq!(cfg.dedup.threshold, 0.85);
        assert_eq!(cfg.notices.max_visible, 3);
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [backend]
            base_url = "https://codes.example.org/api/"

            [polling]
            interval_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(cfg.backend.base_url, "https://codes.example.org/api/");
        assert_eq!(cfg.backend.timeout_ms, 30_000);
        assert_eq!(cfg.polling.interval_ms, 500);
        assert_eq!(cfg.polling.max_consecutive_failures, 3);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = AppConfig::default();
        cfg.dedup.threshold = 1.2;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.polling.max_consecutive_failures = 0;
        assert!(cfg.validate().is_err());
    }
}
