use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Get the default qualcode data directory: $QUALCODE_HOME or ~/.qualcode
pub fn get_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(v) = std::env::var("QUALCODE_HOME") {
        if !v.trim().is_empty() {
            return Ok(PathBuf::from(v));
        }
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".qualcode"))
}

pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("read {} failed: {}", path.display(), e))?;
    let cfg = toml::from_str::<AppConfig>(&s)
        .map_err(|e| anyhow::anyhow!("parse {} failed: {}", path.display(), e))?;
    Ok(cfg)
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.qualcode/config.toml
    let data_config = get_data_dir()?.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let cfg = if data_config.exists() {
        load_from_path(&data_config)?
    } else if local_config.exists() {
        load_from_path(local_config)?
    } else {
        AppConfig::default()
    };

    finish(cfg)
}

/// Loads `path` when given, otherwise the default search order.
pub fn load(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(p) => finish(load_from_path(p)?),
        None => load_default(),
    }
}

fn finish(mut cfg: AppConfig) -> anyhow::Result<AppConfig> {
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

// Environment variable overrides (Priority 0: highest)
fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Ok(v) = std::env::var("QUALCODE_API_URL") {
        if !v.trim().is_empty() {
            cfg.backend.base_url = v;
        }
    }
    if let Ok(v) = std::env::var("QUALCODE_API_KEY") {
        if !v.trim().is_empty() {
            cfg.backend.api_key = v;
        }
    }
    if let Ok(v) = std::env::var("QUALCODE_POLL_INTERVAL_MS") {
        match v.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => cfg.polling.interval_ms = ms,
            _ => tracing::warn!(value = %v, "ignoring invalid QUALCODE_POLL_INTERVAL_MS"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_from_path_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "project_id = \"tesis\"\n[dedup]\nthreshold = 0.9\n[notices]\nmax_visible = 5"
        )
        .unwrap();
        let cfg = load_from_path(file.path()).unwrap();
        assert_eq!(cfg.project_id, "tesis");
        assert_eq!(cfg.dedup.threshold, 0.9);
        assert_eq!(cfg.notices.max_visible, 5);
    }

    #[test]
    fn load_from_path_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[polling\ninterval_ms = 1").unwrap();
        let err = load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    fn load_rejects_invalid_values_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[polling]\nmax_consecutive_failures = 0").unwrap();
        assert!(load(Some(file.path())).is_err());
    }
}
