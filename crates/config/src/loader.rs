//! Config discovery and parsing.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::expand_env, schema::PhonotekConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "phonotek.toml",
    "phonotek.yaml",
    "phonotek.yml",
    "phonotek.json",
];

/// Load config from an explicit path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<PhonotekConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    parse_config(&expand_env(&raw), path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./phonotek.{toml,yaml,yml,json}` (working directory)
/// 2. `~/.config/phonotek/phonotek.{toml,yaml,yml,json}`
///
/// Missing or unreadable files fall back to `PhonotekConfig::default()`.
pub fn discover_and_load() -> PhonotekConfig {
    let Some(path) = find_config_file() else {
        debug!("no config file found, using defaults");
        return PhonotekConfig::default();
    };
    debug!(path = %path.display(), "loading config");
    match load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            PhonotekConfig::default()
        },
    }
}

fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    if let Some(dir) = config_dir() {
        for name in CONFIG_FILENAMES {
            let p = dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// `~/.config/phonotek/` on all platforms.
pub fn config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().join(".config").join("phonotek"))
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<PhonotekConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    #![allow(unsafe_code)]

    use super::*;

    #[test]
    fn loads_toml_with_env_expansion() {
        unsafe { std::env::set_var("PHONOTEK_LOADER_KEY", "from-env") };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phonotek.toml");
        std::fs::write(
            &path,
            "[platform]\nurl = \"https://example.test\"\nservice_key = \"${PHONOTEK_LOADER_KEY}\"\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.platform.service_key, "from-env");
        assert_eq!(cfg.platform.url, "https://example.test");
        unsafe { std::env::remove_var("PHONOTEK_LOADER_KEY") };
    }

    #[test]
    fn loads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phonotek.yaml");
        std::fs::write(&path, "server:\n  port: 9100\n").unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.server.port, 9100);
    }

    #[test]
    fn loads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phonotek.json");
        std::fs::write(&path, r#"{"embeddings": {"dimensions": 384}}"#).unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.embeddings.dimensions, 384);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_config(Path::new("/nonexistent/phonotek.toml")).is_err());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phonotek.toml");
        std::fs::write(&path, "[server\nport=").unwrap();
        assert!(load_config(&path).is_err());
    }
}
