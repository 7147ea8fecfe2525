use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::identify::FailurePolicy;
use crate::oracle::DEFAULT_BACKEND;
use crate::signature::params::SignatureParams;

const CONFIG_FILE: &str = "sonid.toml";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub signature: SignatureParams,
    #[serde(default)]
    pub identify: IdentifyConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize)]
pub struct IdentifyConfig {
    #[serde(default = "default_compressor")]
    pub compressor: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub on_failure: FailurePolicy,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_dir")]
    pub dir: PathBuf,
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            compressor: default_compressor(),
            top_k: default_top_k(),
            on_failure: FailurePolicy::default(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dir: default_database_dir(),
        }
    }
}

fn default_compressor() -> String { DEFAULT_BACKEND.into() }
fn default_top_k() -> usize { 5 }
fn default_timeout_secs() -> u64 { 30 }
fn default_retries() -> u32 { 2 }
fn default_database_dir() -> PathBuf { PathBuf::from("database") }

/// Explicit path, else `./sonid.toml`, else the per-user config locations.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("sonid").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("sonid").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            log::warn!("Cannot read {}: {}", path.display(), err);
            return None;
        }
    };
    parse_config(&content)
        .map_err(|err| log::warn!("Cannot parse {}: {}", path.display(), err))
        .ok()
}

pub fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.signature, SignatureParams::default());
        assert_eq!(cfg.identify.compressor, DEFAULT_BACKEND);
        assert_eq!(cfg.identify.top_k, 5);
        assert_eq!(cfg.identify.on_failure, FailurePolicy::Skip);
        assert_eq!(cfg.database.dir, PathBuf::from("database"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = parse_config(
            r#"
            [signature]
            window_size = 2048
            num_freqs = 8

            [identify]
            compressor = "xz"
            on_failure = "abort"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.signature.window_size, 2048);
        assert_eq!(cfg.signature.num_freqs, 8);
        assert_eq!(cfg.signature.shift, 256);
        assert_eq!(cfg.identify.compressor, "xz");
        assert_eq!(cfg.identify.on_failure, FailurePolicy::Abort);
        assert_eq!(cfg.identify.retries, 2);
    }

    #[test]
    fn malformed_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sonid.toml");
        std::fs::write(&path, "[identify]\ntop_k = \"many\"\n").unwrap();
        assert!(load_config(&path).is_none());
    }

    #[test]
    fn explicit_path_wins() {
        let path = Path::new("/somewhere/custom.toml");
        assert_eq!(find_config(Some(path)), Some(path.to_path_buf()));
    }
}
