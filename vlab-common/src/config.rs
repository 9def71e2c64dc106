//! Configuration loading and data folder resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Name of the SQLite database file inside the data folder
pub const DATABASE_FILE: &str = "vlab.db";

/// Resolve the data folder in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file (`data_dir` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_dir(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = find_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(data_dir) = config.get("data_dir").and_then(|v| v.as_str()) {
                    return PathBuf::from(data_dir);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_data_dir()
}

/// Locate the platform config file (`vlab/config.toml`)
fn find_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("vlab").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/vlab/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default data folder
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("vlab"))
        .unwrap_or_else(|| PathBuf::from("./vlab_data"))
}

/// Ensure the data folder exists and return the database path inside it
pub fn prepare_data_dir(data_dir: &PathBuf) -> Result<PathBuf> {
    std::fs::create_dir_all(data_dir)?;
    Ok(data_dir.join(DATABASE_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_arg_wins() {
        let dir = resolve_data_dir(Some("/tmp/vlab-cli"), "VLAB_TEST_UNSET_VAR");
        assert_eq!(dir, PathBuf::from("/tmp/vlab-cli"));
    }

    #[test]
    fn test_env_var_used_when_no_cli_arg() {
        std::env::set_var("VLAB_TEST_DATA_DIR", "/tmp/vlab-env");
        let dir = resolve_data_dir(None, "VLAB_TEST_DATA_DIR");
        assert_eq!(dir, PathBuf::from("/tmp/vlab-env"));
        std::env::remove_var("VLAB_TEST_DATA_DIR");
    }

    #[test]
    fn test_prepare_creates_dir() {
        let base = std::env::temp_dir().join(format!("vlab-test-{}", std::process::id()));
        let db_path = prepare_data_dir(&base).unwrap();
        assert!(base.exists());
        assert!(db_path.ends_with(DATABASE_FILE));
        let _ = std::fs::remove_dir_all(&base);
    }
}
