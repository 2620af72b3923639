use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::Serialize;

pub const PYTHON_ENV: &str = "DLCGUI_PYTHON";
pub const PROJECT_CONFIG_ENV: &str = "DLCGUI_PROJECT_CONFIG";
pub const ASSETS_ENV: &str = "DLCGUI_ASSETS";
pub const DEFAULT_PYTHON: &str = "python3";

pub fn env_value(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn python_executable() -> String {
    env_value(PYTHON_ENV, DEFAULT_PYTHON)
}

pub fn data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".local/share/dlcgui")
    } else {
        PathBuf::from("/tmp/dlcgui")
    }
}

pub fn state_dir() -> PathBuf {
    data_dir().join("state")
}

pub fn state_file_path(file_name: &str) -> PathBuf {
    state_dir().join(file_name)
}

pub fn expand_user(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            let rest = path.strip_prefix("~/").unwrap_or("");
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

pub fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        name: &'static str,
        count: u32,
    }

    #[test]
    fn expand_user_leaves_plain_paths_alone() {
        assert_eq!(expand_user("/data/config.yaml"), PathBuf::from("/data/config.yaml"));
        assert_eq!(expand_user("relative/config.yaml"), PathBuf::from("relative/config.yaml"));
    }

    #[test]
    fn expand_user_resolves_home_prefix() {
        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(expand_user("~/proj/config.yaml"), PathBuf::from(&home).join("proj/config.yaml"));
            assert_eq!(expand_user("~"), PathBuf::from(home));
        }
    }

    #[test]
    fn write_json_atomic_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        write_json_atomic(&path, &Sample { name: "shuffle", count: 3 }).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["name"], "shuffle");
        assert_eq!(value["count"], 3);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
