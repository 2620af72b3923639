use std::{fs, io, path::PathBuf};

use dlcgui_util::{
    env_value, python_executable, state_file_path, write_json_atomic, ASSETS_ENV,
    PROJECT_CONFIG_ENV, PYTHON_ENV,
};
use serde::{Deserialize, Serialize};

const UI_CONFIG_FILE: &str = "ui-config.json";
const DEFAULT_ASSETS_DIR: &str = "assets";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) python: String,
    pub(crate) project_config: String,
    pub(crate) assets_dir: String,
    pub(crate) last_page: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            python: python_executable(),
            project_config: env_value(PROJECT_CONFIG_ENV, ""),
            assets_dir: env_value(ASSETS_ENV, DEFAULT_ASSETS_DIR),
            last_page: String::new(),
        }
    }
}

impl AppConfig {
    /// Environment variables win over the saved file.
    pub(crate) fn load() -> Self {
        let mut cfg = AppConfig::default();
        let path = ui_config_path();
        match fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<AppConfig>(&data) {
                Ok(file_cfg) => cfg.merge_file(file_cfg, |key| std::env::var(key).is_ok()),
                Err(err) => {
                    eprintln!("Failed to parse {}: {err}", path.display());
                }
            },
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    eprintln!("Failed to read {}: {err}", path.display());
                }
            }
        }
        cfg
    }

    pub(crate) fn save(&self) -> io::Result<()> {
        write_json_atomic(&ui_config_path(), self)
    }

    pub(crate) fn project_config_path(&self) -> Option<PathBuf> {
        let raw = self.project_config.trim();
        if raw.is_empty() {
            None
        } else {
            Some(dlcgui_util::expand_user(raw))
        }
    }

    fn merge_file(&mut self, file_cfg: AppConfig, env_set: impl Fn(&str) -> bool) {
        if !env_set(PYTHON_ENV) && !file_cfg.python.is_empty() {
            self.python = file_cfg.python;
        }
        if !env_set(PROJECT_CONFIG_ENV) && !file_cfg.project_config.is_empty() {
            self.project_config = file_cfg.project_config;
        }
        if !env_set(ASSETS_ENV) && !file_cfg.assets_dir.is_empty() {
            self.assets_dir = file_cfg.assets_dir;
        }
        self.last_page = file_cfg.last_page;
    }
}

fn ui_config_path() -> PathBuf {
    state_file_path(UI_CONFIG_FILE)
}
