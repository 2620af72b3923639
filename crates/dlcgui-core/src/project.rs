use std::{
    fs,
    path::{Path, PathBuf},
};

use serde_yaml::{Mapping, Value};

use crate::error::ProjectConfigError;

/// Crop window read from the project config.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropBounds {
    pub x1: i64,
    pub x2: i64,
    pub y1: i64,
    pub y2: i64,
}

/// Read-only view of a project's `config.yaml`. Missing keys fall back to
/// built-in defaults; nothing here is ever written back.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectConfig {
    path: PathBuf,
    doc: Mapping,
}

impl ProjectConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectConfigError> {
        let path = path.as_ref().to_path_buf();
        let text = fs::read_to_string(&path).map_err(|source| ProjectConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_yaml_str(path, &text)
    }

    pub fn from_yaml_str(path: impl Into<PathBuf>, text: &str) -> Result<Self, ProjectConfigError> {
        let path = path.into();
        let value: Value = serde_yaml::from_str(text).map_err(|source| ProjectConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        match value {
            Value::Mapping(doc) => Ok(Self { path, doc }),
            // An empty file parses as null.
            Value::Null => Ok(Self::empty(path)),
            _ => Err(ProjectConfigError::NotAMapping { path }),
        }
    }

    /// A config with no keys, used before a project is chosen.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            doc: Mapping::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn task(&self) -> Option<&str> {
        self.string("Task")
    }

    pub fn scorer(&self) -> Option<&str> {
        self.string("scorer")
    }

    pub fn project_path(&self) -> Option<PathBuf> {
        self.string("project_path").map(PathBuf::from)
    }

    pub fn is_multi_animal(&self) -> bool {
        self.flag("multianimalproject").unwrap_or(false)
    }

    /// Bodyparts of the project; multi-animal projects list them under
    /// `multianimalbodyparts`.
    pub fn bodyparts(&self) -> Vec<String> {
        let key = if self.is_multi_animal() {
            "multianimalbodyparts"
        } else {
            "bodyparts"
        };
        match self.doc.get(key) {
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `Some` when cropping is enabled; every bound must then be present.
    pub fn cropping(&self) -> Result<Option<CropBounds>, String> {
        if !self.flag("cropping").unwrap_or(false) {
            return Ok(None);
        }
        let bound = |key: &str| {
            self.int(key)
                .ok_or_else(|| format!("cropping is enabled but `{key}` is missing"))
        };
        Ok(Some(CropBounds {
            x1: bound("x1")?,
            x2: bound("x2")?,
            y1: bound("y1")?,
            y2: bound("y2")?,
        }))
    }

    fn string(&self, key: &str) -> Option<&str> {
        self.doc.get(key).and_then(Value::as_str)
    }

    fn int(&self, key: &str) -> Option<i64> {
        match self.doc.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Accepts YAML booleans as well as the `"True"`/`"False"` strings some
    /// project files carry.
    fn flag(&self, key: &str) -> Option<bool> {
        match self.doc.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim() {
                "True" | "true" => Some(true),
                "False" | "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SINGLE: &str = r#"
Task: reaching
scorer: alex
project_path: /data/reaching-alex-2024-01-01
multianimalproject: false
bodyparts:
  - hand
  - finger1
  - joystick
cropping: 'False'
x1: 0
x2: 640
y1: 277
y2: 624
"#;

    #[test]
    fn reads_single_animal_keys() {
        let cfg = ProjectConfig::from_yaml_str("/p/config.yaml", SINGLE).unwrap();
        assert_eq!(cfg.task(), Some("reaching"));
        assert_eq!(cfg.scorer(), Some("alex"));
        assert!(!cfg.is_multi_animal());
        assert_eq!(cfg.bodyparts(), vec!["hand", "finger1", "joystick"]);
        assert_eq!(cfg.cropping().unwrap(), None);
    }

    #[test]
    fn cropping_accepts_string_true() {
        let text = SINGLE.replace("cropping: 'False'", "cropping: 'True'");
        let cfg = ProjectConfig::from_yaml_str("/p/config.yaml", &text).unwrap();
        assert_eq!(
            cfg.cropping().unwrap(),
            Some(CropBounds {
                x1: 0,
                x2: 640,
                y1: 277,
                y2: 624
            })
        );
    }

    #[test]
    fn cropping_without_bounds_is_an_error() {
        let cfg = ProjectConfig::from_yaml_str("/p/config.yaml", "cropping: true\nx1: 3\n").unwrap();
        let err = cfg.cropping().unwrap_err();
        assert!(err.contains("x2"));
    }

    #[test]
    fn multi_animal_uses_its_own_bodyparts() {
        let text = "multianimalproject: true\nbodyparts: MULTI!\nmultianimalbodyparts: [snout, tailbase]\n";
        let cfg = ProjectConfig::from_yaml_str("/p/config.yaml", text).unwrap();
        assert!(cfg.is_multi_animal());
        assert_eq!(cfg.bodyparts(), vec!["snout", "tailbase"]);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let cfg = ProjectConfig::from_yaml_str("/p/config.yaml", "").unwrap();
        assert_eq!(cfg.scorer(), None);
        assert!(!cfg.is_multi_animal());
        assert!(cfg.bodyparts().is_empty());
        assert_eq!(cfg.cropping().unwrap(), None);
    }

    #[test]
    fn top_level_list_is_rejected() {
        let err = ProjectConfig::from_yaml_str("/p/config.yaml", "- a\n- b\n").unwrap_err();
        assert!(matches!(err, ProjectConfigError::NotAMapping { .. }));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SINGLE.as_bytes()).unwrap();
        let cfg = ProjectConfig::load(file.path()).unwrap();
        assert_eq!(cfg.path(), file.path());
        assert_eq!(cfg.task(), Some("reaching"));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProjectConfig::load(dir.path().join("config.yaml")).unwrap_err();
        assert!(matches!(err, ProjectConfigError::Read { .. }));
    }
}
