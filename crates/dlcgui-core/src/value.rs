use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// Semantic type of a form field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Choice,
    Int,
    Bool,
    Path,
    PathSet,
    Subset,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::Choice => "choice",
            ParamKind::Int => "int",
            ParamKind::Bool => "bool",
            ParamKind::Path => "path",
            ParamKind::PathSet => "path-set",
            ParamKind::Subset => "subset",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insertion-ordered set of paths. Adding a path that is already present is a
/// no-op, and existing entries never move.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PathBuf>", into = "Vec<PathBuf>")]
pub struct PathSet {
    paths: Vec<PathBuf>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.contains(&path) {
            return false;
        }
        self.paths.push(path);
        true
    }

    /// Returns how many paths were actually added.
    pub fn extend<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        paths
            .into_iter()
            .map(|path| self.insert(path))
            .filter(|added| *added)
            .count()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|existing| existing == path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.paths.iter()
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for PathSet {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        let mut set = PathSet::new();
        set.extend(iter);
        set
    }
}

impl From<Vec<PathBuf>> for PathSet {
    fn from(paths: Vec<PathBuf>) -> Self {
        paths.into_iter().collect()
    }
}

impl From<PathSet> for Vec<PathBuf> {
    fn from(set: PathSet) -> Self {
        set.paths
    }
}

/// Current value of a form field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Choice(String),
    Int(i64),
    Bool(bool),
    Path(PathBuf),
    PathSet(PathSet),
    Subset(Vec<String>),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Choice(_) => ParamKind::Choice,
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::Path(_) => ParamKind::Path,
            ParamValue::PathSet(_) => ParamKind::PathSet,
            ParamValue::Subset(_) => ParamKind::Subset,
        }
    }

    pub fn as_choice(&self) -> Option<&str> {
        match self {
            ParamValue::Choice(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            ParamValue::Path(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_path_set(&self) -> Option<&PathSet> {
        match self {
            ParamValue::PathSet(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_subset(&self) -> Option<&[String]> {
        match self {
            ParamValue::Subset(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Choice(value) => f.write_str(value),
            ParamValue::Int(value) => write!(f, "{value}"),
            ParamValue::Bool(true) => f.write_str("Yes"),
            ParamValue::Bool(false) => f.write_str("No"),
            ParamValue::Path(value) => write!(f, "{}", value.display()),
            ParamValue::PathSet(set) => {
                let items: Vec<String> =
                    set.iter().map(|path| path.display().to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            ParamValue::Subset(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_set_drops_duplicates_and_keeps_order() {
        let set: PathSet = ["a.avi", "a.avi", "b.avi"].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.as_slice(),
            &[PathBuf::from("a.avi"), PathBuf::from("b.avi")]
        );
    }

    #[test]
    fn path_set_extend_reports_new_entries_only() {
        let mut set: PathSet = ["b.avi"].into_iter().collect();
        let added = set.extend(["c.avi", "b.avi", "a.avi"]);
        assert_eq!(added, 2);
        let order: Vec<_> = set.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        assert_eq!(order, vec!["b.avi", "c.avi", "a.avi"]);
    }

    #[test]
    fn path_set_deserialization_deduplicates() {
        let set: PathSet = serde_json::from_str(r#"["x.mp4", "y.mp4", "x.mp4"]"#).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn param_value_serializes_with_kind_tag() {
        let json = serde_json::to_value(ParamValue::Int(5)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "int", "value": 5}));
        let back: ParamValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, ParamValue::Int(5));
    }

    #[test]
    fn bool_values_display_as_yes_no() {
        assert_eq!(ParamValue::Bool(true).to_string(), "Yes");
        assert_eq!(ParamValue::Bool(false).to_string(), "No");
    }
}
