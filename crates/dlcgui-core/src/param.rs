use std::path::PathBuf;

use crate::error::ValidationError;
use crate::value::{ParamKind, ParamValue, PathSet};

pub const YES: &str = "Yes";
pub const NO: &str = "No";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Constraint {
    Range { min: i64, max: i64 },
    NonEmpty,
}

/// How a boolean field is presented. Both styles hold a `ParamValue::Bool`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoolStyle {
    /// Two mutually exclusive radio options, `Yes` and `No`.
    #[default]
    YesNo,
    Check,
}

/// A field is enabled only while another field holds the given value.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub field: &'static str,
    pub equals: ParamValue,
}

/// Declaration of one page parameter. Built once when the page is created and
/// never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub label: String,
    pub help: String,
    pub section: &'static str,
    pub kind: ParamKind,
    pub default: ParamValue,
    pub options: Vec<String>,
    pub constraint: Option<Constraint>,
    pub bool_style: BoolStyle,
    pub enabled_when: Option<Condition>,
    pub resets: Vec<&'static str>,
    pub read_only: bool,
}

impl ParameterSpec {
    fn base(name: &'static str, label: &str, kind: ParamKind, default: ParamValue) -> Self {
        Self {
            name,
            label: label.to_string(),
            help: String::new(),
            section: "Attributes",
            kind,
            default,
            options: Vec::new(),
            constraint: None,
            bool_style: BoolStyle::default(),
            enabled_when: None,
            resets: Vec::new(),
            read_only: false,
        }
    }

    pub fn choice<S: AsRef<str>>(
        name: &'static str,
        label: &str,
        options: &[S],
        default: &str,
    ) -> Self {
        let mut spec = Self::base(
            name,
            label,
            ParamKind::Choice,
            ParamValue::Choice(default.to_string()),
        );
        spec.options = options.iter().map(|o| o.as_ref().to_string()).collect();
        spec
    }

    pub fn int(name: &'static str, label: &str, default: i64) -> Self {
        Self::base(name, label, ParamKind::Int, ParamValue::Int(default))
    }

    pub fn yes_no(name: &'static str, label: &str, default: bool) -> Self {
        Self::base(name, label, ParamKind::Bool, ParamValue::Bool(default))
    }

    pub fn check(name: &'static str, label: &str, default: bool) -> Self {
        let mut spec = Self::base(name, label, ParamKind::Bool, ParamValue::Bool(default));
        spec.bool_style = BoolStyle::Check;
        spec
    }

    pub fn path(name: &'static str, label: &str, default: impl Into<PathBuf>) -> Self {
        Self::base(name, label, ParamKind::Path, ParamValue::Path(default.into()))
    }

    pub fn path_set(name: &'static str, label: &str) -> Self {
        Self::base(
            name,
            label,
            ParamKind::PathSet,
            ParamValue::PathSet(PathSet::new()),
        )
    }

    pub fn subset(name: &'static str, label: &str, options: &[String]) -> Self {
        let mut spec = Self::base(
            name,
            label,
            ParamKind::Subset,
            ParamValue::Subset(options.to_vec()),
        );
        spec.options = options.to_vec();
        spec
    }

    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.constraint = Some(Constraint::Range { min, max });
        self
    }

    pub fn required(mut self) -> Self {
        self.constraint = Some(Constraint::NonEmpty);
        self
    }

    pub fn help(mut self, help: &str) -> Self {
        self.help = help.to_string();
        self
    }

    pub fn section(mut self, section: &'static str) -> Self {
        self.section = section;
        self
    }

    pub fn enabled_when(mut self, field: &'static str, equals: ParamValue) -> Self {
        self.enabled_when = Some(Condition { field, equals });
        self
    }

    pub fn resets(mut self, field: &'static str) -> Self {
        self.resets.push(field);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Checks a candidate value against the kind, the options, and the
    /// constraint. Returns the rejection reason.
    pub fn check_value(&self, value: &ParamValue) -> Result<(), String> {
        if value.kind() != self.kind {
            return Err(format!("expected {}, got {}", self.kind, value.kind()));
        }
        match value {
            ParamValue::Choice(choice) => {
                if !self.options.iter().any(|o| o == choice) {
                    return Err(format!(
                        "`{choice}` is not one of: {}",
                        self.options.join(", ")
                    ));
                }
            }
            ParamValue::Int(n) => {
                if let Some(Constraint::Range { min, max }) = &self.constraint {
                    if n < min || n > max {
                        return Err(format!("{n} is outside {min}..={max}"));
                    }
                }
            }
            ParamValue::Bool(_) => {}
            ParamValue::Path(path) => {
                if self.constraint == Some(Constraint::NonEmpty) && path.as_os_str().is_empty() {
                    return Err("no path selected".into());
                }
            }
            ParamValue::PathSet(set) => {
                if self.constraint == Some(Constraint::NonEmpty) && set.is_empty() {
                    return Err("nothing selected".into());
                }
            }
            ParamValue::Subset(items) => {
                if let Some(unknown) = items.iter().find(|item| !self.options.contains(*item)) {
                    return Err(format!("`{unknown}` is not one of: {}", self.options.join(", ")));
                }
                if self.constraint == Some(Constraint::NonEmpty) && items.is_empty() {
                    return Err("nothing selected".into());
                }
            }
        }
        Ok(())
    }

    pub fn validate(&self, value: &ParamValue) -> Result<(), ValidationError> {
        self.check_value(value)
            .map_err(|reason| ValidationError::new(self.name, reason))
    }

    /// Labels of the mutually exclusive options for choice and boolean
    /// fields; empty for every other kind.
    pub fn exclusive_options(&self) -> Vec<String> {
        match self.kind {
            ParamKind::Choice => self.options.clone(),
            ParamKind::Bool => vec![YES.to_string(), NO.to_string()],
            _ => Vec::new(),
        }
    }

    pub fn value_for_option(&self, option: &str) -> Option<ParamValue> {
        match self.kind {
            ParamKind::Choice => self
                .options
                .iter()
                .find(|o| o.as_str() == option)
                .map(|o| ParamValue::Choice(o.clone())),
            ParamKind::Bool => match option {
                YES => Some(ParamValue::Bool(true)),
                NO => Some(ParamValue::Bool(false)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Parses a textual value, as typed on a command line.
    pub fn parse_value(&self, raw: &str) -> Result<ParamValue, ValidationError> {
        let raw = raw.trim();
        let value = match self.kind {
            ParamKind::Choice => ParamValue::Choice(raw.to_string()),
            ParamKind::Int => raw
                .parse::<i64>()
                .map(ParamValue::Int)
                .map_err(|_| ValidationError::new(self.name, format!("`{raw}` is not an integer")))?,
            ParamKind::Bool => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => ParamValue::Bool(true),
                "0" | "false" | "no" | "off" => ParamValue::Bool(false),
                _ => {
                    return Err(ValidationError::new(
                        self.name,
                        format!("`{raw}` is not yes/no"),
                    ))
                }
            },
            ParamKind::Path => ParamValue::Path(PathBuf::from(raw)),
            ParamKind::PathSet => ParamValue::PathSet(split_list(raw).collect()),
            ParamKind::Subset => ParamValue::Subset(split_list(raw).map(str::to_string).collect()),
        };
        self.validate(&value)?;
        Ok(value)
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_rejects_values_outside_bounds() {
        let spec = ParameterSpec::int("shuffle", "Shuffle", 1).range(0, 100);
        assert!(spec.validate(&ParamValue::Int(0)).is_ok());
        assert!(spec.validate(&ParamValue::Int(100)).is_ok());
        let err = spec.validate(&ParamValue::Int(101)).unwrap_err();
        assert_eq!(err.field, "shuffle");
        assert!(spec.validate(&ParamValue::Int(-1)).is_err());
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let spec = ParameterSpec::int("shuffle", "Shuffle", 1);
        let err = spec.validate(&ParamValue::Bool(true)).unwrap_err();
        assert!(err.reason.contains("expected int"));
    }

    #[test]
    fn choice_must_be_a_declared_option() {
        let spec = ParameterSpec::choice("videotype", "Video type", &[".avi", ".mp4"], ".avi");
        assert!(spec.validate(&ParamValue::Choice(".mp4".into())).is_ok());
        assert!(spec.validate(&ParamValue::Choice(".mkv".into())).is_err());
    }

    #[test]
    fn required_path_set_rejects_empty_selection() {
        let spec = ParameterSpec::path_set("videos", "Videos").required();
        assert!(spec.validate(&spec.default).is_err());
        let one: PathSet = ["a.avi"].into_iter().collect();
        assert!(spec.validate(&ParamValue::PathSet(one)).is_ok());
    }

    #[test]
    fn subset_rejects_unknown_items() {
        let parts = vec!["nose".to_string(), "tail".to_string()];
        let spec = ParameterSpec::subset("bodyparts", "Bodyparts", &parts);
        assert!(spec.validate(&ParamValue::Subset(vec!["tail".into()])).is_ok());
        assert!(spec.validate(&ParamValue::Subset(vec!["paw".into()])).is_err());
    }

    #[test]
    fn bool_fields_expose_yes_no_options() {
        let spec = ParameterSpec::yes_no("filter", "Filter predictions", false);
        assert_eq!(spec.exclusive_options(), vec!["Yes", "No"]);
        assert_eq!(spec.value_for_option("Yes"), Some(ParamValue::Bool(true)));
        assert_eq!(spec.value_for_option("Maybe"), None);
    }

    #[test]
    fn parse_value_handles_each_kind() {
        let shuffle = ParameterSpec::int("shuffle", "Shuffle", 1).range(0, 100);
        assert_eq!(shuffle.parse_value(" 3 ").unwrap(), ParamValue::Int(3));
        assert!(shuffle.parse_value("three").is_err());
        assert!(shuffle.parse_value("300").is_err());

        let csv = ParameterSpec::yes_no("save_as_csv", "Save as CSV", false);
        assert_eq!(csv.parse_value("yes").unwrap(), ParamValue::Bool(true));
        assert_eq!(csv.parse_value("off").unwrap(), ParamValue::Bool(false));

        let videos = ParameterSpec::path_set("videos", "Videos");
        let parsed = videos.parse_value("a.avi, b.avi, a.avi").unwrap();
        assert_eq!(parsed.as_path_set().map(PathSet::len), Some(2));
    }
}
