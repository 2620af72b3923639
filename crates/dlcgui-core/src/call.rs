use std::fmt;

use crate::task::TaskKind;

/// An argument of a toolkit call, printable as a Python literal.
#[derive(Clone, Debug, PartialEq)]
pub enum ArgValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ArgValue>),
    Tuple(Vec<ArgValue>),
}

impl ArgValue {
    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ArgValue::List(items.into_iter().map(|s| ArgValue::Str(s.into())).collect())
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Int(value)
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        ArgValue::Float(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Str(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Str(value)
    }
}

impl<T: Into<ArgValue>> From<Option<T>> for ArgValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ArgValue::None)
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[ArgValue]) -> fmt::Result {
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::None => f.write_str("None"),
            ArgValue::Bool(true) => f.write_str("True"),
            ArgValue::Bool(false) => f.write_str("False"),
            ArgValue::Int(n) => write!(f, "{n}"),
            ArgValue::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{x:.1}"),
            ArgValue::Float(x) => write!(f, "{x}"),
            // JSON string escaping is a subset Python accepts.
            ArgValue::Str(s) => {
                let quoted = serde_json::to_string(s).map_err(|_| fmt::Error)?;
                f.write_str(&quoted)
            }
            ArgValue::List(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
            ArgValue::Tuple(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// One call into the external toolkit: a dotted function path plus
/// positional and keyword arguments, in the order they are passed.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolkitCall {
    pub task: TaskKind,
    pub function: &'static str,
    pub args: Vec<ArgValue>,
    pub kwargs: Vec<(&'static str, ArgValue)>,
}

impl ToolkitCall {
    pub fn new(task: TaskKind, function: &'static str) -> Self {
        Self {
            task,
            function,
            args: Vec::new(),
            kwargs: Vec::new(),
        }
    }

    pub fn arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: &'static str, value: impl Into<ArgValue>) -> Self {
        self.kwargs.push((name, value.into()));
        self
    }

    pub fn kwarg_value(&self, name: &str) -> Option<&ArgValue> {
        self.kwargs
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Module to import before the call, e.g. `deeplabcut.generate_training_dataset`.
    pub fn module(&self) -> &'static str {
        self.function
            .rsplit_once('.')
            .map(|(module, _)| module)
            .unwrap_or(self.function)
    }
}

impl fmt::Display for ToolkitCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.function)?;
        write_items(f, &self.args)?;
        for (idx, (name, value)) in self.kwargs.iter().enumerate() {
            if idx > 0 || !self.args.is_empty() {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_render_as_python_literals() {
        assert_eq!(ArgValue::None.to_string(), "None");
        assert_eq!(ArgValue::Bool(false).to_string(), "False");
        assert_eq!(ArgValue::Float(0.5).to_string(), "0.5");
        assert_eq!(ArgValue::Float(10.0).to_string(), "10.0");
        assert_eq!(ArgValue::from("a \"b\"").to_string(), r#""a \"b\"""#);
        assert_eq!(
            ArgValue::Tuple(vec![ArgValue::Bool(false), 0.5f64.into(), 10i64.into()]).to_string(),
            "(False, 0.5, 10)"
        );
        assert_eq!(ArgValue::Tuple(vec![1i64.into()]).to_string(), "(1,)");
        assert_eq!(ArgValue::strings(["nose", "tail"]).to_string(), r#"["nose", "tail"]"#);
    }

    #[test]
    fn call_renders_args_then_kwargs() {
        let call = ToolkitCall::new(TaskKind::TrainNetwork, "deeplabcut.train_network")
            .arg("/p/config.yaml")
            .arg(1i64)
            .kwarg("gputouse", ArgValue::None)
            .kwarg("maxiters", 10i64);
        assert_eq!(
            call.to_string(),
            r#"deeplabcut.train_network("/p/config.yaml", 1, gputouse=None, maxiters=10)"#
        );
        assert_eq!(call.kwarg_value("maxiters"), Some(&ArgValue::Int(10)));
        assert_eq!(call.module(), "deeplabcut");
    }

    #[test]
    fn keyword_only_call_has_no_leading_comma() {
        let call = ToolkitCall::new(TaskKind::CreateVideo, "deeplabcut.create_labeled_video")
            .kwarg("config", "c.yaml");
        assert_eq!(call.to_string(), r#"deeplabcut.create_labeled_video(config="c.yaml")"#);
    }

    #[test]
    fn nested_module_is_split_from_function() {
        let call = ToolkitCall::new(
            TaskKind::ExtractFrames,
            "deeplabcut.generate_training_dataset.extract_frames",
        );
        assert_eq!(call.module(), "deeplabcut.generate_training_dataset");
    }
}
