use std::{fmt, path::PathBuf};

use crate::error::ValidationError;
use crate::param::ParameterSpec;
use crate::value::{ParamKind, ParamValue};

pub type ListenerId = usize;

type Listener = Box<dyn FnMut(&ParamValue)>;

/// One typed control. Values only change through [`FormField::set`] and the
/// helpers built on it, so a stored value always passed validation (the
/// declared default excepted: a required selection starts out empty).
pub struct FormField {
    spec: ParameterSpec,
    value: ParamValue,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: ListenerId,
}

impl FormField {
    pub fn new(spec: ParameterSpec) -> Self {
        let value = spec.default.clone();
        Self {
            spec,
            value,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    pub fn spec(&self) -> &ParameterSpec {
        &self.spec
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn get(&self) -> &ParamValue {
        &self.value
    }

    pub fn set(&mut self, value: ParamValue) -> Result<(), ValidationError> {
        self.spec.validate(&value)?;
        self.value = value;
        self.notify();
        Ok(())
    }

    /// Puts the declared default back, bypassing validation.
    pub fn reset(&mut self) {
        self.value = self.spec.default.clone();
        self.notify();
    }

    pub fn check(&self) -> Result<(), String> {
        self.spec.check_value(&self.value)
    }

    pub fn is_valid(&self) -> bool {
        self.check().is_ok()
    }

    /// Listeners run synchronously after every successful `set`, in
    /// registration order.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&ParamValue) + 'static,
    {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn options(&self) -> Vec<String> {
        self.spec.exclusive_options()
    }

    /// Selects one option of a choice or yes/no group. The value is a single
    /// tagged variant, so every sibling option is cleared by construction.
    pub fn select_option(&mut self, option: &str) -> Result<(), ValidationError> {
        let value = self.spec.value_for_option(option).ok_or_else(|| {
            ValidationError::new(
                self.spec.name,
                format!("`{option}` is not an option of this field"),
            )
        })?;
        self.set(value)
    }

    pub fn selected_option(&self) -> Option<String> {
        match &self.value {
            ParamValue::Choice(choice) => Some(choice.clone()),
            ParamValue::Bool(flag) => Some(ParamValue::Bool(*flag).to_string()),
            _ => None,
        }
    }

    pub fn is_option_selected(&self, option: &str) -> bool {
        self.selected_option().as_deref() == Some(option)
    }

    /// Adds paths to a path-set field with set semantics. Returns how many
    /// were new.
    pub fn add_paths<I, P>(&mut self, paths: I) -> Result<usize, ValidationError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let ParamValue::PathSet(current) = &self.value else {
            return Err(ValidationError::new(
                self.spec.name,
                format!("expected {}, field holds {}", ParamKind::PathSet, self.value.kind()),
            ));
        };
        let mut next = current.clone();
        let added = next.extend(paths);
        self.set(ParamValue::PathSet(next))?;
        Ok(added)
    }

    fn notify(&mut self) {
        let value = &self.value;
        for (_, listener) in self.listeners.iter_mut() {
            listener(value);
        }
    }
}

impl fmt::Debug for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormField")
            .field("name", &self.spec.name)
            .field("value", &self.value)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
