use std::{collections::BTreeMap, path::PathBuf};

use tracing::Span;

use crate::catalog::{fields, PageDef, PageId, VIDEO_TYPES};
use crate::context::AppContext;
use crate::error::{IncompleteConfigurationError, SubmitError, ValidationError};
use crate::field::{FormField, ListenerId};
use crate::invoker::{TaskInvoker, Toolkit};
use crate::task::{TaskRequest, TaskResult};
use crate::value::ParamValue;

/// All fields of one page. Owned by the page for its whole lifetime and never
/// shared with another page.
#[derive(Debug)]
pub struct PageState {
    def: PageDef,
    fields: Vec<FormField>,
    span: Span,
    in_flight: bool,
}

impl PageState {
    pub fn new(def: PageDef, ctx: &AppContext) -> Self {
        let fields = def.fields.iter().cloned().map(FormField::new).collect();
        let span = ctx.page_span(def.id);
        Self {
            def,
            fields,
            span,
            in_flight: false,
        }
    }

    pub fn def(&self) -> &PageDef {
        &self.def
    }

    pub fn id(&self) -> PageId {
        self.def.id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|field| field.name() == name)
    }

    pub fn get(&self, name: &str) -> Result<&ParamValue, ValidationError> {
        self.field(name)
            .map(FormField::get)
            .ok_or_else(|| unknown_field(name))
    }

    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ValidationError> {
        let idx = self.index_of(name)?;
        let changed = self.fields[idx].get() != &value;
        self.fields[idx].set(value)?;
        if changed {
            self.after_change(idx);
        }
        Ok(())
    }

    pub fn select_option(&mut self, name: &str, option: &str) -> Result<(), ValidationError> {
        let idx = self.index_of(name)?;
        let value = self.fields[idx]
            .spec()
            .value_for_option(option)
            .ok_or_else(|| ValidationError::new(name, format!("`{option}` is not an option of this field")))?;
        self.set(name, value)
    }

    /// Returns how many of the paths were new to the selection.
    pub fn add_paths<I, P>(&mut self, name: &str, paths: I) -> Result<usize, ValidationError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let idx = self.index_of(name)?;
        let added = self.fields[idx].add_paths(paths)?;
        if added > 0 {
            self.after_change(idx);
        }
        Ok(added)
    }

    /// Puts a field back to its declared default, e.g. to clear a selection.
    pub fn reset(&mut self, name: &str) -> Result<(), ValidationError> {
        let idx = self.index_of(name)?;
        self.fields[idx].reset();
        self.span.in_scope(|| tracing::info!("{name} reset"));
        Ok(())
    }

    pub fn subscribe<F>(&mut self, name: &str, listener: F) -> Result<ListenerId, ValidationError>
    where
        F: FnMut(&ParamValue) + 'static,
    {
        let idx = self.index_of(name)?;
        Ok(self.fields[idx].subscribe(listener))
    }

    pub fn unsubscribe(&mut self, name: &str, id: ListenerId) -> bool {
        match self.index_of(name) {
            Ok(idx) => self.fields[idx].unsubscribe(id),
            Err(_) => false,
        }
    }

    /// Read-only fields are never enabled. Otherwise the field's enablement
    /// rule, if any, is evaluated against the current values.
    pub fn is_enabled(&self, name: &str) -> bool {
        let Some(field) = self.field(name) else {
            return false;
        };
        let spec = field.spec();
        if spec.read_only {
            return false;
        }
        match &spec.enabled_when {
            Some(condition) => self
                .field(condition.field)
                .is_some_and(|other| other.get() == &condition.equals),
            None => true,
        }
    }

    /// Captures every value as of this call. Fails on the first field, in
    /// declaration order, that does not hold a valid value.
    pub fn snapshot(&self) -> Result<TaskRequest, IncompleteConfigurationError> {
        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            field
                .check()
                .map_err(|reason| IncompleteConfigurationError::new(field.name(), reason))?;
            values.push((field.name().to_string(), field.get().clone()));
        }
        Ok(TaskRequest::new(
            self.def.id,
            self.def.id.primary_task(),
            values,
            self.def.project.clone(),
        ))
    }

    /// File patterns for picking videos into `name`. When the video type
    /// clears the selection on change, only that type is offered; otherwise
    /// every supported type is.
    pub fn video_patterns(&self, name: &str) -> Vec<String> {
        let tied_type = self
            .field(fields::VIDEOTYPE)
            .filter(|field| field.spec().resets.iter().any(|reset| *reset == name))
            .and_then(|field| field.get().as_choice());
        match tied_type {
            Some(ext) => vec![format!("*.{}", ext.trim_start_matches('.'))],
            None => VIDEO_TYPES.iter().map(|ext| format!("*.{ext}")).collect(),
        }
    }

    pub fn values(&self) -> BTreeMap<String, ParamValue> {
        self.fields
            .iter()
            .map(|field| (field.name().to_string(), field.get().clone()))
            .collect()
    }

    /// Applies previously saved values. Read-only fields keep the value the
    /// page was built with, and values that no longer validate are skipped.
    /// Reset rules do not fire while restoring.
    pub fn restore(&mut self, saved: &BTreeMap<String, ParamValue>) -> usize {
        let _guard = self.span.enter();
        let mut applied = 0;
        for field in self.fields.iter_mut() {
            if field.spec().read_only {
                continue;
            }
            let Some(value) = saved.get(field.name()) else {
                continue;
            };
            match field.set(value.clone()) {
                Ok(()) => applied += 1,
                Err(err) => tracing::debug!("skipping saved value: {err}"),
            }
        }
        applied
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Snapshots the page and marks it busy until `finish_submission`.
    pub fn begin_submission(&mut self) -> Result<TaskRequest, SubmitError> {
        if self.in_flight {
            return Err(SubmitError::InFlight(self.def.id));
        }
        let request = self.snapshot()?;
        self.in_flight = true;
        self.span.in_scope(|| tracing::info!(task = %request.task(), "submission started"));
        Ok(request)
    }

    pub fn finish_submission(&mut self) {
        self.in_flight = false;
    }

    /// Submits and waits for the result on the calling thread.
    pub fn submit_blocking<T: Toolkit>(
        &mut self,
        invoker: &TaskInvoker<T>,
    ) -> Result<TaskResult, SubmitError> {
        let request = self.begin_submission()?;
        let result = self.span.in_scope(|| invoker.invoke(&request));
        self.finish_submission();
        Ok(result)
    }

    fn index_of(&self, name: &str) -> Result<usize, ValidationError> {
        self.fields
            .iter()
            .position(|field| field.name() == name)
            .ok_or_else(|| unknown_field(name))
    }

    fn after_change(&mut self, idx: usize) {
        let field = &self.fields[idx];
        let name = field.name();
        self.span.in_scope(|| match field.get() {
            ParamValue::Bool(true) => tracing::info!("{name} ENABLED"),
            ParamValue::Bool(false) => tracing::info!("{name} DISABLED"),
            value => tracing::info!("{name} set to {value}"),
        });
        let resets = field.spec().resets.clone();
        for target in resets {
            if let Ok(target_idx) = self.index_of(target) {
                self.fields[target_idx].reset();
                self.span
                    .in_scope(|| tracing::info!("{target} cleared after {name} changed"));
            }
        }
    }
}

fn unknown_field(name: &str) -> ValidationError {
    ValidationError::new(name, "no such field on this page")
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc, sync::Arc};

    use super::*;
    use crate::catalog::page_def;
    use crate::project::ProjectConfig;

    fn page(id: PageId) -> PageState {
        let project = Arc::new(
            ProjectConfig::from_yaml_str("/p/config.yaml", "bodyparts: [hand, finger]\n").unwrap(),
        );
        PageState::new(page_def(id, project), &AppContext::new("/assets"))
    }

    #[test]
    fn snapshot_names_first_invalid_field() {
        let state = page(PageId::AnalyzeVideos);
        let err = state.snapshot().unwrap_err();
        assert_eq!(err.field, fields::VIDEOS);
    }

    #[test]
    fn snapshot_is_not_affected_by_later_edits() {
        let mut state = page(PageId::AnalyzeVideos);
        state.add_paths(fields::VIDEOS, ["a.avi"]).unwrap();
        state.set(fields::SHUFFLE, ParamValue::Int(3)).unwrap();
        let request = state.snapshot().unwrap();
        state.set(fields::SHUFFLE, ParamValue::Int(9)).unwrap();
        state.add_paths(fields::VIDEOS, ["b.avi"]).unwrap();
        assert_eq!(request.value(fields::SHUFFLE), Some(&ParamValue::Int(3)));
        assert_eq!(
            request.value(fields::VIDEOS).and_then(ParamValue::as_path_set).map(|s| s.len()),
            Some(1)
        );
    }

    #[test]
    fn snapshot_preserves_declaration_order() {
        let state = page(PageId::TrainNetwork);
        let request = state.snapshot().unwrap();
        let names: Vec<_> = request.values().iter().map(|(name, _)| name.as_str()).collect();
        let declared: Vec<_> = state.def().fields.iter().map(|spec| spec.name).collect();
        assert_eq!(names, declared);
    }

    #[test]
    fn unknown_field_is_a_validation_error() {
        let mut state = page(PageId::TrainNetwork);
        assert!(state.set("gputouse", ParamValue::Int(0)).is_err());
        assert!(state.get("gputouse").is_err());
    }

    #[test]
    fn create_page_offers_only_the_chosen_video_type() {
        let mut state = page(PageId::CreateVideos);
        assert_eq!(state.video_patterns(fields::VIDEOS), vec!["*.avi"]);
        state.select_option(fields::VIDEOTYPE, "mov").unwrap();
        assert_eq!(state.video_patterns(fields::VIDEOS), vec!["*.mov"]);
    }

    #[test]
    fn analyze_page_offers_every_video_type() {
        let mut state = page(PageId::AnalyzeVideos);
        state.select_option(fields::VIDEOTYPE, ".mp4").unwrap();
        assert_eq!(state.video_patterns(fields::VIDEOS), vec!["*.avi", "*.mp4", "*.mov"]);
    }

    #[test]
    fn changing_videotype_clears_video_selection() {
        let mut state = page(PageId::CreateVideos);
        state.add_paths(fields::VIDEOS, ["a.avi"]).unwrap();
        state.select_option(fields::VIDEOTYPE, "avi").unwrap();
        assert_eq!(state.get(fields::VIDEOS).unwrap().as_path_set().map(|s| s.len()), Some(1));
        state.select_option(fields::VIDEOTYPE, "mp4").unwrap();
        assert!(state.get(fields::VIDEOS).unwrap().as_path_set().unwrap().is_empty());
    }

    #[test]
    fn enablement_follows_controlling_field() {
        let mut state = page(PageId::ExtractFrames);
        assert!(state.is_enabled(fields::ALGORITHM));
        assert!(!state.is_enabled(fields::SLIDER_WIDTH));
        state.select_option(fields::MODE, "manual").unwrap();
        assert!(!state.is_enabled(fields::ALGORITHM));
        assert!(!state.is_enabled(fields::CLUSTER_STEP));
        assert!(state.is_enabled(fields::SLIDER_WIDTH));
        assert!(!state.is_enabled(fields::CONFIG));
    }

    #[test]
    fn bodypart_list_enabled_only_when_not_plotting_all() {
        let mut state = page(PageId::CreateVideos);
        assert!(!state.is_enabled(fields::BODYPARTS));
        state.set(fields::PLOT_ALL_BODYPARTS, ParamValue::Bool(false)).unwrap();
        assert!(state.is_enabled(fields::BODYPARTS));
        assert!(!state.is_enabled(fields::COLOR_BY));
    }

    #[test]
    fn page_level_listeners_see_changes() {
        let mut state = page(PageId::TrainNetwork);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        state
            .subscribe(fields::MAXITERS, move |value| sink.borrow_mut().push(value.clone()))
            .unwrap();
        state.set(fields::MAXITERS, ParamValue::Int(500)).unwrap();
        assert_eq!(*seen.borrow(), vec![ParamValue::Int(500)]);
    }

    #[test]
    fn restore_skips_read_only_and_invalid_values() {
        let mut state = page(PageId::TrainNetwork);
        let mut saved = BTreeMap::new();
        saved.insert(fields::CONFIG.to_string(), ParamValue::Path("/other.yaml".into()));
        saved.insert(fields::SHUFFLE.to_string(), ParamValue::Int(4));
        saved.insert(fields::MAXITERS.to_string(), ParamValue::Int(0));
        assert_eq!(state.restore(&saved), 1);
        assert_eq!(state.get(fields::SHUFFLE).unwrap(), &ParamValue::Int(4));
        assert_eq!(
            state.get(fields::CONFIG).unwrap(),
            &ParamValue::Path("/p/config.yaml".into())
        );
        assert_eq!(state.get(fields::MAXITERS).unwrap(), &ParamValue::Int(100_000));
    }

    #[test]
    fn reset_clears_a_selection() {
        let mut state = page(PageId::AnalyzeVideos);
        state.add_paths(fields::VIDEOS, ["a.avi"]).unwrap();
        state.reset(fields::VIDEOS).unwrap();
        assert!(state.snapshot().is_err());
    }

    #[test]
    fn second_submission_is_refused_while_in_flight() {
        let mut state = page(PageId::TrainNetwork);
        state.begin_submission().unwrap();
        assert!(state.is_in_flight());
        assert_eq!(
            state.begin_submission().unwrap_err(),
            SubmitError::InFlight(PageId::TrainNetwork)
        );
        state.finish_submission();
        assert!(state.begin_submission().is_ok());
    }

    #[test]
    fn incomplete_page_is_not_marked_in_flight() {
        let mut state = page(PageId::AnalyzeVideos);
        assert!(matches!(state.begin_submission(), Err(SubmitError::Incomplete(_))));
        assert!(!state.is_in_flight());
    }
}
