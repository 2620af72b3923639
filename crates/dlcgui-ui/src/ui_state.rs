use std::{collections::BTreeMap, fs, io, path::PathBuf};

use dlcgui_core::{PageId, ParamValue};
use serde::{Deserialize, Serialize};

const UI_STATE_FILE: &str = "ui-state.json";
const LOG_MAX_CHARS: usize = 200_000;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct UiState {
    pub(crate) pages: BTreeMap<PageId, PageUiState>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PageUiState {
    pub(crate) log: String,
    pub(crate) values: BTreeMap<String, ParamValue>,
}

impl UiState {
    pub(crate) fn load_with_status() -> (Self, bool) {
        let path = ui_state_path();
        match fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<UiState>(&data) {
                Ok(state) => (state, true),
                Err(err) => {
                    eprintln!("Failed to parse {}: {err}", path.display());
                    (UiState::default(), false)
                }
            },
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    eprintln!("Failed to read {}: {err}", path.display());
                }
                (UiState::default(), false)
            }
        }
    }

    pub(crate) fn save(&self) -> io::Result<()> {
        dlcgui_util::write_json_atomic(&ui_state_path(), &self.trimmed())
    }

    pub(crate) fn page(&self, page: PageId) -> Option<&PageUiState> {
        self.pages.get(&page)
    }

    pub(crate) fn set_values(&mut self, page: PageId, values: BTreeMap<String, ParamValue>) {
        self.pages.entry(page).or_default().values = values;
    }

    pub(crate) fn append_log(&mut self, page: PageId, line: &str) {
        let target = &mut self.pages.entry(page).or_default().log;
        target.push_str(line);
        if target.len() > LOG_MAX_CHARS {
            *target = trim_log(target);
        }
    }

    fn trimmed(&self) -> Self {
        let mut trimmed = self.clone();
        for page in trimmed.pages.values_mut() {
            page.log = trim_log(&page.log);
        }
        trimmed
    }
}

fn ui_state_path() -> PathBuf {
    dlcgui_util::state_file_path(UI_STATE_FILE)
}

fn trim_log(text: &str) -> String {
    let char_count = text.chars().count();
    if char_count <= LOG_MAX_CHARS {
        return text.to_string();
    }
    text.chars().skip(char_count - LOG_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_keep_the_newest_characters() {
        let mut state = UiState::default();
        state.append_log(PageId::TrainNetwork, &"a".repeat(LOG_MAX_CHARS));
        state.append_log(PageId::TrainNetwork, "tail\n");
        let log = &state.page(PageId::TrainNetwork).unwrap().log;
        assert_eq!(log.chars().count(), LOG_MAX_CHARS);
        assert!(log.ends_with("tail\n"));
    }

    #[test]
    fn state_serializes_with_page_names() {
        let mut state = UiState::default();
        let mut values = BTreeMap::new();
        values.insert("shuffle".to_string(), ParamValue::Int(2));
        state.set_values(PageId::AnalyzeVideos, values.clone());

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["pages"]["analyze-videos"]["values"]["shuffle"]["value"], 2);

        let back: UiState = serde_json::from_value(json).unwrap();
        assert_eq!(back.page(PageId::AnalyzeVideos).unwrap().values, values);
    }

    #[test]
    fn unknown_fields_in_saved_state_are_ignored() {
        let state: UiState =
            serde_json::from_str(r#"{"pages": {}, "home": {"log": "old"}}"#).unwrap();
        assert!(state.pages.is_empty());
    }
}
