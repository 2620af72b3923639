use crate::catalog::PageDef;
use crate::error::TaskError;
use crate::task::TaskResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// User-facing outcome of an action, shown as a modal dialog or printed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub text: String,
    pub detail: Option<String>,
}

impl Notice {
    pub fn for_result(def: &PageDef, result: &TaskResult) -> Self {
        if result.success {
            let detail = match (&result.artifact, def.success_detail) {
                (Some(scorer), Some(detail)) => Some(format!("{detail}\nScorer: {scorer}")),
                (Some(scorer), None) => Some(format!("Scorer: {scorer}")),
                (None, detail) => detail.map(str::to_string),
            };
            return Self {
                level: NoticeLevel::Info,
                title: "Info".into(),
                text: def.success_message.to_string(),
                detail,
            };
        }
        let text = match &result.error {
            Some(TaskError::Invocation(err)) => format!("{} failed.", err.task.label()),
            Some(TaskError::Unsupported(_)) => "This option is not available yet.".to_string(),
            Some(TaskError::Incomplete(_)) => "The page is not fully configured.".to_string(),
            None => format!("{} failed.", result.task.label()),
        };
        Self {
            level: NoticeLevel::Error,
            title: "Error".into(),
            text,
            detail: result.error.as_ref().map(ToString::to_string),
        }
    }

    pub fn for_error(error: &TaskError) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: "Error".into(),
            text: "The action could not be started.".into(),
            detail: Some(error.to_string()),
        }
    }
}
