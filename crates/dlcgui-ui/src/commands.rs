use std::{path::PathBuf, sync::Arc};

use dlcgui_core::{PageId, ProjectConfig, TaskRequest, TaskResult};

pub(crate) enum UiCommand {
    RunTask {
        request: TaskRequest,
        python: String,
        span: tracing::Span,
    },
    LoadProject {
        path: PathBuf,
    },
}

impl UiCommand {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            UiCommand::RunTask { .. } => "run_task",
            UiCommand::LoadProject { .. } => "load_project",
        }
    }
}

#[derive(Debug)]
pub(crate) enum AppEvent {
    Log { page: PageId, line: String },
    TaskStarted { page: PageId },
    TaskFinished { page: PageId, result: TaskResult },
    ProjectLoaded { project: Arc<ProjectConfig> },
    ProjectFailed { path: PathBuf, error: String },
}
