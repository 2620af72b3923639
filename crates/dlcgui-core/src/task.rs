use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::catalog::PageId;
use crate::error::TaskError;
use crate::project::ProjectConfig;
use crate::value::ParamValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    Analyze,
    Filter,
    PlotTrajectories,
    CreateVideo,
    ExtractFrames,
    TrainNetwork,
}

impl TaskKind {
    pub const ALL: [TaskKind; 6] = [
        TaskKind::Analyze,
        TaskKind::Filter,
        TaskKind::PlotTrajectories,
        TaskKind::CreateVideo,
        TaskKind::ExtractFrames,
        TaskKind::TrainNetwork,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Analyze => "analyze",
            TaskKind::Filter => "filter",
            TaskKind::PlotTrajectories => "plot-trajectories",
            TaskKind::CreateVideo => "create-video",
            TaskKind::ExtractFrames => "extract-frames",
            TaskKind::TrainNetwork => "train-network",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::Analyze => "Analyze videos",
            TaskKind::Filter => "Filter predictions",
            TaskKind::PlotTrajectories => "Plot trajectories",
            TaskKind::CreateVideo => "Create labeled videos",
            TaskKind::ExtractFrames => "Extract frames",
            TaskKind::TrainNetwork => "Train network",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| format!("unknown task: {value}"))
    }
}

/// Immutable snapshot of one page, taken at submit time. Later form edits
/// never reach an existing request.
#[derive(Clone, Debug)]
pub struct TaskRequest {
    page: PageId,
    task: TaskKind,
    values: Vec<(String, ParamValue)>,
    project: Arc<ProjectConfig>,
}

impl TaskRequest {
    pub(crate) fn new(
        page: PageId,
        task: TaskKind,
        values: Vec<(String, ParamValue)>,
        project: Arc<ProjectConfig>,
    ) -> Self {
        Self {
            page,
            task,
            values,
            project,
        }
    }

    pub fn page(&self) -> PageId {
        self.page
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    /// Field values in declaration order.
    pub fn values(&self) -> &[(String, ParamValue)] {
        &self.values
    }

    pub fn value(&self, name: &str) -> Option<&ParamValue> {
        self.values
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn project(&self) -> &ProjectConfig {
        &self.project
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TaskResult {
    pub task: TaskKind,
    pub success: bool,
    /// Analyze reports the scorer name it used.
    pub artifact: Option<String>,
    pub error: Option<TaskError>,
    /// Steps that completed, in invocation order.
    pub steps: Vec<TaskKind>,
}

impl TaskResult {
    pub fn succeeded(task: TaskKind, artifact: Option<String>, steps: Vec<TaskKind>) -> Self {
        Self {
            task,
            success: true,
            artifact,
            error: None,
            steps,
        }
    }

    pub fn failed(task: TaskKind, error: impl Into<TaskError>, steps: Vec<TaskKind>) -> Self {
        Self {
            task,
            success: false,
            artifact: None,
            error: Some(error.into()),
            steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_kind_parses_its_own_names() {
        for kind in TaskKind::ALL {
            assert_eq!(kind.as_str().parse::<TaskKind>().unwrap(), kind);
        }
        assert!("evaluate".parse::<TaskKind>().is_err());
    }

    #[test]
    fn task_kind_serde_matches_display() {
        let json = serde_json::to_string(&TaskKind::PlotTrajectories).unwrap();
        assert_eq!(json, "\"plot-trajectories\"");
    }
}
