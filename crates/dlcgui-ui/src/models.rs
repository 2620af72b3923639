use dlcgui_core::ProjectConfig;

/// What the sidebar shows about the active project.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ProjectSummary {
    pub(crate) config_path: String,
    pub(crate) task: String,
    pub(crate) scorer: String,
    pub(crate) bodyparts: usize,
    pub(crate) multi_animal: bool,
}

impl ProjectSummary {
    pub(crate) fn from_config(project: &ProjectConfig) -> Self {
        Self {
            config_path: project.path().display().to_string(),
            task: project.task().unwrap_or_default().to_string(),
            scorer: project.scorer().unwrap_or_default().to_string(),
            bodyparts: project.bodyparts().len(),
            multi_animal: project.is_multi_animal(),
        }
    }

    pub(crate) fn project_line(&self) -> String {
        if self.task.is_empty() && self.scorer.is_empty() {
            return "Project: -".into();
        }
        format!("Project: {} ({})", format_value(&self.task), format_value(&self.scorer))
    }

    pub(crate) fn details_line(&self) -> String {
        let kind = if self.multi_animal {
            "multi-animal"
        } else {
            "single animal"
        };
        format!("{} bodyparts, {kind}", self.bodyparts)
    }
}

fn format_value(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_reads_project_keys() {
        let cfg = ProjectConfig::from_yaml_str(
            "/data/config.yaml",
            "Task: reaching\nscorer: alex\nbodyparts: [hand, finger]\n",
        )
        .unwrap();
        let summary = ProjectSummary::from_config(&cfg);
        assert_eq!(summary.project_line(), "Project: reaching (alex)");
        assert_eq!(summary.details_line(), "2 bodyparts, single animal");
    }

    #[test]
    fn empty_project_renders_placeholder() {
        let summary = ProjectSummary::from_config(&ProjectConfig::empty(""));
        assert_eq!(summary.project_line(), "Project: -");
    }
}
