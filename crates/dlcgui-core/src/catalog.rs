//! Declarative page definitions. Each page is a list of parameter specs; the
//! desktop form builder and the CLI binder both consume these lists.

use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::param::ParameterSpec;
use crate::project::ProjectConfig;
use crate::task::TaskKind;
use crate::value::ParamValue;

/// Field names shared by the catalog and the call builders.
pub mod fields {
    pub const CONFIG: &str = "config";
    pub const VIDEOS: &str = "videos";
    pub const VIDEOTYPE: &str = "videotype";
    pub const SHUFFLE: &str = "shuffle";
    pub const TRAININGSETINDEX: &str = "trainingsetindex";
    pub const SAVE_AS_CSV: &str = "save_as_csv";
    pub const FILTER: &str = "filter";
    pub const SHOWFIGURES: &str = "showfigures";
    pub const DYNAMIC: &str = "dynamic";
    pub const TRAJECTORIES: &str = "trajectories";
    pub const COLOR_BY: &str = "color_by";
    pub const TRAILPOINTS: &str = "trailpoints";
    pub const PLOT_ALL_BODYPARTS: &str = "plot_all_bodyparts";
    pub const BODYPARTS: &str = "bodyparts";
    pub const DRAW_SKELETON: &str = "draw_skeleton";
    pub const FILTERED: &str = "filtered";
    pub const PLOT_TRAJECTORIES: &str = "plot_trajectories";
    pub const HIGH_QUALITY: &str = "high_quality";
    pub const MODE: &str = "mode";
    pub const ALGORITHM: &str = "algorithm";
    pub const FRAME_CROPPING: &str = "frame_cropping";
    pub const CLUSTER_STEP: &str = "cluster_step";
    pub const SLIDER_WIDTH: &str = "slider_width";
    pub const DISPLAYITERS: &str = "displayiters";
    pub const SAVEITERS: &str = "saveiters";
    pub const MAXITERS: &str = "maxiters";
    pub const MAX_SNAPSHOTS: &str = "max_snapshots_to_keep";
}

pub const VIDEO_TYPES_DOTTED: [&str; 3] = [".avi", ".mp4", ".mov"];
pub const VIDEO_TYPES: [&str; 3] = ["avi", "mp4", "mov"];
pub const COLOR_BY: [&str; 2] = ["bodypart", "individual"];
pub const EXTRACT_MODES: [&str; 2] = ["automatic", "manual"];
pub const EXTRACT_ALGORITHMS: [&str; 2] = ["kmeans", "uniform"];
pub const CROP_DISABLED: &str = "disabled";
pub const CROP_FROM_CONFIG: &str = "read from config";
pub const CROP_GUI: &str = "GUI";

const ITERS_MAX: i64 = 10_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageId {
    AnalyzeVideos,
    CreateVideos,
    ExtractFrames,
    TrainNetwork,
}

impl PageId {
    pub const ALL: [PageId; 4] = [
        PageId::ExtractFrames,
        PageId::TrainNetwork,
        PageId::AnalyzeVideos,
        PageId::CreateVideos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PageId::AnalyzeVideos => "analyze-videos",
            PageId::CreateVideos => "create-videos",
            PageId::ExtractFrames => "extract-frames",
            PageId::TrainNetwork => "train-network",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            PageId::AnalyzeVideos => "Analyze Videos",
            PageId::CreateVideos => "Create Videos",
            PageId::ExtractFrames => "Extract Frames",
            PageId::TrainNetwork => "Train Network",
        }
    }

    pub fn primary_task(&self) -> TaskKind {
        match self {
            PageId::AnalyzeVideos => TaskKind::Analyze,
            PageId::CreateVideos => TaskKind::CreateVideo,
            PageId::ExtractFrames => TaskKind::ExtractFrames,
            PageId::TrainNetwork => TaskKind::TrainNetwork,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        PageId::ALL
            .into_iter()
            .find(|page| page.as_str() == value)
            .ok_or_else(|| {
                let known: Vec<_> = PageId::ALL.iter().map(PageId::as_str).collect();
                format!("unknown page `{value}` (expected one of: {})", known.join(", "))
            })
    }
}

#[derive(Clone, Debug)]
pub struct PageDef {
    pub id: PageId,
    pub title: &'static str,
    pub description: &'static str,
    pub action_label: &'static str,
    pub success_message: &'static str,
    pub success_detail: Option<&'static str>,
    pub fields: Vec<ParameterSpec>,
    pub project: Arc<ProjectConfig>,
}

impl PageDef {
    pub fn field(&self, name: &str) -> Option<&ParameterSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }
}

/// Builds the definition of a page for the given project. Defaults that
/// depend on the project (config path, bodyparts) are resolved here.
pub fn page_def(id: PageId, project: Arc<ProjectConfig>) -> PageDef {
    let fields = match id {
        PageId::AnalyzeVideos => analyze_fields(&project),
        PageId::CreateVideos => create_fields(&project),
        PageId::ExtractFrames => extract_fields(&project),
        PageId::TrainNetwork => train_fields(&project),
    };
    let (description, action_label, success_message, success_detail) = match id {
        PageId::AnalyzeVideos => (
            "Run the trained network on new videos and store the predicted poses.",
            "Analyze Videos",
            "The videos are analyzed. Now you can create labeled videos.",
            None,
        ),
        PageId::CreateVideos => (
            "Render the predictions onto the videos.",
            "Create Videos",
            "Labeled videos were created.",
            None,
        ),
        PageId::ExtractFrames => (
            "Pick a set of frames from the project videos for labeling.",
            "Extract Frames",
            "Frames were successfully extracted, for the videos of interest.",
            None,
        ),
        PageId::TrainNetwork => (
            "Train the pose estimation network on the labeled dataset.",
            "Train Network",
            "The network is now trained and ready to evaluate.",
            Some("Use the function 'evaluate_network' to evaluate the network."),
        ),
    };
    PageDef {
        id,
        title: id.title(),
        description,
        action_label,
        success_message,
        success_detail,
        fields,
        project,
    }
}

pub fn all_pages(project: Arc<ProjectConfig>) -> Vec<PageDef> {
    PageId::ALL
        .into_iter()
        .map(|id| page_def(id, project.clone()))
        .collect()
}

fn config_field(project: &ProjectConfig) -> ParameterSpec {
    ParameterSpec::path(fields::CONFIG, "Active config file", project.path())
        .required()
        .read_only()
        .section("Project")
}

fn videos_field() -> ParameterSpec {
    ParameterSpec::path_set(fields::VIDEOS, "Videos")
        .required()
        .section("Videos")
        .help("Select one or more videos")
}

fn shuffle_field() -> ParameterSpec {
    ParameterSpec::int(fields::SHUFFLE, "Shuffle", 1).range(0, 100)
}

fn trainingset_field() -> ParameterSpec {
    ParameterSpec::int(fields::TRAININGSETINDEX, "Trainingset index", 0).range(0, 100)
}

fn analyze_fields(project: &ProjectConfig) -> Vec<ParameterSpec> {
    vec![
        config_field(project),
        videos_field(),
        ParameterSpec::choice(
            fields::VIDEOTYPE,
            "Specify the videotype",
            &VIDEO_TYPES_DOTTED,
            ".avi",
        )
        .section("Videos"),
        shuffle_field(),
        trainingset_field(),
        ParameterSpec::yes_no(fields::SAVE_AS_CSV, "Want to save result(s) as csv?", false),
        ParameterSpec::yes_no(fields::FILTER, "Want to filter the predictions?", false),
        ParameterSpec::yes_no(fields::DYNAMIC, "Want to dynamically crop bodyparts?", false),
        ParameterSpec::yes_no(fields::TRAJECTORIES, "Want to plot the trajectories?", false),
        ParameterSpec::yes_no(fields::SHOWFIGURES, "Want plots to pop up?", true)
            .enabled_when(fields::TRAJECTORIES, ParamValue::Bool(true)),
    ]
}

fn create_fields(project: &ProjectConfig) -> Vec<ParameterSpec> {
    let bodyparts = project.bodyparts();
    let mut color_by = ParameterSpec::choice(fields::COLOR_BY, "Color keypoints by", &COLOR_BY, "bodypart");
    if !project.is_multi_animal() {
        color_by = color_by.read_only();
    }
    vec![
        config_field(project),
        ParameterSpec::choice(fields::VIDEOTYPE, "Video type", &VIDEO_TYPES, "avi")
            .section("Videos")
            .resets(fields::VIDEOS),
        videos_field(),
        color_by,
        shuffle_field(),
        trainingset_field(),
        ParameterSpec::int(fields::TRAILPOINTS, "Specify the number of trail points", 0)
            .range(0, 99)
            .section("Video parameters"),
        ParameterSpec::check(fields::PLOT_ALL_BODYPARTS, "Plot all bodyparts", true)
            .section("Video parameters"),
        ParameterSpec::subset(fields::BODYPARTS, "Bodyparts", &bodyparts)
            .section("Video parameters")
            .enabled_when(fields::PLOT_ALL_BODYPARTS, ParamValue::Bool(false)),
        ParameterSpec::check(fields::DRAW_SKELETON, "Draw skeleton", true)
            .section("Video parameters"),
        ParameterSpec::check(fields::FILTERED, "Use filtered data", false)
            .section("Video parameters"),
        ParameterSpec::check(fields::PLOT_TRAJECTORIES, "Plot trajectories", false)
            .section("Video parameters"),
        ParameterSpec::check(fields::HIGH_QUALITY, "High quality video (slow)", false)
            .section("Video parameters"),
    ]
}

fn extract_fields(project: &ProjectConfig) -> Vec<ParameterSpec> {
    let automatic = || ParamValue::Choice("automatic".into());
    vec![
        config_field(project),
        ParameterSpec::choice(fields::MODE, "Extraction method", &EXTRACT_MODES, "automatic"),
        ParameterSpec::choice(fields::ALGORITHM, "Extraction algorithm", &EXTRACT_ALGORITHMS, "kmeans")
            .enabled_when(fields::MODE, automatic()),
        ParameterSpec::choice(
            fields::FRAME_CROPPING,
            "Frame cropping",
            &[CROP_DISABLED, CROP_FROM_CONFIG, CROP_GUI],
            CROP_DISABLED,
        ),
        ParameterSpec::int(fields::CLUSTER_STEP, "Cluster step", 25)
            .range(0, 99)
            .enabled_when(fields::MODE, automatic()),
        ParameterSpec::int(fields::SLIDER_WIDTH, "GUI slider width", 25)
            .range(0, 99)
            .enabled_when(fields::MODE, ParamValue::Choice("manual".into())),
    ]
}

fn train_fields(project: &ProjectConfig) -> Vec<ParameterSpec> {
    vec![
        config_field(project),
        shuffle_field(),
        trainingset_field(),
        ParameterSpec::int(fields::DISPLAYITERS, "Display iterations", 1000).range(1, ITERS_MAX),
        ParameterSpec::int(fields::SAVEITERS, "Save iterations", 50_000).range(1, ITERS_MAX),
        ParameterSpec::int(fields::MAXITERS, "Maximum iterations", 100_000).range(1, ITERS_MAX),
        ParameterSpec::int(fields::MAX_SNAPSHOTS, "Number of snapshots to keep", 5).range(1, 100),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Arc<ProjectConfig> {
        Arc::new(
            ProjectConfig::from_yaml_str("/p/config.yaml", "bodyparts: [hand, finger]\n").unwrap(),
        )
    }

    #[test]
    fn every_page_starts_with_the_config_field() {
        for def in all_pages(project()) {
            let first = &def.fields[0];
            assert_eq!(first.name, fields::CONFIG, "{}", def.id);
            assert_eq!(first.default, ParamValue::Path("/p/config.yaml".into()));
            assert!(first.read_only);
        }
    }

    #[test]
    fn field_names_are_unique_per_page() {
        for def in all_pages(project()) {
            let mut names: Vec<_> = def.fields.iter().map(|spec| spec.name).collect();
            let count = names.len();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), count, "{}", def.id);
        }
    }

    #[test]
    fn defaults_pass_their_own_validation_except_required_selections() {
        for def in all_pages(project()) {
            for spec in &def.fields {
                if spec.name == fields::VIDEOS {
                    continue;
                }
                assert!(spec.validate(&spec.default).is_ok(), "{}.{}", def.id, spec.name);
            }
        }
    }

    #[test]
    fn create_page_offers_project_bodyparts() {
        let def = page_def(PageId::CreateVideos, project());
        let spec = def.field(fields::BODYPARTS).unwrap();
        assert_eq!(spec.options, vec!["hand", "finger"]);
        assert_eq!(spec.default, ParamValue::Subset(vec!["hand".into(), "finger".into()]));
        assert!(def.field(fields::COLOR_BY).unwrap().read_only);
    }

    #[test]
    fn page_ids_parse_from_their_names() {
        for id in PageId::ALL {
            assert_eq!(id.as_str().parse::<PageId>().unwrap(), id);
        }
        let err = "evaluate".parse::<PageId>().unwrap_err();
        assert!(err.contains("analyze-videos"));
    }
}
