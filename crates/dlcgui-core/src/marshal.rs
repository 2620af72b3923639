//! Fixed mapping from page snapshots to toolkit calls. Every call is built
//! before the first one runs, so an unsupported option never leaves a chain
//! half done.

use std::path::Path;

use crate::call::{ArgValue, ToolkitCall};
use crate::catalog::{fields, PageId, CROP_DISABLED, CROP_FROM_CONFIG, CROP_GUI};
use crate::error::{IncompleteConfigurationError, TaskError, UnsupportedFeatureError};
use crate::task::{TaskKind, TaskRequest};
use crate::value::ParamValue;

pub const ANALYZE_VIDEOS: &str = "deeplabcut.analyze_videos";
pub const FILTER_PREDICTIONS: &str = "deeplabcut.filterpredictions";
pub const PLOT_TRAJECTORIES: &str = "deeplabcut.plot_trajectories";
pub const CREATE_LABELED_VIDEO: &str = "deeplabcut.create_labeled_video";
pub const EXTRACT_FRAMES: &str = "deeplabcut.generate_training_dataset.extract_frames";
pub const TRAIN_NETWORK: &str = "deeplabcut.train_network";

const FILTER_TYPE: &str = "median";
const FILTER_WINDOW: i64 = 5;
const DYNAMIC_THRESHOLD: f64 = 0.5;
const DYNAMIC_MARGIN: i64 = 10;
const CLUSTER_RESIZE_WIDTH: i64 = 30;

/// Tasks a request runs, in order. Optional steps come from the page's own
/// yes/no fields.
pub fn steps(request: &TaskRequest) -> Vec<TaskKind> {
    let mut steps = vec![request.task()];
    match request.page() {
        PageId::AnalyzeVideos => {
            if flag(request, fields::FILTER) {
                steps.push(TaskKind::Filter);
            }
            if flag(request, fields::TRAJECTORIES) {
                steps.push(TaskKind::PlotTrajectories);
            }
        }
        PageId::CreateVideos => {
            if flag(request, fields::PLOT_TRAJECTORIES) {
                steps.push(TaskKind::PlotTrajectories);
            }
        }
        PageId::ExtractFrames | PageId::TrainNetwork => {}
    }
    steps
}

pub fn plan(request: &TaskRequest) -> Result<Vec<ToolkitCall>, TaskError> {
    steps(request)
        .into_iter()
        .map(|task| build_call(request, task))
        .collect()
}

pub fn build_call(request: &TaskRequest, task: TaskKind) -> Result<ToolkitCall, TaskError> {
    match (request.page(), task) {
        (PageId::AnalyzeVideos, TaskKind::Analyze) => analyze_call(request),
        (PageId::AnalyzeVideos, TaskKind::Filter) => filter_call(request),
        (PageId::AnalyzeVideos, TaskKind::PlotTrajectories) => analyze_plot_call(request),
        (PageId::CreateVideos, TaskKind::CreateVideo) => create_video_call(request),
        (PageId::CreateVideos, TaskKind::PlotTrajectories) => create_plot_call(request),
        (PageId::ExtractFrames, TaskKind::ExtractFrames) => extract_frames_call(request),
        (PageId::TrainNetwork, TaskKind::TrainNetwork) => train_network_call(request),
        (page, task) => Err(UnsupportedFeatureError::new(format!("{task} from the {page} page")).into()),
    }
}

fn analyze_call(request: &TaskRequest) -> Result<ToolkitCall, TaskError> {
    let project = request.project();
    if project.is_multi_animal() {
        return Err(UnsupportedFeatureError::new("multi-animal video analysis").into());
    }
    let cropping = match project
        .cropping()
        .map_err(|reason| IncompleteConfigurationError::new(fields::CONFIG, reason))?
    {
        Some(b) => ArgValue::Tuple(vec![b.x1.into(), b.x2.into(), b.y1.into(), b.y2.into()]),
        None => ArgValue::None,
    };
    let dynamic = ArgValue::Tuple(vec![
        require_bool(request, fields::DYNAMIC)?.into(),
        DYNAMIC_THRESHOLD.into(),
        DYNAMIC_MARGIN.into(),
    ]);
    Ok(ToolkitCall::new(TaskKind::Analyze, ANALYZE_VIDEOS)
        .arg(config_arg(request)?)
        .arg(videos_arg(request)?)
        .kwarg("videotype", require_choice(request, fields::VIDEOTYPE)?)
        .kwarg("shuffle", require_int(request, fields::SHUFFLE)?)
        .kwarg("trainingsetindex", require_int(request, fields::TRAININGSETINDEX)?)
        .kwarg("gputouse", ArgValue::None)
        .kwarg("save_as_csv", require_bool(request, fields::SAVE_AS_CSV)?)
        .kwarg("cropping", cropping)
        .kwarg("dynamic", dynamic))
}

fn filter_call(request: &TaskRequest) -> Result<ToolkitCall, TaskError> {
    Ok(ToolkitCall::new(TaskKind::Filter, FILTER_PREDICTIONS)
        .arg(config_arg(request)?)
        .arg(videos_arg(request)?)
        .kwarg("videotype", require_choice(request, fields::VIDEOTYPE)?)
        .kwarg("shuffle", require_int(request, fields::SHUFFLE)?)
        .kwarg("trainingsetindex", require_int(request, fields::TRAININGSETINDEX)?)
        .kwarg("filtertype", FILTER_TYPE)
        .kwarg("windowlength", FILTER_WINDOW)
        .kwarg("save_as_csv", require_bool(request, fields::SAVE_AS_CSV)?))
}

fn analyze_plot_call(request: &TaskRequest) -> Result<ToolkitCall, TaskError> {
    Ok(ToolkitCall::new(TaskKind::PlotTrajectories, PLOT_TRAJECTORIES)
        .arg(config_arg(request)?)
        .arg(videos_arg(request)?)
        // The analyze page has no bodypart picker, so every bodypart is plotted.
        .kwarg("displayedbodyparts", "all")
        .kwarg("videotype", require_choice(request, fields::VIDEOTYPE)?)
        .kwarg("shuffle", require_int(request, fields::SHUFFLE)?)
        .kwarg("trainingsetindex", require_int(request, fields::TRAININGSETINDEX)?)
        .kwarg("filtered", require_bool(request, fields::FILTER)?)
        .kwarg("showfigures", require_bool(request, fields::SHOWFIGURES)?))
}

fn create_video_call(request: &TaskRequest) -> Result<ToolkitCall, TaskError> {
    Ok(ToolkitCall::new(TaskKind::CreateVideo, CREATE_LABELED_VIDEO)
        .kwarg("config", config_arg(request)?)
        .kwarg("videos", videos_arg(request)?)
        .kwarg("videotype", require_choice(request, fields::VIDEOTYPE)?)
        .kwarg("shuffle", require_int(request, fields::SHUFFLE)?)
        .kwarg("trainingsetindex", require_int(request, fields::TRAININGSETINDEX)?)
        .kwarg("filtered", require_bool(request, fields::FILTERED)?)
        .kwarg("save_frames", require_bool(request, fields::HIGH_QUALITY)?)
        .kwarg("displayedbodyparts", displayed_bodyparts(request)?)
        .kwarg("draw_skeleton", require_bool(request, fields::DRAW_SKELETON)?)
        .kwarg("trailpoints", require_int(request, fields::TRAILPOINTS)?)
        .kwarg("color_by", require_choice(request, fields::COLOR_BY)?))
}

fn create_plot_call(request: &TaskRequest) -> Result<ToolkitCall, TaskError> {
    Ok(ToolkitCall::new(TaskKind::PlotTrajectories, PLOT_TRAJECTORIES)
        .kwarg("config", config_arg(request)?)
        .kwarg("videos", videos_arg(request)?)
        .kwarg("videotype", require_choice(request, fields::VIDEOTYPE)?)
        .kwarg("shuffle", require_int(request, fields::SHUFFLE)?)
        .kwarg("trainingsetindex", require_int(request, fields::TRAININGSETINDEX)?)
        .kwarg("filtered", require_bool(request, fields::FILTERED)?)
        .kwarg("displayedbodyparts", displayed_bodyparts(request)?))
}

fn extract_frames_call(request: &TaskRequest) -> Result<ToolkitCall, TaskError> {
    let crop = match require_choice(request, fields::FRAME_CROPPING)? {
        CROP_DISABLED => false,
        CROP_FROM_CONFIG => true,
        CROP_GUI => return Err(UnsupportedFeatureError::new("GUI frame cropping").into()),
        other => {
            return Err(
                IncompleteConfigurationError::new(fields::FRAME_CROPPING, format!("unknown option `{other}`"))
                    .into(),
            )
        }
    };
    Ok(ToolkitCall::new(TaskKind::ExtractFrames, EXTRACT_FRAMES)
        .arg(config_arg(request)?)
        .arg(require_choice(request, fields::MODE)?)
        .arg(require_choice(request, fields::ALGORITHM)?)
        .kwarg("crop", crop)
        .kwarg("userfeedback", false)
        .kwarg("cluster_step", require_int(request, fields::CLUSTER_STEP)?)
        .kwarg("cluster_resizewidth", CLUSTER_RESIZE_WIDTH)
        .kwarg("cluster_color", false)
        .kwarg("slider_width", require_int(request, fields::SLIDER_WIDTH)?))
}

fn train_network_call(request: &TaskRequest) -> Result<ToolkitCall, TaskError> {
    Ok(ToolkitCall::new(TaskKind::TrainNetwork, TRAIN_NETWORK)
        .arg(config_arg(request)?)
        .arg(require_int(request, fields::SHUFFLE)?)
        .arg(require_int(request, fields::TRAININGSETINDEX)?)
        .kwarg("gputouse", ArgValue::None)
        .kwarg("max_snapshots_to_keep", require_int(request, fields::MAX_SNAPSHOTS)?)
        .kwarg("autotune", ArgValue::None)
        .kwarg("displayiters", require_int(request, fields::DISPLAYITERS)?)
        .kwarg("saveiters", require_int(request, fields::SAVEITERS)?)
        .kwarg("maxiters", require_int(request, fields::MAXITERS)?))
}

/// `"all"` unless a strict subset of the project's bodyparts is chosen.
fn displayed_bodyparts(request: &TaskRequest) -> Result<ArgValue, TaskError> {
    if require_bool(request, fields::PLOT_ALL_BODYPARTS)? {
        return Ok("all".into());
    }
    let chosen = match request.value(fields::BODYPARTS) {
        Some(ParamValue::Subset(items)) => items,
        _ => return Err(missing(fields::BODYPARTS)),
    };
    if chosen.len() == request.project().bodyparts().len() {
        return Ok("all".into());
    }
    Ok(ArgValue::strings(chosen.iter().cloned()))
}

fn path_arg(path: &Path) -> ArgValue {
    ArgValue::Str(path.to_string_lossy().into_owned())
}

fn config_arg(request: &TaskRequest) -> Result<ArgValue, TaskError> {
    match request.value(fields::CONFIG) {
        Some(ParamValue::Path(path)) => Ok(path_arg(path)),
        _ => Err(missing(fields::CONFIG)),
    }
}

fn videos_arg(request: &TaskRequest) -> Result<ArgValue, TaskError> {
    match request.value(fields::VIDEOS) {
        Some(ParamValue::PathSet(set)) => Ok(ArgValue::List(set.iter().map(|p| path_arg(p)).collect())),
        _ => Err(missing(fields::VIDEOS)),
    }
}

fn require_int(request: &TaskRequest, name: &str) -> Result<i64, TaskError> {
    request
        .value(name)
        .and_then(ParamValue::as_int)
        .ok_or_else(|| missing(name))
}

fn require_bool(request: &TaskRequest, name: &str) -> Result<bool, TaskError> {
    request
        .value(name)
        .and_then(ParamValue::as_bool)
        .ok_or_else(|| missing(name))
}

fn require_choice<'a>(request: &'a TaskRequest, name: &str) -> Result<&'a str, TaskError> {
    request
        .value(name)
        .and_then(ParamValue::as_choice)
        .ok_or_else(|| missing(name))
}

fn flag(request: &TaskRequest, name: &str) -> bool {
    request.value(name).and_then(ParamValue::as_bool).unwrap_or(false)
}

fn missing(name: &str) -> TaskError {
    IncompleteConfigurationError::new(name, "missing from the request").into()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::page_def;
    use crate::context::AppContext;
    use crate::page::PageState;
    use crate::project::ProjectConfig;

    fn state(id: PageId, yaml: &str) -> PageState {
        let project = Arc::new(ProjectConfig::from_yaml_str("/p/config.yaml", yaml).unwrap());
        PageState::new(page_def(id, project), &AppContext::new("/assets"))
    }

    #[test]
    fn analyze_call_matches_documented_contract() {
        let mut page = state(PageId::AnalyzeVideos, "cropping: 'False'\n");
        page.add_paths(fields::VIDEOS, ["/v/a.avi"]).unwrap();
        page.set(fields::SAVE_AS_CSV, ParamValue::Bool(true)).unwrap();
        let calls = plan(&page.snapshot().unwrap()).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].to_string(),
            "deeplabcut.analyze_videos(\"/p/config.yaml\", [\"/v/a.avi\"], videotype=\".avi\", \
             shuffle=1, trainingsetindex=0, gputouse=None, save_as_csv=True, cropping=None, \
             dynamic=(False, 0.5, 10))"
        );
    }

    #[test]
    fn analyze_passes_project_crop_window() {
        let yaml = "cropping: true\nx1: 1\nx2: 2\ny1: 3\ny2: 4\n";
        let mut page = state(PageId::AnalyzeVideos, yaml);
        page.add_paths(fields::VIDEOS, ["/v/a.avi"]).unwrap();
        let calls = plan(&page.snapshot().unwrap()).unwrap();
        assert_eq!(calls[0].kwarg_value("cropping").unwrap().to_string(), "(1, 2, 3, 4)");
    }

    #[test]
    fn analyze_chain_follows_yes_no_fields() {
        let mut page = state(PageId::AnalyzeVideos, "");
        page.add_paths(fields::VIDEOS, ["/v/a.avi"]).unwrap();
        page.set(fields::TRAJECTORIES, ParamValue::Bool(true)).unwrap();
        let request = page.snapshot().unwrap();
        assert_eq!(steps(&request), vec![TaskKind::Analyze, TaskKind::PlotTrajectories]);
        let plot = &plan(&request).unwrap()[1];
        assert_eq!(plot.kwarg_value("filtered"), Some(&ArgValue::Bool(false)));
        assert_eq!(plot.kwarg_value("displayedbodyparts"), Some(&ArgValue::from("all")));
    }

    #[test]
    fn create_video_uses_keyword_arguments_only() {
        let mut page = state(PageId::CreateVideos, "bodyparts: [hand, finger, joystick]\n");
        page.add_paths(fields::VIDEOS, ["/v/a.avi"]).unwrap();
        page.set(fields::PLOT_ALL_BODYPARTS, ParamValue::Bool(false)).unwrap();
        page.set(fields::BODYPARTS, ParamValue::Subset(vec!["hand".into()])).unwrap();
        page.set(fields::HIGH_QUALITY, ParamValue::Bool(true)).unwrap();
        let call = &plan(&page.snapshot().unwrap()).unwrap()[0];
        assert!(call.args.is_empty());
        assert_eq!(call.function, CREATE_LABELED_VIDEO);
        assert_eq!(call.kwarg_value("displayedbodyparts").unwrap().to_string(), "[\"hand\"]");
        assert_eq!(call.kwarg_value("save_frames"), Some(&ArgValue::Bool(true)));
        assert_eq!(call.kwarg_value("color_by"), Some(&ArgValue::from("bodypart")));
    }

    #[test]
    fn full_bodypart_subset_is_sent_as_all() {
        let mut page = state(PageId::CreateVideos, "bodyparts: [hand, finger]\n");
        page.add_paths(fields::VIDEOS, ["/v/a.avi"]).unwrap();
        page.set(fields::PLOT_ALL_BODYPARTS, ParamValue::Bool(false)).unwrap();
        let call = &plan(&page.snapshot().unwrap()).unwrap()[0];
        assert_eq!(call.kwarg_value("displayedbodyparts"), Some(&ArgValue::from("all")));
    }

    #[test]
    fn extract_frames_maps_crop_choice() {
        let mut page = state(PageId::ExtractFrames, "");
        page.select_option(fields::FRAME_CROPPING, CROP_FROM_CONFIG).unwrap();
        let call = &plan(&page.snapshot().unwrap()).unwrap()[0];
        assert_eq!(
            call.to_string(),
            "deeplabcut.generate_training_dataset.extract_frames(\"/p/config.yaml\", \"automatic\", \
             \"kmeans\", crop=True, userfeedback=False, cluster_step=25, cluster_resizewidth=30, \
             cluster_color=False, slider_width=25)"
        );
    }

    #[test]
    fn gui_cropping_is_unsupported() {
        let mut page = state(PageId::ExtractFrames, "");
        page.select_option(fields::FRAME_CROPPING, CROP_GUI).unwrap();
        let err = plan(&page.snapshot().unwrap()).unwrap_err();
        assert!(matches!(err, TaskError::Unsupported(_)));
    }

    #[test]
    fn multi_animal_analysis_is_unsupported() {
        let mut page = state(PageId::AnalyzeVideos, "multianimalproject: true\n");
        page.add_paths(fields::VIDEOS, ["/v/a.avi"]).unwrap();
        let err = plan(&page.snapshot().unwrap()).unwrap_err();
        assert_eq!(
            err,
            TaskError::Unsupported(UnsupportedFeatureError::new("multi-animal video analysis"))
        );
    }

    #[test]
    fn train_network_positional_then_keywords() {
        let page = state(PageId::TrainNetwork, "");
        let call = &plan(&page.snapshot().unwrap()).unwrap()[0];
        assert_eq!(
            call.to_string(),
            "deeplabcut.train_network(\"/p/config.yaml\", 1, 0, gputouse=None, \
             max_snapshots_to_keep=5, autotune=None, displayiters=1000, saveiters=50000, \
             maxiters=100000)"
        );
    }
}
