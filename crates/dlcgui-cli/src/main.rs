use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use dlcgui_core::{
    marshal, page_def, AppContext, Notice, NoticeLevel, PageDef, PageId, PageState, ProjectConfig,
    TaskInvoker,
};
use dlcgui_runner::{LogSink, OutputLine, PythonToolkit};
use dlcgui_util::{env_value, python_executable, PROJECT_CONFIG_ENV};

#[derive(Parser)]
#[command(name = "dlcgui-cli", version, about = "Run DeepLabCut task pages without the GUI")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List task pages
    Pages,
    /// Show the fields of one page
    Describe {
        page: PageId,
        #[arg(long, default_value_t = default_project_config())]
        config: String,
    },
    /// Fill in a page and run its task
    Run {
        page: PageId,
        #[arg(long, default_value_t = default_project_config())]
        config: String,
        /// Video to add to the page (repeatable)
        #[arg(long = "video")]
        videos: Vec<PathBuf>,
        /// Field assignment as name=value (repeatable)
        #[arg(long = "set", value_parser = parse_assignment)]
        sets: Vec<(String, String)>,
        /// Print the toolkit calls instead of running them
        #[arg(long)]
        dry_run: bool,
        #[arg(long, default_value_t = python_executable())]
        python: String,
    },
}

fn default_project_config() -> String {
    env_value(PROJECT_CONFIG_ENV, "config.yaml")
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing field name in `{raw}`"));
    }
    Ok((name.to_string(), value.to_string()))
}

fn load_page(page: PageId, config: &str) -> Result<PageDef, Box<dyn std::error::Error>> {
    let project = ProjectConfig::load(dlcgui_util::expand_user(config))?;
    Ok(page_def(page, Arc::new(project)))
}

fn describe(def: &PageDef) {
    println!("{} ({})", def.title, def.id);
    println!("{}", def.description);
    for spec in &def.fields {
        let mut line = format!("  {:<24} {:<9} default={}", spec.name, spec.kind.as_str(), spec.default);
        let options = spec.exclusive_options();
        if !options.is_empty() {
            line.push_str(&format!(" options=[{}]", options.join(", ")));
        }
        if let Some(cond) = &spec.enabled_when {
            line.push_str(&format!(" when {}={}", cond.field, cond.equals));
        }
        if spec.read_only {
            line.push_str(" (read-only)");
        }
        println!("{line}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(err) = dlcgui_util::init_tracing() {
        eprintln!("Failed to initialize logging: {err}");
    }
    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Pages => {
            for id in PageId::ALL {
                println!("{:<18} {}", id.as_str(), id.title());
            }
        }
        Cmd::Describe { page, config } => {
            describe(&load_page(page, &config)?);
        }
        Cmd::Run {
            page,
            config,
            videos,
            sets,
            dry_run,
            python,
        } => {
            let def = load_page(page, &config)?;
            let ctx = AppContext::new(env_value(dlcgui_util::ASSETS_ENV, "assets"));
            let mut state = PageState::new(def.clone(), &ctx);

            if !videos.is_empty() {
                let field = def
                    .fields
                    .iter()
                    .find(|spec| spec.kind == dlcgui_core::ParamKind::PathSet)
                    .ok_or_else(|| format!("{page} does not take videos"))?;
                state.add_paths(field.name, videos)?;
            }
            for (name, raw) in &sets {
                let spec = def
                    .field(name)
                    .ok_or_else(|| format!("{page} has no field `{name}`"))?;
                let value = spec.parse_value(raw)?;
                state.set(name, value)?;
            }

            if dry_run {
                let request = state.snapshot()?;
                let calls = marshal::plan(&request)?;
                state
                    .span()
                    .in_scope(|| tracing::info!(task = %request.task(), calls = calls.len(), "dry run"));
                for call in calls {
                    println!("{call}");
                }
                return Ok(());
            }

            let request = state.begin_submission()?;
            let span = state.span().clone();
            tracing::info!(%python, config = %request.project().path().display(), "starting toolkit");
            let sink: LogSink = Arc::new(|output: OutputLine| {
                eprintln!("[{}] {}", output.stream, output.line);
            });
            let mut toolkit =
                PythonToolkit::new(python, tokio::runtime::Handle::current()).with_sink(sink);
            if let Some(dir) = request.project().path().parent() {
                if !dir.as_os_str().is_empty() {
                    toolkit = toolkit.with_working_dir(dir);
                }
            }
            let result = tokio::task::spawn_blocking(move || {
                span.in_scope(|| TaskInvoker::new(toolkit).invoke(&request))
            })
            .await?;
            state.finish_submission();
            if let Some(err) = &result.error {
                tracing::warn!(task = %result.task, "{err}");
            }

            let notice = Notice::for_result(&def, &result);
            println!("{}", notice.text);
            if let Some(detail) = &notice.detail {
                println!("{detail}");
            }
            if notice.level == NoticeLevel::Error {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments_split_on_first_equals() {
        assert_eq!(
            parse_assignment("videotype=.mp4").unwrap(),
            ("videotype".to_string(), ".mp4".to_string())
        );
        assert_eq!(
            parse_assignment("bodyparts=a=b").unwrap(),
            ("bodyparts".to_string(), "a=b".to_string())
        );
        assert!(parse_assignment("=1").is_err());
        assert!(parse_assignment("shuffle").is_err());
    }

    #[test]
    fn cli_parses_run_arguments() {
        let cli = Cli::try_parse_from([
            "dlcgui-cli",
            "run",
            "analyze-videos",
            "--config",
            "/data/config.yaml",
            "--video",
            "/data/a.mp4",
            "--set",
            "shuffle=2",
            "--dry-run",
        ])
        .unwrap();
        match cli.cmd {
            Cmd::Run {
                page,
                videos,
                sets,
                dry_run,
                ..
            } => {
                assert_eq!(page, PageId::AnalyzeVideos);
                assert_eq!(videos, vec![PathBuf::from("/data/a.mp4")]);
                assert_eq!(sets, vec![("shuffle".to_string(), "2".to_string())]);
                assert!(dry_run);
            }
            _ => panic!("expected run"),
        }
    }
}
