use std::{path::Path, sync::Arc};

use dlcgui_core::{
    PageId, ProjectConfig, TaskInvocationError, TaskInvoker, TaskRequest, TaskResult,
};
use dlcgui_runner::{LogSink, OutputLine, PythonToolkit};
use dlcgui_util::now_millis;
use tokio::runtime::Handle;

use crate::commands::{AppEvent, UiCommand};
use crate::ui_events::UiEventSender;

pub(crate) async fn handle_command(
    cmd: UiCommand,
    ui: UiEventSender,
    tasks: &mut tokio::task::JoinSet<()>,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        UiCommand::RunTask {
            request,
            python,
            span,
        } => {
            let page = request.page();
            ui.send(AppEvent::Log {
                page,
                line: format!("Running {} with {python}\n", request.task().label()),
            });
            ui.send(AppEvent::TaskStarted { page });

            let toolkit = build_toolkit(&python, request.project().path(), page, ui.clone());
            let started_at = now_millis();
            tasks.spawn(async move {
                let result = run_request(toolkit, request, span).await;
                let elapsed = now_millis() - started_at;
                ui.send(AppEvent::Log {
                    page,
                    line: format!("{} finished after {:.1}s\n", result.task.label(), elapsed as f64 / 1000.0),
                });
                ui.send(AppEvent::TaskFinished { page, result });
            });
        }
        UiCommand::LoadProject { path } => {
            let loaded = tokio::task::spawn_blocking({
                let path = path.clone();
                move || ProjectConfig::load(path)
            })
            .await?;
            match loaded {
                Ok(project) => {
                    tracing::info!(path = %path.display(), "project loaded");
                    ui.send(AppEvent::ProjectLoaded {
                        project: Arc::new(project),
                    });
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), "project load failed: {err}");
                    ui.send(AppEvent::ProjectFailed {
                        path,
                        error: err.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn build_toolkit(python: &str, config_path: &Path, page: PageId, ui: UiEventSender) -> PythonToolkit {
    let sink: LogSink = Arc::new(move |output: OutputLine| {
        ui.send(AppEvent::Log {
            page,
            line: format_output_line(&output),
        });
    });
    let toolkit = PythonToolkit::new(python, Handle::current()).with_sink(sink);
    match config_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        Some(dir) => toolkit.with_working_dir(dir),
        None => toolkit,
    }
}

// The invoker blocks on each toolkit call, so it runs off the runtime threads.
async fn run_request(toolkit: PythonToolkit, request: TaskRequest, span: tracing::Span) -> TaskResult {
    let task = request.task();
    let joined = tokio::task::spawn_blocking(move || {
        span.in_scope(|| TaskInvoker::new(toolkit).invoke(&request))
    })
    .await;
    match joined {
        Ok(result) => result,
        Err(err) => TaskResult::failed(
            task,
            TaskInvocationError {
                task,
                message: format!("task worker stopped: {err}"),
            },
            Vec::new(),
        ),
    }
}

fn format_output_line(output: &OutputLine) -> String {
    format!("[{}] {}\n", output.stream, output.line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_lines_are_tagged_with_their_stream() {
        let line = OutputLine {
            stream: "stderr",
            line: "Loading DLC 2.3.9...".into(),
        };
        assert_eq!(format_output_line(&line), "[stderr] Loading DLC 2.3.9...\n");
    }

    #[tokio::test]
    async fn missing_project_file_reports_failure() {
        let (queue, _rx) = crate::ui_events::UiEventQueue::new(8);
        let mut tasks = tokio::task::JoinSet::new();
        let path = std::env::temp_dir().join("dlcgui-missing-project/config.yaml");
        handle_command(
            UiCommand::LoadProject { path: path.clone() },
            queue.sender(),
            &mut tasks,
        )
        .await
        .unwrap();

        let events = queue.drain();
        assert!(matches!(
            &events[..],
            [AppEvent::ProjectFailed { path: failed, .. }] if *failed == path
        ));
    }
}
