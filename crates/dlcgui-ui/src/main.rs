mod commands;
mod config;
mod models;
mod pages;
mod ui_events;
mod ui_state;
mod worker;

use std::{
    cell::RefCell,
    collections::BTreeMap,
    rc::Rc,
    sync::{Arc, Mutex},
    thread,
};

use dlcgui_core::{all_pages, AppContext, Notice, PageId, PageState, ProjectConfig};
use glib::prelude::*;
use gtk::gdk;
use gtk::gdk::prelude::{DisplayExt, MonitorExt};
use gtk::gio::prelude::ListModelExt;
use gtk::prelude::*;
use gtk4 as gtk;
use tokio::sync::mpsc;

use commands::{AppEvent, UiCommand};
use config::AppConfig;
use models::ProjectSummary;
use pages::{page_form, select_project_dialog, show_notice, FormPage};
use ui_events::{UiEventQueue, DEFAULT_EVENT_QUEUE_SIZE};
use ui_state::UiState;
use worker::handle_command;

type Forms = Rc<RefCell<BTreeMap<PageId, FormPage>>>;

fn main() {
    if let Err(err) = dlcgui_util::init_tracing() {
        eprintln!("Failed to initialize logging: {err}");
    }

    let app = gtk::Application::builder()
        .application_id("org.deeplabcut.dlcgui")
        .build();

    app.connect_activate(build_ui);
    app.run();
}

fn default_window_size() -> (i32, i32) {
    let mut width = 1100;
    let mut height = 760;

    if let Some(display) = gdk::Display::default() {
        let monitors = display.monitors();
        if let Some(item) = monitors.item(0) {
            if let Ok(monitor) = item.downcast::<gdk::Monitor>() {
                let geometry = monitor.geometry();
                let max_width = (geometry.width() as f32 * 0.9) as i32;
                let max_height = (geometry.height() as f32 * 0.9) as i32;
                if max_width > 0 {
                    width = width.min(max_width);
                }
                if max_height > 0 {
                    height = height.min(max_height);
                }
            }
        }
    }

    (width, height)
}

#[derive(Clone)]
struct ProjectHeader {
    project_label: gtk::Label,
    details_label: gtk::Label,
    path_label: gtk::Label,
}

impl ProjectHeader {
    fn set_summary(&self, summary: &ProjectSummary) {
        self.project_label.set_text(&summary.project_line());
        self.details_label.set_text(&summary.details_line());
        self.path_label.set_text(&summary.config_path);
        self.path_label
            .set_tooltip_text(Some(summary.config_path.as_str()));
    }
}

/// Everything needed to (re)build the task pages for a project.
#[derive(Clone)]
struct PageHost {
    ctx: AppContext,
    window: gtk::ApplicationWindow,
    stack: gtk::Stack,
    forms: Forms,
    cfg: Arc<Mutex<AppConfig>>,
    ui_state: Arc<Mutex<UiState>>,
    cmd_tx: mpsc::Sender<UiCommand>,
}

impl PageHost {
    fn capture_values(&self) {
        let forms = self.forms.borrow();
        let mut ui_state = self.ui_state.lock().unwrap();
        for (id, form) in forms.iter() {
            ui_state.set_values(*id, form.state.borrow().values());
        }
    }

    fn any_in_flight(&self) -> bool {
        self.forms
            .borrow()
            .values()
            .any(|form| form.state.borrow().is_in_flight())
    }

    /// Replaces every page with one bound to `project`, carrying field values
    /// and logs across.
    fn rebuild(&self, project: Arc<ProjectConfig>) {
        self.capture_values();
        let visible = self
            .stack
            .visible_child_name()
            .map(|name| name.to_string())
            .or_else(|| {
                let last = self.cfg.lock().unwrap().last_page.clone();
                (!last.is_empty()).then_some(last)
            });

        let old: Vec<FormPage> = std::mem::take(&mut *self.forms.borrow_mut())
            .into_values()
            .collect();
        for form in old {
            self.stack.remove(&form.page.root);
        }

        let saved = self.ui_state.lock().unwrap().clone();
        let mut forms = BTreeMap::new();
        for def in all_pages(project) {
            let id = def.id;
            let mut state = PageState::new(def, &self.ctx);
            if let Some(page_state) = saved.page(id) {
                let restored = state.restore(&page_state.values);
                tracing::debug!(page = %id, restored, "restored saved values");
            }
            let form = page_form(state, &self.window, self.cfg.clone(), self.cmd_tx.clone());
            if let Some(page_state) = saved.page(id) {
                form.page.append(&page_state.log);
            }
            self.stack
                .add_titled(&form.page.root, Some(id.as_str()), id.title());
            forms.insert(id, form);
        }
        *self.forms.borrow_mut() = forms;

        if let Some(name) = visible {
            if self.stack.child_by_name(&name).is_some() {
                self.stack.set_visible_child_name(&name);
            }
        }
    }
}

fn build_ui(app: &gtk::Application) {
    let (default_width, default_height) = default_window_size();
    let window = gtk::ApplicationWindow::builder()
        .application(app)
        .title("DeepLabCut")
        .default_width(default_width)
        .default_height(default_height)
        .resizable(true)
        .build();

    let cfg = Arc::new(Mutex::new(AppConfig::load()));
    let (initial_state, has_ui_state) = UiState::load_with_status();
    let ui_state = Arc::new(Mutex::new(initial_state));
    let ctx = AppContext::new(cfg.lock().unwrap().assets_dir.clone());
    tracing::info!(has_ui_state, assets = %ctx.asset_root().display(), "starting");

    let (cmd_tx, cmd_rx) = mpsc::channel::<UiCommand>(128);
    let (event_queue, mut notify_rx) = UiEventQueue::new(DEFAULT_EVENT_QUEUE_SIZE);
    let ui_events = event_queue.sender();

    // Worker thread owns the tokio runtime; results come back as AppEvents.
    let mut cmd_rx = cmd_rx;
    thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(err) => {
                eprintln!("failed to build tokio runtime: {err}");
                return;
            }
        };

        rt.block_on(async move {
            let mut tasks = tokio::task::JoinSet::new();

            loop {
                tokio::select! {
                    cmd = cmd_rx.recv() => {
                        let Some(cmd) = cmd else { break };
                        let cmd_name = cmd.name();
                        tracing::debug!(command = cmd_name, "command start");
                        if let Err(err) = handle_command(cmd, ui_events.clone(), &mut tasks).await {
                            tracing::error!(command = cmd_name, "worker error: {err}");
                        }
                    }
                    Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                        if let Err(err) = result {
                            if !err.is_cancelled() {
                                tracing::error!("task error: {err}");
                            }
                        }
                    }
                }
            }
        });
    });

    // Layout: logo + project header + sidebar + stack
    let root = gtk::Box::new(gtk::Orientation::Horizontal, 0);
    let sidebar_width = 220;
    let left_column = gtk::Box::new(gtk::Orientation::Vertical, 0);
    left_column.set_width_request(sidebar_width);
    left_column.set_hexpand(false);
    left_column.set_vexpand(true);

    let stack = gtk::Stack::builder()
        .transition_type(gtk::StackTransitionType::SlideLeftRight)
        .hexpand(true)
        .vexpand(true)
        .build();

    let sidebar = gtk::StackSidebar::builder()
        .stack(&stack)
        .width_request(sidebar_width)
        .build();
    sidebar.set_vexpand(true);

    let logo = gtk::Picture::for_filename(ctx.asset("logo.png"));
    logo.set_can_shrink(true);
    logo.set_height_request(96);
    logo.set_margin_top(8);
    logo.set_margin_start(8);
    logo.set_margin_end(8);

    let project_frame = gtk::Frame::builder().label("Project").build();
    project_frame.set_margin_top(8);
    project_frame.set_margin_bottom(6);
    project_frame.set_margin_start(8);
    project_frame.set_margin_end(8);

    let project_box = gtk::Box::new(gtk::Orientation::Vertical, 4);
    project_box.set_margin_top(6);
    project_box.set_margin_bottom(6);
    project_box.set_margin_start(6);
    project_box.set_margin_end(6);
    let header = ProjectHeader {
        project_label: gtk::Label::builder().label("Project: -").xalign(0.0).build(),
        details_label: gtk::Label::builder()
            .label("")
            .xalign(0.0)
            .css_classes(vec!["dim-label"])
            .build(),
        path_label: gtk::Label::builder()
            .label("")
            .xalign(0.0)
            .ellipsize(gtk::pango::EllipsizeMode::Start)
            .css_classes(vec!["dim-label"])
            .build(),
    };
    let open_btn = gtk::Button::with_label("Open project…");
    project_box.append(&header.project_label);
    project_box.append(&header.details_label);
    project_box.append(&header.path_label);
    project_box.append(&open_btn);
    project_frame.set_child(Some(&project_box));

    left_column.append(&logo);
    left_column.append(&project_frame);
    left_column.append(&sidebar);
    root.append(&left_column);
    root.append(&gtk::Separator::new(gtk::Orientation::Vertical));
    root.append(&stack);

    let host = PageHost {
        ctx,
        window: window.clone(),
        stack: stack.clone(),
        forms: Rc::new(RefCell::new(BTreeMap::new())),
        cfg: cfg.clone(),
        ui_state: ui_state.clone(),
        cmd_tx: cmd_tx.clone(),
    };

    // Pages exist from the start; they bind to the real project once it loads.
    let initial_path = cfg.lock().unwrap().project_config_path();
    let placeholder = ProjectConfig::empty(initial_path.clone().unwrap_or_default());
    host.rebuild(Arc::new(placeholder));
    match initial_path {
        Some(path) => {
            cmd_tx.try_send(UiCommand::LoadProject { path }).ok();
        }
        None => {
            if let Some(form) = host.forms.borrow().values().next() {
                form.append("Open a project config to get started.\n");
            }
        }
    }

    {
        let cfg = cfg.clone();
        let cmd_tx = cmd_tx.clone();
        let window_for_dialog = window.clone();
        open_btn.connect_clicked(move |_| {
            let current = cfg.lock().unwrap().project_config_path();
            let cmd_tx = cmd_tx.clone();
            select_project_dialog(&window_for_dialog, current.as_deref(), move |path| {
                cmd_tx.try_send(UiCommand::LoadProject { path }).ok();
            });
        });
    }

    // Event routing: drain worker events on the GTK thread.
    let host_for_events = host.clone();
    let header_for_events = header.clone();
    let event_queue_for_events = event_queue.clone();
    glib::MainContext::default().spawn_local(async move {
        let host = host_for_events;
        while notify_rx.recv().await.is_some() {
            for ev in event_queue_for_events.drain() {
                match ev {
                    AppEvent::Log { page, line } => {
                        if let Some(form) = host.forms.borrow().get(&page) {
                            form.append(&line);
                        }
                        host.ui_state.lock().unwrap().append_log(page, &line);
                    }
                    AppEvent::TaskStarted { page } => {
                        if let Some(form) = host.forms.borrow().get(&page) {
                            form.sync();
                        }
                    }
                    AppEvent::TaskFinished { page, result } => {
                        let form = host.forms.borrow().get(&page).cloned();
                        if let Some(form) = form {
                            form.finish_submission();
                            let notice = Notice::for_result(&form.def(), &result);
                            form.append(&format!("{}\n", notice.text));
                            show_notice(&host.window, &notice);
                        }
                    }
                    AppEvent::ProjectLoaded { project } => {
                        if host.any_in_flight() {
                            let line = "A task is still running; the project was not switched.\n";
                            for form in host.forms.borrow().values() {
                                form.append(line);
                            }
                            continue;
                        }
                        header_for_events.set_summary(&ProjectSummary::from_config(&project));
                        let path = project.path().display().to_string();
                        host.rebuild(project);
                        let mut cfg = host.cfg.lock().unwrap();
                        cfg.project_config = path;
                        if let Err(err) = cfg.save() {
                            eprintln!("Failed to persist UI config: {err}");
                        }
                    }
                    AppEvent::ProjectFailed { path, error } => {
                        let dialog = gtk::MessageDialog::builder()
                            .transient_for(&host.window)
                            .modal(true)
                            .message_type(gtk::MessageType::Error)
                            .text(format!("Could not open {}", path.display()))
                            .secondary_text(error)
                            .build();
                        dialog.add_button("OK", gtk::ResponseType::Close);
                        dialog.connect_response(|dialog, _| dialog.close());
                        dialog.show();
                    }
                }
            }
        }
    });

    {
        let host = host.clone();
        window.connect_close_request(move |_| {
            host.capture_values();
            if let Err(err) = host.ui_state.lock().unwrap().save() {
                eprintln!("Failed to persist UI state: {err}");
            }
            let mut cfg = host.cfg.lock().unwrap();
            if let Some(name) = host.stack.visible_child_name() {
                cfg.last_page = name.to_string();
            }
            if let Err(err) = cfg.save() {
                eprintln!("Failed to persist UI config: {err}");
            }
            glib::Propagation::Proceed
        });
    }

    window.set_child(Some(&root));
    window.present();
}
