use std::{
    cell::{Cell, RefCell},
    path::{Path, PathBuf},
    rc::Rc,
    sync::{Arc, Mutex},
};

use dlcgui_core::{
    param::NO, param::YES, Constraint, Notice, NoticeLevel, PageDef,
    PageState, ParamKind, ParamValue, SubmitError, TaskError,
};
use gtk::gio::prelude::{FileExt, ListModelExt};
use gtk::glib::ControlFlow;
use gtk::prelude::*;
use gtk4 as gtk;
use tokio::sync::mpsc;

use crate::commands::UiCommand;
use crate::config::AppConfig;

const SECTION_SPACING: i32 = 12;
const ROW_SPACING: i32 = 8;
const COL_SPACING: i32 = 8;
const INTRO_SPACING: i32 = 4;
const PAGE_MARGIN: i32 = 12;
const LABEL_WIDTH_CHARS: i32 = 28;
const INT_FALLBACK_MAX: f64 = 1_000_000.0;

#[derive(Clone)]
pub(crate) struct Page {
    pub(crate) root: gtk::Box,
    pub(crate) container: gtk::Box,
    pub(crate) buffer: gtk::TextBuffer,
    pub(crate) textview: gtk::TextView,
}

impl Page {
    pub(crate) fn append(&self, s: &str) {
        const MAX_CHARS: i32 = 200_000;
        const TRIM_CHARS: i32 = 20_000;
        const MAX_LINES: i32 = 2_000;

        let mut end = self.buffer.end_iter();
        self.buffer.insert(&mut end, s);

        let line_count = self.buffer.line_count();
        if line_count > MAX_LINES {
            let mut start = self.buffer.start_iter();
            let mut cut = self.buffer.start_iter();
            cut.forward_lines(line_count - MAX_LINES);
            self.buffer.delete(&mut start, &mut cut);
        }

        if self.buffer.char_count() > MAX_CHARS {
            let mut start = self.buffer.start_iter();
            let mut cut = self.buffer.start_iter();
            cut.forward_chars(TRIM_CHARS);
            self.buffer.delete(&mut start, &mut cut);
        }

        let mut end = self.buffer.end_iter();
        self.textview.scroll_to_iter(&mut end, 0.0, false, 0.0, 0.0);
    }

    pub(crate) fn clear(&self) {
        self.buffer.set_text("");
    }
}

pub(crate) fn make_page(title: &str, description: &str) -> Page {
    let container = gtk::Box::new(gtk::Orientation::Vertical, SECTION_SPACING);
    container.set_margin_top(PAGE_MARGIN);
    container.set_margin_bottom(PAGE_MARGIN);
    container.set_margin_start(PAGE_MARGIN);
    container.set_margin_end(PAGE_MARGIN);

    let header = gtk::Label::builder()
        .label(title)
        .xalign(0.0)
        .css_classes(vec!["title-2"])
        .build();

    let description_label = gtk::Label::builder()
        .label(description)
        .xalign(0.0)
        .wrap(true)
        .css_classes(vec!["dim-label"])
        .build();

    let intro = gtk::Box::new(gtk::Orientation::Vertical, INTRO_SPACING);
    intro.append(&header);
    intro.append(&description_label);
    container.append(&intro);

    let log_scroller = gtk::ScrolledWindow::builder()
        .hexpand(true)
        .vexpand(false)
        .hscrollbar_policy(gtk::PolicyType::Automatic)
        .vscrollbar_policy(gtk::PolicyType::Automatic)
        .build();

    let textview = gtk::TextView::builder()
        .editable(false)
        .monospace(true)
        .wrap_mode(gtk::WrapMode::None)
        .build();

    let buffer = textview.buffer();
    log_scroller.set_child(Some(&textview));

    let content_scroller = gtk::ScrolledWindow::builder()
        .hexpand(true)
        .vexpand(true)
        .hscrollbar_policy(gtk::PolicyType::Automatic)
        .vscrollbar_policy(gtk::PolicyType::Always)
        .build();
    content_scroller.set_child(Some(&container));

    let root = gtk::Box::new(gtk::Orientation::Vertical, 0);
    root.set_hexpand(true);
    root.set_vexpand(true);
    root.append(&content_scroller);
    root.append(&log_scroller);

    let log_scroller_for_size = log_scroller.clone();
    let last_height = Cell::new(0);
    root.add_tick_callback(move |root, _| {
        let height = root.allocation().height();
        if height <= 0 || last_height.get() == height {
            return ControlFlow::Continue;
        }
        last_height.set(height);
        let target = (((height as f64) * 0.25).round() as i32).max(1);
        if log_scroller_for_size.height_request() != target {
            log_scroller_for_size.set_height_request(target);
        }
        ControlFlow::Continue
    });

    Page {
        root,
        container,
        buffer,
        textview,
    }
}

enum FieldWidget {
    Choice(gtk::DropDown),
    YesNo {
        yes: gtk::CheckButton,
        no: gtk::CheckButton,
    },
    Check(gtk::CheckButton),
    Int(gtk::SpinButton),
    Path(gtk::Entry),
    PathSet {
        select: gtk::Button,
        clear: gtk::Button,
        count: gtk::Label,
    },
    Subset(Vec<gtk::CheckButton>),
}

struct FieldRow {
    name: &'static str,
    row: gtk::Box,
    widget: FieldWidget,
}

/// One task page: the form widgets, its `PageState`, and the run button.
/// Widgets only ever write through `PageState`; `sync` pushes state back out.
#[derive(Clone)]
pub(crate) struct FormPage {
    pub(crate) page: Page,
    pub(crate) state: Rc<RefCell<PageState>>,
    pub(crate) run_btn: gtk::Button,
    rows: Rc<Vec<FieldRow>>,
    syncing: Rc<Cell<bool>>,
}

impl FormPage {
    pub(crate) fn append(&self, s: &str) {
        self.page.append(s);
    }

    pub(crate) fn def(&self) -> PageDef {
        self.state.borrow().def().clone()
    }

    /// Refreshes widget values and sensitivity from the page state.
    pub(crate) fn sync(&self) {
        self.syncing.set(true);
        let state = self.state.borrow();
        let busy = state.is_in_flight();
        for row in self.rows.iter() {
            let Some(field) = state.field(row.name) else {
                continue;
            };
            let editable = !field.spec().read_only && state.is_enabled(row.name) && !busy;
            row.row.set_sensitive(editable);
            apply_value(&row.widget, field.get(), &field.options());
        }
        self.run_btn.set_sensitive(!busy);
        drop(state);
        self.syncing.set(false);
    }

    pub(crate) fn finish_submission(&self) {
        self.state.borrow_mut().finish_submission();
        self.sync();
    }

    fn update(&self, name: &str, change: impl FnOnce(&mut PageState) -> Result<(), String>) {
        if self.syncing.get() {
            return;
        }
        let outcome = change(&mut self.state.borrow_mut());
        if let Err(err) = outcome {
            self.append(&format!("{err}\n"));
            tracing::debug!(field = name, "rejected edit: {err}");
        }
        self.sync();
    }
}

fn apply_value(widget: &FieldWidget, value: &ParamValue, options: &[String]) {
    match (widget, value) {
        (FieldWidget::Choice(dropdown), ParamValue::Choice(choice)) => {
            if let Some(idx) = options.iter().position(|opt| opt == choice) {
                if dropdown.selected() != idx as u32 {
                    dropdown.set_selected(idx as u32);
                }
            }
        }
        (FieldWidget::YesNo { yes, no }, ParamValue::Bool(flag)) => {
            yes.set_active(*flag);
            no.set_active(!*flag);
        }
        (FieldWidget::Check(check), ParamValue::Bool(flag)) => {
            check.set_active(*flag);
        }
        (FieldWidget::Int(spin), ParamValue::Int(n)) => {
            if spin.value_as_int() as i64 != *n {
                spin.set_value(*n as f64);
            }
        }
        (FieldWidget::Path(entry), ParamValue::Path(path)) => {
            entry.set_text(&path.display().to_string());
        }
        (FieldWidget::PathSet { count, clear, .. }, ParamValue::PathSet(paths)) => {
            count.set_text(&format!("Total {} videos selected", paths.len()));
            clear.set_sensitive(!paths.is_empty());
        }
        (FieldWidget::Subset(checks), ParamValue::Subset(chosen)) => {
            for check in checks {
                let label = check.label().map(|l| l.to_string()).unwrap_or_default();
                check.set_active(chosen.contains(&label));
            }
        }
        _ => {}
    }
}

pub(crate) fn page_form(
    state: PageState,
    parent: &gtk::ApplicationWindow,
    cfg: Arc<Mutex<AppConfig>>,
    cmd_tx: mpsc::Sender<UiCommand>,
) -> FormPage {
    let def = state.def().clone();
    let page = make_page(def.title, def.description);

    let mut rows = Vec::new();
    let mut sections: Vec<(&'static str, gtk::Box)> = Vec::new();
    for spec in &def.fields {
        let section_box = match sections.iter().find(|(name, _)| *name == spec.section) {
            Some((_, section_box)) => section_box.clone(),
            None => {
                let frame = gtk::Frame::builder().label(spec.section).build();
                let section_box = gtk::Box::new(gtk::Orientation::Vertical, ROW_SPACING);
                section_box.set_margin_top(ROW_SPACING);
                section_box.set_margin_bottom(ROW_SPACING);
                section_box.set_margin_start(ROW_SPACING);
                section_box.set_margin_end(ROW_SPACING);
                frame.set_child(Some(&section_box));
                page.container.append(&frame);
                sections.push((spec.section, section_box.clone()));
                section_box
            }
        };

        let row = gtk::Box::new(gtk::Orientation::Horizontal, COL_SPACING);
        let label = gtk::Label::builder()
            .label(spec.label.as_str())
            .xalign(0.0)
            .width_chars(LABEL_WIDTH_CHARS)
            .wrap(true)
            .build();
        if !spec.help.is_empty() {
            label.set_tooltip_text(Some(&spec.help));
        }
        row.append(&label);

        let widget = match spec.kind {
            ParamKind::Choice => {
                let options: Vec<&str> = spec.options.iter().map(String::as_str).collect();
                let dropdown = gtk::DropDown::from_strings(&options);
                row.append(&dropdown);
                FieldWidget::Choice(dropdown)
            }
            ParamKind::Bool => match spec.bool_style {
                dlcgui_core::BoolStyle::YesNo => {
                    let yes = gtk::CheckButton::with_label(YES);
                    let no = gtk::CheckButton::with_label(NO);
                    no.set_group(Some(&yes));
                    row.append(&yes);
                    row.append(&no);
                    FieldWidget::YesNo { yes, no }
                }
                dlcgui_core::BoolStyle::Check => {
                    let check = gtk::CheckButton::new();
                    row.append(&check);
                    FieldWidget::Check(check)
                }
            },
            ParamKind::Int => {
                let (min, max) = match spec.constraint {
                    Some(Constraint::Range { min, max }) => (min as f64, max as f64),
                    _ => (0.0, INT_FALLBACK_MAX),
                };
                let spin = gtk::SpinButton::with_range(min, max, 1.0);
                spin.set_digits(0);
                row.append(&spin);
                FieldWidget::Int(spin)
            }
            ParamKind::Path => {
                let entry = gtk::Entry::builder().editable(false).hexpand(true).build();
                row.append(&entry);
                FieldWidget::Path(entry)
            }
            ParamKind::PathSet => {
                let select = gtk::Button::with_label("Select videos");
                let clear = gtk::Button::with_label("Clear");
                let count = gtk::Label::builder().label("Total 0 videos selected").xalign(0.0).build();
                row.append(&select);
                row.append(&clear);
                row.append(&count);
                FieldWidget::PathSet {
                    select,
                    clear,
                    count,
                }
            }
            ParamKind::Subset => {
                let flow = gtk::FlowBox::builder()
                    .selection_mode(gtk::SelectionMode::None)
                    .hexpand(true)
                    .max_children_per_line(6)
                    .build();
                let checks: Vec<gtk::CheckButton> = spec
                    .options
                    .iter()
                    .map(|option| {
                        let check = gtk::CheckButton::with_label(option);
                        flow.insert(&check, -1);
                        check
                    })
                    .collect();
                row.append(&flow);
                FieldWidget::Subset(checks)
            }
        };

        section_box.append(&row);
        rows.push(FieldRow {
            name: spec.name,
            row,
            widget,
        });
    }

    let actions = gtk::Box::new(gtk::Orientation::Horizontal, COL_SPACING);
    let run_btn = gtk::Button::with_label(def.action_label);
    run_btn.add_css_class("suggested-action");
    let clear_log_btn = gtk::Button::with_label("Clear log");
    actions.append(&run_btn);
    actions.append(&clear_log_btn);
    page.container.append(&actions);

    let form = FormPage {
        page,
        state: Rc::new(RefCell::new(state)),
        run_btn,
        rows: Rc::new(rows),
        syncing: Rc::new(Cell::new(false)),
    };

    for row in form.rows.iter() {
        connect_row(&form, row, parent);
    }

    {
        let page = form.page.clone();
        clear_log_btn.connect_clicked(move |_| page.clear());
    }

    {
        let form_run = form.clone();
        let parent = parent.clone();
        form.run_btn.connect_clicked(move |_| {
            submit(&form_run, &parent, &cfg, &cmd_tx);
        });
    }

    form.sync();
    form
}

fn connect_row(form: &FormPage, row: &FieldRow, parent: &gtk::ApplicationWindow) {
    let name = row.name;
    match &row.widget {
        FieldWidget::Choice(dropdown) => {
            let form = form.clone();
            dropdown.connect_selected_notify(move |dropdown| {
                let idx = dropdown.selected() as usize;
                form.update(name, |state| {
                    let option = state
                        .field(name)
                        .and_then(|field| field.options().get(idx).cloned())
                        .ok_or_else(|| format!("{name}: no option at {idx}"))?;
                    state.select_option(name, &option).map_err(|err| err.to_string())
                });
            });
        }
        FieldWidget::YesNo { yes, no } => {
            for (button, option) in [(yes, YES), (no, NO)] {
                let form = form.clone();
                button.connect_toggled(move |button| {
                    if !button.is_active() {
                        return;
                    }
                    form.update(name, |state| {
                        state.select_option(name, option).map_err(|err| err.to_string())
                    });
                });
            }
        }
        FieldWidget::Check(check) => {
            let form = form.clone();
            check.connect_toggled(move |check| {
                let value = ParamValue::Bool(check.is_active());
                form.update(name, |state| state.set(name, value).map_err(|err| err.to_string()));
            });
        }
        FieldWidget::Int(spin) => {
            let form = form.clone();
            spin.connect_value_changed(move |spin| {
                let value = ParamValue::Int(spin.value_as_int() as i64);
                form.update(name, |state| state.set(name, value).map_err(|err| err.to_string()));
            });
        }
        FieldWidget::Path(_) => {}
        FieldWidget::PathSet { select, clear, .. } => {
            {
                let form = form.clone();
                let parent = parent.clone();
                select.connect_clicked(move |_| {
                    let form = form.clone();
                    let patterns = form.state.borrow().video_patterns(name);
                    select_videos_dialog(&parent, &patterns, move |paths| {
                        form.update(name, |state| {
                            let added = state.add_paths(name, paths).map_err(|err| err.to_string())?;
                            state.span().in_scope(|| tracing::info!("{added} videos added"));
                            Ok(())
                        });
                    });
                });
            }
            let form = form.clone();
            clear.connect_clicked(move |_| {
                form.update(name, |state| state.reset(name).map_err(|err| err.to_string()));
            });
        }
        FieldWidget::Subset(checks) => {
            for check in checks {
                let form = form.clone();
                let all_checks = checks.clone();
                check.connect_toggled(move |_| {
                    let chosen: Vec<String> = all_checks
                        .iter()
                        .filter(|check| check.is_active())
                        .filter_map(|check| check.label().map(|l| l.to_string()))
                        .collect();
                    form.update(name, |state| {
                        state
                            .set(name, ParamValue::Subset(chosen))
                            .map_err(|err| err.to_string())
                    });
                });
            }
        }
    }
}

fn submit(
    form: &FormPage,
    parent: &gtk::ApplicationWindow,
    cfg: &Arc<Mutex<AppConfig>>,
    cmd_tx: &mpsc::Sender<UiCommand>,
) {
    let outcome = form.state.borrow_mut().begin_submission();
    match outcome {
        Ok(request) => {
            let span = form.state.borrow().span().clone();
            let python = cfg.lock().unwrap().python.clone();
            form.sync();
            if cmd_tx
                .try_send(UiCommand::RunTask {
                    request,
                    python,
                    span,
                })
                .is_err()
            {
                form.append("Task queue is unavailable, try again\n");
                form.finish_submission();
            }
        }
        Err(SubmitError::InFlight(_)) => {
            form.append("A task from this page is still running\n");
        }
        Err(SubmitError::Incomplete(err)) => {
            show_notice(parent, &Notice::for_error(&TaskError::from(err)));
        }
    }
}

pub(crate) fn show_notice(parent: &gtk::ApplicationWindow, notice: &Notice) {
    let message_type = match notice.level {
        NoticeLevel::Info => gtk::MessageType::Info,
        NoticeLevel::Error => gtk::MessageType::Error,
    };
    let dialog = gtk::MessageDialog::builder()
        .transient_for(parent)
        .modal(true)
        .message_type(message_type)
        .title(notice.title.as_str())
        .text(notice.text.as_str())
        .build();
    if let Some(detail) = &notice.detail {
        dialog.set_secondary_text(Some(detail.as_str()));
    }
    dialog.add_button("OK", gtk::ResponseType::Close);
    dialog.connect_response(|dialog, _| dialog.close());
    dialog.show();
}

fn select_videos_dialog<F>(parent: &gtk::ApplicationWindow, patterns: &[String], on_accept: F)
where
    F: Fn(Vec<PathBuf>) + 'static,
{
    let dialog = gtk::FileChooserNative::new(
        Some("Select videos"),
        Some(parent),
        gtk::FileChooserAction::Open,
        Some("Open"),
        Some("Cancel"),
    );
    dialog.set_select_multiple(true);

    let filter = gtk::FileFilter::new();
    let label = format!("Video files ({})", patterns.join(" "));
    filter.set_name(Some(label.as_str()));
    for pattern in patterns {
        filter.add_pattern(pattern);
    }
    dialog.add_filter(&filter);
    dialog.set_filter(&filter);

    dialog.connect_response(move |dialog, response| {
        if response == gtk::ResponseType::Accept {
            let files = dialog.files();
            let paths: Vec<PathBuf> = (0..files.n_items())
                .filter_map(|idx| files.item(idx))
                .filter_map(|item| item.downcast::<gtk::gio::File>().ok())
                .filter_map(|file| file.path())
                .collect();
            if !paths.is_empty() {
                on_accept(paths);
            }
        }
        dialog.destroy();
    });

    dialog.show();
}

pub(crate) fn select_project_dialog<F>(
    parent: &gtk::ApplicationWindow,
    current: Option<&Path>,
    on_accept: F,
) where
    F: Fn(PathBuf) + 'static,
{
    let dialog = gtk::FileChooserNative::new(
        Some("Open project config"),
        Some(parent),
        gtk::FileChooserAction::Open,
        Some("Open"),
        Some("Cancel"),
    );

    let filter = gtk::FileFilter::new();
    filter.set_name(Some("Project config (.yaml)"));
    filter.add_pattern("*.yaml");
    filter.add_pattern("*.yml");
    dialog.add_filter(&filter);
    dialog.set_filter(&filter);

    if let Some(parent_dir) = current.and_then(Path::parent) {
        let folder = gtk::gio::File::for_path(parent_dir);
        let _ = dialog.set_current_folder(Some(&folder));
    }

    dialog.connect_response(move |dialog, response| {
        if response == gtk::ResponseType::Accept {
            if let Some(path) = dialog.file().and_then(|file| file.path()) {
                on_accept(path);
            }
        }
        dialog.destroy();
    });

    dialog.show();
}
