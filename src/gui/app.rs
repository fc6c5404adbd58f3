use crate::tabs::{ActivityTab, ConnectTab, FilesTab};
use eframe::egui;
use rust_drive::{config::Config, FolderKey, StorageSession};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::runtime::Runtime;
use tracing::warn;

#[derive(Clone, Copy, PartialEq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

#[derive(Clone)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
    pub expires_at: Instant,
}

pub struct AppState {
    pub config: Config,
    pub session: Option<StorageSession>,
    pub notice: Option<Notice>,
}

impl AppState {
    /// Shows `text` in the banner, replacing whatever was there along with
    /// its expiry.
    pub fn notify(&mut self, kind: NoticeKind, text: impl Into<String>) {
        let expires_at = Instant::now() + self.config.notice_lifetime();
        self.notice = Some(Notice {
            text: text.into(),
            kind,
            expires_at,
        });
    }
}

pub type SharedState = Arc<Mutex<AppState>>;

pub fn lock_state(state: &SharedState) -> MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(PartialEq)]
enum Tab {
    Files,
    Activity,
}

pub struct DriveApp {
    state: SharedState,
    runtime: Arc<Runtime>,
    active_tab: Tab,
    connect_tab: ConnectTab,
    files_tab: FilesTab,
    activity_tab: ActivityTab,
    // Some while the new-folder dialog is open.
    new_folder_name: Option<String>,
}

impl DriveApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, runtime: Arc<Runtime>) -> Self {
        let config = Config::load(None).unwrap_or_else(|e| {
            warn!("Falling back to default configuration: {:#}", e);
            Config::default()
        });
        let state = Arc::new(Mutex::new(AppState {
            config,
            session: None,
            notice: None,
        }));

        Self {
            state: state.clone(),
            runtime: runtime.clone(),
            active_tab: Tab::Files,
            connect_tab: ConnectTab::new(state.clone(), runtime.clone()),
            files_tab: FilesTab::new(state.clone(), runtime.clone()),
            activity_tab: ActivityTab::new(state, runtime),
            new_folder_name: None,
        }
    }

    fn open_folder(&mut self, session: &StorageSession, folder: FolderKey, ctx: &egui::Context) {
        self.active_tab = Tab::Files;
        if session.current_folder() == folder {
            return;
        }

        let session = session.clone();
        let state = self.state.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            if let Err(e) = session.select_folder(folder.clone()).await {
                lock_state(&state).notify(NoticeKind::Error, format!("Could not open {}: {}", folder, e));
            }
            ctx.request_repaint();
        });
    }

    fn create_folder(&mut self, session: &StorageSession, name: String, ctx: &egui::Context) {
        let session = session.clone();
        let state = self.state.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            match session.create_folder(&name).await {
                Ok(()) => lock_state(&state)
                    .notify(NoticeKind::Success, format!("Folder \"{}\" created", name.trim())),
                Err(e) => lock_state(&state)
                    .notify(NoticeKind::Error, format!("Error creating folder: {}", e)),
            }
            ctx.request_repaint();
        });
    }

    fn logout(&mut self) {
        let mut state = lock_state(&self.state);
        state.session = None;
        state.notify(NoticeKind::Info, "Logged out");
        self.active_tab = Tab::Files;
        self.new_folder_name = None;
        self.activity_tab.reset();
    }

    fn show_folder_dialog(&mut self, session: &StorageSession, ctx: &egui::Context) {
        let Some(name) = self.new_folder_name.as_mut() else {
            return;
        };

        let mut submit = false;
        let mut close = false;
        egui::Window::new("New Folder")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("Folder name:");
                let response = ui.text_edit_singleline(name);
                if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    submit = true;
                }
                ui.horizontal(|ui| {
                    if ui.button("Create").clicked() {
                        submit = true;
                    }
                    if ui.button("Cancel").clicked() {
                        close = true;
                    }
                });
            });

        if submit {
            if let Some(name) = self.new_folder_name.take() {
                self.create_folder(session, name, ctx);
            }
        } else if close {
            self.new_folder_name = None;
        }
    }

    fn show_notice(&self, ctx: &egui::Context) {
        let mut state = lock_state(&self.state);
        let Some(notice) = state.notice.clone() else {
            return;
        };

        let now = Instant::now();
        if now >= notice.expires_at {
            state.notice = None;
            return;
        }
        drop(state);

        let fill = match notice.kind {
            NoticeKind::Info => egui::Color32::from_rgb(0x25, 0x63, 0xeb),
            NoticeKind::Success => egui::Color32::from_rgb(0x10, 0xb9, 0x81),
            NoticeKind::Error => egui::Color32::from_rgb(0xef, 0x44, 0x44),
        };

        let mut dismissed = false;
        egui::Area::new(egui::Id::new("notice_banner"))
            .anchor(egui::Align2::RIGHT_TOP, [-20.0, 20.0])
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                egui::Frame::none()
                    .fill(fill)
                    .rounding(8.0)
                    .inner_margin(egui::Margin::symmetric(20.0, 12.0))
                    .show(ui, |ui| {
                        ui.set_max_width(320.0);
                        ui.horizontal(|ui| {
                            ui.label(egui::RichText::new(&notice.text).color(egui::Color32::WHITE));
                            if ui.small_button("✖").clicked() {
                                dismissed = true;
                            }
                        });
                    });
            });

        if dismissed {
            lock_state(&self.state).notice = None;
        } else {
            ctx.request_repaint_after(notice.expires_at - now);
        }
    }
}

impl eframe::App for DriveApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let session = lock_state(&self.state).session.clone();

        let Some(session) = session else {
            egui::CentralPanel::default().show(ctx, |ui| {
                self.connect_tab.show(ui, ctx);
            });
            self.show_notice(ctx);
            return;
        };

        let snapshot = session.snapshot();
        let current = snapshot.listing.folder.clone();

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("🗄️ Rust Drive");
                ui.separator();
                ui.label(format!("Welcome, {}!", session.username()));
                ui.separator();
                let mode = lock_state(&self.state).config.server.mode;
                ui.colored_label(egui::Color32::GRAY, format!("Server: {}", mode));
            });
        });

        egui::SidePanel::left("side_panel")
            .default_width(170.0)
            .show(ctx, |ui| {
                ui.vertical(|ui| {
                    ui.heading("Folders");
                    ui.separator();

                    let folders = std::iter::once(FolderKey::Home)
                        .chain(snapshot.subfolders.iter().map(|name| FolderKey::subfolder(name)));
                    for folder in folders {
                        let selected = self.active_tab == Tab::Files && folder == current;
                        if ui.selectable_label(selected, folder.to_string()).clicked() {
                            self.open_folder(&session, folder, ctx);
                        }
                    }

                    ui.separator();
                    if ui
                        .selectable_label(self.active_tab == Tab::Activity, "📜 Activity")
                        .clicked()
                    {
                        self.active_tab = Tab::Activity;
                    }

                    ui.add_space(12.0);
                    if ui.button("➕ Add Folder").clicked() {
                        self.new_folder_name = Some(String::new());
                    }
                    if ui.button("🚪 Logout").clicked() {
                        self.logout();
                    }
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| match self.active_tab {
            Tab::Files => self.files_tab.show(ui, ctx, &session, &snapshot),
            Tab::Activity => self.activity_tab.show(ui, ctx, &session),
        });

        self.show_folder_dialog(&session, ctx);
        self.show_notice(ctx);
    }
}
