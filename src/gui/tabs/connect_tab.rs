use crate::app::{lock_state, NoticeKind, SharedState};
use eframe::egui;
use rust_drive::{
    config::{Config, ServerMode},
    HttpStorageClient, SessionContext, SessionOptions, StorageApi, StorageSession,
};
use std::sync::{Arc, Mutex};
use tokio::runtime::Runtime;
use tracing::{error, info};

#[derive(Clone, Copy, PartialEq)]
enum Action {
    Login,
    Register,
}

pub struct ConnectTab {
    state: SharedState,
    runtime: Arc<Runtime>,
    username: String,
    password: String,
    server_mode: ServerMode,
    local_url: String,
    remote_url: String,
    busy: Arc<Mutex<bool>>,
    loaded: bool,
}

impl ConnectTab {
    pub fn new(state: SharedState, runtime: Arc<Runtime>) -> Self {
        Self {
            state,
            runtime,
            username: String::new(),
            password: String::new(),
            server_mode: ServerMode::default(),
            local_url: String::new(),
            remote_url: String::new(),
            busy: Arc::new(Mutex::new(false)),
            loaded: false,
        }
    }

    fn load_from_config(&mut self) {
        let state = lock_state(&self.state);
        self.username = state.config.username.clone().unwrap_or_default();
        self.server_mode = state.config.server.mode;
        self.local_url = state.config.server.local_url.clone();
        self.remote_url = state.config.server.remote_url.clone();
        self.loaded = true;
    }

    fn edited_config(&self) -> Config {
        let mut config = lock_state(&self.state).config.clone();
        config.server.mode = self.server_mode;
        config.server.local_url = self.local_url.trim().to_string();
        config.server.remote_url = self.remote_url.trim().to_string();
        let username = self.username.trim();
        config.username = (!username.is_empty()).then(|| username.to_string());
        config
    }

    pub fn show(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        if !self.loaded {
            self.load_from_config();
        }

        ui.vertical_centered(|ui| {
            ui.add_space(40.0);
            ui.heading("🗄️ Rust Drive");
            ui.add_space(20.0);
        });

        ui.group(|ui| {
            ui.heading("Account");
            egui::Grid::new("account_grid")
                .num_columns(2)
                .spacing([40.0, 8.0])
                .show(ui, |ui| {
                    ui.label("Username:");
                    ui.text_edit_singleline(&mut self.username);
                    ui.end_row();

                    ui.label("Password:");
                    ui.add(egui::TextEdit::singleline(&mut self.password).password(true));
                    ui.end_row();
                });
        });

        ui.add_space(10.0);

        ui.group(|ui| {
            ui.heading("Server");
            ui.horizontal(|ui| {
                ui.radio_value(&mut self.server_mode, ServerMode::Local, "Local");
                ui.radio_value(&mut self.server_mode, ServerMode::Remote, "Remote");
            });
            egui::Grid::new("server_grid")
                .num_columns(2)
                .spacing([40.0, 8.0])
                .show(ui, |ui| {
                    ui.label("Local URL:");
                    ui.text_edit_singleline(&mut self.local_url);
                    ui.end_row();

                    ui.label("Remote URL:");
                    ui.text_edit_singleline(&mut self.remote_url);
                    ui.end_row();
                });
        });

        ui.add_space(20.0);

        let busy = *self.busy.lock().unwrap_or_else(|e| e.into_inner());
        ui.horizontal(|ui| {
            ui.add_enabled_ui(!busy, |ui| {
                if ui.button("🔑 Login").clicked() {
                    self.submit(Action::Login, ctx);
                }
                if ui.button("📝 Create Account").clicked() {
                    self.submit(Action::Register, ctx);
                }
            });

            if ui.button("💾 Save Settings").clicked() {
                self.save_settings();
            }

            if busy {
                ui.spinner();
                ctx.request_repaint_after(std::time::Duration::from_millis(100));
            }
        });
    }

    fn save_settings(&mut self) {
        let config = self.edited_config();
        let mut state = lock_state(&self.state);
        match Config::default_path() {
            Some(path) => match config.save_to_file(&path) {
                Ok(()) => {
                    state.config = config;
                    state.notify(NoticeKind::Success, format!("Settings saved to {}", path.display()));
                }
                Err(e) => state.notify(NoticeKind::Error, format!("Failed to save settings: {}", e)),
            },
            None => state.notify(NoticeKind::Error, "No config directory available"),
        }
    }

    fn submit(&mut self, action: Action, ctx: &egui::Context) {
        let username = self.username.trim().to_string();
        let password = self.password.clone();
        if username.is_empty() || password.is_empty() {
            lock_state(&self.state).notify(NoticeKind::Error, "Please fill in both fields!");
            return;
        }

        let config = self.edited_config();
        let client = match config.base_url().and_then(|url| Ok(HttpStorageClient::new(url)?)) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                lock_state(&self.state).notify(NoticeKind::Error, format!("Invalid server address: {}", e));
                return;
            }
        };

        *self.busy.lock().unwrap_or_else(|e| e.into_inner()) = true;
        let state = self.state.clone();
        let busy = self.busy.clone();
        let ctx = ctx.clone();

        self.runtime.spawn(async move {
            match action {
                Action::Login => match client.login(&username, &password).await {
                    Ok(()) => {
                        info!("Logged in as {}", username);
                        let session = StorageSession::new(
                            client,
                            SessionContext::new(username.clone()),
                            SessionOptions::from(&config),
                        );
                        session.open().await;

                        let mut state = lock_state(&state);
                        state.config = config;
                        state.session = Some(session);
                        state.notify(NoticeKind::Success, format!("Welcome, {}!", username));
                    }
                    Err(e) => {
                        error!("Login failed: {}", e);
                        lock_state(&state).notify(NoticeKind::Error, format!("Login failed: {}", e));
                    }
                },
                Action::Register => match client.register(&username, &password).await {
                    Ok(()) => lock_state(&state)
                        .notify(NoticeKind::Success, "Account created. You can now log in."),
                    Err(e) => lock_state(&state)
                        .notify(NoticeKind::Error, format!("Registration failed: {}", e)),
                },
            }

            *busy.lock().unwrap_or_else(|e| e.into_inner()) = false;
            ctx.request_repaint();
        });
    }
}
