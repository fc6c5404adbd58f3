use crate::app::{lock_state, NoticeKind, SharedState};
use eframe::egui;
use rust_drive::{
    delete::DeletionOutcome,
    progress::{format_eta, format_file_size},
    session::FileSink,
    SessionSnapshot, StorageSession, UploadSource,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

enum RowAction {
    Download(String),
    Delete(String),
}

pub struct FilesTab {
    state: SharedState,
    runtime: Arc<Runtime>,
}

impl FilesTab {
    pub fn new(state: SharedState, runtime: Arc<Runtime>) -> Self {
        Self { state, runtime }
    }

    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        ctx: &egui::Context,
        session: &StorageSession,
        snapshot: &SessionSnapshot,
    ) {
        let folder = &snapshot.listing.folder;

        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|file| file.path.clone())
                .collect()
        });
        if !dropped.is_empty() {
            self.upload_paths(session, dropped, ctx);
        }

        ui.horizontal(|ui| {
            ui.heading(format!("📁 {}", folder));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if !folder.is_home() && ui.button("🗑️ Delete Folder").clicked() {
                    if let Err(e) = session.delete_current_folder() {
                        lock_state(&self.state).notify(NoticeKind::Error, e.to_string());
                    }
                }
                if ui.button("⬆️ Upload Files").clicked() {
                    if let Some(paths) = rfd::FileDialog::new().pick_files() {
                        self.upload_paths(session, paths, ctx);
                    }
                }
                if ui.button("🔄 Refresh").clicked() {
                    self.refresh(session, ctx);
                }
            });
        });
        ui.separator();

        if snapshot.listing.is_loading {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Loading files...");
            });
            ctx.request_repaint_after(Duration::from_millis(100));
        } else if snapshot.listing.entries.is_empty() {
            ui.label("No files yet. Drop files here or use Upload Files.");
        } else {
            let mut action = None;

            egui::ScrollArea::vertical().show(ui, |ui| {
                egui::Grid::new("files_grid")
                    .striped(true)
                    .num_columns(4)
                    .spacing([40.0, 6.0])
                    .show(ui, |ui| {
                        ui.strong("Name");
                        ui.strong("Created");
                        ui.strong("Size");
                        ui.strong("");
                        ui.end_row();

                        for entry in &snapshot.listing.entries {
                            ui.label(&entry.name);
                            ui.label(entry.created.format("%Y-%m-%d %H:%M").to_string());
                            ui.label(format_file_size(entry.size));
                            ui.horizontal(|ui| {
                                if ui.small_button("⬇️").on_hover_text("Download").clicked() {
                                    action = Some(RowAction::Download(entry.name.clone()));
                                }
                                if ui.small_button("🗑️").on_hover_text("Delete").clicked() {
                                    action = Some(RowAction::Delete(entry.name.clone()));
                                }
                            });
                            ui.end_row();
                        }
                    });
            });

            match action {
                Some(RowAction::Download(name)) => self.download(session, name, ctx),
                Some(RowAction::Delete(name)) => {
                    if let Err(e) = session.delete_file(&name) {
                        lock_state(&self.state).notify(NoticeKind::Error, e.to_string());
                    }
                }
                None => {}
            }
        }

        self.show_confirmation(ctx, session, snapshot);
        self.show_uploads(ctx, snapshot);
    }

    fn show_confirmation(&self, ctx: &egui::Context, session: &StorageSession, snapshot: &SessionSnapshot) {
        let Some(message) = snapshot.pending_deletion.message() else {
            return;
        };

        egui::Window::new("Confirm Deletion")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(message);
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.button("Confirm").clicked() {
                        self.confirm_deletion(session, ctx);
                    }
                    if ui.button("Cancel").clicked() {
                        session.cancel_deletion();
                    }
                });
            });
    }

    fn show_uploads(&self, ctx: &egui::Context, snapshot: &SessionSnapshot) {
        if snapshot.uploads.is_empty() {
            return;
        }

        let now = Instant::now();
        egui::Area::new(egui::Id::new("upload_overlay"))
            .anchor(egui::Align2::RIGHT_BOTTOM, [-16.0, -16.0])
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.set_width(300.0);
                    ui.strong("Uploading...");
                    for item in &snapshot.uploads {
                        let percent = item.whole_percent();
                        let label = match item.eta(now) {
                            Some(eta) if percent < 100 => {
                                format!("{} ({})", item.name, format_eta(eta))
                            }
                            _ => item.name.clone(),
                        };
                        ui.label(label);
                        ui.add(
                            egui::ProgressBar::new((item.progress_percent / 100.0) as f32)
                                .text(format!("{}%", percent)),
                        );
                    }
                });
            });

        ctx.request_repaint_after(Duration::from_millis(100));
    }

    fn refresh(&self, session: &StorageSession, ctx: &egui::Context) {
        let session = session.clone();
        let state = self.state.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            if let Err(e) = session.refresh().await {
                lock_state(&state).notify(NoticeKind::Error, format!("Error fetching files: {}", e));
            }
            ctx.request_repaint();
        });
    }

    fn upload_paths(&self, session: &StorageSession, paths: Vec<PathBuf>, ctx: &egui::Context) {
        let session = session.clone();
        let state = self.state.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let mut sources = Vec::with_capacity(paths.len());
            for path in &paths {
                match UploadSource::from_path(path).await {
                    Ok(source) => sources.push(source),
                    Err(e) => {
                        let text = format!("Cannot upload {}: {}", path.display(), e);
                        lock_state(&state).notify(NoticeKind::Error, text);
                    }
                }
            }
            if sources.is_empty() {
                return;
            }

            let report = session.upload_files(sources).await;
            let mut shared = lock_state(&state);
            if report.all_succeeded() {
                shared.notify(
                    NoticeKind::Success,
                    format!("Uploaded {} file(s)", report.succeeded.len()),
                );
            } else {
                let names: Vec<&str> = report.failed.iter().map(|(name, _)| name.as_str()).collect();
                shared.notify(NoticeKind::Error, format!("Error uploading {}", names.join(", ")));
            }
            drop(shared);
            ctx.request_repaint();
        });
    }

    fn download(&self, session: &StorageSession, name: String, ctx: &egui::Context) {
        let Some(path) = rfd::FileDialog::new().set_file_name(&name).save_file() else {
            return;
        };

        let session = session.clone();
        let state = self.state.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            match session.download_file(&name, &FileSink::new(path)).await {
                Ok(path) => lock_state(&state)
                    .notify(NoticeKind::Success, format!("Saved to {}", path.display())),
                Err(e) => lock_state(&state)
                    .notify(NoticeKind::Error, format!("Download failed: {}", e)),
            }
            ctx.request_repaint();
        });
    }

    fn confirm_deletion(&self, session: &StorageSession, ctx: &egui::Context) {
        let session = session.clone();
        let state = self.state.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            match session.confirm_deletion().await {
                Ok(Some(DeletionOutcome::File(name))) => {
                    lock_state(&state).notify(NoticeKind::Success, format!("Deleted {}", name))
                }
                Ok(Some(DeletionOutcome::Folder(name))) => lock_state(&state)
                    .notify(NoticeKind::Success, format!("Deleted folder {}", name)),
                Ok(None) => {}
                Err(e) => lock_state(&state)
                    .notify(NoticeKind::Error, format!("Error deleting: {}", e)),
            }
            ctx.request_repaint();
        });
    }
}
