use crate::app::{lock_state, NoticeKind, SharedState};
use eframe::egui;
use rust_drive::{model::ActivityRecord, StorageSession};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Runtime;

#[derive(Default)]
struct ActivityState {
    records: Vec<ActivityRecord>,
    loading: bool,
}

pub struct ActivityTab {
    state: SharedState,
    runtime: Arc<Runtime>,
    activity: Arc<Mutex<ActivityState>>,
    needs_refresh: bool,
}

fn lock_activity(activity: &Mutex<ActivityState>) -> MutexGuard<'_, ActivityState> {
    activity.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ActivityTab {
    pub fn new(state: SharedState, runtime: Arc<Runtime>) -> Self {
        Self {
            state,
            runtime,
            activity: Arc::new(Mutex::new(ActivityState::default())),
            needs_refresh: true,
        }
    }

    /// Forgets the previous user's history.
    pub fn reset(&mut self) {
        *lock_activity(&self.activity) = ActivityState::default();
        self.needs_refresh = true;
    }

    pub fn show(&mut self, ui: &mut egui::Ui, ctx: &egui::Context, session: &StorageSession) {
        if self.needs_refresh {
            self.needs_refresh = false;
            self.trigger_refresh(session, ctx);
        }

        ui.horizontal(|ui| {
            ui.heading("📜 Activity History");
            if ui.button("🔄 Refresh").clicked() {
                self.trigger_refresh(session, ctx);
            }
        });
        ui.separator();

        let activity = lock_activity(&self.activity);
        if activity.loading {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Loading activity...");
            });
            ctx.request_repaint_after(Duration::from_millis(100));
            return;
        }

        if activity.records.is_empty() {
            ui.label("No activity yet.");
            return;
        }

        egui::ScrollArea::vertical().show(ui, |ui| {
            egui::Grid::new("activity_grid")
                .striped(true)
                .num_columns(3)
                .spacing([40.0, 6.0])
                .show(ui, |ui| {
                    ui.strong("When");
                    ui.strong("Action");
                    ui.strong("File");
                    ui.end_row();

                    for record in &activity.records {
                        ui.label(record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string());
                        ui.label(record.action.to_uppercase());
                        ui.label(&record.filename);
                        ui.end_row();
                    }
                });
        });
    }

    fn trigger_refresh(&self, session: &StorageSession, ctx: &egui::Context) {
        {
            let mut activity = lock_activity(&self.activity);
            if activity.loading {
                return;
            }
            activity.loading = true;
        }

        let session = session.clone();
        let state = self.state.clone();
        let activity = self.activity.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let result = session.activity_log().await;

            let mut shared = lock_activity(&activity);
            shared.loading = false;
            match result {
                Ok(records) => shared.records = records,
                Err(e) => {
                    shared.records.clear();
                    drop(shared);
                    lock_state(&state)
                        .notify(NoticeKind::Error, format!("Error fetching activity log: {}", e));
                }
            }
            ctx.request_repaint();
        });
    }
}
