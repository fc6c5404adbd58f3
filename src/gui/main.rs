mod app;
mod tabs;

use anyhow::{anyhow, Context, Result};
use eframe::egui;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn main() -> Result<()> {
    env_logger::init();

    let runtime = Arc::new(Runtime::new().context("Failed to create Tokio runtime")?);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 750.0])
            .with_min_inner_size([720.0, 480.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "Rust Drive",
        options,
        Box::new(move |cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(app::DriveApp::new(cc, runtime)))
        }),
    )
    .map_err(|e| anyhow!("GUI exited with an error: {}", e))
}
