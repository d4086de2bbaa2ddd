mod app;
mod config;
mod editor;
mod error;
mod export;
mod geometry;
mod history;
mod model;
mod project;
mod render;
mod stamps;
mod text_document;

use std::path::PathBuf;

use anyhow::Context;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (config, config_path) = config::load_or_default();
    let arg = std::env::args_os().nth(1).map(PathBuf::from);
    let editor = app::startup_editor(config, arg.as_deref())?;

    let native_options = eframe::NativeOptions::default();
    eframe::run_native(
        "Oxxxy",
        native_options,
        Box::new(|cc| Ok(Box::new(app::OxxxyApp::new(cc, editor, config_path)))),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))
    .context("window failed")
}
