use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use eframe::egui;

use crate::config::EditorConfig;
use crate::editor::{ColorTarget, Editor};
use crate::model::Rgba;
use crate::project;
use crate::render::raster;
use crate::stamps::PreviewLoader;

mod help;
mod input;
mod update;
mod widgets;

/// A pending inline color choice for the text being edited.
#[derive(Clone, Copy, Debug)]
struct ColorPick {
    target: ColorTarget,
    color: Rgba,
}

pub struct OxxxyApp {
    editor: Editor,
    config_path: Option<PathBuf>,
    canvas: Option<egui::TextureHandle>,
    status: Option<String>,
    notification: Option<String>,
    quit_dialog: bool,
    color_pick: Option<ColorPick>,
    stamps: Option<PreviewLoader>,
    stamp_textures: HashMap<PathBuf, egui::TextureHandle>,
    slice_rows: u32,
    slice_cols: u32,
    pointer_inside: bool,
}

/// Opens a project directory, a `.oxxxyshot` file or a PNG as a new editor.
pub fn open_path(config: EditorConfig, path: &Path) -> anyhow::Result<Editor> {
    let is_project = path.is_dir() || path.extension().is_some_and(|ext| ext == project::PROJECT_EXTENSION);
    if is_project {
        return project::load_project(config, path).with_context(|| format!("cannot open project {}", path.display()));
    }
    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let pixmap = raster::decode_png_bytes(&bytes).with_context(|| format!("cannot decode {}", path.display()))?;
    Ok(Editor::with_background(config, pixmap, true))
}

/// Editor for the command line: the given path, else the clipboard image,
/// else an empty canvas.
pub fn startup_editor(config: EditorConfig, arg: Option<&Path>) -> anyhow::Result<Editor> {
    if let Some(path) = arg {
        return open_path(config, path);
    }
    match crate::export::read_clipboard_image() {
        Ok(Some(pixmap)) => {
            log::info!("starting from the clipboard image");
            Ok(Editor::with_background(config, pixmap, false))
        }
        Ok(None) => Ok(Editor::new(config)),
        Err(e) => {
            log::warn!("{e}");
            Ok(Editor::new(config))
        }
    }
}

impl OxxxyApp {
    pub fn new(cc: &eframe::CreationContext<'_>, editor: Editor, config_path: Option<PathBuf>) -> Self {
        if editor.config.flat_editor_ui {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
        }
        Self {
            editor,
            config_path,
            canvas: None,
            status: None,
            notification: None,
            quit_dialog: false,
            color_pick: None,
            stamps: None,
            stamp_textures: HashMap::new(),
            slice_rows: 2,
            slice_cols: 2,
            pointer_inside: false,
        }
    }

    fn report(&mut self, err: anyhow::Error) {
        log::error!("{err:#}");
        self.notification = Some(format!("{err:#}"));
    }

    fn open_dialog(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Projects and pictures", &[project::PROJECT_EXTENSION, "png"])
            .pick_file()
        else {
            return;
        };
        match open_path(self.editor.config.clone(), &path) {
            Ok(editor) => {
                self.editor = editor;
                self.status = Some(format!("Opened {}", path.display()));
            }
            Err(e) => self.report(e),
        }
    }

    fn save_project(&mut self) {
        let folder = self.editor.config.projects_folder.clone();
        match project::save_project(&self.editor, &folder, chrono::Local::now()).context("cannot save project") {
            Ok(dir) => self.status = Some(format!("Project saved to {}", dir.display())),
            Err(e) => self.report(e),
        }
    }

    fn save_settings(&mut self) {
        let path = self.config_path.clone().unwrap_or_else(|| PathBuf::from("settings.toml"));
        match crate::config::save_config(&path, &self.editor.config).context("cannot save settings") {
            Ok(()) => {
                self.status = Some(format!("Settings saved to {}", path.display()));
                self.config_path = Some(path);
            }
            Err(e) => self.report(e),
        }
    }

    fn pick_stamp_folder(&mut self, ctx: &egui::Context) {
        let Some(folder) = rfd::FileDialog::new().pick_folder() else {
            return;
        };
        let repaint = ctx.clone();
        self.stamp_textures.clear();
        self.stamps = Some(PreviewLoader::spawn(&folder, move || repaint.request_repaint()));
    }
}
