use anyhow::Context;
use eframe::egui;

use crate::editor::{ColorTarget, Request, Tool, UncaptureMode};
use crate::export::{self, Exported};

use super::input::cursor_icon;
use super::widgets::{color_row, style_editor, tool_button};
use super::{ColorPick, OxxxyApp};

fn uncapture_label(mode: UncaptureMode) -> &'static str {
    match mode {
        UncaptureMode::FullTransparent => "Uncaptured: hidden",
        UncaptureMode::HalfTransparent => "Uncaptured: dimmed",
        UncaptureMode::Opaque => "Uncaptured: shown",
    }
}

impl OxxxyApp {
    fn handle_request(&mut self, ctx: &egui::Context, request: Request) {
        match request {
            Request::OpenQuitDialog => self.quit_dialog = true,
            Request::Commit => self.commit(ctx),
            Request::CopyText(text) => match export::copy_text_to_clipboard(&text).context("cannot copy text") {
                Ok(()) => self.status = Some(format!("Copied {text}")),
                Err(e) => self.report(e),
            },
            Request::PasteImage => self.paste_image(),
            Request::PickColor(target) => {
                let color = self
                    .editor
                    .editing_text
                    .and_then(|i| self.editor.element(i))
                    .map(|e| match target {
                        ColorTarget::Text => e.color,
                        ColorTarget::Plate => e.secondary_color,
                    })
                    .unwrap_or_default();
                self.color_pick = Some(ColorPick { target, color });
            }
        }
    }

    fn commit(&mut self, ctx: &egui::Context) {
        match export::export(&mut self.editor, chrono::Local::now()).context("export failed") {
            Ok(Some(Exported::File(path))) => {
                self.status = Some(format!("Saved {}", path.display()));
                if self.editor.close_editor_on_done {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            }
            Ok(Some(Exported::Memory(n))) => self.status = Some(format!("Kept composite #{n} in memory")),
            Ok(None) => self.status = Some("Define a capture region first".to_string()),
            Err(e) => self.report(e),
        }
    }

    fn copy_composite(&mut self) {
        let copied = self
            .editor
            .render_export()
            .context("cannot render the capture region")
            .and_then(|pixmap| match pixmap {
                Some(pixmap) => export::copy_image_to_clipboard(&pixmap).context("cannot copy image"),
                None => Ok(()),
            });
        match copied {
            Ok(()) => self.status = Some("Copied to clipboard".to_string()),
            Err(e) => self.report(e),
        }
    }

    fn paste_image(&mut self) {
        match export::read_clipboard_image().context("cannot read the clipboard") {
            Ok(Some(pixmap)) => {
                self.editor.paste_image(pixmap);
            }
            Ok(None) => self.status = Some("No image in the clipboard".to_string()),
            Err(e) => self.report(e),
        }
    }

    fn reshoot_from_clipboard(&mut self) {
        match export::read_clipboard_image().context("cannot read the clipboard") {
            Ok(Some(pixmap)) => {
                self.editor.reshoot(pixmap);
            }
            Ok(None) => self.status = Some("No image in the clipboard".to_string()),
            Err(e) => self.report(e),
        }
    }

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open...").clicked() {
                        self.open_dialog();
                        ui.close_menu();
                    }
                    if ui.button("Save project").clicked() {
                        self.save_project();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Save PNG (Enter)").clicked() {
                        self.commit(ctx);
                        ui.close_menu();
                    }
                    if ui.button("Copy image").clicked() {
                        self.copy_composite();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Stamps folder...").clicked() {
                        self.pick_stamp_folder(ctx);
                        ui.close_menu();
                    }
                    if ui.button("Save settings").clicked() {
                        self.save_settings();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        self.quit_dialog = true;
                        ui.close_menu();
                    }
                });
                ui.menu_button("Edit", |ui| {
                    let idle = self.editor.is_idle();
                    if ui
                        .add_enabled(idle && self.editor.history.can_go_backwards(), egui::Button::new("Undo (Ctrl+Z)"))
                        .clicked()
                    {
                        self.editor.history_backwards();
                        ui.close_menu();
                    }
                    if ui
                        .add_enabled(idle && self.editor.history.can_go_forwards(), egui::Button::new("Redo (Ctrl+Shift+Z)"))
                        .clicked()
                    {
                        self.editor.history_forwards();
                        ui.close_menu();
                    }
                    ui.separator();
                    let has_selection = !self.editor.selected_indexes().is_empty();
                    if ui.add_enabled(has_selection, egui::Button::new("Delete")).clicked() {
                        self.editor.delete_selection();
                        ui.close_menu();
                    }
                    if ui.button("Select all (Ctrl+A)").clicked() {
                        self.editor.toggle_select_all();
                        ui.close_menu();
                    }
                    if ui.button("Paste image (Ctrl+V)").clicked() {
                        self.paste_image();
                        ui.close_menu();
                    }
                    ui.separator();
                    let has_background = self.editor.background().is_some();
                    if ui.button("Reshoot from clipboard").clicked() {
                        self.reshoot_from_clipboard();
                        ui.close_menu();
                    }
                    if ui.add_enabled(has_background, egui::Button::new("Content to background")).clicked() {
                        if let Err(e) = self.editor.content_to_background().context("cannot flatten") {
                            self.report(e);
                        }
                        ui.close_menu();
                    }
                    ui.horizontal(|ui| {
                        ui.add(egui::DragValue::new(&mut self.slice_rows).range(1..=16).prefix("rows "));
                        ui.add(egui::DragValue::new(&mut self.slice_cols).range(1..=16).prefix("cols "));
                    });
                    if ui.add_enabled(has_background, egui::Button::new("Slice background")).clicked() {
                        if let Err(e) = self
                            .editor
                            .slice_background(self.slice_rows, self.slice_cols)
                            .context("cannot slice")
                        {
                            self.report(e);
                        }
                        ui.close_menu();
                    }
                });
                ui.menu_button("View", |ui| {
                    if ui.button("Fit selection (F)").clicked() {
                        self.editor.fit_selection();
                        ui.close_menu();
                    }
                    if ui.button("Fit capture (Ctrl+F)").clicked() {
                        self.editor.fit_capture();
                        ui.close_menu();
                    }
                    ui.separator();
                    ui.checkbox(&mut self.editor.preview_mode, "Preview (P)");
                    ui.checkbox(&mut self.editor.masked, "Mask");
                    ui.checkbox(&mut self.editor.hex_mask, "Hexagonal mask (H)");
                    ui.checkbox(&mut self.editor.dark_pictures, "Dark pictures");
                    ui.checkbox(&mut self.editor.show_background, "Show background");
                    ui.checkbox(&mut self.editor.draw_datetime_stamp, "Date stamp");
                    ui.checkbox(&mut self.editor.magnifier.enabled, "Magnifier");
                    ui.checkbox(&mut self.editor.save_to_memory_mode, "Save to memory");
                    if ui.button(uncapture_label(self.editor.uncapture_mode)).clicked() {
                        self.editor.uncapture_mode = self.editor.uncapture_mode.next();
                    }
                });
                ui.menu_button("Help", |ui| {
                    if ui.button("Show Help (F1)").clicked() {
                        self.editor.show_help = true;
                        ui.close_menu();
                    }
                });
                ui.separator();
                let current = self.editor.tool;
                for tool in Tool::ALL {
                    if tool_button(ui, tool, current) {
                        self.editor.set_tool(tool);
                    }
                }
            });
        });
    }

    fn side_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("style_panel").resizable(true).show(ctx, |ui| {
            let tool = self.editor.tool;
            if tool != Tool::Transform {
                let palette = self.editor.config.use_color_palette;
                let mut style = self.editor.style(tool);
                if style_editor(ui, tool, &mut style, palette) {
                    *self.editor.style_mut(tool) = style;
                }
                ui.separator();
            }
            if let Some(loader) = &mut self.stamps {
                loader.poll();
            }
            let Some(loader) = &self.stamps else {
                return;
            };
            ui.label(if loader.is_finished() { "Stamps" } else { "Stamps (loading)" });
            let mut chosen = None;
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.horizontal_wrapped(|ui| {
                    for preview in loader.previews() {
                        let texture = self.stamp_textures.entry(preview.path.clone()).or_insert_with(|| {
                            let size = [preview.thumbnail.width() as usize, preview.thumbnail.height() as usize];
                            let image = egui::ColorImage::from_rgba_unmultiplied(size, preview.thumbnail.as_raw());
                            ctx.load_texture(preview.path.display().to_string(), image, egui::TextureOptions::LINEAR)
                        });
                        if ui.add(egui::Button::image((texture.id(), texture.size_vec2()))).clicked() {
                            chosen = Some(preview.path.clone());
                        }
                    }
                });
            });
            if let Some(path) = chosen {
                match crate::stamps::load_stamp(&path).context("cannot load stamp") {
                    Ok(pixmap) => {
                        self.editor.magazine.push_front(std::sync::Arc::new(pixmap));
                        self.editor.set_tool(Tool::Picture);
                    }
                    Err(e) => self.report(e),
                }
            }
        });
    }

    fn dialogs(&mut self, ctx: &egui::Context) {
        if self.quit_dialog {
            egui::Window::new("Quit")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.label("Close the editor without saving?");
                    ui.horizontal(|ui| {
                        if ui.button("Save project").clicked() {
                            self.save_project();
                            self.quit_dialog = false;
                        }
                        if ui.button("Quit").clicked() {
                            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                        }
                        if ui.button("Cancel").clicked() {
                            self.quit_dialog = false;
                        }
                    });
                });
        }

        if let Some(mut pick) = self.color_pick {
            let mut done = false;
            let mut apply = false;
            egui::Window::new("Color")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    color_row(ui, &mut pick.color, true);
                    ui.horizontal(|ui| {
                        apply = ui.button("Apply").clicked();
                        done = apply || ui.button("Cancel").clicked();
                    });
                });
            if apply {
                self.editor.set_text_color(pick.target, pick.color);
            }
            self.color_pick = if done { None } else { Some(pick) };
        }

        if let Some(message) = self.notification.clone() {
            egui::Window::new("Error")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.label(message);
                    if ui.button("OK").clicked() {
                        self.notification = None;
                    }
                });
        }

        super::help::draw_help_window(ctx, &mut self.editor.show_help);
    }

    fn canvas(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());
                self.editor.viewport_size = kurbo::Vec2::new(rect.width() as f64, rect.height() as f64);

                let requests = self.forward_input(ctx, rect, response.hovered());
                for request in requests {
                    self.handle_request(ctx, request);
                }

                let recomputed = self.editor.refresh_derived();
                if recomputed > 0 {
                    log::debug!("{recomputed} derived pixmaps refreshed");
                }
                match self.editor.render_view().context("cannot render the canvas") {
                    Ok(frame) => {
                        let size = [frame.width() as usize, frame.height() as usize];
                        let image = egui::ColorImage::from_rgba_premultiplied(size, frame.data());
                        match &mut self.canvas {
                            Some(texture) => texture.set(image, egui::TextureOptions::NEAREST),
                            None => {
                                self.canvas = Some(ctx.load_texture("canvas", image, egui::TextureOptions::NEAREST));
                            }
                        }
                    }
                    Err(e) => self.report(e),
                }
                if let Some(texture) = &self.canvas {
                    let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                    ui.painter().image(texture.id(), rect, uv, egui::Color32::WHITE);
                }
                if self.pointer_inside {
                    ctx.set_cursor_icon(cursor_icon(self.editor.cursor_shape()));
                }
            });
    }
}

impl eframe::App for OxxxyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.menu_bar(ctx);

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(self.status.as_deref().unwrap_or("Ready"));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(format!("Zoom: {:.0}%", self.editor.viewport.scale_x * 100.0));
                    ui.separator();
                    ui.label(self.editor.visible_summary());
                });
            });
        });

        self.side_panel(ctx);
        self.canvas(ctx);
        self.dialogs(ctx);

        if self.editor.editing_text.is_some() {
            ctx.request_repaint_after(std::time::Duration::from_millis(300));
        }
    }
}
