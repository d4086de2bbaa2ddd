use eframe::egui;

pub(super) fn draw_help_window(ctx: &egui::Context, open: &mut bool) {
    egui::Window::new("Help")
        .open(open)
        .resizable(true)
        .default_width(520.0)
        .default_height(480.0)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.heading("Keyboard Shortcuts");
                ui.separator();

                ui.label("General");
                help_row(ui, "Enter", "Save the capture region as PNG");
                help_row(ui, "Esc", "Cancel the gesture, or ask to quit");
                help_row(ui, "Ctrl+Z", "Undo");
                help_row(ui, "Ctrl+Shift+Z", "Redo");
                help_row(ui, "F1", "Toggle this window");
                help_row(ui, "P", "Preview the exported look");

                ui.add_space(10.0);
                ui.label("Selection");
                help_row(ui, "Space", "Transform tool");
                help_row(ui, "Ctrl+A", "Select all / deselect all");
                help_row(ui, "Delete", "Remove the selection");
                help_row(ui, "Arrows", "Move selection or capture region by 1px");
                help_row(ui, "Shift / Ctrl", "Move by 10px / five times further");
                help_row(ui, "F5 / F6", "Rotate selected texts by -10 / +10 degrees");

                ui.add_space(10.0);
                ui.label("Canvas");
                help_row(ui, "Wheel", "Zoom (Ctrl: horizontal only, Shift: vertical only)");
                help_row(ui, "Middle drag", "Pan");
                help_row(ui, "F", "Fit the selection");
                help_row(ui, "Ctrl+F", "Fit the capture region");
                help_row(ui, "Tab / Shift+Tab", "Cycle how the uncaptured zone is shown");
                help_row(ui, "H", "Hexagonal or circular mask");

                ui.add_space(10.0);
                ui.label("Clipboard");
                help_row(ui, "Ctrl+C", "Copy the color under the magnifier");
                help_row(ui, "Ctrl+V", "Paste an image as a picture");

                ui.add_space(20.0);
                ui.heading("Tools");
                ui.separator();
                ui.label("• Shift while drawing keeps proportions or snaps lines to 45°");
                ui.label("• Ctrl while drawing rects and ovals fills them");
                ui.label("• Zoom and copy-paste regions take two clicks: source, then destination");
                ui.label("• Ctrl+wheel over the picture tool rotates the stamp, Shift for 10° steps");
                ui.label("• Ctrl+wheel while the magnifier shows changes its size");

                ui.add_space(20.0);
                ui.heading("Files");
                ui.separator();
                ui.label("• Projects are folders with a .oxxxyshot document and PNG side files");
                ui.label("• Settings are read from ~/.config/oxxxy.toml or settings.toml");
            });
        });
}

fn help_row(ui: &mut egui::Ui, shortcut: &str, description: &str) {
    ui.horizontal(|ui| {
        ui.add_sized([110.0, 16.0], egui::Label::new(egui::RichText::new(shortcut).monospace().strong()));
        ui.label(description);
    });
}
