use eframe::egui;

use crate::editor::{Tool, ToolStyle};
use crate::model::Rgba;

pub(super) fn tool_button(ui: &mut egui::Ui, tool: Tool, selected: Tool) -> bool {
    ui.selectable_label(selected == tool, tool.label()).clicked()
}

fn to_color32(c: Rgba) -> egui::Color32 {
    egui::Color32::from_rgba_unmultiplied(c.r, c.g, c.b, c.a)
}

pub(super) fn color_row(ui: &mut egui::Ui, rgba: &mut Rgba, palette: bool) -> bool {
    let mut changed = false;
    ui.horizontal(|ui| {
        if palette {
            let presets = [
                Rgba::RED,
                Rgba::rgb(255, 200, 0),
                Rgba::rgb(40, 160, 60),
                Rgba::rgb(40, 90, 200),
                Rgba::BLACK,
                Rgba::WHITE,
            ];
            for c in presets {
                if ui
                    .add_sized([18.0, 18.0], egui::Button::new("").fill(to_color32(c)))
                    .clicked()
                {
                    *rgba = c;
                    changed = true;
                }
            }
        }
        let mut arr = [rgba.r, rgba.g, rgba.b, rgba.a];
        if ui.color_edit_button_srgba_unmultiplied(&mut arr).changed() {
            *rgba = Rgba {
                r: arr[0],
                g: arr[1],
                b: arr[2],
                a: arr[3],
            };
            changed = true;
        }
    });
    changed
}

fn toolbool_label(tool: Tool) -> Option<&'static str> {
    Some(match tool {
        Tool::Arrow => "Rounded arrow",
        Tool::Blurring => "Pixelate",
        Tool::ZoomInRegion | Tool::CopyPaste => "Circular",
        _ => return None,
    })
}

pub(super) fn style_editor(ui: &mut egui::Ui, tool: Tool, style: &mut ToolStyle, palette: bool) -> bool {
    let mut changed = false;
    ui.label(tool.label());
    ui.label("Color");
    changed |= color_row(ui, &mut style.color, palette);
    if tool == Tool::Text {
        ui.label("Plate");
        changed |= color_row(ui, &mut style.secondary_color, palette);
    }
    changed |= ui
        .add(egui::Slider::new(&mut style.size, 0.0..=1.0).text("Size"))
        .changed();
    changed |= ui
        .add(egui::Slider::new(&mut style.opacity, 0.0..=1.0).text("Opacity"))
        .changed();
    if let Some(label) = toolbool_label(tool) {
        changed |= ui.checkbox(&mut style.toolbool, label).changed();
    }
    changed
}
