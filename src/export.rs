//! Writing the finished composite: PNG files, the clipboard, save-to-memory.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tiny_skia::Pixmap;

use crate::editor::Editor;
use crate::error::{EditorError, Result};
use crate::render::raster;

pub const METADATA_KEYWORD: &str = "text";

#[derive(Clone, Debug, PartialEq)]
pub enum Exported {
    File(PathBuf),
    /// Kept in the editor; the value is the composite's slot in `in_memory`.
    Memory(usize),
}

pub fn export_file_name(now: DateTime<Local>) -> String {
    format!("{}.png", now.format("%Y-%m-%d %H-%M-%S"))
}

pub fn metadata_text(metadata: &(String, String)) -> String {
    format!("Screenshot metadata: {} {}", metadata.0, metadata.1)
}

/// PNG bytes with an optional `tEXt` chunk.
pub fn encode_png(pixmap: &Pixmap, text: Option<&str>) -> Result<Vec<u8>> {
    let image = raster::pixmap_to_image(pixmap);
    let mut bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut bytes, pixmap.width(), pixmap.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        if let Some(text) = text {
            encoder.add_text_chunk(METADATA_KEYWORD.to_string(), text.to_string())?;
        }
        let mut writer = encoder.write_header()?;
        writer.write_image_data(image.as_raw())?;
        writer.finish()?;
    }
    Ok(bytes)
}

/// `folder/name`, or `name (n)` when the file is already there.
fn free_path(folder: &Path, name: &str) -> PathBuf {
    let candidate = folder.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let stem = name.trim_end_matches(".png");
    (1..)
        .map(|n| folder.join(format!("{stem} ({n}).png")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

pub fn write_png(pixmap: &Pixmap, folder: &Path, now: DateTime<Local>, text: Option<&str>) -> Result<PathBuf> {
    std::fs::create_dir_all(folder).map_err(|e| EditorError::io(folder, e))?;
    let path = free_path(folder, &export_file_name(now));
    let bytes = encode_png(pixmap, text)?;
    std::fs::write(&path, bytes).map_err(|e| EditorError::io(&path, e))?;
    log::info!("screenshot written to {}", path.display());
    Ok(path)
}

/// Renders the capture rect and stores it: in memory when save-to-memory mode
/// is on, otherwise as a PNG in the screenshot folder. `None` without a
/// capture rect.
pub fn export(editor: &mut Editor, now: DateTime<Local>) -> Result<Option<Exported>> {
    let Some(pixmap) = editor.render_export()? else {
        log::debug!("export skipped, capture rect undefined");
        return Ok(None);
    };
    if editor.save_to_memory_mode {
        editor.in_memory.push(Arc::new(pixmap));
        return Ok(Some(Exported::Memory(editor.in_memory.len() - 1)));
    }
    let text = editor.config.add_meta.then(|| metadata_text(&editor.metadata));
    let folder = editor.config.screenshot_folder.clone();
    write_png(&pixmap, &folder, now, text.as_deref()).map(|p| Some(Exported::File(p)))
}

fn clipboard() -> Result<arboard::Clipboard> {
    arboard::Clipboard::new().map_err(|e| EditorError::Clipboard(e.to_string()))
}

pub fn copy_image_to_clipboard(pixmap: &Pixmap) -> Result<()> {
    let image = raster::pixmap_to_image(pixmap);
    clipboard()?
        .set_image(arboard::ImageData {
            width: image.width() as usize,
            height: image.height() as usize,
            bytes: Cow::Owned(image.into_raw()),
        })
        .map_err(|e| EditorError::Clipboard(e.to_string()))
}

pub fn copy_text_to_clipboard(text: &str) -> Result<()> {
    clipboard()?
        .set_text(text.to_string())
        .map_err(|e| EditorError::Clipboard(e.to_string()))
}

/// The clipboard image, or `None` when it holds something else.
pub fn read_clipboard_image() -> Result<Option<Pixmap>> {
    let data = match clipboard()?.get_image() {
        Ok(data) => data,
        Err(arboard::Error::ContentNotAvailable) => return Ok(None),
        Err(e) => return Err(EditorError::Clipboard(e.to_string())),
    };
    let Some(image) = image::RgbaImage::from_raw(data.width as u32, data.height as u32, data.bytes.into_owned()) else {
        return Err(EditorError::Clipboard("clipboard image has an invalid shape".to_string()));
    };
    raster::image_to_pixmap(&image).map(Some)
}
