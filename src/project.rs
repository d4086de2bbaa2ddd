//! Project directories: the slot history written as tagged attribute triples,
//! with paths and pixmaps in side files.
//!
//! ```text
//! OxxxyProject_<date>/
//!     project.{cbor2|json}.oxxxyshot
//!     background.png
//!     path_<attr>_<index>.data
//!     pixmap_<attr>_<index>.png
//!     in_memory/<n>.png
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use kurbo::{BezPath, Point, Vec2};
use serde::{Deserialize, Serialize};

use crate::config::EditorConfig;
use crate::editor::{Editor, Tool};
use crate::error::{EditorError, Result};
use crate::history::{History, ModificationSlot};
use crate::model::{self, Element, ElementIndex, ElementKind, Rgba, SharedPixmap};
use crate::render::raster;
use crate::text_document::TextDocument;

pub const PROJECT_EXTENSION: &str = "oxxxyshot";
const CBOR_FILE: &str = "project.cbor2.oxxxyshot";
const JSON_FILE: &str = "project.json.oxxxyshot";
const BACKGROUND_FILE: &str = "background.png";
const IN_MEMORY_DIR: &str = "in_memory";

mod tag {
    pub const POINT: &str = "QPointF";
    pub const INT_POINT: &str = "QPoint";
    pub const PATH: &str = "QPainterPath";
    pub const PIXMAP: &str = "QPixmap";
    pub const COLOR: &str = "QColor";
    pub const NONE: &str = "NoneType";
    pub const INT: &str = "int";
    pub const FLOAT: &str = "float";
    pub const BOOL: &str = "bool";
    pub const STR: &str = "str";
    pub const LIST: &str = "list";

    pub const ALL: [&str; 11] = [POINT, INT_POINT, PATH, PIXMAP, COLOR, NONE, INT, FLOAT, BOOL, STR, LIST];
}

/// An attribute value as it sits in the document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Record(Vec<Attribute>),
    List(Vec<AttrValue>),
}

/// `(name, type tag, value)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attribute(pub String, pub String, pub AttrValue);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub dark_pictures: bool,
    pub close_editor_on_done: bool,
    pub save_to_memory_mode: bool,
    pub metadata: (String, String),
    pub masked: bool,
    pub hex_mask: bool,
    pub capture_region_rect: [f64; 4],
    pub is_rect_defined: bool,
    pub current_tool: String,
    pub elements_modification_index: usize,
    pub canvas_origin: [f64; 2],
    pub canvas_scale: [f64; 2],
    pub slots: Vec<Vec<Attribute>>,
}

fn attr(name: &str, tag: &str, value: AttrValue) -> Attribute {
    Attribute(name.to_string(), tag.to_string(), value)
}

fn float(name: &str, v: f64) -> Attribute {
    attr(name, tag::FLOAT, AttrValue::Float(v))
}

fn boolean(name: &str, v: bool) -> Attribute {
    attr(name, tag::BOOL, AttrValue::Bool(v))
}

fn point(name: &str, p: Point) -> Attribute {
    attr(name, tag::POINT, AttrValue::List(vec![AttrValue::Float(p.x), AttrValue::Float(p.y)]))
}

fn index(name: &str, v: ElementIndex) -> Attribute {
    attr(name, tag::INT, AttrValue::Int(v as i64))
}

fn optional_index(name: &str, v: Option<ElementIndex>) -> Attribute {
    match v {
        Some(v) => index(name, v),
        None => attr(name, tag::NONE, AttrValue::Null),
    }
}

fn indexes(name: &str, v: &[ElementIndex]) -> Attribute {
    attr(name, tag::LIST, AttrValue::List(v.iter().map(|i| AttrValue::Int(*i as i64)).collect()))
}

fn color(name: &str, c: Rgba) -> Attribute {
    let floats = c.to_floats().into_iter().map(AttrValue::Float).collect();
    attr(name, tag::COLOR, AttrValue::List(floats))
}

/// Pixmaps stored for these kinds; the rest are derived again after loading.
fn keeps_pixmap(kind: ElementKind) -> bool {
    kind.is_picture()
}

struct Writer<'a> {
    dir: &'a Path,
}

impl Writer<'_> {
    fn write_path(&self, name: &str, owner: ElementIndex, path: &BezPath) -> Result<Attribute> {
        let file = format!("path_{name}_{owner:04}.data");
        let target = self.dir.join(&file);
        std::fs::write(&target, path.to_svg()).map_err(|e| EditorError::io(&target, e))?;
        Ok(attr(name, tag::PATH, AttrValue::Text(file)))
    }

    fn write_pixmap(&self, name: &str, owner: ElementIndex, pixmap: &tiny_skia::Pixmap) -> Result<Attribute> {
        let file = format!("pixmap_{name}_{owner:04}.png");
        let target = self.dir.join(&file);
        let bytes = raster::encode_png_bytes(pixmap)?;
        std::fs::write(&target, bytes).map_err(|e| EditorError::io(&target, e))?;
        Ok(attr(name, tag::PIXMAP, AttrValue::Text(file)))
    }

    fn element(&self, e: &Element) -> Result<Vec<Attribute>> {
        let mut attrs = vec![
            attr("type", tag::STR, AttrValue::Text(e.kind.tag().to_string())),
            index("unique_index", e.unique_index),
            index("pass2_unique_index", e.pass2_unique_index),
            point("position", e.position),
            float("rotation", e.rotation),
            float("prerotation", e.prerotation),
            float("scale_x", e.scale_x),
            float("scale_y", e.scale_y),
            float("width", e.width),
            float("height", e.height),
            point("start_point", e.start_point),
            point("end_point", e.end_point),
            point("local_start_point", e.local_start_point),
            point("local_end_point", e.local_end_point),
            color("color", e.color),
            color("secondary_color", e.secondary_color),
            float("size", e.size),
            float("opacity", e.opacity),
            boolean("toolbool", e.toolbool),
            boolean("straight", e.straight),
            boolean("filled", e.filled),
            boolean("equilateral", e.equilateral),
            attr("plain_text", tag::STR, AttrValue::Text(e.plain_text.clone())),
            optional_index("group_id", e.group_id),
            boolean("second", e.second),
            indexes("source_indexes", &e.source_indexes),
            indexes("allowed_indexes", &e.allowed_indexes),
            boolean("pass_through_filter_only_if_allowed", e.pass_through_filter_only_if_allowed),
            optional_index("tree_parent", e.tree_parent),
            boolean("tree_root", e.tree_root),
            boolean("background_image", e.background_image),
            boolean("finished", e.finished),
        ];
        if let Some(path) = &e.path {
            attrs.push(self.write_path("path", e.unique_index, path)?);
        }
        if let (true, Some(pixmap)) = (keeps_pixmap(e.kind), &e.pixmap) {
            attrs.push(self.write_pixmap("pixmap", e.unique_index, pixmap)?);
        }
        Ok(attrs)
    }

    fn slot(&self, slot: &ModificationSlot) -> Result<Vec<Attribute>> {
        let elements = slot
            .elements
            .iter()
            .map(|e| self.element(e).map(AttrValue::Record))
            .collect::<Result<Vec<_>>>()?;
        Ok(vec![
            attr("content_type", tag::STR, AttrValue::Text(slot.content_type.clone())),
            attr("elements", tag::LIST, AttrValue::List(elements)),
        ])
    }
}

pub fn project_dir_name(now: DateTime<Local>) -> String {
    format!("OxxxyProject_{}", now.format("%Y-%m-%d_%H-%M-%S"))
}

/// Saves into a fresh `OxxxyProject_<date>` directory under `folder`.
pub fn save_project(editor: &Editor, folder: &Path, now: DateTime<Local>) -> Result<PathBuf> {
    let dir = folder.join(project_dir_name(now));
    write_project(editor, &dir)?;
    Ok(dir)
}

/// Writes the project into `dir`, creating it. Returns the root document path.
pub fn write_project(editor: &Editor, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| EditorError::io(dir, e))?;
    let writer = Writer { dir };
    let slots = editor
        .history
        .slots()
        .iter()
        .map(|s| writer.slot(s))
        .collect::<Result<Vec<_>>>()?;

    if let Some(background) = editor.source_pixels() {
        let target = dir.join(BACKGROUND_FILE);
        let bytes = raster::encode_png_bytes(&background)?;
        std::fs::write(&target, bytes).map_err(|e| EditorError::io(&target, e))?;
    }
    if !editor.in_memory.is_empty() {
        let memory = dir.join(IN_MEMORY_DIR);
        std::fs::create_dir_all(&memory).map_err(|e| EditorError::io(&memory, e))?;
        for (n, pixmap) in editor.in_memory.iter().enumerate() {
            let target = memory.join(format!("{n}.png"));
            let bytes = raster::encode_png_bytes(pixmap)?;
            std::fs::write(&target, bytes).map_err(|e| EditorError::io(&target, e))?;
        }
    }

    let capture = editor.capture.rect;
    let document = ProjectDocument {
        dark_pictures: editor.dark_pictures,
        close_editor_on_done: editor.close_editor_on_done,
        save_to_memory_mode: editor.save_to_memory_mode,
        metadata: editor.metadata.clone(),
        masked: editor.masked,
        hex_mask: editor.hex_mask,
        capture_region_rect: capture.map_or([0.0; 4], |r| [r.x0, r.y0, r.width(), r.height()]),
        is_rect_defined: capture.is_some(),
        current_tool: editor.tool.tag().to_string(),
        elements_modification_index: editor.history.cursor(),
        canvas_origin: [editor.viewport.origin.x, editor.viewport.origin.y],
        canvas_scale: [editor.viewport.scale_x, editor.viewport.scale_y],
        slots,
    };

    let path = if editor.config.use_cbor_else_json {
        let path = dir.join(CBOR_FILE);
        let file = std::fs::File::create(&path).map_err(|e| EditorError::io(&path, e))?;
        ciborium::into_writer(&document, std::io::BufWriter::new(file))
            .map_err(|e| EditorError::io(&path, std::io::Error::other(e.to_string())))?;
        path
    } else {
        let path = dir.join(JSON_FILE);
        let text = serde_json::to_string(&document).map_err(|e| EditorError::decode("project", e))?;
        std::fs::write(&path, text).map_err(|e| EditorError::io(&path, e))?;
        path
    };
    log::info!("project saved to {}", path.display());
    Ok(path)
}

/// Finds the root document for a project directory or file path.
pub fn locate_project_file(path: &Path) -> Result<PathBuf> {
    if path.is_dir() {
        return [CBOR_FILE, JSON_FILE]
            .iter()
            .map(|name| path.join(name))
            .find(|p| p.is_file())
            .ok_or_else(|| EditorError::ProjectFileMissing(path.to_path_buf()));
    }
    if path.extension().is_none_or(|ext| ext != PROJECT_EXTENSION) {
        return Err(EditorError::WrongExtension(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(EditorError::ProjectFileMissing(path.to_path_buf()));
    }
    Ok(path.to_path_buf())
}

pub fn read_document(file: &Path) -> Result<ProjectDocument> {
    let bytes = std::fs::read(file).map_err(|e| EditorError::io(file, e))?;
    let is_json = file
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(&format!(".json.{PROJECT_EXTENSION}")));
    if is_json {
        serde_json::from_slice(&bytes).map_err(|e| EditorError::decode(file.display().to_string(), e))
    } else {
        ciborium::from_reader(bytes.as_slice()).map_err(|e| EditorError::decode(file.display().to_string(), e))
    }
}

struct Reader<'a> {
    dir: &'a Path,
    /// Side files shared between versions of one element are decoded once.
    pixmaps: HashMap<String, SharedPixmap>,
}

fn mismatch(name: &str, expected: &'static str) -> EditorError {
    EditorError::AttributeMismatch {
        name: name.to_string(),
        expected,
    }
}

impl Attribute {
    fn name(&self) -> &str {
        &self.0
    }

    fn check_tag(&self) -> Result<()> {
        if tag::ALL.contains(&self.1.as_str()) {
            Ok(())
        } else {
            Err(EditorError::UnknownAttributeType {
                name: self.0.clone(),
                tag: self.1.clone(),
            })
        }
    }

    fn as_f64(&self) -> Result<f64> {
        match self.2 {
            AttrValue::Float(v) => Ok(v),
            AttrValue::Int(v) => Ok(v as f64),
            _ => Err(mismatch(self.name(), tag::FLOAT)),
        }
    }

    fn as_bool(&self) -> Result<bool> {
        match self.2 {
            AttrValue::Bool(v) => Ok(v),
            _ => Err(mismatch(self.name(), tag::BOOL)),
        }
    }

    fn as_index(&self) -> Result<ElementIndex> {
        match self.2 {
            AttrValue::Int(v) if v >= 0 => Ok(v as ElementIndex),
            _ => Err(mismatch(self.name(), tag::INT)),
        }
    }

    fn as_optional_index(&self) -> Result<Option<ElementIndex>> {
        match self.2 {
            AttrValue::Null => Ok(None),
            _ => self.as_index().map(Some),
        }
    }

    fn as_str(&self) -> Result<&str> {
        match &self.2 {
            AttrValue::Text(s) => Ok(s),
            _ => Err(mismatch(self.name(), tag::STR)),
        }
    }

    /// List contents. Untagged decoding reads an empty list as an empty record.
    fn items(&self, expected: &'static str) -> Result<&[AttrValue]> {
        match &self.2 {
            AttrValue::List(items) => Ok(items),
            AttrValue::Record(fields) if fields.is_empty() => Ok(&[]),
            _ => Err(mismatch(self.name(), expected)),
        }
    }

    fn floats(&self, expected: &'static str) -> Result<Vec<f64>> {
        self.items(expected)?
            .iter()
            .map(|v| match v {
                AttrValue::Float(f) => Ok(*f),
                AttrValue::Int(i) => Ok(*i as f64),
                _ => Err(mismatch(self.name(), expected)),
            })
            .collect()
    }

    fn as_point(&self) -> Result<Point> {
        match self.floats(tag::POINT)?.as_slice() {
            [x, y] => Ok(Point::new(*x, *y)),
            _ => Err(mismatch(self.name(), tag::POINT)),
        }
    }

    fn as_color(&self) -> Result<Rgba> {
        match self.floats(tag::COLOR)?.as_slice() {
            [r, g, b, a] => Ok(Rgba::from_floats([*r, *g, *b, *a])),
            _ => Err(mismatch(self.name(), tag::COLOR)),
        }
    }

    fn as_indexes(&self) -> Result<Vec<ElementIndex>> {
        self.items(tag::LIST)?
            .iter()
            .map(|v| match v {
                AttrValue::Int(i) if *i >= 0 => Ok(*i as ElementIndex),
                _ => Err(mismatch(self.name(), tag::LIST)),
            })
            .collect()
    }
}

impl Reader<'_> {
    fn read_path(&self, attr: &Attribute) -> Option<BezPath> {
        let file = self.dir.join(attr.as_str().ok()?);
        match std::fs::read_to_string(&file) {
            Ok(svg) => BezPath::from_svg(&svg)
                .map_err(|e| log::warn!("{}: {e}", file.display()))
                .ok(),
            Err(e) => {
                log::warn!("path file {} unavailable: {e}", file.display());
                None
            }
        }
    }

    fn read_pixmap(&mut self, attr: &Attribute, size: (f64, f64)) -> Result<SharedPixmap> {
        let name = attr.as_str()?.to_string();
        if let Some(pixmap) = self.pixmaps.get(&name) {
            return Ok(pixmap.clone());
        }
        let file = self.dir.join(&name);
        let pixmap = match std::fs::read(&file).map_err(|e| EditorError::io(&file, e)).and_then(|b| raster::decode_png_bytes(&b)) {
            Ok(pixmap) => pixmap,
            Err(err) => {
                log::warn!("pixmap file {} unavailable, using placeholder: {err}", file.display());
                raster::pixmap_broken(size.0.ceil().max(1.0) as u32, size.1.ceil().max(1.0) as u32)?
            }
        };
        let pixmap = Arc::new(pixmap);
        self.pixmaps.insert(name, pixmap.clone());
        Ok(pixmap)
    }

    fn element(&mut self, attrs: &[Attribute]) -> Result<Element> {
        for a in attrs {
            a.check_tag()?;
        }
        let kind_attr = attrs
            .iter()
            .find(|a| a.name() == "type")
            .ok_or_else(|| mismatch("type", tag::STR))?;
        let kind_tag = kind_attr.as_str()?;
        let kind = ElementKind::from_tag(kind_tag).ok_or_else(|| EditorError::decode("element type", kind_tag))?;

        let mut e = Element::new(kind);
        let mut pixmap_attr = None;
        for a in attrs {
            match a.name() {
                "unique_index" => e.unique_index = a.as_index()?,
                "pass2_unique_index" => e.pass2_unique_index = a.as_index()?,
                "position" => e.position = a.as_point()?,
                "rotation" => e.rotation = a.as_f64()?,
                "prerotation" => e.prerotation = a.as_f64()?,
                "scale_x" => e.scale_x = a.as_f64()?,
                "scale_y" => e.scale_y = a.as_f64()?,
                "width" => e.width = a.as_f64()?,
                "height" => e.height = a.as_f64()?,
                "start_point" => e.start_point = a.as_point()?,
                "end_point" => e.end_point = a.as_point()?,
                "local_start_point" => e.local_start_point = a.as_point()?,
                "local_end_point" => e.local_end_point = a.as_point()?,
                "color" => e.color = a.as_color()?,
                "secondary_color" => e.secondary_color = a.as_color()?,
                "size" => e.size = a.as_f64()?,
                "opacity" => e.opacity = a.as_f64()?,
                "toolbool" => e.toolbool = a.as_bool()?,
                "straight" => e.straight = a.as_bool()?,
                "filled" => e.filled = a.as_bool()?,
                "equilateral" => e.equilateral = a.as_bool()?,
                "plain_text" => e.plain_text = a.as_str()?.to_string(),
                "group_id" => e.group_id = a.as_optional_index()?,
                "second" => e.second = a.as_bool()?,
                "source_indexes" => e.source_indexes = a.as_indexes()?,
                "allowed_indexes" => e.allowed_indexes = a.as_indexes()?,
                "pass_through_filter_only_if_allowed" => e.pass_through_filter_only_if_allowed = a.as_bool()?,
                "tree_parent" => e.tree_parent = a.as_optional_index()?,
                "tree_root" => e.tree_root = a.as_bool()?,
                "background_image" => e.background_image = a.as_bool()?,
                "finished" => e.finished = a.as_bool()?,
                "path" => e.path = self.read_path(a),
                "pixmap" => pixmap_attr = Some(a),
                "type" => {}
                other => log::debug!("ignoring attribute {other}"),
            }
        }
        if let Some(a) = pixmap_attr {
            e.pixmap = Some(self.read_pixmap(a, (e.width, e.height))?);
        } else if keeps_pixmap(e.kind) {
            log::warn!("picture {} has no pixmap, using placeholder", e.unique_index);
            e.pixmap = Some(Arc::new(raster::pixmap_broken(
                e.width.ceil().max(1.0) as u32,
                e.height.ceil().max(1.0) as u32,
            )?));
        }
        if kind == ElementKind::Text {
            e.text_doc = Some(TextDocument::new(e.plain_text.clone()));
        }
        if e.is_linear() || e.is_freehand() {
            e.rebuild_selection_path();
        }
        Ok(e)
    }

    fn slot(&mut self, attrs: &[Attribute]) -> Result<ModificationSlot> {
        let mut slot = ModificationSlot::new("");
        for a in attrs {
            a.check_tag()?;
            if a.name() == "content_type" {
                slot.content_type = a.as_str()?.to_string();
            } else if a.name() == "elements" {
                for item in a.items(tag::LIST)? {
                    let AttrValue::Record(element) = item else {
                        return Err(mismatch("elements", "element record"));
                    };
                    slot.elements.push(self.element(element)?);
                }
            }
        }
        Ok(slot)
    }
}

/// Opens a project directory (or its root file) into a fresh editor.
pub fn load_project(config: EditorConfig, path: &Path) -> Result<Editor> {
    let file = locate_project_file(path)?;
    let dir = file.parent().unwrap_or(Path::new(".")).to_path_buf();
    let document = read_document(&file)?;

    let mut reader = Reader {
        dir: &dir,
        pixmaps: HashMap::new(),
    };
    let slots = document
        .slots
        .iter()
        .map(|s| reader.slot(s))
        .collect::<Result<Vec<_>>>()?;

    let mut editor = Editor::new(config);
    editor.history = History::from_slots(slots, document.elements_modification_index);
    let top = editor
        .history
        .all_elements()
        .flat_map(|e| [e.unique_index, e.pass2_unique_index])
        .max()
        .unwrap_or(0);
    model::reserve_unique_indexes_above(top);

    editor.dark_pictures = document.dark_pictures;
    editor.close_editor_on_done = document.close_editor_on_done;
    editor.save_to_memory_mode = document.save_to_memory_mode;
    editor.metadata = document.metadata;
    editor.masked = document.masked;
    editor.hex_mask = document.hex_mask;
    let [x, y, w, h] = document.capture_region_rect;
    editor.capture.rect = (document.is_rect_defined && (w, h) != (0.0, 0.0))
        .then(|| kurbo::Rect::from_origin_size((x, y), (w, h)));
    if let Some(tool) = Tool::from_tag(&document.current_tool) {
        editor.tool = tool;
    }
    editor.viewport.origin = Vec2::new(document.canvas_origin[0], document.canvas_origin[1]);
    editor.viewport.scale_x = document.canvas_scale[0];
    editor.viewport.scale_y = document.canvas_scale[1];
    editor.in_memory = read_in_memory(&dir);

    log::info!(
        "project loaded from {} ({} slots)",
        file.display(),
        editor.history.slots().len()
    );
    Ok(editor)
}

fn read_in_memory(dir: &Path) -> Vec<SharedPixmap> {
    let memory = dir.join(IN_MEMORY_DIR);
    let Ok(entries) = std::fs::read_dir(&memory) else {
        return Vec::new();
    };
    let mut numbered: Vec<(usize, PathBuf)> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter_map(|p| {
            let n = p.file_stem()?.to_str()?.parse().ok()?;
            Some((n, p))
        })
        .collect();
    numbered.sort();
    numbered
        .into_iter()
        .filter_map(|(_, p)| {
            let bytes = std::fs::read(&p).ok()?;
            raster::decode_png_bytes(&bytes).ok().map(Arc::new)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use kurbo::Rect;
    use tiny_skia::Pixmap;

    use super::*;
    use crate::editor::test_support::*;
    use crate::editor::{Modifiers, Tool};

    fn sample_editor(cbor: bool) -> Editor {
        let mut editor = blank_editor(400, 300);
        editor.config.use_cbor_else_json = cbor;

        editor.mouse_move(Point::new(60.0, 60.0), Modifiers::NONE);
        let mut picture = Pixmap::new(30, 20).unwrap();
        picture.fill(Rgba::rgb(10, 200, 30).to_skia());
        editor.paste_image(picture).unwrap();

        editor.set_tool(Tool::Text);
        drag(&mut editor, Point::new(150.0, 150.0), Point::new(300.0, 250.0), Modifiers::NONE);
        editor.text_input("hello");
        editor.finish_text_editing();

        draw(&mut editor, Tool::ZoomInRegion, Point::new(20.0, 200.0), Point::new(60.0, 240.0), Modifiers::NONE);
        drag(&mut editor, Point::new(350.0, 60.0), Point::new(350.0, 60.0), Modifiers::NONE);
        editor.capture.rect = Some(Rect::new(10.0, 10.0, 390.0, 290.0));
        editor
    }

    fn summary(editor: &Editor) -> Vec<(ElementKind, Option<ElementIndex>, bool, Point, f64, f64)> {
        editor
            .visible_elements()
            .into_iter()
            .map(|e| (e.kind, e.group_id, e.second, e.position, e.width, e.height))
            .collect()
    }

    fn assert_same_document(a: &Editor, b: &Editor) {
        let (sa, sb) = (summary(a), summary(b));
        assert_eq!(sa.len(), sb.len());
        for (x, y) in sa.iter().zip(&sb) {
            assert_eq!((x.0, x.1, x.2), (y.0, y.1, y.2));
            assert!(x.3.distance(y.3) < 1e-6);
            assert!((x.4 - y.4).abs() < 1e-6 && (x.5 - y.5).abs() < 1e-6);
        }
        assert_eq!(a.capture.rect, b.capture.rect);
        assert_eq!(a.history.cursor(), b.history.cursor());
    }

    #[test]
    fn save_and_load_keep_the_visible_document() {
        for cbor in [true, false] {
            let editor = sample_editor(cbor);
            let tmp = tempfile::tempdir().unwrap();
            let dir = tmp.path().join("project");
            let file = write_project(&editor, &dir).unwrap();
            assert!(file.to_string_lossy().ends_with(if cbor { CBOR_FILE } else { JSON_FILE }));
            assert!(dir.join(BACKGROUND_FILE).is_file());

            let loaded = load_project(EditorConfig::default(), &dir).unwrap();
            assert_same_document(&editor, &loaded);

            let kinds: Vec<ElementKind> = summary(&loaded).iter().map(|s| s.0).collect();
            for kind in [ElementKind::BackgroundPicture, ElementKind::Picture, ElementKind::Text, ElementKind::Arrow] {
                assert_eq!(kinds.iter().filter(|k| **k == kind).count(), 1, "{kind:?}");
            }
            let zooms: Vec<&Element> = loaded
                .visible_elements()
                .into_iter()
                .filter(|e| e.kind == ElementKind::ZoomInRegion)
                .collect();
            assert_eq!(zooms.len(), 2);
            assert_eq!(zooms[0].group_id, zooms[1].group_id);
            assert_ne!(zooms[0].second, zooms[1].second);
            let text = loaded.visible_elements().into_iter().find(|e| e.kind == ElementKind::Text).unwrap();
            assert_eq!(text.text_doc.as_ref().unwrap().text(), "hello");
            let picture = loaded.visible_elements().into_iter().find(|e| e.kind == ElementKind::Picture).unwrap();
            let pixels = picture.pixmap.as_deref().unwrap();
            assert_eq!(raster::pixel_at(pixels, 3, 3), Some(Rgba::rgb(10, 200, 30)));
        }
    }

    #[test]
    fn loading_bumps_the_index_counter() {
        let editor = sample_editor(false);
        let tmp = tempfile::tempdir().unwrap();
        write_project(&editor, tmp.path()).unwrap();
        let loaded = load_project(EditorConfig::default(), tmp.path()).unwrap();
        let fresh = Element::new(ElementKind::Rect);
        assert!(fresh.unique_index > loaded.history.max_unique_index());
    }

    #[test]
    fn missing_pixmap_file_becomes_placeholder() {
        let editor = sample_editor(true);
        let tmp = tempfile::tempdir().unwrap();
        write_project(&editor, tmp.path()).unwrap();
        for entry in std::fs::read_dir(tmp.path()).unwrap() {
            let path = entry.unwrap().path();
            if path.file_name().unwrap().to_string_lossy().starts_with("pixmap_") {
                std::fs::remove_file(path).unwrap();
            }
        }
        let loaded = load_project(EditorConfig::default(), tmp.path()).unwrap();
        let picture = loaded.visible_elements().into_iter().find(|e| e.kind == ElementKind::Picture).unwrap();
        let placeholder = picture.pixmap.as_deref().unwrap();
        assert_eq!((placeholder.width(), placeholder.height()), (30, 20));
        assert_eq!(loaded.visible_elements().len(), editor.visible_elements().len());
    }

    #[test]
    fn bad_paths_are_input_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_project(EditorConfig::default(), tmp.path()).err().unwrap();
        assert!(matches!(err, EditorError::ProjectFileMissing(_)));
        let wrong = tmp.path().join("notes.txt");
        std::fs::write(&wrong, "x").unwrap();
        let err = load_project(EditorConfig::default(), &wrong).err().unwrap();
        assert!(matches!(err, EditorError::WrongExtension(_)));
        assert!(err.is_input_error());
    }

    #[test]
    fn unknown_type_tag_is_rejected() {
        let mut document = ProjectDocument {
            dark_pictures: false,
            close_editor_on_done: false,
            save_to_memory_mode: false,
            metadata: (String::new(), String::new()),
            masked: false,
            hex_mask: false,
            capture_region_rect: [0.0; 4],
            is_rect_defined: false,
            current_tool: "arrow".to_string(),
            elements_modification_index: 1,
            canvas_origin: [0.0, 0.0],
            canvas_scale: [1.0, 1.0],
            slots: Vec::new(),
        };
        let element = vec![
            attr("type", tag::STR, AttrValue::Text("rect".to_string())),
            attr("position", "QVector3D", AttrValue::List(vec![AttrValue::Float(1.0)])),
        ];
        document.slots.push(vec![
            attr("content_type", tag::STR, AttrValue::Text("rect".to_string())),
            attr("elements", tag::LIST, AttrValue::List(vec![AttrValue::Record(element)])),
        ]);
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(JSON_FILE), serde_json::to_string(&document).unwrap()).unwrap();
        let err = load_project(EditorConfig::default(), tmp.path()).err().unwrap();
        assert!(matches!(err, EditorError::UnknownAttributeType { ref tag, .. } if tag == "QVector3D"));
    }

    #[test]
    fn in_memory_composites_survive() {
        let mut editor = sample_editor(true);
        editor.in_memory.push(Arc::new(Pixmap::new(8, 8).unwrap()));
        editor.in_memory.push(Arc::new(Pixmap::new(4, 4).unwrap()));
        let tmp = tempfile::tempdir().unwrap();
        write_project(&editor, tmp.path()).unwrap();
        let loaded = load_project(EditorConfig::default(), tmp.path()).unwrap();
        let sizes: Vec<u32> = loaded.in_memory.iter().map(|p| p.width()).collect();
        assert_eq!(sizes, vec![8, 4]);
    }

    #[test]
    fn directory_name_follows_the_date() {
        use chrono::TimeZone;
        let now = Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(project_dir_name(now), "OxxxyProject_2024-05-06_07-08-09");
    }
}
