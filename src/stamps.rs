//! Stamp previews: a folder of pictures decoded into thumbnails off the UI
//! thread. Results arrive over a channel; `notify` lets the shell repaint.

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use crossbeam::channel::{Receiver, Sender};
use image::RgbaImage;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tiny_skia::Pixmap;

use crate::error::{EditorError, Result};
use crate::render::raster;

pub const THUMBNAIL_SIZE: u32 = 96;

#[derive(Clone, Debug)]
pub struct StampPreview {
    pub path: PathBuf,
    pub thumbnail: RgbaImage,
}

#[derive(Debug)]
pub enum LoaderEvent {
    Preview(StampPreview),
    Failed(PathBuf, String),
    Done,
}

/// Picture files of `folder`, sorted by name.
pub fn stamp_paths(folder: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(folder) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("png")))
        .collect();
    paths.sort();
    paths
}

fn decode(path: &Path) -> Result<RgbaImage> {
    let bytes = std::fs::read(path).map_err(|e| EditorError::io(path, e))?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

fn thumbnail(path: &Path) -> Result<RgbaImage> {
    let image = decode(path)?;
    let (w, h) = image.dimensions();
    let scale = (THUMBNAIL_SIZE as f64 / w.max(h).max(1) as f64).min(1.0);
    let (tw, th) = (((w as f64 * scale).round() as u32).max(1), ((h as f64 * scale).round() as u32).max(1));
    Ok(image::imageops::thumbnail(&image, tw, th))
}

/// Full-size stamp for the picture magazine.
pub fn load_stamp(path: &Path) -> Result<Pixmap> {
    raster::image_to_pixmap(&decode(path)?)
}

pub struct PreviewLoader {
    events: Receiver<LoaderEvent>,
    previews: Vec<StampPreview>,
    finished: bool,
    worker: Option<JoinHandle<()>>,
}

fn run(paths: Vec<PathBuf>, sender: Sender<LoaderEvent>, notify: &(dyn Fn() + Sync)) {
    paths.into_par_iter().for_each(|path| {
        let event = match thumbnail(&path) {
            Ok(thumbnail) => LoaderEvent::Preview(StampPreview { path, thumbnail }),
            Err(e) => {
                log::warn!("stamp {} skipped: {e}", path.display());
                LoaderEvent::Failed(path, e.to_string())
            }
        };
        // the receiver may be gone once the editor closes
        let _ = sender.send(event);
        notify();
    });
    let _ = sender.send(LoaderEvent::Done);
    notify();
}

impl PreviewLoader {
    pub fn spawn(folder: &Path, notify: impl Fn() + Send + Sync + 'static) -> Self {
        let paths = stamp_paths(folder);
        log::debug!("loading {} stamp previews from {}", paths.len(), folder.display());
        let (sender, events) = crossbeam::channel::unbounded();
        let worker = std::thread::spawn(move || run(paths, sender, &notify));
        Self {
            events,
            previews: Vec::new(),
            finished: false,
            worker: Some(worker),
        }
    }

    /// Takes finished previews off the channel. Returns how many arrived.
    pub fn poll(&mut self) -> usize {
        let mut arrived = 0;
        for event in self.events.try_iter() {
            match event {
                LoaderEvent::Preview(preview) => {
                    self.previews.push(preview);
                    arrived += 1;
                }
                LoaderEvent::Failed(..) => {}
                LoaderEvent::Done => self.finished = true,
            }
        }
        if arrived > 0 {
            self.previews.sort_by(|a, b| a.path.cmp(&b.path));
        }
        if self.finished {
            if let Some(worker) = self.worker.take() {
                let _ = worker.join();
            }
        }
        arrived
    }

    pub fn previews(&self) -> &[StampPreview] {
        &self.previews
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use super::*;

    fn wait(loader: &mut PreviewLoader) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !loader.is_finished() && Instant::now() < deadline {
            loader.poll();
            std::thread::sleep(Duration::from_millis(5));
        }
        loader.poll();
    }

    #[test]
    fn previews_arrive_sorted_and_shrunk() {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::from_pixel(300, 150, image::Rgba([200, 10, 10, 255]))
            .save(dir.path().join("b.png"))
            .unwrap();
        RgbaImage::from_pixel(20, 40, image::Rgba([10, 10, 200, 255]))
            .save(dir.path().join("a.png"))
            .unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let pings = Arc::new(AtomicUsize::new(0));
        let counter = pings.clone();
        let mut loader = PreviewLoader::spawn(dir.path(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        wait(&mut loader);

        assert!(loader.is_finished());
        let names: Vec<_> = loader
            .previews()
            .iter()
            .map(|p| p.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
        assert_eq!(loader.previews()[0].thumbnail.dimensions(), (20, 40));
        assert_eq!(loader.previews()[1].thumbnail.dimensions(), (96, 48));
        assert_eq!(pings.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn empty_folder_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = PreviewLoader::spawn(&dir.path().join("missing"), || {});
        wait(&mut loader);
        assert!(loader.is_finished());
        assert!(loader.previews().is_empty());
    }

    #[test]
    fn full_stamp_keeps_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.png");
        RgbaImage::from_pixel(7, 9, image::Rgba([1, 2, 3, 255])).save(&path).unwrap();
        let pixmap = load_stamp(&path).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (7, 9));
    }
}
