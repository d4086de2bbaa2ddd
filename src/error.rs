use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum EditorError {
    #[error("project file not found in {0}")]
    ProjectFileMissing(PathBuf),
    #[error("{0} is not an .oxxxyshot project file")]
    WrongExtension(PathBuf),
    #[error("failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("attribute `{name}` has unknown type tag `{tag}`")]
    UnknownAttributeType { name: String, tag: String },
    #[error("attribute `{name}` does not hold a `{expected}` value")]
    AttributeMismatch { name: String, expected: &'static str },
    #[error("cannot allocate a {width}x{height} pixmap")]
    PixmapAllocation { width: u32, height: u32 },
    #[error("png encoding failed: {0}")]
    PngEncoding(#[from] png::EncodingError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("clipboard error: {0}")]
    Clipboard(String),
}

impl EditorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn decode(what: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    /// Errors that come from user-supplied input rather than a programming mistake.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::ProjectFileMissing(_)
                | Self::WrongExtension(_)
                | Self::Decode { .. }
                | Self::Io { .. }
                | Self::Image(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;
