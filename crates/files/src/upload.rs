//! Upload sources consumed by [`crate::FileRepository::create_from_upload`].

use crate::FilesResult;
use depot_types::extension_of;
use std::fs;
use std::path::Path;

/// Byte-bearing input with the name the client gave it.
pub trait UploadSource {
    /// File name as supplied by the client, extension included.
    fn original_name(&self) -> &str;

    fn bytes(&self) -> &[u8];

    /// Extension of [`UploadSource::original_name`]; hidden files have none.
    fn original_extension(&self) -> Option<&str> {
        extension_of(self.original_name())
    }

    fn size(&self) -> u64 {
        self.bytes().len() as u64
    }

    /// Best-effort content type; not authoritative.
    fn mime(&self) -> Option<&str> {
        None
    }
}

/// An upload held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    original_name: String,
    contents: Vec<u8>,
    mime: Option<String>,
}

impl UploadedFile {
    /// Wraps `contents`, sniffing the media type from its magic bytes.
    pub fn new(original_name: impl Into<String>, contents: Vec<u8>) -> Self {
        let mime = infer::get(&contents).map(|kind| kind.mime_type().to_owned());
        Self {
            original_name: original_name.into(),
            contents,
            mime,
        }
    }

    /// Overrides the sniffed media type, e.g. with a client-declared `Content-Type`.
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Reads a file from the local filesystem; its file name becomes the original name.
    pub fn from_path(path: &Path) -> FilesResult<Self> {
        let contents = fs::read(path).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("Failed to read upload source {}: {}", path.display(), e),
            )
        })?;
        let original_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_owned();
        Ok(Self::new(original_name, contents))
    }
}

impl UploadSource for UploadedFile {
    fn original_name(&self) -> &str {
        &self.original_name
    }

    fn bytes(&self) -> &[u8] {
        &self.contents
    }

    fn mime(&self) -> Option<&str> {
        self.mime.as_deref()
    }
}
