//! File references handed to the coordinator.

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{IngestionError, IngestionResult};

/// A file submitted for ingestion.
///
/// Only the reference travels to the execution unit; the content is read there, so a slow disk
/// or a large file never blocks the caller.
#[derive(Clone)]
pub struct SourceFile {
    name: String,
    content: SourceContent,
}

#[derive(Clone)]
enum SourceContent {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

impl SourceFile {
    /// Reference a file on disk. The display name is the final path component.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            content: SourceContent::Path(path.to_path_buf()),
        }
    }

    /// Wrap content that is already in memory (e.g. an upload buffer).
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: SourceContent::Bytes(bytes.into().into()),
        }
    }

    /// Display name of the file, including its extension.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File extension without the dot, if the name has one.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.name).extension().and_then(|e| e.to_str())
    }

    /// Read the full content as bytes.
    ///
    /// Fails with [`IngestionError::Unreadable`] if the file cannot be read and with
    /// [`IngestionError::EmptyContent`] if it has no bytes.
    pub fn read_all(&self) -> IngestionResult<Cow<'_, [u8]>> {
        let bytes = match &self.content {
            SourceContent::Path(path) => {
                Cow::Owned(fs::read(path).map_err(|source| IngestionError::Unreadable { source })?)
            }
            SourceContent::Bytes(bytes) => Cow::Borrowed(&bytes[..]),
        };
        if bytes.is_empty() {
            return Err(IngestionError::EmptyContent);
        }
        Ok(bytes)
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("SourceFile");
        s.field("name", &self.name);
        match &self.content {
            SourceContent::Path(p) => s.field("path", p),
            SourceContent::Bytes(b) => s.field("bytes_len", &b.len()),
        };
        s.finish()
    }
}
