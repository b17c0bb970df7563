use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tempfile::TempDir;
use tokio_stream::Stream;

/// Scratch space for a single materialized download: a uniquely-named
/// temporary directory plus the media file the extractor wrote into it.
///
/// Dropping the artifact removes the file and then the directory. Removal
/// errors are swallowed; cleanup must never surface into the response.
/// Directory uniqueness is the only isolation concurrent downloads need,
/// since every request owns a disjoint subtree.
pub struct TempArtifact {
    dir: TempDir,
    file: Option<PathBuf>,
}

impl TempArtifact {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
            file: None,
        })
    }

    pub fn dir_path(&self) -> &Path {
        self.dir.path()
    }

    /// Records the file the extractor produced so drop can remove it.
    pub fn set_file(&mut self, path: PathBuf) {
        self.file = Some(path);
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = fs::remove_file(file);
        }
        // the TempDir field removes the directory itself when it drops
    }
}

/// A byte stream that owns its backing `TempArtifact`.
///
/// The response body holds this stream, so the artifact is released exactly
/// when the body is dropped — after full transmission or on a transport
/// error, never before.
pub struct ArtifactStream<S> {
    stream: S,
    _artifact: TempArtifact,
}

impl<S> ArtifactStream<S> {
    pub fn new(stream: S, artifact: TempArtifact) -> Self {
        Self {
            stream,
            _artifact: artifact,
        }
    }
}

impl<S: Stream + Unpin> Stream for ArtifactStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().stream).poll_next(cx)
    }
}
