//! Display handles for embedding the current document in a viewer
//!
//! A handle is a private temporary file holding one document generation,
//! addressed by a `file://` URL. Publishing a new handle releases the old
//! one, so stale copies never pile up.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use log::{debug, warn};
use tempfile::NamedTempFile;

use crate::pdf::DocumentBuffer;

/// Viewer-facing reference to one document generation
#[derive(Debug)]
pub struct DisplayHandle {
    file: NamedTempFile,
    url: String,
    generation: u64,
}

impl DisplayHandle {
    /// Write `document` to a fresh temporary file
    pub fn create(document: &DocumentBuffer) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("pdfstamp-")
            .suffix(".pdf")
            .tempfile()?;
        file.write_all(document.bytes())?;
        file.flush()?;

        let url = format!("file://{}", file.path().display());
        Ok(Self {
            file,
            url,
            generation: document.generation(),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Inline `data:` URL form, for viewers that cannot read local files
    pub fn data_url(&self) -> io::Result<String> {
        let bytes = fs::read(self.path())?;
        Ok(format!("data:application/pdf;base64,{}", B64.encode(bytes)))
    }

    /// Remove the backing file now rather than on drop
    pub fn release(self) -> io::Result<()> {
        self.file.close()
    }
}

/// Owner of the one live display handle
#[derive(Debug, Default)]
pub struct DisplayHandles {
    current: Option<DisplayHandle>,
    released: usize,
}

impl DisplayHandles {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a handle for `document`, releasing the previous one.
    ///
    /// On failure the previous handle stays current.
    pub fn publish(&mut self, document: &DocumentBuffer) -> io::Result<&DisplayHandle> {
        let handle = DisplayHandle::create(document)?;
        debug!(
            "Published display handle for generation {}: {}",
            handle.generation(),
            handle.url()
        );

        if let Some(previous) = self.current.take() {
            let generation = previous.generation();
            match previous.release() {
                Ok(()) => debug!("Released display handle for generation {generation}"),
                Err(e) => warn!("Failed to release display handle for generation {generation}: {e}"),
            }
            self.released += 1;
        }

        Ok(self.current.insert(handle))
    }

    #[must_use]
    pub fn current(&self) -> Option<&DisplayHandle> {
        self.current.as_ref()
    }

    /// Number of handles released so far
    #[must_use]
    pub fn released(&self) -> usize {
        self.released
    }
}
