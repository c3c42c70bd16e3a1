//! Work request and response types

use std::sync::Arc;

use super::types::{DocumentBuffer, PageRaster, Position};
use crate::error::StampError;

/// Unique identifier for work requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Parameters shared by stamping and rendering
#[derive(Clone, Debug)]
pub struct RenderParams {
    /// Page to render (1-based)
    pub page: usize,
    /// Scale factor (1.0 = page points are pixels)
    pub scale: f32,
    /// Stamp edge length in page points
    pub stamp_size: f32,
}

/// Request sent to the stamp worker
#[derive(Debug)]
pub enum WorkRequest {
    /// Embed the stamp into `document` at the cursor position
    Stamp {
        id: RequestId,
        document: DocumentBuffer,
        stamp: Arc<[u8]>,
        position: Position,
        params: RenderParams,
    },

    /// Rasterize a page of `document`
    Render {
        id: RequestId,
        document: DocumentBuffer,
        params: RenderParams,
    },

    /// Shutdown the worker
    Shutdown,
}

/// Response from the stamp worker
#[derive(Debug)]
pub enum WorkResponse {
    /// Stamping succeeded; `document` is the successor buffer
    Stamped { id: RequestId, document: DocumentBuffer },

    /// Rendered page data
    Rendered { id: RequestId, raster: Arc<PageRaster> },

    /// Error while stamping or rendering
    Error { id: RequestId, error: StampError },
}

impl WorkResponse {
    #[must_use]
    pub fn id(&self) -> RequestId {
        match self {
            Self::Stamped { id, .. } | Self::Rendered { id, .. } | Self::Error { id, .. } => *id,
        }
    }
}
