//! PDF stamping and rendering infrastructure

mod cache;
pub mod editor;
pub mod renderer;
mod request;
mod service;
mod state;
mod types;
mod worker;

pub use cache::{CacheKey, PageCache};
pub use editor::{PageBox, Placement, StampImage};
pub use request::{RenderParams, RequestId, WorkRequest, WorkResponse};
pub use service::{PendingRequest, StampService};
pub use state::{Command, Effect, Phase, WidgetState};
pub use types::*;

/// Edge length of the stamp footprint, in pixels at scale 1
pub const DEFAULT_STAMP_SIZE: u32 = 128;

/// Rasters kept in the render cache
pub const DEFAULT_CACHE_SIZE: usize = 4;
