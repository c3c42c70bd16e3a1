// Export modules for use in tests
pub mod assets;
pub mod display;
pub mod error;
pub mod event_source;
pub mod panic_handler;
pub mod pdf;
pub mod settings;
pub mod widget;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export the widget surface
pub use assets::{AssetNames, AssetSource, DirAssetSource, MemoryAssetSource};
pub use error::{Result, StampError};
pub use widget::{CanvasRect, ClickOutcome, StampConfig, StampWidget};
