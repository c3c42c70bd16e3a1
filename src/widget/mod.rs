pub mod coords;
pub mod overlay;
pub mod stamp_widget;

pub use coords::CanvasRect;
pub use stamp_widget::{ClickOutcome, ReplaySummary, StampConfig, StampWidget};
