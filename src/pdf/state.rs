//! Widget state machine
//!
//! Pure transition function: commands go in, effects come out. The widget
//! executes the effects (talking to the worker, swapping buffers), which keeps
//! the ordering rules testable without a document or a thread.

use super::types::Position;

/// Lifecycle phase of a stamp widget
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// Nothing loaded yet
    #[default]
    Uninitialized,
    /// Assets fetching or initial render in flight
    Loading,
    /// Page rendered, awaiting input
    Ready,
    /// Stamp and re-render in flight
    Editing,
    /// Assets or initial render failed; the widget stays unusable
    Failed,
}

/// Current state of a stamp widget
#[derive(Clone, Debug, Default)]
pub struct WidgetState {
    /// Lifecycle phase
    pub phase: Phase,

    /// Last tracked cursor position (stamp top-left, canvas pixels)
    pub cursor: Position,

    /// Whether the stamp preview follows the pointer
    pub overlay_visible: bool,
}

impl WidgetState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::BeginLoading => {
                if self.phase == Phase::Uninitialized {
                    self.phase = Phase::Loading;
                }
                vec![]
            }

            Command::AssetsLoaded => {
                if self.phase == Phase::Loading {
                    vec![Effect::RenderCurrentPage]
                } else {
                    vec![]
                }
            }

            Command::LoadFailed => {
                self.phase = Phase::Failed;
                vec![]
            }

            Command::RenderFinished => match self.phase {
                Phase::Loading => {
                    self.phase = Phase::Ready;
                    vec![Effect::PublishDisplayHandle]
                }
                Phase::Editing => {
                    self.phase = Phase::Ready;
                    vec![]
                }
                _ => vec![],
            },

            Command::RenderFailed => {
                match self.phase {
                    Phase::Loading => self.phase = Phase::Failed,
                    Phase::Editing => self.phase = Phase::Ready,
                    _ => {}
                }
                vec![]
            }

            Command::PointerEntered(pos) => {
                self.cursor = pos;
                self.overlay_visible = true;
                vec![]
            }

            Command::PointerMoved(pos) => {
                self.cursor = pos;
                vec![]
            }

            Command::PointerLeft => {
                self.overlay_visible = false;
                vec![]
            }

            Command::Clicked(pos) => {
                if self.phase == Phase::Ready {
                    self.phase = Phase::Editing;
                    vec![Effect::StampAt(pos)]
                } else {
                    vec![Effect::DropClick]
                }
            }

            Command::StampFinished => {
                if self.phase == Phase::Editing {
                    vec![Effect::PublishDisplayHandle, Effect::RenderCurrentPage]
                } else {
                    vec![]
                }
            }

            Command::StampFailed => {
                if self.phase == Phase::Editing {
                    self.phase = Phase::Ready;
                }
                vec![]
            }
        }
    }
}

/// Commands that modify widget state
#[derive(Clone, Debug)]
pub enum Command {
    /// Asset fetching started
    BeginLoading,
    /// Both assets are in memory
    AssetsLoaded,
    /// An asset could not be fetched
    LoadFailed,
    /// The current buffer was drawn onto the canvas
    RenderFinished,
    /// The current buffer could not be rendered
    RenderFailed,
    /// Pointer entered the canvas
    PointerEntered(Position),
    /// Pointer moved over the canvas
    PointerMoved(Position),
    /// Pointer left the canvas
    PointerLeft,
    /// Canvas was clicked
    Clicked(Position),
    /// The stamped buffer replaced the current one
    StampFinished,
    /// Stamping failed; the current buffer is unchanged
    StampFailed,
}

/// Effects produced by state changes
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Render the current buffer's page onto the canvas
    RenderCurrentPage,
    /// Stamp the current buffer at a cursor position
    StampAt(Position),
    /// Release the old display handle and publish one for the current buffer
    PublishDisplayHandle,
    /// A click arrived while busy and was ignored
    DropClick,
}
