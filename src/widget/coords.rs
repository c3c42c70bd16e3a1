//! Client-to-canvas coordinate mapping

use crate::pdf::Position;

/// Bounding rectangle of the canvas in client coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CanvasRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CanvasRect {
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Canvas-local pixel coordinates of a client point
    fn local(&self, client_x: f32, client_y: f32) -> (f32, f32) {
        (client_x - self.x, client_y - self.y)
    }

    /// Cursor position for a client point: canvas-local, minus the stamp
    /// size on both axes.
    #[must_use]
    pub fn to_position(&self, client_x: f32, client_y: f32, stamp_size: f32) -> Position {
        let (x, y) = self.local(client_x, client_y);
        Position::new(x - stamp_size, y - stamp_size)
    }

    #[must_use]
    pub fn contains(&self, client_x: f32, client_y: f32) -> bool {
        let (x, y) = self.local(client_x, client_y);
        x >= 0.0 && y >= 0.0 && x < self.width && y < self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_at_50_50_tracks_minus_78() {
        let rect = CanvasRect::new(0.0, 0.0, 612.0, 792.0);
        assert_eq!(rect.to_position(50.0, 50.0, 128.0), Position::new(-78.0, -78.0));
    }

    #[test]
    fn position_subtracts_canvas_origin() {
        let rect = CanvasRect::new(10.0, 20.0, 612.0, 792.0);
        assert_eq!(rect.to_position(210.0, 320.0, 128.0), Position::new(72.0, 172.0));
    }

    #[test]
    fn contains_is_half_open() {
        let rect = CanvasRect::new(5.0, 5.0, 10.0, 10.0);

        assert!(rect.contains(5.0, 5.0));
        assert!(rect.contains(14.9, 14.9));
        assert!(!rect.contains(15.0, 10.0));
        assert!(!rect.contains(4.9, 10.0));
    }
}
