//! Small geometry types shared across the coordinator.

use serde::{Deserialize, Serialize};

/// Rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_size(width: i32, height: i32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width,
            bottom: height,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    pub fn set_empty(&mut self) {
        *self = Self::default();
    }
}

/// Insets applied to a window frame (content, visible, touchable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Insets {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Insets {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Scales all four sides, rounding toward the nearest pixel.
    pub fn scale(&mut self, factor: f32) {
        if (factor - 1.0).abs() < f32::EPSILON {
            return;
        }
        self.left = (self.left as f32 * factor + 0.5) as i32;
        self.top = (self.top as f32 * factor + 0.5) as i32;
        self.right = (self.right as f32 * factor + 0.5) as i32;
        self.bottom = (self.bottom as f32 * factor + 0.5) as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_dimensions() {
        let r = Rect::new(10, 20, 110, 220);
        assert_eq!(r.width(), 100);
        assert_eq!(r.height(), 200);
        assert!(!r.is_empty());
    }

    #[test]
    fn test_empty_rect() {
        let mut r = Rect::new(5, 5, 100, 100);
        r.set_empty();
        assert!(r.is_empty());
        assert_eq!(r, Rect::default());
    }

    #[test]
    fn test_insets_scale() {
        let mut insets = Insets::new(10, 10, 10, 10);
        insets.scale(1.5);
        assert_eq!(insets, Insets::new(15, 15, 15, 15));

        let mut unchanged = Insets::new(4, 4, 4, 4);
        unchanged.scale(1.0);
        assert_eq!(unchanged, Insets::new(4, 4, 4, 4));
    }
}
