/// Raster output rectangle, in physical pixels of the bound render target.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Viewport {
    pub top_left_x: f32,
    pub top_left_y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Viewport covering a whole `width x height` surface, depth range `[0, 1]`.
    #[inline]
    pub const fn full(width: u32, height: u32) -> Self {
        Self {
            top_left_x: 0.0,
            top_left_y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    /// Clamps the rectangle to a `width x height` target.
    ///
    /// Returns `None` when nothing of the viewport is left inside the target.
    pub fn clamped_to(self, width: u32, height: u32) -> Option<Self> {
        let x = self.top_left_x.max(0.0);
        let y = self.top_left_y.max(0.0);
        let x2 = (self.top_left_x + self.width).min(width as f32);
        let y2 = (self.top_left_y + self.height).min(height as f32);

        if x2 <= x || y2 <= y {
            return None;
        }

        Some(Self {
            top_left_x: x,
            top_left_y: y,
            width: x2 - x,
            height: y2 - y,
            min_depth: self.min_depth.clamp(0.0, 1.0),
            max_depth: self.max_depth.clamp(0.0, 1.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_covers_surface() {
        let v = Viewport::full(1366, 768);
        assert_eq!(v.top_left_x, 0.0);
        assert_eq!(v.top_left_y, 0.0);
        assert_eq!(v.width, 1366.0);
        assert_eq!(v.height, 768.0);
        assert_eq!((v.min_depth, v.max_depth), (0.0, 1.0));
    }

    #[test]
    fn zero_area_clamps_to_nothing() {
        assert!(Viewport::full(0, 768).clamped_to(1366, 768).is_none());
    }

    #[test]
    fn clamped_to_smaller_target() {
        let v = Viewport::full(1366, 768).clamped_to(800, 600).unwrap();
        assert_eq!((v.width, v.height), (800.0, 600.0));
    }

    #[test]
    fn clamped_outside_target_is_none() {
        let v = Viewport {
            top_left_x: 900.0,
            ..Viewport::full(100, 100)
        };
        assert!(v.clamped_to(800, 600).is_none());
    }
}
