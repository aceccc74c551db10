use bytemuck::{Pod, Zeroable};

/// Straight-alpha RGBA color, one `f32` per channel.
///
/// Channels are meant to lie in `[0, 1]`. Nothing enforces it: values outside
/// that range reach the GPU unchanged and the result is whatever the target
/// format does with them.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const RED: Self = Self::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Self = Self::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Self = Self::new(0.0, 0.0, 1.0, 1.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl From<Color> for wgpu::Color {
    fn from(c: Color) -> Self {
        wgpu::Color {
            r: c.r as f64,
            g: c.g as f64,
            b: c.b as f64,
            a: c.a as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_four_packed_floats() {
        assert_eq!(std::mem::size_of::<Color>(), 16);
        assert_eq!(
            bytemuck::bytes_of(&Color::GREEN),
            bytemuck::cast_slice::<f32, u8>(&[0.0, 1.0, 0.0, 1.0])
        );
    }

    #[test]
    fn out_of_range_channels_reach_the_gpu_unchanged() {
        let hot: wgpu::Color = Color::new(2.0, -0.5, 0.0, 1.0).into();
        assert_eq!((hot.r, hot.g, hot.b, hot.a), (2.0, -0.5, 0.0, 1.0));
    }
}
