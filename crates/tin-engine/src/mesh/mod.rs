//! Vertex format and the static mesh drawn by the frame loop.

mod vertex;

pub use vertex::{Vertex, VertexLayout};

use crate::coords::Color;

/// The bootstrap triangle: red apex, green bottom-right, blue bottom-left.
pub const TRIANGLE: [Vertex; 3] = [
    Vertex::new(0.0, 0.7, 0.0, Color::RED),
    Vertex::new(0.4, -0.4, 0.0, Color::GREEN),
    Vertex::new(-0.4, -0.4, 0.0, Color::BLUE),
];
