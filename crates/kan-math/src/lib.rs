//! Small math primitives shared by the render frontend: 2D vectors and
//! the 26.6 fixed-point format freetype/harfbuzz use for subpixel glyph
//! positioning (spec.md GLOSSARY, "26.6").

pub mod fixed26_6;
pub mod vec2;

pub use fixed26_6::Fixed26_6;
pub use vec2::{Vec2, Vec2I};
