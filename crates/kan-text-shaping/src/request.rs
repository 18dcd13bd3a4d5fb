//! Shaping request/response shapes (spec.md §4.7.2).

use kan_math::{Fixed26_6, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingDirection {
    Ltr,
    Rtl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFormat {
    Sdf,
}

#[derive(Debug, Clone)]
pub struct ShapingRequest {
    pub font_size: f32,
    pub orientation: Orientation,
    pub reading_direction: ReadingDirection,
    pub alignment: Alignment,
    pub primary_axis_limit: Fixed26_6,
    pub render_format: RenderFormat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapedGlyph {
    pub min: Vec2,
    pub max: Vec2,
    pub uv_min: Vec2,
    pub uv_max: Vec2,
    pub layer: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapedIcon {
    pub icon_index: u32,
    pub min: Vec2,
    pub max: Vec2,
}

#[derive(Debug, Clone, Default)]
pub struct ShapedData {
    pub min: Vec2,
    pub max: Vec2,
    pub glyphs: Vec<ShapedGlyph>,
    pub icons: Vec<ShapedIcon>,
}
