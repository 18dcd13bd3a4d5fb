//! Font backend contract: the harfbuzz/freetype operations the shaping
//! pipeline needs, abstracted so segmentation/sequencing logic can be
//! unit-tested against a fake (spec.md §4.7.3, §4.7.5, §4.7.9).

use kan_math::Fixed26_6;
use unicode_script::Script;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CategoryId(pub u32);

#[derive(Debug, Clone, Copy)]
pub struct GlyphId(pub u32);

/// One shaped glyph as harfbuzz reports it: cluster index into the
/// source text plus 26.6 advances/offsets (spec.md §4.7.3 step 3).
#[derive(Debug, Clone, Copy)]
pub struct HbGlyphInfo {
    pub glyph: GlyphId,
    pub cluster: u32,
    pub x_advance: Fixed26_6,
    pub y_advance: Fixed26_6,
    pub x_offset: Fixed26_6,
    pub y_offset: Fixed26_6,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GlyphExtents {
    pub bearing_x: f32,
    pub bearing_y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone)]
pub struct SdfBitmap {
    pub width: u32,
    pub height: u32,
    pub bitmap_left: i32,
    pub bitmap_top: i32,
    pub pixels: Vec<u8>,
}

/// Font metrics used for inter-sequence line spacing (spec.md §4.7.3:
/// "ascender − descender + line-gap").
#[derive(Debug, Clone, Copy, Default)]
pub struct FontMetrics {
    pub ascender_26_6: Fixed26_6,
    pub descender_26_6: Fixed26_6,
    pub line_gap_26_6: Fixed26_6,
}

impl FontMetrics {
    pub fn line_space(&self) -> Fixed26_6 {
        self.ascender_26_6 - self.descender_26_6 + self.line_gap_26_6
    }
}

pub trait FontBackend {
    /// spec.md §4.7.3 step 1: pick the category by `(script, style)`,
    /// falling back to the first usable category for common/icon
    /// scripts.
    fn category_for(&self, script: Script, style: u32) -> Option<CategoryId>;

    /// Whether `script`'s natural horizontal reading direction is RTL;
    /// used to gate line breaking (spec.md §4.7.3 step 2).
    fn script_is_natively_rtl(&self, script: Script) -> bool;

    fn metrics(&self, category: CategoryId, font_size: f32) -> FontMetrics;

    fn shape(&self, category: CategoryId, text: &str, font_size: f32) -> Vec<HbGlyphInfo>;

    fn glyph_id_for_codepoint(&self, category: CategoryId, codepoint: u32) -> Option<GlyphId>;

    fn glyph_extents(&self, category: CategoryId, glyph: GlyphId, font_size: f32) -> GlyphExtents;

    /// Rasterize an SDF bitmap for `glyph` at the atlas's standard
    /// font size (spec.md §4.7.5). `None` means an empty glyph (e.g.
    /// whitespace): zero extents, no atlas slot consumed.
    fn rasterize_sdf(&mut self, category: CategoryId, glyph: GlyphId) -> Option<SdfBitmap>;

    fn atlas_standard_font_size(&self) -> f32;
}
