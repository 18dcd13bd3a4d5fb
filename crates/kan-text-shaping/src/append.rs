//! Glyph/icon origin computation and render-data application (spec.md
//! §4.7.4, §4.7.6, §4.7.7).

use kan_math::Fixed26_6;

use crate::cache::CachedGlyphRecord;
use crate::request::{Orientation, ReadingDirection};

/// A glyph record mid-pipeline: origin is set at grab time (§4.7.4),
/// then widened into min/max once render data is applied (§4.7.6). All
/// fields stay in 26.6 until the post-process pass converts to pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkGlyph {
    pub min_x: Fixed26_6,
    pub min_y: Fixed26_6,
    pub max_x: Fixed26_6,
    pub max_y: Fixed26_6,
    pub uv_min: kan_math::Vec2,
    pub uv_max: kan_math::Vec2,
    pub layer: u32,
    pub sequence_index: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkIcon {
    pub icon_index: u32,
    pub min_x: Fixed26_6,
    pub min_y: Fixed26_6,
    pub max_x: Fixed26_6,
    pub max_y: Fixed26_6,
    pub sequence_index: usize,
}

/// spec.md §4.7.4: glyph origin from orientation/direction.
/// `length_before_grab` and `advance` come from the sequence builder.
pub fn glyph_origin(
    orientation: Orientation,
    direction: ReadingDirection,
    length_before_grab: Fixed26_6,
    advance: Fixed26_6,
    x_offset: Fixed26_6,
    y_offset: Fixed26_6,
    primary_axis_limit: Fixed26_6,
) -> (Fixed26_6, Fixed26_6) {
    match (orientation, direction) {
        (Orientation::Horizontal, ReadingDirection::Ltr) => {
            (length_before_grab + x_offset, y_offset)
        }
        (Orientation::Horizontal, ReadingDirection::Rtl) => {
            (
                primary_axis_limit - length_before_grab - advance + x_offset,
                y_offset,
            )
        }
        (Orientation::Vertical, _) => (x_offset, length_before_grab + y_offset),
    }
}

/// spec.md §4.7.6: apply a cached glyph's bitmap bearing/size to widen
/// an origin-only record into min/max, scaling by
/// `request_font_size / atlas_font_size` when they differ.
pub fn apply_render_data(
    origin_x: Fixed26_6,
    origin_y: Fixed26_6,
    record: &CachedGlyphRecord,
    request_font_size: f32,
    atlas_font_size: f32,
    sequence_index: usize,
) -> WorkGlyph {
    if record.empty {
        return WorkGlyph {
            min_x: origin_x,
            min_y: origin_y,
            max_x: origin_x,
            max_y: origin_y,
            sequence_index,
            ..Default::default()
        };
    }

    let scale = if (request_font_size - atlas_font_size).abs() > f32::EPSILON {
        request_font_size / atlas_font_size
    } else {
        1.0
    };
    let scale_fixed = Fixed26_6::from_num(scale);
    let bearing_x = record.bearing_x_26_6 * scale_fixed;
    let bearing_y = record.bearing_y_26_6 * scale_fixed;
    let width = record.width_26_6 * scale_fixed;
    let height = record.height_26_6 * scale_fixed;

    WorkGlyph {
        min_x: origin_x + bearing_x,
        min_y: origin_y - bearing_y,
        max_x: origin_x + bearing_x + width,
        max_y: origin_y + height - bearing_y,
        uv_min: record.uv_min,
        uv_max: record.uv_max,
        layer: record.layer,
        sequence_index,
    }
}

/// spec.md §4.7.7: icon min/max from the base glyph's extents, scaled
/// by `(scale_x, scale_y)`.
pub fn icon_min_max(
    origin_x: Fixed26_6,
    origin_y: Fixed26_6,
    base_width_26_6: Fixed26_6,
    base_height_26_6: Fixed26_6,
    scale_x: f32,
    scale_y: f32,
    sequence_index: usize,
    icon_index: u32,
) -> WorkIcon {
    let sx = Fixed26_6::from_num(scale_x);
    let sy = Fixed26_6::from_num(scale_y);
    WorkIcon {
        icon_index,
        min_x: origin_x,
        min_y: origin_y,
        max_x: origin_x + base_width_26_6 * sx,
        max_y: origin_y + base_height_26_6 * sy,
        sequence_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fx(v: i32) -> Fixed26_6 {
        Fixed26_6::from_bits(v)
    }

    #[test]
    fn horizontal_ltr_origin_uses_length_plus_offset() {
        let (x, y) = glyph_origin(
            Orientation::Horizontal,
            ReadingDirection::Ltr,
            fx(64 * 10),
            fx(64 * 5),
            fx(64 * 1),
            fx(0),
            fx(64 * 1000),
        );
        assert_eq!(x, fx(64 * 11));
        assert_eq!(y, fx(0));
    }

    #[test]
    fn horizontal_rtl_origin_mirrors_around_limit() {
        let (x, _y) = glyph_origin(
            Orientation::Horizontal,
            ReadingDirection::Rtl,
            fx(64 * 10),
            fx(64 * 5),
            fx(0),
            fx(0),
            fx(64 * 100),
        );
        assert_eq!(x, fx(64 * 85));
    }

    #[test]
    fn empty_glyph_has_zero_extent() {
        let record = CachedGlyphRecord { empty: true, ..Default::default() };
        let glyph = apply_render_data(fx(10), fx(10), &record, 16.0, 16.0, 0);
        assert_eq!(glyph.min_x, glyph.max_x);
        assert_eq!(glyph.min_y, glyph.max_y);
    }
}
