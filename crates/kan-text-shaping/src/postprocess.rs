//! Post-processing: alignment, baseline stacking, and 26.6 → pixel
//! conversion (spec.md §4.7.8).

use kan_math::{Fixed26_6, Vec2};

use crate::append::{WorkGlyph, WorkIcon};
use crate::request::{Alignment, Orientation, ReadingDirection, ShapedData, ShapedGlyph, ShapedIcon};
use crate::segment::Sequence;

fn effective_alignment(alignment: Alignment, orientation: Orientation, direction: ReadingDirection) -> Alignment {
    if orientation == Orientation::Horizontal && direction == ReadingDirection::Rtl {
        match alignment {
            Alignment::Left => Alignment::Right,
            Alignment::Right => Alignment::Left,
            Alignment::Center => Alignment::Center,
        }
    } else {
        alignment
    }
}

fn alignment_offset(limit: Fixed26_6, length: Fixed26_6, alignment: Alignment) -> Fixed26_6 {
    match alignment {
        Alignment::Left => Fixed26_6::ZERO,
        Alignment::Right => limit - length,
        Alignment::Center => (limit - length) / Fixed26_6::from_num(2),
    }
}

fn to_pixels(v: Fixed26_6) -> f32 {
    kan_math::fixed26_6::from_26_6(v)
}

/// spec.md §4.7.8: walk every sequence's glyphs/icons, applying
/// alignment offset on the primary axis and a running baseline on the
/// secondary axis, then convert to pixel space.
pub fn post_process(
    sequences: &[Sequence],
    mut glyphs: Vec<WorkGlyph>,
    mut icons: Vec<WorkIcon>,
    orientation: Orientation,
    direction: ReadingDirection,
    alignment: Alignment,
    primary_axis_limit: Fixed26_6,
) -> ShapedData {
    let effective = effective_alignment(alignment, orientation, direction);
    let mut baseline = Fixed26_6::ZERO;

    let mut offsets = Vec::with_capacity(sequences.len());
    let mut baselines = Vec::with_capacity(sequences.len());
    for seq in sequences {
        offsets.push(alignment_offset(primary_axis_limit, seq.length_26_6, effective));
        baselines.push(baseline);
        baseline += seq.biggest_line_space_26_6;
    }

    let mut data = ShapedData::default();
    let mut bounds_set = false;

    for glyph in glyphs.iter_mut() {
        let offset = offsets[glyph.sequence_index];
        let base = baselines[glyph.sequence_index];
        apply_axes(orientation, offset, base, &mut glyph.min_x, &mut glyph.min_y, &mut glyph.max_x, &mut glyph.max_y);

        let shaped = ShapedGlyph {
            min: Vec2::new(to_pixels(glyph.min_x), to_pixels(glyph.min_y)),
            max: Vec2::new(to_pixels(glyph.max_x), to_pixels(glyph.max_y)),
            uv_min: glyph.uv_min,
            uv_max: glyph.uv_max,
            layer: glyph.layer,
        };
        bounds_set = accumulate_bounds(&mut data, shaped.min, shaped.max, bounds_set);
        data.glyphs.push(shaped);
    }

    for icon in icons.iter_mut() {
        let offset = offsets[icon.sequence_index];
        let base = baselines[icon.sequence_index];
        apply_axes(orientation, offset, base, &mut icon.min_x, &mut icon.min_y, &mut icon.max_x, &mut icon.max_y);

        let min = Vec2::new(to_pixels(icon.min_x).round(), to_pixels(icon.min_y).round());
        let max = Vec2::new(to_pixels(icon.max_x).round(), to_pixels(icon.max_y).round());
        let shaped = ShapedIcon { icon_index: icon.icon_index, min, max };
        bounds_set = accumulate_bounds(&mut data, min, max, bounds_set);
        data.icons.push(shaped);
    }

    data
}

fn apply_axes(
    orientation: Orientation,
    offset: Fixed26_6,
    baseline: Fixed26_6,
    min_x: &mut Fixed26_6,
    min_y: &mut Fixed26_6,
    max_x: &mut Fixed26_6,
    max_y: &mut Fixed26_6,
) {
    match orientation {
        Orientation::Horizontal => {
            *min_x += offset;
            *max_x += offset;
            *min_y += baseline;
            *max_y += baseline;
        }
        Orientation::Vertical => {
            *min_y += offset;
            *max_y += offset;
            *min_x += baseline;
            *max_x += baseline;
        }
    }
}

fn accumulate_bounds(data: &mut ShapedData, min: Vec2, max: Vec2, bounds_set: bool) -> bool {
    if !bounds_set {
        data.min = min;
        data.max = max;
    } else {
        data.min = data.min.min(min);
        data.max = data.max.max(max);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::GrabKind;

    #[test]
    fn left_alignment_has_zero_offset() {
        let sequences = vec![Sequence {
            first_glyph_index: Some(0),
            first_icon_index: None,
            length_26_6: Fixed26_6::from_bits(64 * 5),
            biggest_line_space_26_6: Fixed26_6::from_bits(64 * 20),
        }];
        let glyphs = vec![WorkGlyph {
            min_x: Fixed26_6::ZERO,
            min_y: Fixed26_6::ZERO,
            max_x: Fixed26_6::from_bits(64 * 5),
            max_y: Fixed26_6::from_bits(64 * 5),
            sequence_index: 0,
            ..Default::default()
        }];
        let data = post_process(
            &sequences,
            glyphs,
            vec![],
            Orientation::Horizontal,
            ReadingDirection::Ltr,
            Alignment::Left,
            Fixed26_6::from_bits(64 * 100),
        );
        assert_eq!(data.glyphs[0].min.x, 0.0);
    }

    #[test]
    fn right_alignment_shifts_by_remaining_space() {
        let sequences = vec![Sequence {
            first_glyph_index: Some(0),
            first_icon_index: None,
            length_26_6: Fixed26_6::from_bits(64 * 5),
            biggest_line_space_26_6: Fixed26_6::ZERO,
        }];
        let glyphs = vec![WorkGlyph {
            sequence_index: 0,
            ..Default::default()
        }];
        let data = post_process(
            &sequences,
            glyphs,
            vec![],
            Orientation::Horizontal,
            ReadingDirection::Ltr,
            Alignment::Right,
            Fixed26_6::from_bits(64 * 20),
        );
        assert_eq!(data.glyphs[0].min.x, 15.0);
    }

    #[test]
    fn second_sequence_starts_below_first_by_line_space() {
        let sequences = vec![
            Sequence {
                first_glyph_index: Some(0),
                first_icon_index: None,
                length_26_6: Fixed26_6::ZERO,
                biggest_line_space_26_6: Fixed26_6::from_bits(64 * 20),
            },
            Sequence {
                first_glyph_index: Some(1),
                first_icon_index: None,
                length_26_6: Fixed26_6::ZERO,
                biggest_line_space_26_6: Fixed26_6::from_bits(64 * 20),
            },
        ];
        let glyphs = vec![
            WorkGlyph { sequence_index: 0, ..Default::default() },
            WorkGlyph { sequence_index: 1, ..Default::default() },
        ];
        let data = post_process(
            &sequences,
            glyphs,
            vec![],
            Orientation::Horizontal,
            ReadingDirection::Ltr,
            Alignment::Left,
            Fixed26_6::from_bits(64 * 100),
        );
        assert_eq!(data.glyphs[1].min.y, 20.0);
        let _ = GrabKind::Glyph(0);
    }
}
