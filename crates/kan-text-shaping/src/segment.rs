//! Sequence building: the grab-cursor algorithm that splits shaped
//! glyphs/icons into line-break sequences (spec.md §4.7.3, §4.7.7).

use kan_math::Fixed26_6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabKind {
    Glyph(usize),
    Icon(usize),
}

/// One unit offered to the grab cursor. For line-breakable text this is
/// one shaped glyph; when line breaking is not permitted for a node,
/// the whole node collapses into a single unit (spec.md §4.7.3: "grab
/// the whole node into the current sequence").
#[derive(Debug, Clone, Copy)]
pub struct GrabUnit {
    pub advance: Fixed26_6,
    /// A break is allowed immediately before this unit.
    pub break_here: bool,
    pub hard: bool,
    pub line_space: Fixed26_6,
    pub kind: GrabKind,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sequence {
    pub first_glyph_index: Option<usize>,
    pub first_icon_index: Option<usize>,
    pub length_26_6: Fixed26_6,
    pub biggest_line_space_26_6: Fixed26_6,
}

/// Where a unit landed: which sequence, and the sequence's accumulated
/// length *before* this unit was grabbed (the `x`/`y` origin basis for
/// glyph append, spec.md §4.7.4).
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub sequence_index: usize,
    pub length_before_grab: Fixed26_6,
}

/// spec.md §4.7.3 step 4 / §4.7.7: run the grab cursor over `units`,
/// producing the finished sequences and each unit's placement.
pub fn build_sequences(units: &[GrabUnit], primary_axis_limit: Fixed26_6) -> (Vec<Sequence>, Vec<Placement>) {
    let mut sequences = Vec::new();
    let mut placements = Vec::with_capacity(units.len());
    let mut current = Sequence::default();
    let mut has_current = false;

    for (i, unit) in units.iter().enumerate() {
        let is_first_overall = i == 0;
        if has_current && !is_first_overall {
            if unit.hard {
                sequences.push(current);
                current = Sequence::default();
                has_current = false;
            } else if unit.break_here
                && unit.advance != Fixed26_6::ZERO
                && current.length_26_6 + unit.advance > primary_axis_limit
            {
                sequences.push(current);
                current = Sequence::default();
                has_current = false;
            }
        }
        if !has_current {
            current = Sequence::default();
            has_current = true;
        }

        let length_before_grab = current.length_26_6;
        match unit.kind {
            GrabKind::Glyph(idx) => {
                if current.first_glyph_index.is_none() {
                    current.first_glyph_index = Some(idx);
                }
            }
            GrabKind::Icon(idx) => {
                if current.first_icon_index.is_none() {
                    current.first_icon_index = Some(idx);
                }
            }
        }
        current.length_26_6 += unit.advance;
        current.biggest_line_space_26_6 = current.biggest_line_space_26_6.max(unit.line_space);

        placements.push(Placement {
            sequence_index: sequences.len(),
            length_before_grab,
        });
    }

    if has_current {
        sequences.push(current);
    }

    (sequences, placements)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(advance: i32, break_here: bool, hard: bool, kind: GrabKind) -> GrabUnit {
        GrabUnit {
            advance: Fixed26_6::from_bits(advance),
            break_here,
            hard,
            line_space: Fixed26_6::from_bits(64 * 20),
            kind,
        }
    }

    #[test]
    fn fits_in_a_single_sequence_when_under_limit() {
        let units = vec![
            unit(64 * 5, false, false, GrabKind::Glyph(0)),
            unit(64 * 5, true, false, GrabKind::Glyph(1)),
        ];
        let (sequences, placements) = build_sequences(&units, Fixed26_6::from_bits(64 * 100));
        assert_eq!(sequences.len(), 1);
        assert_eq!(placements.len(), 2);
        assert_eq!(placements[1].length_before_grab, Fixed26_6::from_bits(64 * 5));
    }

    #[test]
    fn overflow_at_break_position_starts_new_sequence() {
        let units = vec![
            unit(64 * 8, false, false, GrabKind::Glyph(0)),
            unit(64 * 8, true, false, GrabKind::Glyph(1)),
        ];
        let (sequences, placements) = build_sequences(&units, Fixed26_6::from_bits(64 * 10));
        assert_eq!(sequences.len(), 2);
        assert_eq!(placements[0].sequence_index, 0);
        assert_eq!(placements[1].sequence_index, 1);
    }

    #[test]
    fn hard_break_always_forces_new_sequence() {
        let units = vec![
            unit(64, false, false, GrabKind::Glyph(0)),
            unit(64, true, true, GrabKind::Glyph(1)),
        ];
        let (sequences, _placements) = build_sequences(&units, Fixed26_6::from_bits(64 * 1000));
        assert_eq!(sequences.len(), 2);
    }

    #[test]
    fn zero_length_glyph_always_grabs() {
        let units = vec![
            unit(64 * 10, false, false, GrabKind::Glyph(0)),
            unit(0, true, false, GrabKind::Glyph(1)),
        ];
        let (sequences, _placements) = build_sequences(&units, Fixed26_6::from_bits(64 * 10));
        assert_eq!(sequences.len(), 1);
    }
}
