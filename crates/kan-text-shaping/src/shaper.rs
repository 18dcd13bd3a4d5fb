//! Top-level shaping pipeline, wiring together text-build nodes, font
//! shaping, segmentation, rasterization, and post-processing (spec.md
//! §4.7.2-§4.7.8).

use std::collections::HashMap;

use kan_math::Fixed26_6;
use unicode_script::Script;

use crate::append::{apply_render_data, glyph_origin, icon_min_max};
use crate::atlas::AtlasPacker;
use crate::cache::{CachedGlyphRecord, GlyphCache};
use crate::font::{CategoryId, FontBackend, HbGlyphInfo};
use crate::linebreak::LineBreaker;
use crate::node::TextNode;
use crate::request::{Orientation, ReadingDirection, ShapedData, ShapingRequest};
use crate::segment::{build_sequences, GrabKind, GrabUnit};

/// A unit's payload: either a group of one-or-more shaped glyphs that
/// are grabbed together (one glyph when line breaking is permitted,
/// the whole node's glyphs when it is not — spec.md §4.7.3), or an
/// icon.
enum UnitPayload {
    Glyphs { category: CategoryId, infos: Vec<HbGlyphInfo> },
    Icon { category: CategoryId, icon_index: u32, base_codepoint: u32, scale_x: f32, scale_y: f32 },
}

/// spec.md §4.7.2: run a shaping request over an already-built node
/// list, producing `shaped-data`.
pub fn shape<B: FontBackend>(
    nodes: &[TextNode],
    backend: &mut B,
    caches: &mut HashMap<CategoryId, GlyphCache>,
    atlas: &mut AtlasPacker,
    breaker: &dyn LineBreaker,
    request: &ShapingRequest,
) -> ShapedData {
    let mut current_style: u32 = 0;
    let mut units: Vec<GrabUnit> = Vec::new();
    let mut payloads: Vec<UnitPayload> = Vec::new();

    for node in nodes {
        match node {
            TextNode::Style(tag) => current_style = tag.style,
            TextNode::Utf8 { script, bytes } => {
                let text = String::from_utf8_lossy(bytes);
                let Some(category) = backend.category_for(*script, current_style) else {
                    log::warn!("no font category for script {script:?}, skipping node");
                    continue;
                };
                let line_space = backend.metrics(category, request.font_size).line_space();
                let glyphs = backend.shape(category, &text, request.font_size);

                // spec.md §4.7.3 step 2: line breaks permitted only
                // when reading direction agrees with the script's
                // natural direction.
                let natively_rtl = backend.script_is_natively_rtl(*script);
                let requested_rtl = request.reading_direction == ReadingDirection::Rtl;
                let breaking_permitted = natively_rtl == requested_rtl;

                let must_reverse = request.orientation == Orientation::Horizontal && requested_rtl;
                let ordered: Vec<HbGlyphInfo> = if must_reverse {
                    glyphs.iter().rev().copied().collect()
                } else {
                    glyphs.clone()
                };

                if breaking_permitted {
                    let breaks = breaker.breaks(&text);
                    for info in ordered {
                        let advance = axis_advance(request.orientation, &info);
                        let hit = breaks.iter().find(|b| b.offset as u32 == info.cluster);
                        units.push(GrabUnit {
                            advance,
                            break_here: hit.is_some(),
                            hard: hit.map(|b| b.hard).unwrap_or(false),
                            line_space,
                            kind: GrabKind::Glyph(payloads.len()),
                        });
                        payloads.push(UnitPayload::Glyphs { category, infos: vec![info] });
                    }
                } else {
                    let total_advance = ordered
                        .iter()
                        .fold(Fixed26_6::ZERO, |acc, info| acc + axis_advance(request.orientation, info));
                    units.push(GrabUnit {
                        advance: total_advance,
                        break_here: true,
                        hard: false,
                        line_space,
                        kind: GrabKind::Glyph(payloads.len()),
                    });
                    payloads.push(UnitPayload::Glyphs { category, infos: ordered });
                }
            }
            TextNode::Icon { index, base_codepoint, scale_x, scale_y } => {
                let Some(category) = backend.category_for(Script::Common, current_style) else {
                    continue;
                };
                let advance = icon_advance(backend, category, *base_codepoint, *scale_x, request.orientation, request.font_size);
                units.push(GrabUnit {
                    advance,
                    break_here: true,
                    hard: false,
                    line_space: Fixed26_6::ZERO,
                    kind: GrabKind::Icon(payloads.len()),
                });
                payloads.push(UnitPayload::Icon {
                    category,
                    icon_index: *index,
                    base_codepoint: *base_codepoint,
                    scale_x: *scale_x,
                    scale_y: *scale_y,
                });
            }
            TextNode::Empty => {}
        }
    }

    let (sequences, placements) = build_sequences(&units, request.primary_axis_limit);

    let mut work_glyphs = Vec::new();
    let mut work_icons = Vec::new();

    for (unit, placement) in units.iter().zip(placements.iter()) {
        let payload_index = match unit.kind {
            GrabKind::Glyph(i) | GrabKind::Icon(i) => i,
        };
        match &payloads[payload_index] {
            UnitPayload::Glyphs { category, infos } => {
                let mut cursor = placement.length_before_grab;
                for info in infos {
                    let advance = axis_advance(request.orientation, info);
                    let (origin_x, origin_y) = glyph_origin(
                        request.orientation,
                        request.reading_direction,
                        cursor,
                        advance,
                        info.x_offset,
                        info.y_offset,
                        request.primary_axis_limit,
                    );
                    cursor += advance;
                    let record = rasterize_and_cache(backend, caches, atlas, *category, info.glyph);
                    let glyph = apply_render_data(
                        origin_x,
                        origin_y,
                        &record,
                        request.font_size,
                        backend.atlas_standard_font_size(),
                        placement.sequence_index,
                    );
                    work_glyphs.push(glyph);
                }
            }
            UnitPayload::Icon { category, icon_index, base_codepoint, scale_x, scale_y } => {
                let Some(glyph_id) = backend.glyph_id_for_codepoint(*category, *base_codepoint) else {
                    continue;
                };
                let extents = backend.glyph_extents(*category, glyph_id, request.font_size);
                let (origin_x, origin_y) = glyph_origin(
                    request.orientation,
                    request.reading_direction,
                    placement.length_before_grab,
                    unit.advance,
                    Fixed26_6::ZERO,
                    Fixed26_6::ZERO,
                    request.primary_axis_limit,
                );
                let icon = icon_min_max(
                    origin_x,
                    origin_y,
                    Fixed26_6::from_num(extents.width),
                    Fixed26_6::from_num(extents.height),
                    *scale_x,
                    *scale_y,
                    placement.sequence_index,
                    *icon_index,
                );
                work_icons.push(icon);
            }
        }
    }

    crate::postprocess::post_process(
        &sequences,
        work_glyphs,
        work_icons,
        request.orientation,
        request.reading_direction,
        request.alignment,
        request.primary_axis_limit,
    )
}

fn axis_advance(orientation: Orientation, info: &HbGlyphInfo) -> Fixed26_6 {
    if orientation == Orientation::Horizontal {
        info.x_advance
    } else {
        info.y_advance
    }
}

fn icon_advance<B: FontBackend>(
    backend: &B,
    category: CategoryId,
    base_codepoint: u32,
    scale_x: f32,
    orientation: Orientation,
    font_size: f32,
) -> Fixed26_6 {
    let Some(glyph) = backend.glyph_id_for_codepoint(category, base_codepoint) else {
        return Fixed26_6::ZERO;
    };
    let extents = backend.glyph_extents(category, glyph, font_size);
    let dimension = if orientation == Orientation::Horizontal { extents.width } else { extents.height };
    Fixed26_6::from_num(dimension * scale_x)
}

fn rasterize_and_cache<B: FontBackend>(
    backend: &mut B,
    caches: &mut HashMap<CategoryId, GlyphCache>,
    atlas: &mut AtlasPacker,
    category: CategoryId,
    glyph: crate::font::GlyphId,
) -> CachedGlyphRecord {
    if let Some(record) = caches.get(&category).and_then(|c| c.get(glyph)) {
        return record;
    }
    let bitmap = backend.rasterize_sdf(category, glyph);
    let record = match bitmap {
        None => CachedGlyphRecord { empty: true, ..Default::default() },
        Some(bitmap) => {
            let placement = atlas.place(bitmap.width, bitmap.height);
            let (uv_min, uv_max) = atlas.uv_rect(placement.placement, bitmap.width, bitmap.height);
            CachedGlyphRecord {
                bearing_x_26_6: Fixed26_6::from_num(bitmap.bitmap_left),
                bearing_y_26_6: Fixed26_6::from_num(bitmap.bitmap_top),
                width_26_6: Fixed26_6::from_num(bitmap.width),
                height_26_6: Fixed26_6::from_num(bitmap.height),
                uv_min,
                uv_max,
                layer: placement.placement.layer,
                empty: false,
            }
        }
    };
    caches.entry(category).or_insert_with(GlyphCache::new).get_or_insert_with(glyph, || record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{FontMetrics, GlyphId};
    use crate::linebreak::LineBreakPos;
    use crate::node::build_nodes;
    use crate::node::TextItem;
    use crate::request::{Alignment, RenderFormat};

    struct FakeBackend;
    impl FontBackend for FakeBackend {
        fn category_for(&self, _script: Script, _style: u32) -> Option<CategoryId> {
            Some(CategoryId(0))
        }
        fn script_is_natively_rtl(&self, _script: Script) -> bool {
            false
        }
        fn metrics(&self, _category: CategoryId, _font_size: f32) -> FontMetrics {
            FontMetrics {
                ascender_26_6: Fixed26_6::from_bits(64 * 18),
                descender_26_6: Fixed26_6::from_bits(-64 * 4),
                line_gap_26_6: Fixed26_6::ZERO,
            }
        }
        fn shape(&self, _category: CategoryId, text: &str, _font_size: f32) -> Vec<HbGlyphInfo> {
            text.char_indices()
                .map(|(i, _)| HbGlyphInfo {
                    glyph: GlyphId(i as u32),
                    cluster: i as u32,
                    x_advance: Fixed26_6::from_bits(64 * 8),
                    y_advance: Fixed26_6::ZERO,
                    x_offset: Fixed26_6::ZERO,
                    y_offset: Fixed26_6::ZERO,
                })
                .collect()
        }
        fn glyph_id_for_codepoint(&self, _category: CategoryId, codepoint: u32) -> Option<GlyphId> {
            Some(GlyphId(codepoint))
        }
        fn glyph_extents(&self, _category: CategoryId, _glyph: GlyphId, _font_size: f32) -> crate::font::GlyphExtents {
            crate::font::GlyphExtents { bearing_x: 0.0, bearing_y: 0.0, width: 8.0, height: 10.0 }
        }
        fn rasterize_sdf(&mut self, _category: CategoryId, _glyph: GlyphId) -> Option<crate::font::SdfBitmap> {
            Some(crate::font::SdfBitmap { width: 8, height: 10, bitmap_left: 0, bitmap_top: 8, pixels: vec![0; 80] })
        }
        fn atlas_standard_font_size(&self) -> f32 {
            16.0
        }
    }

    struct NoBreaker;
    impl LineBreaker for NoBreaker {
        fn breaks(&self, _text: &str) -> Vec<LineBreakPos> {
            Vec::new()
        }
    }

    #[test]
    fn shapes_plain_text_into_one_sequence() {
        let nodes = build_nodes(&[TextItem::Utf8(b"hi".to_vec())]);
        let mut backend = FakeBackend;
        let mut caches = HashMap::new();
        let mut atlas = AtlasPacker::new(256, 256, 1, 1);
        let request = ShapingRequest {
            font_size: 16.0,
            orientation: Orientation::Horizontal,
            reading_direction: ReadingDirection::Ltr,
            alignment: Alignment::Left,
            primary_axis_limit: Fixed26_6::from_bits(64 * 1000),
            render_format: RenderFormat::Sdf,
        };
        let data = shape(&nodes, &mut backend, &mut caches, &mut atlas, &NoBreaker, &request);
        assert_eq!(data.glyphs.len(), 2);
    }
}
