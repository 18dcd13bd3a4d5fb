//! Font library lifecycle: owns the FreeType/HarfBuzz objects backing
//! each font category and implements [`FontBackend`] over them (spec.md
//! §4.7.9).

use std::collections::HashMap;
use std::sync::Arc;

use freetype::face::LoadFlag;
use freetype::Library as FtLibrary;
use harfbuzz_rs::{Face as HbFace, Font as HbFont, Owned, UnicodeBuffer};
use unicode_script::Script;

use kan_math::Fixed26_6;

use crate::font::{CategoryId, FontBackend, FontMetrics, GlyphExtents, GlyphId, HbGlyphInfo, SdfBitmap};

/// One loaded font file, opened both through FreeType (rasterization,
/// metrics) and HarfBuzz (shaping) over the same byte buffer.
struct Category {
    ft_face: freetype::Face,
    hb_face: Owned<HbFace<'static>>,
    natively_rtl: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum FontLibraryError {
    #[error("freetype init failed: {0}")]
    FreeType(#[from] freetype::Error),
    #[error("no category registered for script {0:?} / style {1}")]
    NoCategory(Script, u32),
}

/// Owns the FreeType library and one [`Category`] per `(script-group,
/// style)` registration. Categories are loaded once at startup and live
/// for the program's lifetime; there is no unload path because spec.md
/// does not describe one (§4.7.9: "destruction releases all HarfBuzz /
/// FreeType objects and the atlas image" happens only on full teardown,
/// modeled here by `Drop`).
pub struct FontLibrary {
    ft: FtLibrary,
    categories: Vec<Category>,
    by_script: HashMap<(u32, u32), CategoryId>,
    standard_font_size: f32,
}

impl FontLibrary {
    pub fn new(standard_font_size: f32) -> Result<Self, FontLibraryError> {
        let ft = FtLibrary::init()?;
        Ok(Self { ft, categories: Vec::new(), by_script: HashMap::new(), standard_font_size })
    }

    /// Loads a font file's bytes for `script_group` (a coarse key the
    /// caller defines, e.g. the `unicode-script::Script` discriminant
    /// packed as `u32`) and `style`, applying `variable_axes` as
    /// FreeType MM/variable-font design coordinates if the face
    /// supports them.
    pub fn register_category(
        &mut self,
        script_group: u32,
        style: u32,
        bytes: Arc<Vec<u8>>,
        natively_rtl: bool,
        variable_axes: &[f64],
    ) -> Result<CategoryId, FontLibraryError> {
        let ft_face = self.ft.new_memory_face(bytes.clone(), 0)?;
        if !variable_axes.is_empty() {
            if let Ok(mut mm) = ft_face.get_mm_var() {
                let coords: Vec<freetype::ffi::FT_Fixed> =
                    variable_axes.iter().map(|v| (*v * 65536.0) as freetype::ffi::FT_Fixed).collect();
                let _ = mm.set_var_design_coordinates(&ft_face, &coords);
            }
        }

        let hb_face: Owned<HbFace<'static>> = HbFace::new(bytes.as_slice().to_vec(), 0);

        let id = CategoryId(self.categories.len() as u32);
        self.categories.push(Category { ft_face, hb_face, natively_rtl });
        self.by_script.insert((script_group, style), id);
        Ok(id)
    }

    fn category(&self, id: CategoryId) -> &Category {
        &self.categories[id.0 as usize]
    }

    fn category_mut(&mut self, id: CategoryId) -> &mut Category {
        &mut self.categories[id.0 as usize]
    }

    fn set_pixel_size(&self, category: &Category, font_size: f32) {
        let _ = category.ft_face.set_char_size((font_size * 64.0) as isize, 0, 0, 0);
    }
}

impl FontBackend for FontLibrary {
    fn category_for(&self, script: Script, style: u32) -> Option<CategoryId> {
        let group = script as u32;
        self.by_script
            .get(&(group, style))
            .copied()
            .or_else(|| self.by_script.get(&(Script::Common as u32, style)).copied())
            .or_else(|| self.by_script.get(&(group, 0)).copied())
    }

    fn script_is_natively_rtl(&self, script: Script) -> bool {
        matches!(
            script,
            Script::Arabic | Script::Hebrew | Script::Syriac | Script::Thaana | Script::Nko | Script::Adlam
        ) || self
            .by_script
            .get(&(script as u32, 0))
            .map(|id| self.category(*id).natively_rtl)
            .unwrap_or(false)
    }

    fn metrics(&self, category: CategoryId, font_size: f32) -> FontMetrics {
        let cat = self.category(category);
        self.set_pixel_size(cat, font_size);
        let metrics = cat.ft_face.size_metrics().unwrap_or_default();
        FontMetrics {
            ascender_26_6: Fixed26_6::from_bits(metrics.ascender as i32),
            descender_26_6: Fixed26_6::from_bits(metrics.descender as i32),
            line_gap_26_6: Fixed26_6::from_bits((metrics.height - (metrics.ascender - metrics.descender)) as i32),
        }
    }

    fn shape(&self, category: CategoryId, text: &str, font_size: f32) -> Vec<HbGlyphInfo> {
        let cat = self.category(category);
        self.set_pixel_size(cat, font_size);
        let scale = (font_size * 64.0) as i32;
        let mut font = HbFont::new(cat.hb_face.clone());
        font.set_scale(scale, scale);

        let buffer = UnicodeBuffer::new().add_str(text).guess_segment_properties();
        let output = harfbuzz_rs::shape(&font, buffer, &[]);
        let infos = output.get_glyph_infos();
        let positions = output.get_glyph_positions();

        infos
            .iter()
            .zip(positions.iter())
            .map(|(info, pos)| HbGlyphInfo {
                glyph: GlyphId(info.codepoint),
                cluster: info.cluster,
                x_advance: Fixed26_6::from_bits(pos.x_advance),
                y_advance: Fixed26_6::from_bits(pos.y_advance),
                x_offset: Fixed26_6::from_bits(pos.x_offset),
                y_offset: Fixed26_6::from_bits(pos.y_offset),
            })
            .collect()
    }

    fn glyph_id_for_codepoint(&self, category: CategoryId, codepoint: u32) -> Option<GlyphId> {
        let cat = self.category(category);
        let Some(ch) = char::from_u32(codepoint) else { return None };
        let index = cat.ft_face.get_char_index(ch as usize)?;
        Some(GlyphId(index))
    }

    fn glyph_extents(&self, category: CategoryId, glyph: GlyphId, font_size: f32) -> GlyphExtents {
        let cat = self.category(category);
        self.set_pixel_size(cat, font_size);
        if cat.ft_face.load_glyph(glyph.0, LoadFlag::DEFAULT).is_err() {
            return GlyphExtents::default();
        }
        let slot = cat.ft_face.glyph();
        let metrics = slot.metrics();
        GlyphExtents {
            bearing_x: (metrics.horiBearingX >> 6) as f32,
            bearing_y: (metrics.horiBearingY >> 6) as f32,
            width: (metrics.width >> 6) as f32,
            height: (metrics.height >> 6) as f32,
        }
    }

    fn rasterize_sdf(&mut self, category: CategoryId, glyph: GlyphId) -> Option<SdfBitmap> {
        let cat = self.category_mut(category);
        cat.ft_face.load_glyph(glyph.0, LoadFlag::RENDER | LoadFlag::TARGET_NORMAL).ok()?;
        let slot = cat.ft_face.glyph();
        let bitmap = slot.bitmap();
        if bitmap.width() == 0 || bitmap.rows() == 0 {
            return None;
        }
        Some(SdfBitmap {
            width: bitmap.width() as u32,
            height: bitmap.rows() as u32,
            bitmap_left: slot.bitmap_left(),
            bitmap_top: slot.bitmap_top(),
            pixels: bitmap.buffer().to_vec(),
        })
    }

    fn atlas_standard_font_size(&self) -> f32 {
        self.standard_font_size
    }
}
