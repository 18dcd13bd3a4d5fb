//! Text shaping and SDF glyph atlas engine (spec.md §4.7, component C7):
//! turns an append-only stream of UTF-8/icon/style items into shaped,
//! pixel-space glyph and icon placements ready for rendering.

pub mod append;
pub mod atlas;
pub mod cache;
pub mod font;
pub mod library;
pub mod linebreak;
pub mod node;
pub mod request;
pub mod segment;
pub mod shaper;
pub mod postprocess;

pub use atlas::{AtlasPacker, AtlasPlacement};
pub use cache::{CachedGlyphRecord, GlyphCache};
pub use font::{CategoryId, FontBackend, FontMetrics, GlyphExtents, GlyphId, HbGlyphInfo, SdfBitmap};
pub use library::FontLibrary;
pub use linebreak::{IcuLineBreaker, LineBreakPos, LineBreaker};
pub use node::{build_nodes, StyleTag, TextItem, TextNode};
pub use request::{Alignment, Orientation, ReadingDirection, RenderFormat, ShapedData, ShapedGlyph, ShapedIcon, ShapingRequest};
pub use shaper::shape;
