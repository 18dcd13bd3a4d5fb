//! Per-category glyph cache: a read/write lock guarding an append-only
//! record store (spec.md §4.7.5 intro, §5 "Text glyph cache per
//! category").

use std::collections::HashMap;

use parking_lot::RwLock;

use kan_math::Fixed26_6;

use crate::font::GlyphId;

#[derive(Debug, Clone, Copy, Default)]
pub struct CachedGlyphRecord {
    pub bearing_x_26_6: Fixed26_6,
    pub bearing_y_26_6: Fixed26_6,
    pub width_26_6: Fixed26_6,
    pub height_26_6: Fixed26_6,
    pub uv_min: kan_math::Vec2,
    pub uv_max: kan_math::Vec2,
    pub layer: u32,
    /// `true` for a glyph with an empty rasterized bitmap (e.g. space):
    /// zero extents, no atlas slot (spec.md §4.7.5 "If bitmap is empty,
    /// record zero extents").
    pub empty: bool,
}

#[derive(Default)]
struct CacheInner {
    index: HashMap<u32, usize>,
    records: Vec<CachedGlyphRecord>,
}

/// Append-only store: insertion never invalidates a previously returned
/// index, matching the "stack-group allocator for cache records"
/// described in spec.md §4.7.9.
#[derive(Default)]
pub struct GlyphCache {
    inner: RwLock<CacheInner>,
}

impl GlyphCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-locked lookup (spec.md §4.7.5: "look up ... under a read
    /// lock").
    pub fn get(&self, glyph: GlyphId) -> Option<CachedGlyphRecord> {
        let inner = self.inner.read();
        inner.index.get(&glyph.0).map(|&i| inner.records[i])
    }

    /// On a cache miss, retake a write lock, re-check (another thread
    /// may have inserted meanwhile), then insert (spec.md §4.7.5).
    pub fn get_or_insert_with(
        &self,
        glyph: GlyphId,
        make: impl FnOnce() -> CachedGlyphRecord,
    ) -> CachedGlyphRecord {
        if let Some(record) = self.get(glyph) {
            return record;
        }
        let mut inner = self.inner.write();
        if let Some(&i) = inner.index.get(&glyph.0) {
            return inner.records[i];
        }
        let record = make();
        let index = inner.records.len();
        inner.records.push(record);
        inner.index.insert(glyph.0, index);
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_hit_returns_same_record() {
        let cache = GlyphCache::new();
        let glyph = GlyphId(7);
        let mut calls = 0;
        let first = cache.get_or_insert_with(glyph, || {
            calls += 1;
            CachedGlyphRecord { layer: 2, ..Default::default() }
        });
        let second = cache.get_or_insert_with(glyph, || {
            calls += 1;
            CachedGlyphRecord { layer: 99, ..Default::default() }
        });
        assert_eq!(calls, 1);
        assert_eq!(first.layer, second.layer);
        assert_eq!(first.layer, 2);
    }
}
