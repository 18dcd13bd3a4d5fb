//! SDF glyph atlas packing (spec.md §4.7.5 steps 1-6, §6.4: a 2D-array
//! image of format `R8_UNORM`).

pub const ATLAS_GROW_STEP_LAYERS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasPlacement {
    pub x: u32,
    pub y: u32,
    pub layer: u32,
}

/// Whether the packer had to allocate a new, larger atlas image this
/// call (spec.md §4.7.5 step 3: "copy all existing layers from the old
/// atlas into the new one").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementResult {
    pub placement: AtlasPlacement,
    pub grew: bool,
}

/// Row/layer bookkeeping for the shelf-packing scheme; owns no pixel
/// data itself, just the cursor state, so it can be unit-tested without
/// a real backend image.
#[derive(Debug, Clone)]
pub struct AtlasPacker {
    pub width: u32,
    pub height: u32,
    pub layer_count: u32,
    pub border: u32,
    row_x: u32,
    row_y: u32,
    row_max_height: u32,
    current_layer: u32,
}

impl AtlasPacker {
    pub fn new(width: u32, height: u32, initial_layer_count: u32, border: u32) -> Self {
        Self {
            width,
            height,
            layer_count: initial_layer_count,
            border,
            row_x: 0,
            row_y: 0,
            row_max_height: 0,
            current_layer: 0,
        }
    }

    /// Reserves a `width × height` rectangle; follows spec.md §4.7.5
    /// steps 1-3 exactly: wrap row, wrap layer, grow image.
    pub fn place(&mut self, width: u32, height: u32) -> PlacementResult {
        if self.row_x + width >= self.width {
            self.row_x = 0;
            self.row_y += self.row_max_height + self.border;
            self.row_max_height = 0;
        }
        if self.row_y + height >= self.height {
            self.row_x = 0;
            self.row_y = 0;
            self.row_max_height = 0;
            self.current_layer += 1;
        }
        let mut grew = false;
        if self.current_layer >= self.layer_count {
            self.layer_count += ATLAS_GROW_STEP_LAYERS;
            grew = true;
        }

        let placement = AtlasPlacement { x: self.row_x, y: self.row_y, layer: self.current_layer };
        self.row_x += width + self.border;
        self.row_max_height = self.row_max_height.max(height);
        PlacementResult { placement, grew }
    }

    pub fn uv_rect(&self, placement: AtlasPlacement, width: u32, height: u32) -> (kan_math::Vec2, kan_math::Vec2) {
        let uv_min = kan_math::Vec2::new(
            placement.x as f32 / self.width as f32,
            placement.y as f32 / self.height as f32,
        );
        let uv_max = kan_math::Vec2::new(
            (placement.x + width) as f32 / self.width as f32,
            (placement.y + height) as f32 / self.height as f32,
        );
        (uv_min, uv_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_left_to_right_within_a_row() {
        let mut packer = AtlasPacker::new(256, 256, 1, 1);
        let a = packer.place(10, 10);
        let b = packer.place(10, 10);
        assert_eq!(a.placement, AtlasPlacement { x: 0, y: 0, layer: 0 });
        assert_eq!(b.placement, AtlasPlacement { x: 11, y: 0, layer: 0 });
        assert!(!a.grew && !b.grew);
    }

    #[test]
    fn wraps_to_new_row_when_full() {
        let mut packer = AtlasPacker::new(20, 256, 1, 0);
        let _first = packer.place(15, 5);
        let second = packer.place(15, 5);
        assert_eq!(second.placement.x, 0);
        assert_eq!(second.placement.y, 5);
    }

    #[test]
    fn advances_layer_and_grows_when_exhausted() {
        let mut packer = AtlasPacker::new(10, 10, 1, 0);
        let first = packer.place(10, 10);
        assert_eq!(first.placement.layer, 0);
        assert!(!first.grew);
        let second = packer.place(10, 10);
        assert_eq!(second.placement.layer, 1);
        assert!(second.grew);
        assert_eq!(packer.layer_count, 1 + ATLAS_GROW_STEP_LAYERS);
    }
}
