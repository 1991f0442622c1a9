//! Tile-partitioned accumulation buffer.
//!
//! The image is split into square tiles of `tile_size` pixels. Each tile
//! owns `tile_size²` RGBA cells (RGB sum plus sample weight in alpha),
//! row-major with stride `tile_size`, behind its own mutex. Edge tiles are
//! only partially covered; their out-of-range cells are never read.

use kiln_math::Vec4;
use parking_lot::{Mutex, MutexGuard};

/// Exclusive access to one tile's cells.
pub type TileGuard<'a> = MutexGuard<'a, Box<[Vec4]>>;

/// Pixel rectangle covered by a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileBounds {
    pub begin_x: usize,
    pub begin_y: usize,
    pub count_x: usize,
    pub count_y: usize,
}

impl TileBounds {
    pub fn pixel_count(&self) -> usize {
        self.count_x * self.count_y
    }
}

pub struct TiledFramebuffer {
    tile_size: usize,
    width: usize,
    height: usize,
    tile_count_x: usize,
    tile_count_y: usize,
    tiles: Vec<Mutex<Box<[Vec4]>>>,
}

impl TiledFramebuffer {
    /// Create a zeroed framebuffer. `tile_size` must be non-zero.
    pub fn new(tile_size: usize, width: usize, height: usize) -> Self {
        assert!(tile_size > 0, "tile size must be non-zero");

        let tile_count_x = width.div_ceil(tile_size);
        let tile_count_y = height.div_ceil(tile_size);
        let cells = tile_size * tile_size;

        let tiles = (0..tile_count_x * tile_count_y)
            .map(|_| Mutex::new(vec![Vec4::ZERO; cells].into_boxed_slice()))
            .collect();

        Self {
            tile_size,
            width,
            height,
            tile_count_x,
            tile_count_y,
            tiles,
        }
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    /// Cells per tile, including the unused part of edge tiles.
    pub fn tile_pixel_count(&self) -> usize {
        self.tile_size * self.tile_size
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn tile_count_x(&self) -> usize {
        self.tile_count_x
    }

    pub fn tile_count_y(&self) -> usize {
        self.tile_count_y
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Pixel rectangle of `tile`, clipped to the image.
    pub fn tile_bounds(&self, tile: usize) -> TileBounds {
        debug_assert!(tile < self.tile_count(), "tile {} out of range", tile);

        let begin_x = (tile % self.tile_count_x) * self.tile_size;
        let begin_y = (tile / self.tile_count_x) * self.tile_size;

        TileBounds {
            begin_x,
            begin_y,
            count_x: self.tile_size.min(self.width - begin_x),
            count_y: self.tile_size.min(self.height - begin_y),
        }
    }

    /// Lock a tile for reading or accumulation.
    pub fn lock_tile(&self, tile: usize) -> TileGuard<'_> {
        debug_assert!(tile < self.tile_count(), "tile {} out of range", tile);
        self.tiles[tile].lock()
    }

    /// Zero every cell. Locks each tile in turn.
    pub fn clear(&self) {
        for tile in &self.tiles {
            tile.lock().fill(Vec4::ZERO);
        }
    }

    /// Copy the valid region of every tile into a row-major `width * height`
    /// image. Locks each tile while reading it.
    pub fn copy_to(&self, image: &mut [Vec4]) {
        assert_eq!(
            image.len(),
            self.pixel_count(),
            "image size does not match framebuffer"
        );

        for tile in 0..self.tile_count() {
            let bounds = self.tile_bounds(tile);
            let cells = self.lock_tile(tile);

            for y in 0..bounds.count_y {
                let src = &cells[y * self.tile_size..y * self.tile_size + bounds.count_x];
                let dst_start = (bounds.begin_y + y) * self.width + bounds.begin_x;
                image[dst_start..dst_start + bounds.count_x].copy_from_slice(src);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_counts_round_up() {
        let fb = TiledFramebuffer::new(16, 100, 40);
        assert_eq!(fb.tile_count_x(), 7);
        assert_eq!(fb.tile_count_y(), 3);
        assert_eq!(fb.tile_count(), 21);
        assert_eq!(fb.tile_pixel_count(), 256);
    }

    #[test]
    fn test_edge_tiles_are_clipped() {
        let fb = TiledFramebuffer::new(16, 100, 40);

        let last = fb.tile_bounds(fb.tile_count() - 1);
        assert_eq!(
            last,
            TileBounds {
                begin_x: 96,
                begin_y: 32,
                count_x: 4,
                count_y: 8,
            }
        );

        let first = fb.tile_bounds(0);
        assert_eq!(first.count_x, 16);
        assert_eq!(first.count_y, 16);
    }

    #[test]
    fn test_tiles_cover_every_pixel_once() {
        for (tile_size, width, height) in [(16, 64, 64), (16, 100, 40), (7, 13, 29), (32, 8, 8)] {
            let fb = TiledFramebuffer::new(tile_size, width, height);
            let mut covered = vec![0u32; width * height];

            for tile in 0..fb.tile_count() {
                let b = fb.tile_bounds(tile);
                assert!(b.count_x >= 1 && b.count_x <= tile_size);
                assert!(b.count_y >= 1 && b.count_y <= tile_size);
                for y in b.begin_y..b.begin_y + b.count_y {
                    for x in b.begin_x..b.begin_x + b.count_x {
                        covered[y * width + x] += 1;
                    }
                }
            }

            assert!(covered.iter().all(|&c| c == 1));
        }
    }

    #[test]
    fn test_copy_places_tiles_and_skips_padding() {
        let fb = TiledFramebuffer::new(4, 6, 5);

        // Tag each cell with (tile, slot); padding gets -1 so leaks show up
        for tile in 0..fb.tile_count() {
            let bounds = fb.tile_bounds(tile);
            let mut cells = fb.lock_tile(tile);
            for (slot, cell) in cells.iter_mut().enumerate() {
                let (x, y) = (slot % 4, slot / 4);
                *cell = if x < bounds.count_x && y < bounds.count_y {
                    Vec4::new((bounds.begin_x + x) as f32, (bounds.begin_y + y) as f32, 0.0, 1.0)
                } else {
                    Vec4::splat(-1.0)
                };
            }
        }

        let mut image = vec![Vec4::ZERO; fb.pixel_count()];
        fb.copy_to(&mut image);

        for y in 0..5 {
            for x in 0..6 {
                assert_eq!(image[y * 6 + x], Vec4::new(x as f32, y as f32, 0.0, 1.0));
            }
        }
    }

    #[test]
    fn test_clear_zeroes_all_cells() {
        let fb = TiledFramebuffer::new(8, 10, 10);
        for tile in 0..fb.tile_count() {
            fb.lock_tile(tile).fill(Vec4::ONE);
        }

        fb.clear();

        for tile in 0..fb.tile_count() {
            assert!(fb.lock_tile(tile).iter().all(|c| *c == Vec4::ZERO));
        }
    }

    #[test]
    fn test_zero_size_has_no_tiles() {
        let fb = TiledFramebuffer::new(16, 0, 0);
        assert_eq!(fb.tile_count(), 0);

        let mut image = Vec::new();
        fb.copy_to(&mut image);
        fb.clear();
    }
}
