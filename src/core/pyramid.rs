//! Pyramid geometry: cube face size, tile size, and level count.

/// Geometry of a tile pyramid over six cube faces.
///
/// Levels run from 1 (coarsest) to `max_level` (native resolution). The face
/// edge at each level is the previous level's edge halved with truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidPlan {
    pub cube_size: u32,
    pub tile_size: u32,
    pub max_level: u32,
}

/// Compute pyramid geometry from the source width and horizontal angle of
/// view. `cube_req` overrides the derived cube size when nonzero; the derived
/// size reconciles equirectangular pixel density with a cube-face projection
/// and is truncated to a multiple of 8. The tile size is clamped to the cube
/// size.
pub fn plan(source_width: u32, haov: f64, tile_req: u32, cube_req: u32) -> PyramidPlan {
    let cube_size = if cube_req != 0 {
        cube_req
    } else {
        8 * ((360.0 / haov) * source_width as f64 / std::f64::consts::PI / 8.0) as u32
    };
    let tile_size = tile_req.min(cube_size);

    // Smallest level count whose coarsest face fits in one doubling chain.
    let mut max_level: u32 = 1;
    let mut reach = tile_size as u64;
    while reach < cube_size as u64 {
        reach *= 2;
        max_level += 1;
    }
    // When the geometry lands exactly on a power of two one level down, the
    // extra top level would be pixel-identical to the level below it.
    if max_level >= 2 && cube_size / (1 << (max_level - 2)) == tile_size {
        max_level -= 1;
    }

    PyramidPlan {
        cube_size,
        tile_size,
        max_level,
    }
}

impl PyramidPlan {
    /// Face edge length at `level`, by successive truncating halving from the
    /// native cube size.
    pub fn level_size(&self, level: u32) -> u32 {
        let mut size = self.cube_size;
        for _ in level..self.max_level {
            size /= 2;
        }
        size
    }

    /// Number of tile rows (and columns) at `level`.
    pub fn tiles_at(&self, level: u32) -> u32 {
        self.level_size(level).div_ceil(self.tile_size)
    }
}
