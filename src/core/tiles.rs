//! Per-face tiling: recursive downsampling, slicing into fixed-size tiles,
//! empty-tile detection for partial panoramas, and tile image output.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageBuffer, Pixel, Rgb, RgbImage, Rgba, RgbaImage};
use rayon::prelude::*;
use tracing::debug;

use super::missing::MissingTile;
use super::pyramid::PyramidPlan;
use super::{resize_rgba, BackgroundColor, Face, ResampleFilter, TileFormat};

/// Settings shared by every face while tiling.
pub struct TileOptions {
    pub plan: PyramidPlan,
    pub format: TileFormat,
    pub quality: u8,
    pub background: BackgroundColor,
    /// The panorama covers less than a full sphere; uniform background tiles
    /// are omitted and recorded instead of written.
    pub partial: bool,
    /// A spherical preview is being generated, so tiles that composite to
    /// pure background are still written rather than recorded as missing.
    pub keep_background_tiles: bool,
    pub filter: ResampleFilter,
}

/// Tile all six faces into `output`. Faces are processed in parallel, each
/// worker owning its face image exclusively; per-face record lists are merged
/// in face order so the result is identical to a sequential run. An absent
/// face image is a valid partial-panorama outcome and is recorded as one
/// whole-face omission at the coarsest level.
pub fn generate_tiles(
    face_paths: &[PathBuf; 6],
    output: &Path,
    opts: &TileOptions,
) -> Result<Vec<MissingTile>> {
    let per_face: Vec<Result<Vec<MissingTile>>> = Face::ALL
        .par_iter()
        .map(|&face| tile_face(face, &face_paths[face.index()], output, opts))
        .collect();

    let mut missing = Vec::new();
    for face_missing in per_face {
        missing.extend(face_missing?);
    }
    Ok(missing)
}

fn tile_face(
    face: Face,
    face_path: &Path,
    output: &Path,
    opts: &TileOptions,
) -> Result<Vec<MissingTile>> {
    if !face_path.exists() {
        debug!("face {} absent, recording whole-face omission", face.letter());
        return Ok(vec![MissingTile { face, level: 1, col: 0, row: 0 }]);
    }
    let source = image::open(face_path)
        .with_context(|| format!("failed to open face image {}", face_path.display()))?;
    let has_alpha = source.color().has_alpha();
    let mut current = source.into_rgba8();

    let plan = &opts.plan;
    let background = opts.background.to_rgb8();
    let bg_opaque = Rgba([background[0], background[1], background[2], 255]);
    let mut missing = Vec::new();
    let mut size = plan.cube_size;

    for level in (1..=plan.max_level).rev() {
        let level_dir = output.join(level.to_string());
        fs::create_dir_all(&level_dir)
            .with_context(|| format!("failed to create {}", level_dir.display()))?;
        if level < plan.max_level {
            current = resize_rgba(&current, size, size, opts.filter);
        }
        let tiles = size.div_ceil(plan.tile_size);
        debug!(
            "face {} level {}: {}x{} tiles from a {}px face",
            face.letter(),
            level,
            tiles,
            tiles,
            size
        );

        for row in 0..tiles {
            for col in 0..tiles {
                let x0 = col * plan.tile_size;
                let y0 = row * plan.tile_size;
                let w = plan.tile_size.min(size - x0);
                let h = plan.tile_size.min(size - y0);
                let tile = image::imageops::crop_imm(&current, x0, y0, w, h).to_image();

                if opts.partial && !has_alpha && uniform_color(&tile) == Some(bg_opaque) {
                    missing.push(MissingTile { face, level, col, row });
                    continue;
                }

                let tile = if has_alpha {
                    composite_background(&tile, background)
                } else {
                    strip_alpha(&tile)
                };
                if !opts.keep_background_tiles
                    && uniform_color(&tile) == Some(Rgb(background))
                {
                    missing.push(MissingTile { face, level, col, row });
                } else {
                    let name = format!(
                        "{}{}_{}.{}",
                        face.letter(),
                        row,
                        col,
                        opts.format.extension()
                    );
                    write_image(&tile, &level_dir.join(name), opts.format, opts.quality)?;
                }
            }
        }
        size /= 2;
    }
    Ok(missing)
}

/// The single color of a uniform image, if it is uniform.
fn uniform_color<P>(img: &ImageBuffer<P, Vec<P::Subpixel>>) -> Option<P>
where
    P: Pixel + PartialEq,
{
    let mut pixels = img.pixels();
    let first = *pixels.next()?;
    pixels.all(|p| *p == first).then_some(first)
}

/// Composite onto the background color: visible pixels keep their color,
/// fully transparent pixels become exactly the background.
pub fn composite_background(img: &RgbaImage, background: [u8; 3]) -> RgbImage {
    let mut out = RgbImage::new(img.width(), img.height());
    for (src, dst) in img.pixels().zip(out.pixels_mut()) {
        let a = src.0[3] as u32;
        for c in 0..3 {
            dst.0[c] =
                ((src.0[c] as u32 * a + background[c] as u32 * (255 - a) + 127) / 255) as u8;
        }
    }
    out
}

fn strip_alpha(img: &RgbaImage) -> RgbImage {
    let mut out = RgbImage::new(img.width(), img.height());
    for (src, dst) in img.pixels().zip(out.pixels_mut()) {
        dst.0.copy_from_slice(&src.0[..3]);
    }
    out
}

/// Flatten any decoded image to RGB, compositing alpha onto the background.
pub fn flatten(image: DynamicImage, background: [u8; 3]) -> RgbImage {
    if image.color().has_alpha() {
        composite_background(&image.into_rgba8(), background)
    } else {
        image.into_rgb8()
    }
}

/// Write an RGB image in the configured output format and quality.
pub fn write_image(img: &RgbImage, path: &Path, format: TileFormat, quality: u8) -> Result<()> {
    match format {
        TileFormat::Jpeg => {
            let mut buf = Vec::new();
            JpegEncoder::new_with_quality(&mut buf, quality)
                .encode_image(img)
                .with_context(|| format!("failed to encode {}", path.display()))?;
            fs::write(path, &buf)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        TileFormat::Png => {
            img.save(path)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pyramid;
    use tempfile::TempDir;

    fn options(plan: PyramidPlan, partial: bool) -> TileOptions {
        TileOptions {
            plan,
            format: TileFormat::Jpeg,
            quality: 75,
            background: BackgroundColor::default(),
            partial,
            keep_background_tiles: false,
            filter: ResampleFilter::Lanczos3,
        }
    }

    #[test]
    fn test_uniform_color_detection() {
        let img = RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255]));
        assert_eq!(uniform_color(&img), Some(Rgba([1, 2, 3, 255])));

        let mut img = img;
        img.put_pixel(7, 7, Rgba([0, 0, 0, 255]));
        assert_eq!(uniform_color(&img), None);
    }

    #[test]
    fn test_composite_background() {
        let mut img = RgbaImage::new(3, 1);
        img.put_pixel(0, 0, Rgba([200, 100, 50, 255]));
        img.put_pixel(1, 0, Rgba([200, 100, 50, 0]));
        img.put_pixel(2, 0, Rgba([200, 0, 0, 128]));
        let out = composite_background(&img, [10, 20, 30]);
        assert_eq!(out.get_pixel(0, 0), &Rgb([200, 100, 50]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([10, 20, 30]));
        // Half-transparent red blends toward the background.
        let mid = out.get_pixel(2, 0);
        assert!(mid.0[0] > 100 && mid.0[0] < 200);
    }

    #[test]
    fn test_absent_face_records_whole_face_omission() {
        let dir = TempDir::new().unwrap();
        let plan = pyramid::plan(4096, 360.0, 64, 128);
        let missing = tile_face(
            Face::Back,
            &dir.path().join("no_such_face.tif"),
            dir.path(),
            &options(plan, true),
        )
        .unwrap();
        assert_eq!(
            missing,
            vec![MissingTile { face: Face::Back, level: 1, col: 0, row: 0 }]
        );
    }

    #[test]
    fn test_tile_face_writes_clipped_edge_tiles() {
        let dir = TempDir::new().unwrap();
        let face_path = dir.path().join("face0000.png");
        let face = RgbImage::from_fn(100, 100, |x, y| Rgb([x as u8, y as u8, 17]));
        face.save(&face_path).unwrap();

        let plan = pyramid::plan(4096, 360.0, 64, 100);
        assert_eq!(plan.max_level, 2);
        let missing =
            tile_face(Face::Front, &face_path, dir.path(), &options(plan, false)).unwrap();
        assert!(missing.is_empty());

        let full = image::open(dir.path().join("2").join("f0_0.jpg")).unwrap();
        assert_eq!(full.width(), 64);
        assert_eq!(full.height(), 64);
        // Last column and row are clipped, never padded.
        let right = image::open(dir.path().join("2").join("f0_1.jpg")).unwrap();
        assert_eq!((right.width(), right.height()), (36, 64));
        let corner = image::open(dir.path().join("2").join("f1_1.jpg")).unwrap();
        assert_eq!((corner.width(), corner.height()), (36, 36));
        // Coarsest level is the halved face in a single tile.
        let coarse = image::open(dir.path().join("1").join("f0_0.jpg")).unwrap();
        assert_eq!((coarse.width(), coarse.height()), (50, 50));
    }

    #[test]
    fn test_partial_background_face_is_fully_omitted() {
        let dir = TempDir::new().unwrap();
        let face_path = dir.path().join("face0003.png");
        RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]))
            .save(&face_path)
            .unwrap();

        let plan = pyramid::plan(4096, 360.0, 32, 64);
        assert_eq!(plan.max_level, 2);
        let missing =
            tile_face(Face::Down, &face_path, dir.path(), &options(plan, true)).unwrap();
        // Four tiles at level 2 plus one at level 1.
        assert_eq!(missing.len(), 5);
        assert!(missing.iter().all(|m| m.face == Face::Down));
        assert!(!dir.path().join("2").join("d0_0.jpg").exists());
    }

    #[test]
    fn test_fully_transparent_face_is_fully_omitted() {
        let dir = TempDir::new().unwrap();
        let face_path = dir.path().join("face0000.png");
        RgbaImage::from_pixel(64, 64, Rgba([90, 90, 90, 0]))
            .save(&face_path)
            .unwrap();

        let plan = pyramid::plan(4096, 360.0, 32, 64);
        let missing =
            tile_face(Face::Front, &face_path, dir.path(), &options(plan, true)).unwrap();
        assert_eq!(missing.len(), 5);
    }

    #[test]
    fn test_preview_keeps_background_tiles() {
        let dir = TempDir::new().unwrap();
        let face_path = dir.path().join("face0000.png");
        RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]))
            .save(&face_path)
            .unwrap();

        let plan = pyramid::plan(4096, 360.0, 32, 64);
        let mut opts = options(plan, false);
        opts.keep_background_tiles = true;
        let missing = tile_face(Face::Front, &face_path, dir.path(), &opts).unwrap();
        assert!(missing.is_empty());
        assert!(dir.path().join("2").join("f1_1.jpg").exists());
        assert!(dir.path().join("1").join("f0_0.jpg").exists());
    }
}
