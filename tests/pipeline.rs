//! End-to-end pyramid generation over synthetic cube faces, bypassing the
//! external remapper: face images are written where the remap step would
//! leave them, then tiled, compacted, and assembled into a manifest.

use std::path::PathBuf;

use image::{Rgb, RgbImage};
use tempfile::TempDir;

use panotiler::core::pyramid;
use panotiler::core::tiles::{generate_tiles, TileOptions};
use panotiler::core::{missing, Face};
use panotiler::manifest::{self, ManifestParams};
use panotiler::{BackgroundColor, ResampleFilter, TileFormat};

fn face_paths(dir: &TempDir) -> [PathBuf; 6] {
    Face::ALL.map(|f| dir.path().join(format!("face{:04}.tif", f.index())))
}

fn options(plan: pyramid::PyramidPlan, partial: bool) -> TileOptions {
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
fn full_panorama_of_uniform_gray_has_no_missing_tiles() {
    let dir = TempDir::new().unwrap();
    let paths = face_paths(&dir);
    for path in &paths {
        RgbImage::from_pixel(128, 128, Rgb([128, 128, 128]))
            .save(path)
            .unwrap();
    }

    let plan = pyramid::plan(4096, 360.0, 64, 128);
    assert_eq!(plan.max_level, 2);
    let records = generate_tiles(&paths, dir.path(), &options(plan, false)).unwrap();
    assert!(records.is_empty());

    // Every face yields a full 2x2 grid at level 2 and one tile at level 1.
    for face in Face::ALL {
        for (level, coords) in [(2, vec![(0, 0), (0, 1), (1, 0), (1, 1)]), (1, vec![(0, 0)])] {
            for (row, col) in coords {
                let tile = dir
                    .path()
                    .join(level.to_string())
                    .join(format!("{}{}_{}.jpg", face.letter(), row, col));
                assert!(tile.exists(), "missing {}", tile.display());
            }
        }
    }

    // No records means the manifest carries no missingTiles field.
    let manifest = manifest::assemble(ManifestParams {
        hfov: 100.0,
        haov: 360.0,
        vaov: 180.0,
        v_offset: 0.0,
        background: BackgroundColor::default(),
        avoid_background: false,
        auto_load: false,
        format: TileFormat::Jpeg,
        with_fallback: false,
        sht_hash: None,
        thumbnail: None,
        missing_tiles: (!records.is_empty())
            .then(|| missing::compact(&records, &plan)),
        tile_size: plan.tile_size,
        max_level: plan.max_level,
        cube_size: plan.cube_size,
    });
    manifest::write(dir.path(), &manifest).unwrap();
    let text = std::fs::read_to_string(dir.path().join("config.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert!(json["multiRes"].get("missingTiles").is_none());
    assert_eq!(json["multiRes"]["maxLevel"], 2);
    assert_eq!(json["multiRes"]["cubeResolution"], 128);
    assert_eq!(json["multiRes"]["tileResolution"], 64);
}

#[test]
fn partial_panorama_omits_background_faces_compactly() {
    let dir = TempDir::new().unwrap();
    let paths = face_paths(&dir);
    // Front face has content, back face is pure background; the rest never
    // came out of the remapper.
    RgbImage::from_pixel(128, 128, Rgb([40, 80, 120]))
        .save(&paths[Face::Front.index()])
        .unwrap();
    RgbImage::from_pixel(128, 128, Rgb([0, 0, 0]))
        .save(&paths[Face::Back.index()])
        .unwrap();

    let plan = pyramid::plan(4096, 180.0, 64, 128);
    assert_eq!(plan.max_level, 2);
    let records = generate_tiles(&paths, dir.path(), &options(plan, true)).unwrap();

    // Back face: all five tiles recorded. Absent faces: one record each.
    assert_eq!(records.len(), 5 + 4);
    assert!(records.iter().all(|r| r.face != Face::Front));

    // Compaction collapses the back face to its coarsest record, so every
    // face encodes as a single whole-face omission; the level marker is only
    // emitted when the level changes, even across faces.
    let encoded = missing::compact(&records, &plan);
    assert_eq!(encoded, "!b>1!u!d!l!r");

    // The front face was written in full.
    assert!(dir.path().join("2").join("f1_1.jpg").exists());
    assert!(dir.path().join("1").join("f0_0.jpg").exists());
    assert!(!dir.path().join("2").join("b0_0.jpg").exists());
}

#[test]
fn clipped_pyramid_geometry_round_trips_through_files() {
    let dir = TempDir::new().unwrap();
    let paths = face_paths(&dir);
    for path in &paths {
        RgbImage::from_fn(100, 100, |x, y| Rgb([x as u8, y as u8, 200]))
            .save(path)
            .unwrap();
    }

    let plan = pyramid::plan(4096, 360.0, 64, 100);
    let records = generate_tiles(&paths, dir.path(), &options(plan, false)).unwrap();
    assert!(records.is_empty());

    let edge = image::open(dir.path().join("2").join("u1_0.jpg")).unwrap();
    assert_eq!((edge.width(), edge.height()), (64, 36));
    let coarse = image::open(dir.path().join("1").join("r0_0.jpg")).unwrap();
    assert_eq!((coarse.width(), coarse.height()), (50, 50));
}
