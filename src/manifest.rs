//! Viewer manifest (`config.json`): a structured record serialized with
//! serde, so optional fields can never produce invalid syntax.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::{BackgroundColor, TileFormat};

/// Tile path template understood by the viewer: level, face letter, row,
/// column.
pub const TILE_PATH_TEMPLATE: &str = "/%l/%s%y_%x";

/// Per-face fallback path template.
pub const FALLBACK_PATH_TEMPLATE: &str = "/fallback/%s";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub hfov: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub haov: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_yaw: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaw: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_yaw: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vaov: Option<f64>,
    #[serde(rename = "vOffset", skip_serializing_if = "Option::is_none")]
    pub v_offset: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_pitch: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pitch: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avoid_showing_background: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_load: Option<bool>,
    #[serde(rename = "type")]
    pub scene_type: &'static str,
    pub multi_res: MultiRes,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiRes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sht_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equirectangular_thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_tiles: Option<String>,
    pub path: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_path: Option<&'static str>,
    pub extension: &'static str,
    pub tile_resolution: u32,
    pub max_level: u32,
    pub cube_resolution: u32,
}

/// View and omission settings that shape the optional manifest fields.
pub struct ManifestParams {
    pub hfov: f64,
    pub haov: f64,
    pub vaov: f64,
    pub v_offset: f64,
    pub background: BackgroundColor,
    pub avoid_background: bool,
    pub auto_load: bool,
    pub format: TileFormat,
    pub with_fallback: bool,
    pub sht_hash: Option<String>,
    pub thumbnail: Option<String>,
    pub missing_tiles: Option<String>,
    pub tile_size: u32,
    pub max_level: u32,
    pub cube_size: u32,
}

/// Assemble the manifest record. Yaw and pitch limits appear only for
/// partial coverage, the background color only when it is not pure black.
pub fn assemble(params: ManifestParams) -> Manifest {
    let partial_haov = params.haov < 360.0;
    let partial_vaov = params.vaov < 180.0;
    Manifest {
        hfov: params.hfov,
        haov: partial_haov.then_some(params.haov),
        min_yaw: partial_haov.then_some(-params.haov / 2.0),
        yaw: partial_haov.then_some(-params.haov / 2.0 + params.hfov / 2.0),
        max_yaw: partial_haov.then_some(params.haov / 2.0),
        vaov: partial_vaov.then_some(params.vaov),
        v_offset: partial_vaov.then_some(params.v_offset),
        min_pitch: partial_vaov.then_some(-params.vaov / 2.0 + params.v_offset),
        pitch: partial_vaov.then_some(params.v_offset),
        max_pitch: partial_vaov.then_some(params.vaov / 2.0 + params.v_offset),
        background_color: (!params.background.is_black()).then_some(params.background.0),
        avoid_showing_background: (params.avoid_background
            && (partial_haov || partial_vaov))
            .then_some(true),
        auto_load: params.auto_load.then_some(true),
        scene_type: "multires",
        multi_res: MultiRes {
            sht_hash: params.sht_hash,
            equirectangular_thumbnail: params.thumbnail,
            missing_tiles: params.missing_tiles,
            path: TILE_PATH_TEMPLATE,
            fallback_path: params.with_fallback.then_some(FALLBACK_PATH_TEMPLATE),
            extension: params.format.extension(),
            tile_resolution: params.tile_size,
            max_level: params.max_level,
            cube_resolution: params.cube_size,
        },
    }
}

/// Serialize and write the manifest into the output directory.
pub fn write(output: &Path, manifest: &Manifest) -> Result<()> {
    let path = output.join("config.json");
    let text = serde_json::to_string_pretty(manifest).context("failed to serialize manifest")?;
    fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
