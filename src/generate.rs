//! End-to-end generation: validate the configuration, plan the pyramid,
//! remap the panorama into cube faces, tile every face, compact the
//! missing-tile list, and write fallbacks, previews, and the manifest.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::Args;
use image::codecs::jpeg::JpegEncoder;
use tracing::{debug, info};

use crate::core::tiles::{self, TileOptions};
use crate::core::{
    missing, pyramid, resize_rgb, sht, BackgroundColor, Face, ResampleFilter, TileFormat,
};
use crate::error::ConfigError;
use crate::manifest::{self, ManifestParams};
use crate::remap::{self, Projection};

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Panorama to be processed
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Input projection is cylindrical (default is equirectangular)
    #[arg(short = 'C', long)]
    pub cylindrical: bool,

    /// Horizontal angle of view (defaults to 360.0 for a full panorama)
    #[arg(short = 'H', long, default_value_t = -1.0, allow_negative_numbers = true)]
    pub haov: f64,

    /// Starting horizontal field of view
    #[arg(short = 'F', long, default_value_t = 100.0)]
    pub hfov: f64,

    /// Vertical angle of view (defaults to 180.0 for a full panorama)
    #[arg(short = 'V', long, default_value_t = -1.0, allow_negative_numbers = true)]
    pub vaov: f64,

    /// Starting pitch position
    #[arg(short = 'O', long = "voffset", default_value_t = 0.0, allow_negative_numbers = true)]
    pub v_offset: f64,

    /// Offset of the horizon in pixels (negative if above middle)
    #[arg(short = 'e', long, default_value_t = 0, allow_negative_numbers = true)]
    pub horizon: i32,

    /// Output directory, optionally to be used as basePath
    #[arg(short = 'o', long, default_value = "./output")]
    pub output: PathBuf,

    /// Tile size in pixels
    #[arg(short = 's', long = "tilesize", default_value_t = 512)]
    pub tile_size: u32,

    /// Fallback tile size in pixels (0 to skip)
    #[arg(short = 'f', long = "fallbacksize", default_value_t = 1024)]
    pub fallback_size: u32,

    /// Cube size in pixels, or 0 to retain all details
    #[arg(short = 'c', long = "cubesize", default_value_t = 0)]
    pub cube_size: u32,

    /// RGB triple of values [0, 1] defining the background color shown past
    /// the edges of a partial panorama
    #[arg(short = 'b', long = "backgroundcolor", default_value = "[0.0, 0.0, 0.0]")]
    pub background_color: BackgroundColor,

    /// Viewer should limit the view to avoid showing the background
    #[arg(short = 'B', long = "avoidbackground")]
    pub avoid_background: bool,

    /// Automatically load the panorama in the viewer
    #[arg(short = 'a', long = "autoload")]
    pub auto_load: bool,

    /// Output JPEG quality 0-100
    #[arg(short = 'q', long, default_value_t = 75)]
    pub quality: u8,

    /// Output PNG tiles instead of JPEG tiles
    #[arg(long)]
    pub png: bool,

    /// Width of the embedded equirectangular thumbnail preview (0 for none;
    /// must be a power of two)
    #[arg(long = "thumbnailsize", default_value_t = 0)]
    pub thumbnail_size: u32,

    /// Location of the nona executable to use
    #[arg(short = 'n', long, default_value = "nona")]
    pub nona: PathBuf,

    /// Perform image remapping by nona on the GPU
    #[arg(short = 'G', long)]
    pub gpu: bool,

    /// Downsampling filter for pyramid levels and fallback tiles
    #[arg(long, default_value = "lanczos3")]
    pub filter: ResampleFilter,

    /// Do not generate the spherical-harmonic preview hash
    #[arg(long)]
    pub skip_preview: bool,

    /// Debug mode (verbose logging, keep intermediate files, allow an
    /// existing output directory)
    #[arg(short = 'd', long)]
    pub debug: bool,
}

pub fn run(args: GenerateArgs) -> Result<()> {
    if args.thumbnail_size > 0 && !args.thumbnail_size.is_power_of_two() {
        return Err(ConfigError::ThumbnailSize(args.thumbnail_size).into());
    }
    if args.output.exists() && !args.debug {
        return Err(ConfigError::OutputExists(args.output.display().to_string()).into());
    }
    fs::create_dir_all(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;

    info!("Processing input image information...");
    let (width, height) = image::image_dimensions(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let full_frame = args.cylindrical || width as f64 / height as f64 == 2.0;
    let haov = resolve_aov("haov", args.haov, 360.0, full_frame)?;
    let vaov = resolve_aov("vaov", args.vaov, 180.0, full_frame)?;
    let partial = args.haov != -1.0 && args.vaov != -1.0;
    let gen_preview = !args.skip_preview && haov >= 360.0 && vaov >= 180.0;

    let plan = pyramid::plan(width, haov, args.tile_size, args.cube_size);
    debug!("maxLevel: {}", plan.max_level);
    debug!("tileResolution: {}", plan.tile_size);
    debug!("cubeResolution: {}", plan.cube_size);

    let projection = Projection {
        input: args.input.clone(),
        source_width: width,
        source_height: height,
        cube_size: plan.cube_size,
        haov,
        horizon: args.horizon,
        cylindrical: args.cylindrical,
    };
    let project = remap::write_project(&args.output, &projection)?;
    remap::run_nona(&args.nona, args.gpu, &args.output, &project)?;

    let format = if args.png { TileFormat::Png } else { TileFormat::Jpeg };
    let face_paths: [PathBuf; 6] = Face::ALL.map(|f| remap::face_path(&args.output, f));

    info!("Generating tiles...");
    let records = tiles::generate_tiles(
        &face_paths,
        &args.output,
        &TileOptions {
            plan,
            format,
            quality: args.quality,
            background: args.background_color,
            partial,
            keep_background_tiles: gen_preview,
            filter: args.filter,
        },
    )?;
    let missing_tiles = (!records.is_empty()).then(|| missing::compact(&records, &plan));
    if let Some(encoded) = &missing_tiles {
        debug!(
            "{} missing tile records encoded into {} characters",
            records.len(),
            encoded.len()
        );
    }

    if args.fallback_size > 0 {
        info!("Generating fallback tiles...");
        write_fallbacks(&args, format)?;
    }

    if !args.debug {
        remap::clean_up(&args.output, &project)?;
    }

    let sht_hash = if gen_preview {
        info!("Generating spherical-harmonic preview...");
        let img = image::open(&args.input)
            .with_context(|| format!("failed to read {}", args.input.display()))?
            .into_rgb8();
        let preview = resize_rgb(&img, 1024, 512, ResampleFilter::Bicubic);
        Some(sht::hash(&preview, sht::DEFAULT_LMAX))
    } else {
        None
    };

    let thumbnail = if args.thumbnail_size > 0 {
        Some(thumbnail_data_uri(&args.input, args.thumbnail_size)?)
    } else {
        None
    };

    let manifest = manifest::assemble(ManifestParams {
        hfov: args.hfov,
        haov,
        vaov,
        v_offset: args.v_offset,
        background: args.background_color,
        avoid_background: args.avoid_background,
        auto_load: args.auto_load,
        format,
        with_fallback: args.fallback_size > 0,
        sht_hash,
        thumbnail,
        missing_tiles,
        tile_size: plan.tile_size,
        max_level: plan.max_level,
        cube_size: plan.cube_size,
    });
    manifest::write(&args.output, &manifest)?;
    info!("Wrote {}", args.output.join("config.json").display());
    Ok(())
}

/// Resolve a defaulted angle of view. Full-sphere coverage is assumed only
/// for cylindrical input or a 2:1 equirectangular frame.
fn resolve_aov(name: &str, value: f64, full: f64, full_frame: bool) -> Result<f64, ConfigError> {
    if value != -1.0 {
        return Ok(value);
    }
    if full_frame {
        info!("Assuming --{name} {full}");
        Ok(full)
    } else {
        Err(ConfigError::AngleOfView)
    }
}

fn write_fallbacks(args: &GenerateArgs, format: TileFormat) -> Result<()> {
    let dir = args.output.join("fallback");
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let background = args.background_color.to_rgb8();
    for face in Face::ALL {
        let path = remap::face_path(&args.output, face);
        if !path.exists() {
            continue;
        }
        let img = image::open(&path)
            .with_context(|| format!("failed to open face image {}", path.display()))?;
        let flat = tiles::flatten(img, background);
        let resized = resize_rgb(&flat, args.fallback_size, args.fallback_size, args.filter);
        let out = dir.join(format!("{}.{}", face.letter(), format.extension()));
        tiles::write_image(&resized, &out, format, args.quality)?;
    }
    Ok(())
}

/// Encode a low-resolution equirectangular preview as a JPEG data URI.
fn thumbnail_data_uri(input: &Path, size: u32) -> Result<String> {
    let img = image::open(input)
        .with_context(|| format!("failed to read {}", input.display()))?
        .into_rgb8();
    let thumb = resize_rgb(&img, size, size / 2, ResampleFilter::Bicubic);
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 75)
        .encode_image(&thumb)
        .context("failed to encode thumbnail")?;
    Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(&buf)))
}
