//! Cube-face extraction via the external `nona` remapper (from Hugin): a
//! generated PTO project describes six rectilinear views of the source
//! panorama, and nona renders them to TIFF face images. Any subset of faces
//! may come out absent for a partial panorama; that is handled downstream,
//! not here.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::core::Face;

/// Parameters of the PTO project handed to nona.
pub struct Projection {
    pub input: PathBuf,
    pub source_width: u32,
    pub source_height: u32,
    pub cube_size: u32,
    pub haov: f64,
    /// Offset of the horizon in pixels, negative if above the middle.
    pub horizon: i32,
    pub cylindrical: bool,
}

/// Path of the remapped image for `face` under `output`.
pub fn face_path(output: &Path, face: Face) -> PathBuf {
    output.join(format!("face{:04}.tif", face.index()))
}

/// Render the PTO project text describing all six cube faces.
pub fn project_text(proj: &Projection) -> Result<String> {
    let input = if proj.input.is_absolute() {
        proj.input.clone()
    } else {
        env::current_dir()
            .context("failed to resolve the working directory")?
            .join(&proj.input)
    };
    let projection_code = if proj.cylindrical { "f1" } else { "f4" };

    let mut lines = Vec::with_capacity(10);
    lines.push(format!(
        "p E0 R0 f0 h{size} w{size} n\"TIFF_m\" u0 v90",
        size = proj.cube_size
    ));
    lines.push("m g1 i0 m2 p0.00784314".to_string());
    for face in Face::ALL {
        let (pitch, yaw) = face.orientation();
        lines.push(format!(
            "i a0 b0 c0 d0 e{} {} h{} w{} n\"{}\" r0 v{} p{} y{}",
            proj.horizon,
            projection_code,
            proj.source_height,
            proj.source_width,
            input.display(),
            proj.haov,
            pitch,
            yaw
        ));
    }
    lines.push("v".to_string());
    lines.push("*".to_string());
    Ok(lines.join("\n"))
}

/// Write the PTO project into the output directory.
pub fn write_project(output: &Path, proj: &Projection) -> Result<PathBuf> {
    let path = output.join("cubic.pto");
    let text = project_text(proj)?;
    fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Run nona over the project, synchronously. A non-zero exit or a missing
/// executable aborts the whole run.
pub fn run_nona(nona: &Path, gpu: bool, output: &Path, project: &Path) -> Result<()> {
    info!("Generating cube faces...");
    let status = Command::new(nona)
        .arg(if gpu { "-g" } else { "-d" })
        .arg("-o")
        .arg(output.join("face"))
        .arg(project)
        .status()
        .with_context(|| {
            format!(
                "failed to run '{}'; point --nona at the Hugin nona executable",
                nona.display()
            )
        })?;
    if !status.success() {
        bail!("nona exited with {status}");
    }
    Ok(())
}

/// Delete the PTO project and the remapped face images; kept in debug mode.
pub fn clean_up(output: &Path, project: &Path) -> Result<()> {
    fs::remove_file(project)
        .with_context(|| format!("failed to remove {}", project.display()))?;
    for face in Face::ALL {
        let path = face_path(output, face);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        }
    }
    Ok(())
}
