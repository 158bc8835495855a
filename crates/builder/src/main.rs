//! Offline mesh builder: turns a JSON or OBJ source into a binary mesh file.
//!
//! `meshbuilder --source=<path> --target=<path>`

mod description;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use asset::MeshData;

use crate::description::MeshDescription;

struct Args {
    source: PathBuf,
    target: PathBuf,
}

fn parse_args() -> Result<Args> {
    let mut source = None;
    let mut target = None;
    for arg in std::env::args().skip(1) {
        if let Some(v) = arg.strip_prefix("--source=") {
            source = Some(PathBuf::from(v));
        } else if let Some(v) = arg.strip_prefix("--target=") {
            target = Some(PathBuf::from(v));
        } else {
            log::warn!("Ignoring unknown argument '{}'", arg);
        }
    }
    match (source, target) {
        (Some(source), Some(target)) => Ok(Args { source, target }),
        _ => bail!("usage: meshbuilder --source=<mesh.json|mesh.obj> --target=<mesh file>"),
    }
}

fn read_source(path: &Path) -> Result<MeshData> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("obj") => asset::obj::load_obj_from_path(path),
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            MeshDescription::from_json(&text)?.into_mesh_data()
        }
        _ => bail!("Unsupported source type: {}", path.display()),
    }
}

fn build(source: &Path, target: &Path) -> Result<usize> {
    if let Some(dir) = target.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    let mesh = read_source(source).with_context(|| format!("Invalid source {}", source.display()))?;
    let bytes = asset::encode(&mesh).with_context(|| format!("Failed to encode {}", source.display()))?;
    std::fs::write(target, &bytes)
        .with_context(|| format!("Failed to write {}", target.display()))?;

    log::info!(
        "Built {} -> {} ({} vertices, {} triangles, {} materials, {} bytes)",
        source.display(),
        target.display(),
        mesh.vertices.len(),
        mesh.triangle_count(),
        mesh.materials.len(),
        bytes.len()
    );
    Ok(bytes.len())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    if let Err(err) = build(&args.source, &args.target) {
        log::error!("{}: {:#}", args.source.display(), err);
        return Err(err);
    }
    Ok(())
}
