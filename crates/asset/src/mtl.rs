//! Minimal Wavefront MTL reader feeding [`MaterialRecord`]s to the OBJ parser.

use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result, anyhow};

use crate::mesh::{ColorLayer, MaterialRecord};

pub type MtlLibrary = HashMap<String, MaterialRecord>;

pub fn load_mtl_from_path(path: impl AsRef<Path>) -> Result<MtlLibrary> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open MTL file: {}", path.display()))?;
    parse_mtl(BufReader::new(file))
        .with_context(|| format!("Failed to parse MTL file: {}", path.display()))
}

/// Parse `newmtl` blocks. Colors: `Kd` base, `Ks` specular, `Ka` ambient,
/// `Tr` (or `1 - d`) transparency. Maps follow the same slots; `map_Bump`,
/// `bump` and `norm` fill the normal texture. Map options are skipped and the
/// last token is taken as the path.
pub fn parse_mtl<R: BufRead>(reader: R) -> Result<MtlLibrary> {
    let mut library = MtlLibrary::new();
    let mut current: Option<(String, MaterialRecord)> = None;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_no + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else { continue };

        if tag == "newmtl" {
            if let Some((name, record)) = current.take() {
                library.insert(name, record);
            }
            let name = parts
                .next()
                .ok_or_else(|| anyhow!("newmtl without a name on line {}", line_no + 1))?;
            current = Some((name.to_owned(), default_record()));
            continue;
        }

        let Some((_, record)) = current.as_mut() else {
            log::debug!("Ignoring '{}' outside of a material on line {}", tag, line_no + 1);
            continue;
        };

        match tag {
            "Kd" => record.base.color = parse_triple(parts, line_no)?,
            "Ks" => record.specular.color = parse_triple(parts, line_no)?,
            "Ka" => record.ambient.color = parse_triple(parts, line_no)?,
            "Tr" => record.transparency.color = [parse_scalar(parts.next(), line_no)?; 3],
            "d" => record.transparency.color = [1.0 - parse_scalar(parts.next(), line_no)?; 3],
            "map_Kd" => record.base.texture = last_token(parts),
            "map_Ks" => record.specular.texture = last_token(parts),
            "map_Ka" => record.ambient.texture = last_token(parts),
            "map_d" | "map_Tr" => record.transparency.texture = last_token(parts),
            "map_Bump" | "map_bump" | "bump" | "norm" => record.normal_texture = last_token(parts),
            _ => {}
        }
    }

    if let Some((name, record)) = current.take() {
        library.insert(name, record);
    }
    Ok(library)
}

fn default_record() -> MaterialRecord {
    MaterialRecord {
        base: ColorLayer::new([1.0, 1.0, 1.0]),
        ..MaterialRecord::default()
    }
}

fn parse_scalar(token: Option<&str>, line_no: usize) -> Result<f32> {
    let token = token.ok_or_else(|| anyhow!("Missing value on line {}", line_no + 1))?;
    token
        .parse::<f32>()
        .with_context(|| format!("Invalid number '{}' on line {}", token, line_no + 1))
}

fn parse_triple<'a>(mut parts: impl Iterator<Item = &'a str>, line_no: usize) -> Result<[f32; 3]> {
    let r = parse_scalar(parts.next(), line_no)?;
    // A single value means grey.
    match parts.next() {
        None => Ok([r; 3]),
        Some(g) => {
            let g = parse_scalar(Some(g), line_no)?;
            let b = parse_scalar(parts.next(), line_no)?;
            Ok([r, g, b])
        }
    }
}

fn last_token<'a>(parts: impl Iterator<Item = &'a str>) -> Option<String> {
    parts.last().map(str::to_owned)
}
