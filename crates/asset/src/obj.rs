//! OBJ source parser for the mesh builder.
//!
//! Supports positions, normals, texture coordinates, polygon faces (fan
//! triangulated) and `usemtl` groups. Each group becomes one material whose
//! index range covers its triangles; groups are made contiguous in the
//! output, in order of first use. Material properties come from the `mtllib`
//! files next to the OBJ when loading from a path.

use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result, anyhow};

use crate::mesh::{InclusiveRange, MaterialRecord, MeshData, MeshVertex};
use crate::mtl::{MtlLibrary, load_mtl_from_path};

/// Load an OBJ mesh from a file path, resolving `mtllib` relative to it.
pub fn load_obj_from_path(path: impl AsRef<Path>) -> Result<MeshData> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open OBJ file: {}", path.display()))?;
    parse_obj(BufReader::new(file), path.parent())
        .with_context(|| format!("Failed to parse OBJ file: {}", path.display()))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
struct Key {
    position: usize,
    uv: Option<usize>,
    normal: Option<usize>,
    slot: u8,
}

fn parse_obj<R: BufRead>(reader: R, base_dir: Option<&Path>) -> Result<MeshData> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut texcoords: Vec<[f32; 2]> = Vec::new();

    let mut library = MtlLibrary::new();
    // Material names in order of first use; `None` is faces before any `usemtl`.
    let mut slots: Vec<Option<String>> = Vec::new();
    let mut current_slot: Option<u8> = None;
    let mut saw_usemtl = false;

    let mut unique: HashMap<Key, u32> = HashMap::new();
    let mut vertices: Vec<MeshVertex> = Vec::new();
    let mut triangles: Vec<(u8, [u32; 3])> = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_no + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let tag = parts
            .next()
            .ok_or_else(|| anyhow!("Malformed OBJ line {}: '{}'", line_no + 1, trimmed))?;

        match tag {
            "v" => {
                let x = parse_f32(parts.next(), line_no, "x coordinate")?;
                let y = parse_f32(parts.next(), line_no, "y coordinate")?;
                let z = parse_f32(parts.next(), line_no, "z coordinate")?;
                positions.push([x, y, z]);
            }
            "vt" => {
                let u = parse_f32(parts.next(), line_no, "u coordinate")?;
                let v = parse_f32(parts.next(), line_no, "v coordinate")?;
                texcoords.push([u, v]);
            }
            "vn" => {
                let nx = parse_f32(parts.next(), line_no, "nx coordinate")?;
                let ny = parse_f32(parts.next(), line_no, "ny coordinate")?;
                let nz = parse_f32(parts.next(), line_no, "nz coordinate")?;
                normals.push([nx, ny, nz]);
            }
            "mtllib" => {
                let Some(dir) = base_dir else {
                    log::debug!("Ignoring mtllib on line {} (no base directory)", line_no + 1);
                    continue;
                };
                for name in parts {
                    library.extend(load_mtl_from_path(dir.join(name))?);
                }
            }
            "usemtl" => {
                saw_usemtl = true;
                let name = parts.next().map(str::to_owned);
                current_slot = Some(slot_for(&mut slots, name, line_no)?);
            }
            "f" => {
                let slot = match current_slot {
                    Some(slot) => slot,
                    None => {
                        let slot = slot_for(&mut slots, None, line_no)?;
                        current_slot = Some(slot);
                        slot
                    }
                };

                let mut face_indices: Vec<u32> = Vec::new();
                for part in parts {
                    let (position, uv, normal) = parse_face_vertex(
                        part,
                        positions.len(),
                        texcoords.len(),
                        normals.len(),
                        line_no,
                    )?;
                    let key = Key {
                        position,
                        uv,
                        normal,
                        slot,
                    };
                    let index = match unique.get(&key) {
                        Some(&idx) => idx,
                        None => {
                            let uv = uv.and_then(|i| texcoords.get(i).copied()).unwrap_or([0.0, 0.0]);
                            let normal = normal
                                .and_then(|i| normals.get(i).copied())
                                .unwrap_or([0.0, 0.0, 1.0]);

                            let idx = u32::try_from(vertices.len())
                                .map_err(|_| anyhow!("Too many vertices in OBJ (>{})", u32::MAX))?;
                            vertices.push(
                                MeshVertex::new(positions[position], normal, uv).with_material(slot),
                            );
                            unique.insert(key, idx);
                            idx
                        }
                    };
                    face_indices.push(index);
                }

                if face_indices.len() < 3 {
                    continue;
                }
                // Triangulate fan
                for tri in 1..(face_indices.len() - 1) {
                    triangles.push((slot, [face_indices[0], face_indices[tri], face_indices[tri + 1]]));
                }
            }
            _ => {
                // Ignore other directives (o/g/s/etc.)
            }
        }
    }

    if vertices.is_empty() || triangles.is_empty() {
        anyhow::bail!("OBJ contained no triangles");
    }

    // Stable sort keeps face order within each material.
    triangles.sort_by_key(|&(slot, _)| slot);
    let indices: Vec<u32> = triangles.iter().flat_map(|(_, tri)| *tri).collect();

    let materials = if saw_usemtl {
        build_materials(&slots, &triangles, &library)
    } else {
        Vec::new()
    };

    let mesh = MeshData::from_parts(vertices, indices, materials)?;
    log::info!(
        "Parsed OBJ: {} vertices, {} triangles, {} materials",
        mesh.vertices.len(),
        mesh.triangle_count(),
        mesh.materials.len()
    );
    Ok(mesh)
}

fn slot_for(slots: &mut Vec<Option<String>>, name: Option<String>, line_no: usize) -> Result<u8> {
    let index = match slots.iter().position(|s| *s == name) {
        Some(index) => index,
        None => {
            slots.push(name);
            slots.len() - 1
        }
    };
    u8::try_from(index)
        .map_err(|_| anyhow!("More than {} materials referenced by line {}", u8::MAX as usize + 1, line_no + 1))
}

fn build_materials(
    slots: &[Option<String>],
    triangles: &[(u8, [u32; 3])],
    library: &MtlLibrary,
) -> Vec<MaterialRecord> {
    let mut materials = Vec::new();
    let mut cursor = 0usize;
    for (slot, name) in slots.iter().enumerate() {
        let run = triangles[cursor..]
            .iter()
            .take_while(|(s, _)| *s as usize == slot)
            .count();
        if run == 0 {
            continue;
        }
        let group = &triangles[cursor..cursor + run];
        let first_index = (cursor * 3) as u32;
        let last_index = ((cursor + run) * 3 - 1) as u32;
        cursor += run;

        let referenced = group.iter().flat_map(|(_, tri)| tri.iter().copied());
        let (min, max) = referenced.fold((u32::MAX, 0), |(lo, hi), v| (lo.min(v), hi.max(v)));

        let mut record = match name.as_deref().and_then(|n| library.get(n)) {
            Some(found) => found.clone(),
            None => {
                if let Some(name) = name {
                    log::warn!("Material '{}' is not defined in any mtllib; using defaults", name);
                }
                MaterialRecord::default()
            }
        };
        record.vertex_range = InclusiveRange::new(min, max);
        record.index_range = InclusiveRange::new(first_index, last_index);
        materials.push(record);
    }
    materials
}

fn parse_f32(value: Option<&str>, line_no: usize, what: &str) -> Result<f32> {
    let token = value.ok_or_else(|| anyhow!("Missing {} on line {}", what, line_no + 1))?;
    token
        .parse::<f32>()
        .with_context(|| format!("Failed to parse {} on line {}", what, line_no + 1))
}

fn parse_face_vertex(
    token: &str,
    pos_count: usize,
    tex_count: usize,
    norm_count: usize,
    line_no: usize,
) -> Result<(usize, Option<usize>, Option<usize>)> {
    let mut split = token.split('/');
    let pos = split
        .next()
        .ok_or_else(|| anyhow!("Malformed face element '{}' on line {}", token, line_no + 1))?;
    let pos_idx = resolve_index(pos, pos_count, line_no)?;

    let tex_idx = match split.next() {
        Some(value) if !value.is_empty() => Some(resolve_index(value, tex_count, line_no)?),
        _ => None,
    };

    let norm_idx = match split.next() {
        Some(value) if !value.is_empty() => Some(resolve_index(value, norm_count, line_no)?),
        _ => None,
    };

    Ok((pos_idx, tex_idx, norm_idx))
}

fn resolve_index(token: &str, len: usize, line_no: usize) -> Result<usize> {
    let raw = token
        .parse::<i32>()
        .with_context(|| format!("Invalid index '{}' on line {}", token, line_no + 1))?;
    if raw == 0 {
        anyhow::bail!("OBJ indices are 1-based; found 0 on line {}", line_no + 1);
    }

    let idx = if raw > 0 {
        (raw - 1) as isize
    } else {
        (len as isize) + (raw as isize)
    };

    if idx < 0 || idx as usize >= len {
        anyhow::bail!(
            "OBJ index {} resolved out of bounds (len={}) on line {}",
            raw,
            len,
            line_no + 1
        );
    }

    Ok(idx as usize)
}
