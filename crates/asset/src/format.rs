//! Binary mesh file codec.
//!
//! Layout (all values little-endian):
//!
//! ```text
//! vertex_count: u32
//! vertex_count * MeshVertex (64 bytes each)
//! index_count: u32
//! index_count * (u16 if index_count <= 65535 else u32)
//! -- optional, present iff bytes remain --
//! material_count: u16
//! material_count * {
//!     base, specular, ambient, transparency: [f32; 3] + u8 name_len + name bytes
//!     normal texture: u8 name_len + name bytes
//!     vertex_range.first, vertex_range.last: u32
//!     index_range.first, index_range.last: u32
//! }
//! ```
//!
//! A mesh without materials is a strict prefix of the same mesh with
//! materials; the decoder detects the material section by the bytes that
//! remain after the indices. There is no version tag.

use thiserror::Error;

use crate::mesh::{
    ColorLayer, IndexData, IndexFormat, InclusiveRange, MaterialRecord, MeshData, MeshVertex,
};

/// Longest texture path the one-byte length prefix can describe.
pub const MAX_TEXTURE_NAME_LEN: usize = u8::MAX as usize;

/// Smallest encoded material: four color triples with empty names, an empty
/// normal name and the two ranges.
const MIN_MATERIAL_LEN: usize = 4 * (12 + 1) + 1 + 16;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("{what} needs {needed} bytes at offset {offset} but the buffer is {len} bytes long")]
    Truncated {
        what: &'static str,
        offset: usize,
        needed: usize,
        len: usize,
    },

    #[error("{what} count {count} implies {bytes} bytes but only {available} remain")]
    CountExceedsBuffer {
        what: &'static str,
        count: u64,
        bytes: u64,
        available: usize,
    },

    #[error("texture name of {len} bytes at offset {offset} exceeds the {available} bytes remaining")]
    TextureNameOverrun {
        offset: usize,
        len: usize,
        available: usize,
    },

    #[error("texture name at offset {offset} is not valid UTF-8")]
    TextureNameEncoding { offset: usize },

    #[error("{count} unexpected bytes after the material section")]
    TrailingBytes { count: usize },

    #[error("couldn't allocate memory for {what}")]
    AllocationFailed { what: &'static str },

    #[error("{what} count {count} exceeds the format limit of {limit}")]
    TooMany {
        what: &'static str,
        count: usize,
        limit: u64,
    },

    #[error("texture name '{name}' is {len} bytes long, the format allows {MAX_TEXTURE_NAME_LEN}")]
    TextureNameTooLong { name: String, len: usize },

    #[error("texture name is empty; leave the slot unset instead")]
    EmptyTextureName,

    #[error("index {value} at position {position} doesn't fit the 16-bit index width")]
    IndexOutOfRange { position: usize, value: u32 },

    #[error("index count {index_count} is not a whole number of triangles")]
    PartialTriangle { index_count: usize },

    #[error("index {value} at position {position} is past the {vertex_count} vertices")]
    IndexBeyondVertices {
        position: usize,
        value: u32,
        vertex_count: usize,
    },

    #[error("material {material} {what} range [{first}, {last}] is outside a buffer of {len}")]
    MaterialRangeOutOfBounds {
        material: usize,
        what: &'static str,
        first: u32,
        last: u32,
        len: usize,
    },
}

impl FormatError {
    /// Allocation failures are reported as out-of-memory, everything else as an invalid file.
    pub fn is_allocation_failure(&self) -> bool {
        matches!(self, FormatError::AllocationFailed { .. })
    }
}

// ---------- encode ----------

/// Serialize `mesh` into one contiguous buffer.
///
/// The index width written is always the one the index count selects, even
/// if `mesh.indices` was built with the other width.
pub fn encode(mesh: &MeshData) -> Result<Vec<u8>, FormatError> {
    let vertex_count = u32::try_from(mesh.vertices.len())
        .map_err(|_| too_many("vertex", mesh.vertices.len(), u32::MAX.into()))?;
    let index_count = u32::try_from(mesh.indices.len())
        .map_err(|_| too_many("index", mesh.indices.len(), u32::MAX.into()))?;

    let renarrowed;
    let indices = if IndexFormat::for_count(mesh.indices.len()) == mesh.indices.format() {
        &mesh.indices
    } else {
        renarrowed = IndexData::from_u32(mesh.indices.iter().collect())?;
        &renarrowed
    };

    let mut out = Vec::with_capacity(encoded_len(mesh));
    put_u32(&mut out, vertex_count);
    for v in &mesh.vertices {
        put_vertex(&mut out, v);
    }
    put_u32(&mut out, index_count);
    match indices {
        IndexData::U16(indices) => indices.iter().for_each(|&i| put_u16(&mut out, i)),
        IndexData::U32(indices) => indices.iter().for_each(|&i| put_u32(&mut out, i)),
    }

    if !mesh.materials.is_empty() {
        let material_count = u16::try_from(mesh.materials.len())
            .map_err(|_| too_many("material", mesh.materials.len(), u16::MAX.into()))?;
        put_u16(&mut out, material_count);
        for material in &mesh.materials {
            put_material(&mut out, material)?;
        }
    }

    log::debug!(
        "Encoded mesh: {} vertices, {} indices ({:?}), {} materials, {} bytes",
        mesh.vertices.len(),
        mesh.indices.len(),
        indices.format(),
        mesh.materials.len(),
        out.len()
    );
    Ok(out)
}

fn too_many(what: &'static str, count: usize, limit: u64) -> FormatError {
    FormatError::TooMany { what, count, limit }
}

fn encoded_len(mesh: &MeshData) -> usize {
    4 + mesh.vertices.len() * MeshVertex::SIZE
        + 4
        + mesh.indices.len() * mesh.indices.format().size_in_bytes()
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_f32s(out: &mut Vec<u8>, values: &[f32]) {
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

fn put_vertex(out: &mut Vec<u8>, v: &MeshVertex) {
    put_f32s(out, &v.position);
    put_f32s(out, &v.normal);
    put_f32s(out, &v.tangent);
    put_f32s(out, &v.bitangent);
    put_f32s(out, &v.uv);
    out.extend_from_slice(&v.color);
    out.push(v.material);
    out.extend_from_slice(&[0; 3]);
}

fn put_name(out: &mut Vec<u8>, name: Option<&str>) -> Result<(), FormatError> {
    // A zero length already means "no texture" on disk.
    if name == Some("") {
        return Err(FormatError::EmptyTextureName);
    }
    let bytes = name.unwrap_or_default().as_bytes();
    let len = u8::try_from(bytes.len()).map_err(|_| FormatError::TextureNameTooLong {
        name: name.unwrap_or_default().to_owned(),
        len: bytes.len(),
    })?;
    out.push(len);
    out.extend_from_slice(bytes);
    Ok(())
}

fn put_material(out: &mut Vec<u8>, m: &MaterialRecord) -> Result<(), FormatError> {
    for layer in [&m.base, &m.specular, &m.ambient, &m.transparency] {
        put_f32s(out, &layer.color);
        put_name(out, layer.texture.as_deref())?;
    }
    put_name(out, m.normal_texture.as_deref())?;
    put_u32(out, m.vertex_range.first);
    put_u32(out, m.vertex_range.last);
    put_u32(out, m.index_range.first);
    put_u32(out, m.index_range.last);
    Ok(())
}

// ---------- decode ----------

struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, needed: usize, what: &'static str) -> Result<&'a [u8], FormatError> {
        if needed > self.remaining() {
            return Err(FormatError::Truncated {
                what,
                offset: self.offset,
                needed,
                len: self.bytes.len(),
            });
        }
        let slice = &self.bytes[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, FormatError> {
        Ok(self.array::<1>(what)?[0])
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, FormatError> {
        self.array(what).map(u16::from_le_bytes)
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, FormatError> {
        self.array(what).map(u32::from_le_bytes)
    }

    fn f32x3(&mut self, what: &'static str) -> Result<[f32; 3], FormatError> {
        let b: [u8; 12] = self.array(what)?;
        Ok([f32_at(&b, 0), f32_at(&b, 4), f32_at(&b, 8)])
    }

    /// Make sure `count` elements of `element_size` bytes fit before anything is allocated.
    fn ensure_fits(
        &self,
        what: &'static str,
        count: u32,
        element_size: usize,
    ) -> Result<usize, FormatError> {
        let bytes = u64::from(count) * element_size as u64;
        if bytes > self.remaining() as u64 {
            return Err(FormatError::CountExceedsBuffer {
                what,
                count: u64::from(count),
                bytes,
                available: self.remaining(),
            });
        }
        Ok(bytes as usize)
    }

    fn name(&mut self) -> Result<Option<String>, FormatError> {
        let len = self.u8("texture name length")? as usize;
        if len == 0 {
            return Ok(None);
        }
        let offset = self.offset;
        if len > self.remaining() {
            return Err(FormatError::TextureNameOverrun {
                offset,
                len,
                available: self.remaining(),
            });
        }
        let bytes = self.take(len, "texture name")?;
        String::from_utf8(bytes.to_vec())
            .map(Some)
            .map_err(|_| FormatError::TextureNameEncoding { offset })
    }
}

#[inline]
fn f32_at(bytes: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn alloc<T>(count: usize, what: &'static str) -> Result<Vec<T>, FormatError> {
    let mut v = Vec::new();
    v.try_reserve_exact(count)
        .map_err(|_| FormatError::AllocationFailed { what })?;
    Ok(v)
}

fn vertex_from_record(b: &[u8]) -> MeshVertex {
    let f = |i: usize| f32_at(b, i * 4);
    MeshVertex {
        position: [f(0), f(1), f(2)],
        normal: [f(3), f(4), f(5)],
        tangent: [f(6), f(7), f(8)],
        bitangent: [f(9), f(10), f(11)],
        uv: [f(12), f(13)],
        color: [b[56], b[57], b[58], b[59]],
        material: b[60],
        _padding: [0; 3],
    }
}

/// Parse a mesh file produced by [`encode`].
///
/// Every count is checked against the bytes actually present before the
/// matching array is allocated, so a malformed buffer never produces partial
/// output.
pub fn decode(bytes: &[u8]) -> Result<MeshData, FormatError> {
    let mut r = ByteReader::new(bytes);

    let vertex_count = r.u32("vertex count")?;
    let vertex_bytes = r.ensure_fits("vertex", vertex_count, MeshVertex::SIZE)?;
    let mut vertices = alloc(vertex_count as usize, "the vertex data")?;
    vertices.extend(
        r.take(vertex_bytes, "vertex data")?
            .chunks_exact(MeshVertex::SIZE)
            .map(vertex_from_record),
    );

    let index_count = r.u32("index count")?;
    let format = IndexFormat::for_count(index_count as usize);
    let index_bytes = r.ensure_fits("index", index_count, format.size_in_bytes())?;
    let raw = r.take(index_bytes, "index data")?;
    let indices = match format {
        IndexFormat::U16 => {
            let mut v = alloc(index_count as usize, "the index data")?;
            v.extend(
                raw.chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]])),
            );
            IndexData::U16(v)
        }
        IndexFormat::U32 => {
            let mut v = alloc(index_count as usize, "the index data")?;
            v.extend(
                raw.chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]])),
            );
            IndexData::U32(v)
        }
    };

    let mut materials = Vec::new();
    if r.remaining() > 0 {
        let material_count = r.u16("material count")?;
        r.ensure_fits("material", material_count.into(), MIN_MATERIAL_LEN)?;
        materials = alloc(material_count as usize, "the materials data")?;
        for _ in 0..material_count {
            materials.push(decode_material(&mut r)?);
        }
        if r.remaining() > 0 {
            return Err(FormatError::TrailingBytes {
                count: r.remaining(),
            });
        }
    }

    Ok(MeshData {
        vertices,
        indices,
        materials,
    })
}

fn decode_layer(r: &mut ByteReader<'_>, what: &'static str) -> Result<ColorLayer, FormatError> {
    Ok(ColorLayer {
        color: r.f32x3(what)?,
        texture: r.name()?,
    })
}

fn decode_material(r: &mut ByteReader<'_>) -> Result<MaterialRecord, FormatError> {
    let base = decode_layer(r, "base color")?;
    let specular = decode_layer(r, "specular color")?;
    let ambient = decode_layer(r, "ambient color")?;
    let transparency = decode_layer(r, "transparency")?;
    let normal_texture = r.name()?;
    let vertex_range = InclusiveRange::new(r.u32("vertex range")?, r.u32("vertex range")?);
    let index_range = InclusiveRange::new(r.u32("index range")?, r.u32("index range")?);
    Ok(MaterialRecord {
        base,
        specular,
        ambient,
        transparency,
        normal_texture,
        vertex_range,
        index_range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(i: u32) -> MeshVertex {
        let f = i as f32;
        MeshVertex {
            position: [f, f + 0.5, -f],
            normal: [0.0, 1.0, 0.0],
            tangent: [1.0, 0.0, 0.0],
            bitangent: [0.0, 0.0, 1.0],
            uv: [f * 0.25, 1.0 - f * 0.25],
            color: [(i % 256) as u8, 10, 20, 255],
            material: (i % 2) as u8,
            _padding: [0; 3],
        }
    }

    fn quad() -> MeshData {
        MeshData::from_parts((0..4).map(vertex).collect(), vec![0, 1, 2, 0, 2, 3], vec![])
            .expect("quad")
    }

    fn material() -> MaterialRecord {
        MaterialRecord {
            base: ColorLayer::textured([0.8, 0.1, 0.1], "textures/brick.png"),
            specular: ColorLayer::new([1.0, 1.0, 1.0]),
            ambient: ColorLayer::new([0.1, 0.1, 0.1]),
            transparency: ColorLayer::new([0.0, 0.0, 0.0]),
            normal_texture: Some("textures/brick_n.png".into()),
            vertex_range: InclusiveRange::new(0, 3),
            index_range: InclusiveRange::new(0, 5),
        }
    }

    #[test]
    fn small_mesh_round_trips_with_16bit_indices() {
        let mesh = quad();
        let bytes = encode(&mesh).expect("encode");
        assert_eq!(bytes.len(), 4 + 4 * 64 + 4 + 6 * 2);

        let decoded = decode(&bytes).expect("decode");
        assert_eq!(decoded.indices.format(), IndexFormat::U16);
        assert_eq!(decoded, mesh);
        assert!(decoded.materials.is_empty());
    }

    #[test]
    fn large_index_count_round_trips_with_32bit_indices() {
        let vertex_count = 70_000u32;
        let vertices: Vec<_> = (0..vertex_count).map(vertex).collect();
        let indices: Vec<u32> = (0..vertex_count - 2)
            .flat_map(|i| [i, i + 1, i + 2])
            .collect();
        let mesh = MeshData::from_parts(vertices, indices.clone(), vec![]).expect("mesh");
        assert_eq!(mesh.indices.format(), IndexFormat::U32);

        let decoded = decode(&encode(&mesh).expect("encode")).expect("decode");
        assert_eq!(decoded.indices.format(), IndexFormat::U32);
        assert_eq!(decoded.indices.iter().collect::<Vec<_>>(), indices);
        assert_eq!(decoded.vertices, mesh.vertices);
    }

    #[test]
    fn header_layout_is_little_endian() {
        let bytes = encode(&quad()).expect("encode");
        assert_eq!(&bytes[0..4], &4u32.to_le_bytes());
        let index_count_at = 4 + 4 * 64;
        assert_eq!(&bytes[index_count_at..index_count_at + 4], &6u32.to_le_bytes());
        // second vertex: position.x == 1.0, material byte == 1, zero padding
        let v1 = 4 + 64;
        assert_eq!(&bytes[v1..v1 + 4], &1.0f32.to_le_bytes());
        assert_eq!(bytes[v1 + 60], 1);
        assert_eq!(&bytes[v1 + 61..v1 + 64], &[0, 0, 0]);
    }

    #[test]
    fn materials_are_appended_after_geometry() {
        let plain = quad();
        let mut with_materials = quad();
        with_materials.materials.push(material());

        let plain_bytes = encode(&plain).expect("encode plain");
        let bytes = encode(&with_materials).expect("encode with materials");
        assert!(bytes.starts_with(&plain_bytes));
        assert_eq!(&bytes[plain_bytes.len()..plain_bytes.len() + 2], &1u16.to_le_bytes());

        let decoded = decode(&bytes).expect("decode");
        assert_eq!(decoded.materials, vec![material()]);
    }

    #[test]
    fn truncated_vertex_data_is_rejected_before_allocation() {
        let mut bytes = Vec::new();
        put_u32(&mut bytes, 100);
        bytes.extend(vec![0u8; 10 * MeshVertex::SIZE]);
        let err = decode(&bytes).unwrap_err();
        assert_eq!(
            err,
            FormatError::CountExceedsBuffer {
                what: "vertex",
                count: 100,
                bytes: 6400,
                available: 640,
            }
        );
    }

    #[test]
    fn truncated_index_data_is_rejected() {
        let mut bytes = encode(&quad()).expect("encode");
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(
            decode(&bytes),
            Err(FormatError::CountExceedsBuffer { what: "index", .. })
        ));
    }

    #[test]
    fn empty_buffer_is_truncated() {
        assert!(matches!(decode(&[]), Err(FormatError::Truncated { .. })));
    }

    #[test]
    fn texture_name_past_end_is_rejected() {
        let mut with_materials = quad();
        with_materials.materials.push(material());
        let bytes = encode(&with_materials).expect("encode");
        // Cut inside the base color texture name.
        let geometry_len = encode(&quad()).expect("encode").len();
        let cut = geometry_len + 2 + 12 + 1 + 4;
        assert!(matches!(
            decode(&bytes[..cut]),
            Err(FormatError::TextureNameOverrun { len: 18, available: 4, .. })
        ));
    }

    #[test]
    fn single_stray_byte_after_indices_is_truncated_material_count() {
        let mut bytes = encode(&quad()).expect("encode");
        bytes.push(7);
        assert!(matches!(
            decode(&bytes),
            Err(FormatError::Truncated { what: "material count", .. })
        ));
    }

    #[test]
    fn trailing_bytes_after_materials_are_rejected() {
        let mut with_materials = quad();
        with_materials.materials.push(material());
        let mut bytes = encode(&with_materials).expect("encode");
        bytes.extend_from_slice(&[1, 2, 3]);
        assert_eq!(
            decode(&bytes).unwrap_err(),
            FormatError::TrailingBytes { count: 3 }
        );
    }

    #[test]
    fn overlong_texture_name_is_rejected_by_encoder() {
        let mut mesh = quad();
        let mut m = material();
        m.base.texture = Some("x".repeat(256));
        mesh.materials.push(m);
        assert!(matches!(
            encode(&mesh),
            Err(FormatError::TextureNameTooLong { len: 256, .. })
        ));
    }

    #[test]
    fn material_count_is_checked_before_allocation() {
        let mut bytes = encode(&quad()).expect("encode");
        let available = 2;
        bytes.extend_from_slice(&u16::MAX.to_le_bytes());
        bytes.extend_from_slice(&[0; 2]);
        assert_eq!(
            decode(&bytes).unwrap_err(),
            FormatError::CountExceedsBuffer {
                what: "material",
                count: u16::MAX.into(),
                bytes: u64::from(u16::MAX) * MIN_MATERIAL_LEN as u64,
                available,
            }
        );
    }

    #[test]
    fn smallest_material_matches_its_encoding() {
        let mut mesh = quad();
        mesh.materials.push(MaterialRecord {
            vertex_range: InclusiveRange::new(0, 3),
            index_range: InclusiveRange::new(0, 5),
            ..MaterialRecord::default()
        });
        let geometry_len = encode(&quad()).expect("encode").len();
        let bytes = encode(&mesh).expect("encode with material");
        assert_eq!(bytes.len(), geometry_len + 2 + MIN_MATERIAL_LEN);
        assert_eq!(decode(&bytes).expect("decode"), mesh);
    }

    #[test]
    fn many_vertices_with_few_indices_must_fit_16_bits() {
        // The width follows the index count only, so a far vertex is out of reach.
        let vertices: Vec<_> = (0..70_000).map(vertex).collect();
        assert_eq!(
            MeshData::from_parts(vertices.clone(), vec![0, 1, 69_999], vec![]).unwrap_err(),
            FormatError::IndexOutOfRange {
                position: 2,
                value: 69_999
            }
        );

        let wide = MeshData::new(vertices, IndexData::U32(vec![0, 1, 69_999]));
        assert_eq!(
            encode(&wide).unwrap_err(),
            FormatError::IndexOutOfRange {
                position: 2,
                value: 69_999
            }
        );
    }

    #[test]
    fn empty_texture_name_is_rejected_by_encoder() {
        let mut mesh = quad();
        let mut m = material();
        m.normal_texture = Some(String::new());
        mesh.materials.push(m);
        assert_eq!(encode(&mesh).unwrap_err(), FormatError::EmptyTextureName);
    }
}
