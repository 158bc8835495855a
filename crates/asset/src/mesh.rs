//! CPU-side mesh representation shared by the builder and the runtime loader.

use bytemuck::{Pod, Zeroable};

use crate::format::FormatError;

/// Largest index count that is still stored with 16-bit indices.
pub const MAX_16BIT_INDEX_COUNT: usize = u16::MAX as usize;

/// One vertex as it is laid out in the mesh file and in the GPU vertex buffer.
///
/// 64 bytes: 14 floats, RGBA8 color, the material slot and explicit padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
    pub uv: [f32; 2],
    pub color: [u8; 4],
    /// Index of the material covering this vertex.
    pub material: u8,
    pub _padding: [u8; 3],
}

impl MeshVertex {
    pub const SIZE: usize = std::mem::size_of::<MeshVertex>();

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
            color: [255, 255, 255, 255],
            ..Self::default()
        }
    }

    pub fn with_color(mut self, color: [u8; 4]) -> Self {
        self.color = color;
        self
    }

    pub fn with_material(mut self, material: u8) -> Self {
        self.material = material;
        self
    }
}

/// Width of the entries in an index buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    /// The width is never stored; both sides derive it from the index count.
    /// A mesh with more than 65535 vertices but at most 65535 indices still
    /// gets 16-bit indices, so every index it uses must be below 65536.
    pub fn for_count(index_count: usize) -> Self {
        if index_count > MAX_16BIT_INDEX_COUNT {
            IndexFormat::U32
        } else {
            IndexFormat::U16
        }
    }

    pub fn size_in_bytes(&self) -> usize {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

/// Index buffer contents in the width the format selected for them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexData {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexData {
    /// Narrow `indices` to the width its length selects.
    ///
    /// Fails if the count selects 16-bit indices but a value doesn't fit.
    pub fn from_u32(indices: Vec<u32>) -> Result<Self, FormatError> {
        match IndexFormat::for_count(indices.len()) {
            IndexFormat::U32 => Ok(IndexData::U32(indices)),
            IndexFormat::U16 => indices
                .iter()
                .enumerate()
                .map(|(position, &value)| {
                    u16::try_from(value)
                        .map_err(|_| FormatError::IndexOutOfRange { position, value })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(IndexData::U16),
        }
    }

    pub fn format(&self) -> IndexFormat {
        match self {
            IndexData::U16(_) => IndexFormat::U16,
            IndexData::U32(_) => IndexFormat::U32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexData::U16(v) => v.len(),
            IndexData::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, position: usize) -> Option<u32> {
        match self {
            IndexData::U16(v) => v.get(position).map(|&i| u32::from(i)),
            IndexData::U32(v) => v.get(position).copied(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }
}

impl Default for IndexData {
    fn default() -> Self {
        IndexData::U16(Vec::new())
    }
}

/// Inclusive `[first, last]` range of vertices or indices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InclusiveRange {
    pub first: u32,
    pub last: u32,
}

impl InclusiveRange {
    pub fn new(first: u32, last: u32) -> Self {
        Self { first, last }
    }

    /// Number of elements covered, `None` for an inverted range.
    pub fn count(&self) -> Option<u32> {
        self.last
            .checked_sub(self.first)
            .and_then(|d| d.checked_add(1))
    }

    pub fn fits_within(&self, len: usize) -> bool {
        self.first <= self.last && (self.last as usize) < len
    }
}

/// A color triple with its optional texture path. An empty path means no texture.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColorLayer {
    pub color: [f32; 3],
    pub texture: Option<String>,
}

impl ColorLayer {
    pub fn new(color: [f32; 3]) -> Self {
        Self {
            color,
            texture: None,
        }
    }

    /// An empty `texture` leaves the slot unset.
    pub fn textured(color: [f32; 3], texture: impl Into<String>) -> Self {
        Self {
            color,
            texture: Some(texture.into()).filter(|name| !name.is_empty()),
        }
    }
}

/// Material description as stored in a mesh file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialRecord {
    pub base: ColorLayer,
    pub specular: ColorLayer,
    pub ambient: ColorLayer,
    pub transparency: ColorLayer,
    pub normal_texture: Option<String>,
    pub vertex_range: InclusiveRange,
    pub index_range: InclusiveRange,
}

/// Indexed triangle mesh plus the materials covering its sub-ranges.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: IndexData,
    pub materials: Vec<MaterialRecord>,
}

impl MeshData {
    pub fn new(vertices: Vec<MeshVertex>, indices: IndexData) -> Self {
        Self {
            vertices,
            indices,
            materials: Vec::new(),
        }
    }

    /// Build from wide indices, narrowing them to the width the count selects.
    pub fn from_parts(
        vertices: Vec<MeshVertex>,
        indices: Vec<u32>,
        materials: Vec<MaterialRecord>,
    ) -> Result<Self, FormatError> {
        Ok(Self {
            vertices,
            indices: IndexData::from_u32(indices)?,
            materials,
        })
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Returns `true` if both vertex and index buffers are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.vertices.is_empty() && !self.indices.is_empty()
    }

    /// Check the structural invariants a loader relies on: whole triangles,
    /// indices inside the vertex buffer, material ranges inside the buffers.
    pub fn validate(&self) -> Result<(), FormatError> {
        let index_count = self.indices.len();
        if index_count % 3 != 0 {
            return Err(FormatError::PartialTriangle { index_count });
        }
        let vertex_count = self.vertices.len();
        if let Some((position, value)) = self
            .indices
            .iter()
            .enumerate()
            .find(|&(_, value)| value as usize >= vertex_count)
        {
            return Err(FormatError::IndexBeyondVertices {
                position,
                value,
                vertex_count,
            });
        }
        for (material, record) in self.materials.iter().enumerate() {
            for (what, range, len) in [
                ("vertex", record.vertex_range, vertex_count),
                ("index", record.index_range, index_count),
            ] {
                if !range.fits_within(len) {
                    return Err(FormatError::MaterialRangeOutOfBounds {
                        material,
                        what,
                        first: range.first,
                        last: range.last,
                        len,
                    });
                }
            }
        }
        Ok(())
    }
}
