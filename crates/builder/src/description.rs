//! JSON mesh description accepted by the builder.
//!
//! ```json
//! {
//!   "vertices": [
//!     { "position": [0, 0, 0], "uv": [0, 0], "color": [1, 0, 0, 1] }
//!   ],
//!   "elements": [[0, 1, 2]],
//!   "materials": [
//!     { "base": { "color": [1, 1, 1], "texture": "brick.png" },
//!       "vertex_range": [0, 2], "index_range": [0, 2] }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use asset::{ColorLayer, InclusiveRange, MaterialRecord, MeshData, MeshVertex};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeshDescription {
    pub vertices: Vec<VertexDescription>,
    /// Triangles as triples of vertex indices.
    pub elements: Vec<[u32; 3]>,
    #[serde(default)]
    pub materials: Vec<MaterialDescription>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VertexDescription {
    pub position: [f32; 3],
    #[serde(default)]
    pub normal: [f32; 3],
    #[serde(default)]
    pub tangent: [f32; 3],
    #[serde(default)]
    pub bitangent: [f32; 3],
    #[serde(default)]
    pub uv: [f32; 2],
    /// RGBA in 0..1, stored as bytes.
    #[serde(default = "white")]
    pub color: [f32; 4],
    #[serde(default)]
    pub material: u8,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerDescription {
    #[serde(default)]
    pub color: [f32; 3],
    #[serde(default)]
    pub texture: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaterialDescription {
    #[serde(default)]
    pub base: LayerDescription,
    #[serde(default)]
    pub specular: LayerDescription,
    #[serde(default)]
    pub ambient: LayerDescription,
    #[serde(default)]
    pub transparency: LayerDescription,
    #[serde(default)]
    pub normal_texture: Option<String>,
    pub vertex_range: [u32; 2],
    pub index_range: [u32; 2],
}

fn white() -> [f32; 4] {
    [1.0; 4]
}

fn color_byte(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl From<LayerDescription> for ColorLayer {
    fn from(layer: LayerDescription) -> Self {
        ColorLayer {
            color: layer.color,
            // An empty name means no texture.
            texture: layer.texture.filter(|name| !name.is_empty()),
        }
    }
}

impl MeshDescription {
    pub fn from_json(source: &str) -> Result<Self> {
        serde_json::from_str(source).context("Malformed mesh description")
    }

    pub fn into_mesh_data(self) -> Result<MeshData> {
        let vertices = self
            .vertices
            .into_iter()
            .map(|v| MeshVertex {
                position: v.position,
                normal: v.normal,
                tangent: v.tangent,
                bitangent: v.bitangent,
                uv: v.uv,
                color: v.color.map(color_byte),
                material: v.material,
                _padding: [0; 3],
            })
            .collect();
        let indices = self.elements.into_iter().flatten().collect();
        let materials = self
            .materials
            .into_iter()
            .map(|m| MaterialRecord {
                base: m.base.into(),
                specular: m.specular.into(),
                ambient: m.ambient.into(),
                transparency: m.transparency.into(),
                normal_texture: m.normal_texture.filter(|name| !name.is_empty()),
                vertex_range: InclusiveRange::new(m.vertex_range[0], m.vertex_range[1]),
                index_range: InclusiveRange::new(m.index_range[0], m.index_range[1]),
            })
            .collect();

        let mesh = MeshData::from_parts(vertices, indices, materials)?;
        mesh.validate().context("Mesh description is inconsistent")?;
        Ok(mesh)
    }
}
