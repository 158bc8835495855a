//! CPU-side asset data and parsers.
//!
//! `format` is the binary mesh file codec shared by the offline builder and
//! the runtime loader. `obj`/`mtl` read Wavefront sources for the builder and
//! `texture` decodes images to RGBA8.

pub mod format;
pub mod mesh;
pub mod mtl;
pub mod obj;
pub mod texture;

pub use format::{FormatError, decode, encode};
pub use mesh::{
    ColorLayer, InclusiveRange, IndexData, IndexFormat, MaterialRecord, MeshData, MeshVertex,
};
pub use texture::TextureData;
