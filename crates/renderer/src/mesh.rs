//! Meshes uploaded to the device, with the materials covering their sub-ranges.

use std::path::Path;
use std::sync::Arc;

use asset::{FormatError, IndexFormat, MeshData};
use corelib::{EngineError, EngineResult};

use crate::backend::{GraphicsDevice, IndexBufferId, VertexBufferId};
use crate::config::AssetPaths;
use crate::handle::{Asset, AssetHandle};
use crate::material::MaterialAsset;

pub struct MeshAsset {
    device: Arc<dyn GraphicsDevice>,
    vertex_buffer: VertexBufferId,
    index_buffer: IndexBufferId,
    index_format: IndexFormat,
    index_count: u32,
    vertex_count: usize,
    materials: Vec<AssetHandle<MaterialAsset>>,
}

impl Asset for MeshAsset {
    const KIND: &'static str = "mesh";
}

impl MeshAsset {
    /// Read and decode a binary mesh file, then upload it.
    pub fn load(
        path: impl AsRef<Path>,
        device: &Arc<dyn GraphicsDevice>,
        paths: &AssetPaths,
    ) -> EngineResult<AssetHandle<Self>> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| {
            log::error!("Failed to read mesh file {}: {}", path.display(), source);
            EngineError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let data = asset::decode(&bytes)
            .and_then(|data| data.validate().map(|()| data))
            .map_err(|err| {
                log::error!("Failed to load mesh {}: {}", path.display(), err);
                format_error(path, err)
            })?;

        log::info!(
            "Loaded mesh {} ({} vertices, {} triangles, {} materials)",
            path.display(),
            data.vertices.len(),
            data.triangle_count(),
            data.materials.len()
        );
        Self::from_data(&data, device, paths)
    }

    /// Upload decoded mesh data and build its materials.
    pub fn from_data(
        data: &MeshData,
        device: &Arc<dyn GraphicsDevice>,
        paths: &AssetPaths,
    ) -> EngineResult<AssetHandle<Self>> {
        let index_count = u32::try_from(data.indices.len()).map_err(|_| {
            EngineError::backend(
                "create index buffer",
                format!("{} indices exceed the draw range", data.indices.len()),
            )
        })?;

        let materials = data
            .materials
            .iter()
            .map(|record| MaterialAsset::from_record(record, device, paths))
            .collect::<EngineResult<Vec<_>>>()?;

        let vertex_buffer = device.create_vertex_buffer(&data.vertices)?;
        let index_buffer = match device.create_index_buffer(&data.indices) {
            Ok(id) => id,
            Err(err) => {
                device.release_vertex_buffer(vertex_buffer);
                return Err(err);
            }
        };

        Ok(AssetHandle::new(Self {
            device: Arc::clone(device),
            vertex_buffer,
            index_buffer,
            index_format: data.indices.format(),
            index_count,
            vertex_count: data.vertices.len(),
            materials,
        }))
    }

    /// One draw per material over its index range, or one draw over
    /// everything when the mesh has no materials.
    pub fn draw(&self) {
        if self.materials.is_empty() {
            self.device.draw_indexed(
                self.vertex_buffer,
                self.index_buffer,
                self.index_format,
                0,
                self.index_count,
            );
            return;
        }

        for material in &self.materials {
            let range = material.index_range();
            let Some(count) = range.count() else {
                log::warn!("Skipping material with inverted index range {:?}", range);
                continue;
            };
            material.bind();
            self.device.draw_indexed(
                self.vertex_buffer,
                self.index_buffer,
                self.index_format,
                range.first,
                count,
            );
        }
    }

    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn index_format(&self) -> IndexFormat {
        self.index_format
    }

    pub fn materials(&self) -> &[AssetHandle<MaterialAsset>] {
        &self.materials
    }
}

impl Drop for MeshAsset {
    fn drop(&mut self) {
        self.device.release_vertex_buffer(self.vertex_buffer);
        self.device.release_index_buffer(self.index_buffer);
    }
}

fn format_error(path: &Path, err: FormatError) -> EngineError {
    if err.is_allocation_failure() {
        EngineError::OutOfMemory {
            what: format!("mesh data for {}", path.display()),
        }
    } else {
        EngineError::invalid_file(path, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DeviceCommand, HeadlessDevice};
    use asset::{IndexData, InclusiveRange, MaterialRecord, MeshVertex};

    fn quad() -> MeshData {
        MeshData::new(
            vec![MeshVertex::default(); 4],
            IndexData::U16(vec![0, 1, 2, 0, 2, 3]),
        )
    }

    fn draws(commands: &[DeviceCommand]) -> Vec<(u32, u32)> {
        commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::Draw {
                    first_index,
                    index_count,
                    ..
                } => Some((*first_index, *index_count)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn mesh_without_materials_draws_everything_once() {
        let headless = Arc::new(HeadlessDevice::new());
        let device: Arc<dyn GraphicsDevice> = headless.clone();
        let mesh = MeshAsset::from_data(&quad(), &device, &AssetPaths::default()).expect("mesh");
        assert_eq!(mesh.triangle_count(), 2);

        mesh.draw();
        assert_eq!(draws(&headless.drain_commands()), vec![(0, 6)]);

        drop(mesh);
        assert_eq!(headless.live_resources(), 0);
    }

    #[test]
    fn each_material_draws_its_index_range() {
        let dir = tempfile::tempdir().expect("tempdir");
        let vs = dir.path().join("v.shader");
        let fs = dir.path().join("f.shader");
        std::fs::write(&vs, "vertex").expect("write vs");
        std::fs::write(&fs, "fragment").expect("write fs");
        let paths = AssetPaths {
            texture_root: dir.path().to_path_buf(),
            default_vertex_shader: vs,
            default_fragment_shader: fs,
        };

        let mut data = quad();
        for (first, last) in [(0, 2), (3, 5)] {
            data.materials.push(MaterialRecord {
                vertex_range: InclusiveRange::new(0, 3),
                index_range: InclusiveRange::new(first, last),
                ..MaterialRecord::default()
            });
        }

        let headless = Arc::new(HeadlessDevice::new());
        let device: Arc<dyn GraphicsDevice> = headless.clone();
        let mesh = MeshAsset::from_data(&data, &device, &paths).expect("mesh");
        assert_eq!(mesh.materials().len(), 2);

        mesh.draw();
        assert_eq!(draws(&headless.drain_commands()), vec![(0, 3), (3, 3)]);

        drop(mesh);
        assert_eq!(headless.live_resources(), 0);
    }

    #[test]
    fn truncated_file_is_invalid_and_names_the_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.mesh");
        let mut bytes = asset::encode(&quad()).expect("encode");
        bytes.truncate(bytes.len() - 5);
        std::fs::write(&path, bytes).expect("write");

        let device: Arc<dyn GraphicsDevice> = Arc::new(HeadlessDevice::new());
        match MeshAsset::load(&path, &device, &AssetPaths::default()) {
            Err(EngineError::InvalidFile { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let device: Arc<dyn GraphicsDevice> = Arc::new(HeadlessDevice::new());
        assert!(matches!(
            MeshAsset::load("nowhere/box.mesh", &device, &AssetPaths::default()),
            Err(EngineError::Io { .. })
        ));
    }

    #[test]
    fn allocation_failure_is_out_of_memory_and_other_errors_are_invalid_files() {
        let path = Path::new("meshes/huge.mesh");
        let err = format_error(path, FormatError::AllocationFailed { what: "the vertex data" });
        assert!(matches!(&err, EngineError::OutOfMemory { what } if what.contains("huge.mesh")));

        let err = format_error(path, FormatError::TrailingBytes { count: 2 });
        assert!(matches!(err, EngineError::InvalidFile { .. }));
    }
}
