//! Materials: colour constants, up to five textures and the effect that shades them.

use std::sync::Arc;

use asset::{InclusiveRange, MaterialRecord};
use corelib::EngineResult;

use crate::backend::{GraphicsDevice, TextureSlot};
use crate::config::AssetPaths;
use crate::constants::MaterialConstants;
use crate::effect::EffectAsset;
use crate::handle::{Asset, AssetHandle};
use crate::texture::TextureAsset;

pub struct MaterialAsset {
    device: Arc<dyn GraphicsDevice>,
    effect: Option<AssetHandle<EffectAsset>>,
    constants: MaterialConstants,
    textures: Vec<(TextureSlot, AssetHandle<TextureAsset>)>,
    vertex_range: InclusiveRange,
    index_range: InclusiveRange,
}

impl Asset for MaterialAsset {
    const KIND: &'static str = "material";
}

impl MaterialAsset {
    /// Build a material from its file record, loading the default effect and
    /// every texture the record names.
    pub fn from_record(
        record: &MaterialRecord,
        device: &Arc<dyn GraphicsDevice>,
        paths: &AssetPaths,
    ) -> EngineResult<AssetHandle<Self>> {
        let effect = EffectAsset::load(
            device,
            &paths.default_vertex_shader,
            &paths.default_fragment_shader,
        )?;

        let mut textures = Vec::new();
        for (slot, texture) in [
            (TextureSlot::BaseColor, &record.base.texture),
            (TextureSlot::Specular, &record.specular.texture),
            (TextureSlot::Ambient, &record.ambient.texture),
            (TextureSlot::Normal, &record.normal_texture),
            (TextureSlot::Transparency, &record.transparency.texture),
        ] {
            let Some(name) = texture else { continue };
            // Already-loaded textures are released when `textures` drops.
            let loaded = TextureAsset::load(device, paths.texture_root.join(name))?;
            textures.push((slot, loaded));
        }

        Ok(Self::with_parts(
            device,
            Some(effect),
            record,
            textures,
        ))
    }

    /// Assemble a material from already-loaded parts.
    pub fn with_parts(
        device: &Arc<dyn GraphicsDevice>,
        effect: Option<AssetHandle<EffectAsset>>,
        record: &MaterialRecord,
        textures: Vec<(TextureSlot, AssetHandle<TextureAsset>)>,
    ) -> AssetHandle<Self> {
        let constants = MaterialConstants {
            base_color: record.base.color,
            opacity: 1.0 - record.transparency.color[0],
            specular_color: record.specular.color,
            ambient_color: record.ambient.color,
            transparency: record.transparency.color,
            ..MaterialConstants::default()
        };
        AssetHandle::new(Self {
            device: Arc::clone(device),
            effect,
            constants,
            textures,
            vertex_range: record.vertex_range,
            index_range: record.index_range,
        })
    }

    /// Bind the effect, colour constants and the textures that are present.
    pub fn bind(&self) {
        if let Some(effect) = &self.effect {
            effect.bind();
        }
        for (slot, texture) in &self.textures {
            self.device.bind_texture(*slot, texture.id());
        }
        self.device.update_material_constants(&self.constants);
    }

    pub fn effect(&self) -> Option<&AssetHandle<EffectAsset>> {
        self.effect.as_ref()
    }

    pub fn constants(&self) -> &MaterialConstants {
        &self.constants
    }

    pub fn texture(&self, slot: TextureSlot) -> Option<&AssetHandle<TextureAsset>> {
        self.textures
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, texture)| texture)
    }

    pub fn vertex_range(&self) -> InclusiveRange {
        self.vertex_range
    }

    pub fn index_range(&self) -> InclusiveRange {
        self.index_range
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DeviceCommand, HeadlessDevice, ResourceKind};
    use asset::{ColorLayer, TextureData};

    fn shader_dir() -> (tempfile::TempDir, AssetPaths) {
        let dir = tempfile::tempdir().expect("tempdir");
        let vs = dir.path().join("lambert.vs");
        let fs = dir.path().join("lambert.fs");
        std::fs::write(&vs, "vertex").expect("write vs");
        std::fs::write(&fs, "fragment").expect("write fs");
        let paths = AssetPaths {
            texture_root: dir.path().to_path_buf(),
            default_vertex_shader: vs,
            default_fragment_shader: fs,
        };
        (dir, paths)
    }

    #[test]
    fn only_present_texture_slots_are_loaded_and_bound() {
        let (dir, paths) = shader_dir();
        let texture = TextureData::checkerboard(8);
        image::RgbaImage::from_raw(texture.width, texture.height, texture.data)
            .expect("image")
            .save(dir.path().join("albedo.png"))
            .expect("write png");

        let record = MaterialRecord {
            base: ColorLayer::textured([0.5, 0.5, 0.5], "albedo.png"),
            transparency: ColorLayer::new([0.25, 0.0, 0.0]),
            ..MaterialRecord::default()
        };

        let headless = Arc::new(HeadlessDevice::new());
        let device: Arc<dyn GraphicsDevice> = headless.clone();
        let material = MaterialAsset::from_record(&record, &device, &paths).expect("material");
        assert!(material.texture(TextureSlot::BaseColor).is_some());
        assert!(material.texture(TextureSlot::Normal).is_none());
        assert_eq!(material.constants().opacity, 0.75);

        material.bind();
        let commands = headless.drain_commands();
        assert!(matches!(commands[0], DeviceCommand::BindProgram { .. }));
        assert!(matches!(
            commands[1],
            DeviceCommand::BindTexture {
                slot: TextureSlot::BaseColor,
                ..
            }
        ));
        assert!(matches!(commands[2], DeviceCommand::MaterialConstants(_)));
        assert_eq!(commands.len(), 3);

        drop(material);
        assert_eq!(headless.live_resources(), 0);
    }

    #[test]
    fn failed_texture_load_releases_what_was_loaded() {
        let (_dir, paths) = shader_dir();
        let record = MaterialRecord {
            base: ColorLayer::textured([1.0; 3], "missing.png"),
            ..MaterialRecord::default()
        };
        let headless = Arc::new(HeadlessDevice::new());
        let device: Arc<dyn GraphicsDevice> = headless.clone();
        assert!(MaterialAsset::from_record(&record, &device, &paths).is_err());
        assert_eq!(headless.live_of_kind(|k| *k == ResourceKind::Program), 0);
        assert_eq!(headless.live_resources(), 0);
    }
}
