use std::path::Path;
use std::sync::Arc;

use asset::TextureData;
use corelib::{EngineError, EngineResult};

use crate::backend::{GraphicsDevice, TextureId};
use crate::handle::{Asset, AssetHandle};

/// A texture uploaded to the device.
pub struct TextureAsset {
    device: Arc<dyn GraphicsDevice>,
    id: TextureId,
    width: u32,
    height: u32,
}

impl Asset for TextureAsset {
    const KIND: &'static str = "texture";
}

impl TextureAsset {
    pub fn load(device: &Arc<dyn GraphicsDevice>, path: impl AsRef<Path>) -> EngineResult<AssetHandle<Self>> {
        let path = path.as_ref();
        let data = TextureData::load(path).map_err(|err| {
            log::error!("Failed to load texture {}: {:#}", path.display(), err);
            EngineError::invalid_file(path, format!("{err:#}"))
        })?;
        Self::from_data(device, &data)
    }

    pub fn from_data(device: &Arc<dyn GraphicsDevice>, data: &TextureData) -> EngineResult<AssetHandle<Self>> {
        let id = device.create_texture(data)?;
        Ok(AssetHandle::new(Self {
            device: Arc::clone(device),
            id,
            width: data.width,
            height: data.height,
        }))
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Drop for TextureAsset {
    fn drop(&mut self) {
        self.device.release_texture(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessDevice;

    #[test]
    fn png_round_trips_through_the_device() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("red.png");
        image::RgbaImage::from_pixel(4, 2, image::Rgba([255, 0, 0, 255]))
            .save(&path)
            .expect("write png");

        let headless = Arc::new(HeadlessDevice::new());
        let device: Arc<dyn GraphicsDevice> = headless.clone();
        let texture = TextureAsset::load(&device, &path).expect("load texture");
        assert_eq!(texture.size(), (4, 2));
        assert_eq!(headless.live_resources(), 1);

        drop(texture);
        assert_eq!(headless.live_resources(), 0);
    }

    #[test]
    fn undecodable_file_is_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").expect("write");

        let device: Arc<dyn GraphicsDevice> = Arc::new(HeadlessDevice::new());
        assert!(matches!(
            TextureAsset::load(&device, &path),
            Err(EngineError::InvalidFile { .. })
        ));
    }
}
