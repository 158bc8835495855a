//! Texture pixel data decoded to RGBA8 before upload.

use std::path::Path;

use anyhow::{Context, Result, ensure};

/// Texture data in CPU-friendly format before GPU upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8,
}

impl TextureFormat {
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8 => 4,
        }
    }
}

impl TextureData {
    /// Wrap raw RGBA8 pixels, checking the length against the dimensions.
    pub fn new_rgba8(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        ensure!(
            data.len() == expected,
            "RGBA8 texture {}x{} needs {} bytes, got {}",
            width,
            height,
            expected,
            data.len()
        );
        Ok(Self {
            data,
            width,
            height,
            format: TextureFormat::Rgba8,
        })
    }

    /// Decode an image file (any format the `image` features enable) to RGBA8.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading texture from {}", path.display());

        let img = image::open(path)
            .with_context(|| format!("Failed to decode image {}", path.display()))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        log::info!("Loaded texture {} ({}x{})", path.display(), width, height);
        Self::new_rgba8(width, height, rgba.into_raw())
    }

    /// Checkerboard of 8-pixel white and grey squares.
    pub fn checkerboard(size: u32) -> Self {
        let mut data = Vec::with_capacity(size as usize * size as usize * 4);
        for y in 0..size {
            for x in 0..size {
                let shade = if ((x / 8) + (y / 8)) % 2 == 0 { 255 } else { 128 };
                data.extend_from_slice(&[shade, shade, shade, 255]);
            }
        }
        Self {
            data,
            width: size,
            height: size,
            format: TextureFormat::Rgba8,
        }
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        self.format.bytes_per_pixel()
    }

    /// Non-empty and sized to match its dimensions.
    pub fn is_valid(&self) -> bool {
        let expected = self.width as usize * self.height as usize * self.bytes_per_pixel() as usize;
        self.data.len() == expected && self.width > 0 && self.height > 0
    }
}
