//! Renderer: reference-counted GPU assets and the double-buffered frame pipeline.
//!
//! The simulation thread builds [`RenderCommand`]s and hands them over through
//! a [`FrameSubmitter`]; the render thread drains them with a
//! [`FrameRenderer`]. All GPU work goes through a [`GraphicsDevice`].

pub mod backend;
pub mod command;
pub mod config;
pub mod constants;
pub mod effect;
pub mod handle;
pub mod material;
pub mod mesh;
pub mod pipeline;
pub mod texture;

pub use backend::{DeviceCommand, GraphicsDevice, HeadlessDevice, TextureSlot};
pub use command::RenderCommand;
pub use config::{AssetPaths, PipelineConfig};
pub use constants::{DrawCallConstants, FrameConstants, MaterialConstants};
pub use effect::{EffectAsset, RenderState};
pub use handle::{Asset, AssetHandle};
pub use material::MaterialAsset;
pub use mesh::MeshAsset;
pub use pipeline::{FrameData, FrameOutcome, FrameRenderer, FrameSubmissionPipeline, FrameSubmitter};
pub use texture::TextureAsset;
