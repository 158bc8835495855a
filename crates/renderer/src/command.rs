use corelib::{EngineError, EngineResult, Mat4};

use crate::effect::EffectAsset;
use crate::handle::AssetHandle;
use crate::mesh::MeshAsset;

/// Draw one mesh with one transform, optionally overriding its effect.
///
/// Holds a counted reference to the mesh (and effect) from
/// [`set_render_command`](Self::set_render_command) until
/// [`clean_up`](Self::clean_up) or drop.
#[derive(Debug, Default)]
pub struct RenderCommand {
    mesh: Option<AssetHandle<MeshAsset>>,
    effect: Option<AssetHandle<EffectAsset>>,
    pub transform: Mat4,
}

impl RenderCommand {
    pub fn new(
        mesh: Option<&AssetHandle<MeshAsset>>,
        effect: Option<&AssetHandle<EffectAsset>>,
        transform: Mat4,
    ) -> EngineResult<Self> {
        let mut command = Self {
            transform,
            ..Self::default()
        };
        command.set_render_command(mesh, effect)?;
        Ok(command)
    }

    /// Take references to `mesh` and `effect`. Fails without touching any
    /// count when the mesh is absent.
    pub fn set_render_command(
        &mut self,
        mesh: Option<&AssetHandle<MeshAsset>>,
        effect: Option<&AssetHandle<EffectAsset>>,
    ) -> EngineResult<()> {
        let mesh = mesh.ok_or(EngineError::MissingMesh)?;
        self.mesh = Some(mesh.increment_reference_count());
        self.effect = effect.map(AssetHandle::increment_reference_count);
        Ok(())
    }

    /// Release whatever references are held.
    pub fn clean_up(&mut self) {
        if let Some(mesh) = self.mesh.take() {
            mesh.decrement_reference_count();
        }
        if let Some(effect) = self.effect.take() {
            effect.decrement_reference_count();
        }
    }

    /// Bind the override effect, if any, and draw the mesh.
    pub fn draw(&self) {
        let Some(mesh) = &self.mesh else {
            log::warn!("Render command without a mesh");
            return;
        };
        if let Some(effect) = &self.effect {
            effect.bind();
        }
        mesh.draw();
    }

    pub fn mesh(&self) -> Option<&AssetHandle<MeshAsset>> {
        self.mesh.as_ref()
    }

    pub fn effect(&self) -> Option<&AssetHandle<EffectAsset>> {
        self.effect.as_ref()
    }
}
