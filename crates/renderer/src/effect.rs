//! Shader program plus fixed render state.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bitflags::bitflags;
use corelib::{EngineError, EngineResult};

use crate::backend::{GraphicsDevice, ProgramId};
use crate::handle::{Asset, AssetHandle};

bitflags! {
    /// Fixed-function toggles bound together with a program.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct RenderState: u8 {
        const ALPHA_TRANSPARENCY = 1 << 0;
        const DEPTH_TESTING = 1 << 1;
        const DEPTH_WRITING = 1 << 2;
        const DRAW_BOTH_SIDES = 1 << 3;
    }
}

impl Default for RenderState {
    /// Opaque, depth tested and written, back faces culled.
    fn default() -> Self {
        RenderState::DEPTH_TESTING | RenderState::DEPTH_WRITING
    }
}

pub struct EffectAsset {
    device: Arc<dyn GraphicsDevice>,
    program: ProgramId,
    render_state: RenderState,
}

impl Asset for EffectAsset {
    const KIND: &'static str = "effect";
}

impl EffectAsset {
    /// Read both shader files and build a program from them.
    ///
    /// Every call produces a new effect; nothing is shared between calls with
    /// the same paths.
    pub fn load(
        device: &Arc<dyn GraphicsDevice>,
        vertex_shader: impl AsRef<Path>,
        fragment_shader: impl AsRef<Path>,
    ) -> EngineResult<AssetHandle<Self>> {
        let vertex_source = read_shader(vertex_shader.as_ref())?;
        let fragment_source = read_shader(fragment_shader.as_ref())?;
        Self::from_sources(device, &vertex_source, &fragment_source, RenderState::default())
            .inspect_err(|err| {
                log::error!(
                    "Failed to build effect from {} and {}: {}",
                    vertex_shader.as_ref().display(),
                    fragment_shader.as_ref().display(),
                    err
                )
            })
    }

    pub fn from_sources(
        device: &Arc<dyn GraphicsDevice>,
        vertex_source: &str,
        fragment_source: &str,
        render_state: RenderState,
    ) -> EngineResult<AssetHandle<Self>> {
        let program = device.create_program(vertex_source, fragment_source)?;
        Ok(AssetHandle::new(Self {
            device: Arc::clone(device),
            program,
            render_state,
        }))
    }

    pub fn bind(&self) {
        self.device.bind_program(self.program, self.render_state);
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub fn render_state(&self) -> RenderState {
        self.render_state
    }
}

impl Drop for EffectAsset {
    fn drop(&mut self) {
        self.device.release_program(self.program);
    }
}

impl fmt::Debug for EffectAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectAsset")
            .field("program", &self.program)
            .field("render_state", &self.render_state)
            .finish()
    }
}

fn read_shader(path: &Path) -> EngineResult<String> {
    std::fs::read_to_string(path).map_err(|source| {
        log::error!("Failed to read shader {}: {}", path.display(), source);
        EngineError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}
