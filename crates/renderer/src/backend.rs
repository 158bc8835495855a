//! Graphics backend contract and the headless implementation.
//!
//! Assets only talk to the GPU through [`GraphicsDevice`]: create and release
//! buffers, textures and programs, update constant blocks, bind, draw, clear
//! and present. [`HeadlessDevice`] implements it without a GPU. It checks its
//! inputs the way a driver would, tracks every live resource and, unless
//! recording is switched off, records the command stream so callers can
//! inspect what a frame did.

use std::collections::HashMap;

use asset::{IndexData, IndexFormat, MeshVertex, TextureData};
use corelib::{EngineError, EngineResult};
use parking_lot::Mutex;

use crate::constants::{DrawCallConstants, FrameConstants, MaterialConstants};
use crate::effect::RenderState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexBufferId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IndexBufferId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Texture units a material binds to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    BaseColor = 0,
    Normal = 1,
    Specular = 2,
    Ambient = 3,
    Transparency = 4,
}

pub trait GraphicsDevice: Send + Sync {
    fn create_vertex_buffer(&self, vertices: &[MeshVertex]) -> EngineResult<VertexBufferId>;
    fn create_index_buffer(&self, indices: &IndexData) -> EngineResult<IndexBufferId>;
    fn create_texture(&self, texture: &TextureData) -> EngineResult<TextureId>;
    fn create_program(&self, vertex_source: &str, fragment_source: &str) -> EngineResult<ProgramId>;

    fn release_vertex_buffer(&self, id: VertexBufferId);
    fn release_index_buffer(&self, id: IndexBufferId);
    fn release_texture(&self, id: TextureId);
    fn release_program(&self, id: ProgramId);

    fn update_frame_constants(&self, constants: &FrameConstants);
    fn update_draw_constants(&self, constants: &DrawCallConstants);
    fn update_material_constants(&self, constants: &MaterialConstants);

    fn bind_program(&self, program: ProgramId, state: RenderState);
    fn bind_texture(&self, slot: TextureSlot, texture: TextureId);

    /// Draw `index_count` indices starting at `first_index` as a triangle list.
    fn draw_indexed(
        &self,
        vertices: VertexBufferId,
        indices: IndexBufferId,
        format: IndexFormat,
        first_index: u32,
        index_count: u32,
    );

    fn clear(&self, color: [f32; 4]);
    fn present(&self);
}

/// One entry of the headless command stream.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCommand {
    FrameConstants(FrameConstants),
    DrawConstants(DrawCallConstants),
    MaterialConstants(MaterialConstants),
    BindProgram {
        program: ProgramId,
        state: RenderState,
    },
    BindTexture {
        slot: TextureSlot,
        texture: TextureId,
    },
    Clear([f32; 4]),
    Draw {
        vertices: VertexBufferId,
        indices: IndexBufferId,
        format: IndexFormat,
        first_index: u32,
        index_count: u32,
    },
    Present,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    VertexBuffer { vertex_count: usize },
    IndexBuffer { index_count: usize },
    Texture { width: u32, height: u32 },
    Program,
}

#[derive(Default)]
struct HeadlessState {
    next_id: u32,
    live: HashMap<u32, ResourceKind>,
    created: usize,
    released: usize,
    draw_calls: u64,
    commands: Vec<DeviceCommand>,
}

impl HeadlessState {
    fn create(&mut self, kind: ResourceKind) -> u32 {
        self.next_id += 1;
        self.live.insert(self.next_id, kind);
        self.created += 1;
        self.next_id
    }

    fn release(&mut self, id: u32, expected: &str) {
        match self.live.remove(&id) {
            Some(_) => self.released += 1,
            None => log::warn!("Release of unknown {} {}", expected, id),
        }
    }

    fn is_live(&self, id: u32) -> bool {
        self.live.contains_key(&id)
    }
}

/// A [`GraphicsDevice`] that needs no GPU.
pub struct HeadlessDevice {
    state: Mutex<HeadlessState>,
    recording: bool,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::with_recording(true)
    }
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device that only records commands when `recording` is set. A
    /// recording device keeps every command until [`drain_commands`] is
    /// called, so long-running loops should turn it off.
    ///
    /// [`drain_commands`]: HeadlessDevice::drain_commands
    pub fn with_recording(recording: bool) -> Self {
        Self {
            state: Mutex::new(HeadlessState::default()),
            recording,
        }
    }

    /// Resources created and not yet released.
    pub fn live_resources(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn live_of_kind(&self, matches: impl Fn(&ResourceKind) -> bool) -> usize {
        self.state.lock().live.values().filter(|k| matches(k)).count()
    }

    pub fn created_resources(&self) -> usize {
        self.state.lock().created
    }

    pub fn released_resources(&self) -> usize {
        self.state.lock().released
    }

    /// Draws issued since creation, counted whether or not recording is on.
    pub fn draw_calls(&self) -> u64 {
        self.state.lock().draw_calls
    }

    /// Take the recorded command stream, leaving it empty.
    pub fn drain_commands(&self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.state.lock().commands)
    }

    fn record(&self, command: DeviceCommand) {
        if self.recording {
            self.state.lock().commands.push(command);
        }
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_vertex_buffer(&self, vertices: &[MeshVertex]) -> EngineResult<VertexBufferId> {
        if vertices.is_empty() {
            return Err(EngineError::backend("create vertex buffer", "buffer size is zero"));
        }
        let id = self.state.lock().create(ResourceKind::VertexBuffer {
            vertex_count: vertices.len(),
        });
        log::trace!("Created vertex buffer {} ({} vertices)", id, vertices.len());
        Ok(VertexBufferId(id))
    }

    fn create_index_buffer(&self, indices: &IndexData) -> EngineResult<IndexBufferId> {
        if indices.is_empty() {
            return Err(EngineError::backend("create index buffer", "buffer size is zero"));
        }
        let id = self.state.lock().create(ResourceKind::IndexBuffer {
            index_count: indices.len(),
        });
        log::trace!("Created index buffer {} ({} indices)", id, indices.len());
        Ok(IndexBufferId(id))
    }

    fn create_texture(&self, texture: &TextureData) -> EngineResult<TextureId> {
        if !texture.is_valid() {
            return Err(EngineError::backend(
                "create texture",
                format!(
                    "{}x{} texture with {} bytes of pixel data",
                    texture.width,
                    texture.height,
                    texture.data.len()
                ),
            ));
        }
        let id = self.state.lock().create(ResourceKind::Texture {
            width: texture.width,
            height: texture.height,
        });
        Ok(TextureId(id))
    }

    fn create_program(&self, vertex_source: &str, fragment_source: &str) -> EngineResult<ProgramId> {
        for (stage, source) in [("vertex", vertex_source), ("fragment", fragment_source)] {
            if source.trim().is_empty() {
                return Err(EngineError::backend(
                    "compile shader program",
                    format!("{stage} shader source is empty"),
                ));
            }
        }
        Ok(ProgramId(self.state.lock().create(ResourceKind::Program)))
    }

    fn release_vertex_buffer(&self, id: VertexBufferId) {
        self.state.lock().release(id.0, "vertex buffer");
    }

    fn release_index_buffer(&self, id: IndexBufferId) {
        self.state.lock().release(id.0, "index buffer");
    }

    fn release_texture(&self, id: TextureId) {
        self.state.lock().release(id.0, "texture");
    }

    fn release_program(&self, id: ProgramId) {
        self.state.lock().release(id.0, "program");
    }

    fn update_frame_constants(&self, constants: &FrameConstants) {
        self.record(DeviceCommand::FrameConstants(*constants));
    }

    fn update_draw_constants(&self, constants: &DrawCallConstants) {
        self.record(DeviceCommand::DrawConstants(*constants));
    }

    fn update_material_constants(&self, constants: &MaterialConstants) {
        self.record(DeviceCommand::MaterialConstants(*constants));
    }

    fn bind_program(&self, program: ProgramId, state: RenderState) {
        self.record(DeviceCommand::BindProgram { program, state });
    }

    fn bind_texture(&self, slot: TextureSlot, texture: TextureId) {
        self.record(DeviceCommand::BindTexture { slot, texture });
    }

    fn draw_indexed(
        &self,
        vertices: VertexBufferId,
        indices: IndexBufferId,
        format: IndexFormat,
        first_index: u32,
        index_count: u32,
    ) {
        let mut state = self.state.lock();
        if !state.is_live(vertices.0) || !state.is_live(indices.0) {
            log::error!(
                "Draw with released buffers (vertex {}, index {})",
                vertices.0,
                indices.0
            );
        }
        state.draw_calls += 1;
        if self.recording {
            state.commands.push(DeviceCommand::Draw {
                vertices,
                indices,
                format,
                first_index,
                index_count,
            });
        }
    }

    fn clear(&self, color: [f32; 4]) {
        self.record(DeviceCommand::Clear(color));
    }

    fn present(&self) {
        self.record(DeviceCommand::Present);
    }
}
