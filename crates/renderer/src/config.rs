use std::path::PathBuf;

/// Capacity of each frame record.
pub const DEFAULT_MAX_RENDER_COMMANDS: usize = u16::MAX as usize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Commands accepted per frame; submissions past it are dropped.
    pub max_render_commands: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_render_commands: DEFAULT_MAX_RENDER_COMMANDS,
        }
    }
}

/// Where mesh loading looks for the files a mesh refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetPaths {
    /// Material texture names are relative to this directory.
    pub texture_root: PathBuf,
    pub default_vertex_shader: PathBuf,
    pub default_fragment_shader: PathBuf,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            texture_root: PathBuf::from("data/Meshes/"),
            default_vertex_shader: PathBuf::from("data/Shaders/Vertex/lambert.shader"),
            default_fragment_shader: PathBuf::from("data/Shaders/Fragment/lambert.shader"),
        }
    }
}

impl AssetPaths {
    /// Defaults re-rooted under `root`.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let defaults = Self::default();
        Self {
            texture_root: root.join(defaults.texture_root),
            default_vertex_shader: root.join(defaults.default_vertex_shader),
            default_fragment_shader: root.join(defaults.default_fragment_shader),
        }
    }
}
