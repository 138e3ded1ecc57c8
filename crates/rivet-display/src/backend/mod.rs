//! The seam between the backend-agnostic display core and a concrete GPU API.
//!
//! `Display` owns one `GpuBackend` and drives it from a single thread. Backends only
//! execute what they are told: state diffing, topology emulation and resource
//! bookkeeping stay in the core.

mod error;
pub mod recording;
pub mod wgpu;

pub use error::BackendError;
pub use recording::{Call, RecordingBackend};

use crate::device::modes::{DisplayMode, DisplayRect};
use crate::draw::vertex::SpriteVertex;
use crate::pixel::{FormatSupport, Palette, PixelFormat, Region};
use crate::state::{
    BlendState, DepthStencilState, PixelConstants, RasterState, SamplerState, VertexConstants,
};

/// Backend-issued texture id.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct BackendTexture(pub u64);

/// Backend-issued buffer id.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct BackendBuffer(pub u64);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor: u32,
    pub device: u32,
    pub backend: String,
    pub driver: String,
}

/// One physical output (monitor) as seen by the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDesc {
    pub name: String,
    pub desktop: DisplayRect,
    pub modes: Vec<DisplayMode>,
    /// `None` if the backend cannot query the active mode directly.
    pub current: Option<DisplayMode>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SwapEffect {
    /// Flip-model presentation; may be unavailable for some configurations.
    FlipDiscard,
    /// Legacy blit-model presentation; always available.
    Discard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwapChainDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub buffer_count: u32,
    pub effect: SwapEffect,
    pub allow_tearing: bool,
    pub vsync: bool,
    pub windowed: bool,
    pub refresh_rate: u32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureUsage {
    /// Shader input only.
    Sampled,
    /// Shader input and colour target.
    RenderTarget,
    /// Depth buffer paired with a render target.
    Depth,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub mip_levels: u32,
    pub usage: TextureUsage,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Topology {
    TriangleList,
    TriangleStrip,
    /// Only issued when `supports_native_fans` is true.
    TriangleFan,
}

/// Where subsequent draws land.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RenderTarget {
    BackBuffer,
    Texture {
        color: BackendTexture,
        depth: Option<BackendTexture>,
    },
}

/// Back-buffer pixels copied to the CPU, rows tightly packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBack {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Minimal capability-oriented GPU interface.
pub trait GpuBackend {
    // ── capabilities ──────────────────────────────────────────────────────

    fn adapter_info(&self) -> AdapterInfo;
    fn format_support(&self, format: PixelFormat) -> FormatSupport;
    fn supports_tearing(&self) -> bool;
    fn supports_native_fans(&self) -> bool;
    fn max_texture_size(&self) -> u32;
    /// Hardware palette slots; `0` means paletted textures are unsupported.
    fn palette_slots(&self) -> usize;
    fn outputs(&self) -> Vec<OutputDesc>;

    // ── swapchain ─────────────────────────────────────────────────────────

    fn create_swapchain(&mut self, desc: &SwapChainDesc) -> Result<(), BackendError>;
    fn resize_swapchain(&mut self, width: u32, height: u32) -> Result<(), BackendError>;
    /// Recreates the back-buffer view and a matching depth buffer. Returns their
    /// shared extent.
    fn create_back_buffer_targets(&mut self) -> Result<(u32, u32), BackendError>;
    /// Leaves exclusive fullscreen and drops the swapchain.
    fn release_swapchain(&mut self);

    // ── resources ─────────────────────────────────────────────────────────

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<BackendTexture, BackendError>;
    /// `data` rows are `bytes_per_row` apart and cover exactly `region`.
    fn write_texture(
        &mut self,
        texture: BackendTexture,
        mip_level: u32,
        region: Region,
        data: &[u8],
        bytes_per_row: u32,
    ) -> Result<(), BackendError>;
    fn destroy_texture(&mut self, texture: BackendTexture);

    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> Result<BackendBuffer, BackendError>;
    fn write_buffer(&mut self, buffer: BackendBuffer, offset: u64, data: &[u8]);
    fn destroy_buffer(&mut self, buffer: BackendBuffer);

    fn load_palette(&mut self, slot: usize, palette: &Palette);
    fn set_active_palette(&mut self, slot: usize);

    // ── state ─────────────────────────────────────────────────────────────

    fn apply_raster(&mut self, state: &RasterState);
    fn apply_depth_stencil(&mut self, state: &DepthStencilState);
    fn apply_blend(&mut self, state: &BlendState);
    fn apply_sampler(&mut self, unit: usize, state: &SamplerState);
    fn bind_texture(&mut self, unit: usize, texture: Option<BackendTexture>);
    fn apply_vertex_constants(&mut self, constants: &VertexConstants);
    fn apply_pixel_constants(&mut self, constants: &PixelConstants);

    // ── frame ─────────────────────────────────────────────────────────────

    /// Acquires the next back buffer. `Ok(false)` means skip this frame.
    fn begin_frame(&mut self) -> Result<bool, BackendError>;
    fn set_render_target(&mut self, target: RenderTarget);
    fn clear(&mut self, color: Option<[f32; 4]>, depth: Option<f32>);
    fn draw_sprites(&mut self, topology: Topology, vertices: &[SpriteVertex], indices: Option<&[u16]>);
    fn draw_model(
        &mut self,
        vertices: BackendBuffer,
        indices: BackendBuffer,
        first_index: u32,
        index_count: u32,
    );
    fn present(&mut self, sync_interval: u32) -> Result<(), BackendError>;
    /// Copies the back buffer as drawn so far this frame. `Ok(None)` when no frame is
    /// acquired or the back buffer cannot be read in a known format.
    fn read_back_buffer(&mut self) -> Result<Option<ReadBack>, BackendError>;
}
