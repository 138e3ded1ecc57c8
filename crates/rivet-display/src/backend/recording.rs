//! Headless backend that records every call it receives.
//!
//! Used by the unit tests and by tooling that wants to inspect what the display core
//! would send to a GPU. Capabilities and failure points are plain public fields.

use std::collections::{HashMap, HashSet};

use crate::draw::vertex::SpriteVertex;
use crate::pixel::{FormatSupport, Palette, PixelFormat, Region};
use crate::state::{
    BlendState, DepthStencilState, PixelConstants, RasterState, SamplerState, VertexConstants,
};

use super::{
    AdapterInfo, BackendBuffer, BackendError, BackendTexture, BufferKind, GpuBackend, OutputDesc,
    ReadBack, RenderTarget, SwapChainDesc, SwapEffect, TextureDesc, Topology,
};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateSwapChain(SwapChainDesc),
    ResizeSwapChain { width: u32, height: u32 },
    CreateBackBufferTargets { width: u32, height: u32 },
    ReleaseSwapChain,
    CreateTexture(TextureDesc, BackendTexture),
    WriteTexture {
        texture: BackendTexture,
        mip_level: u32,
        region: Region,
        bytes_per_row: u32,
        data: Vec<u8>,
    },
    DestroyTexture(BackendTexture),
    CreateBuffer {
        kind: BufferKind,
        size: u64,
        buffer: BackendBuffer,
    },
    WriteBuffer {
        buffer: BackendBuffer,
        offset: u64,
        data: Vec<u8>,
    },
    DestroyBuffer(BackendBuffer),
    LoadPalette { slot: usize },
    SetActivePalette { slot: usize },
    Raster(RasterState),
    DepthStencil(DepthStencilState),
    Blend(BlendState),
    Sampler { unit: usize, state: SamplerState },
    BindTexture {
        unit: usize,
        texture: Option<BackendTexture>,
    },
    VertexConstants(Box<VertexConstants>),
    PixelConstants(PixelConstants),
    BeginFrame,
    SetRenderTarget(RenderTarget),
    Clear {
        color: Option<[f32; 4]>,
        depth: Option<f32>,
    },
    DrawSprites {
        topology: Topology,
        vertex_count: usize,
        indices: Option<Vec<u16>>,
    },
    DrawModel {
        vertices: BackendBuffer,
        indices: BackendBuffer,
        first_index: u32,
        index_count: u32,
    },
    Present { sync_interval: u32 },
    ReadBackBuffer,
}

impl Call {
    /// Short, stable name used by ordering assertions.
    pub fn name(&self) -> &'static str {
        match self {
            Call::CreateSwapChain(_) => "create_swapchain",
            Call::ResizeSwapChain { .. } => "resize_swapchain",
            Call::CreateBackBufferTargets { .. } => "create_back_buffer_targets",
            Call::ReleaseSwapChain => "release_swapchain",
            Call::CreateTexture(..) => "create_texture",
            Call::WriteTexture { .. } => "write_texture",
            Call::DestroyTexture(_) => "destroy_texture",
            Call::CreateBuffer { .. } => "create_buffer",
            Call::WriteBuffer { .. } => "write_buffer",
            Call::DestroyBuffer(_) => "destroy_buffer",
            Call::LoadPalette { .. } => "load_palette",
            Call::SetActivePalette { .. } => "set_active_palette",
            Call::Raster(_) => "raster",
            Call::DepthStencil(_) => "depth_stencil",
            Call::Blend(_) => "blend",
            Call::Sampler { .. } => "sampler",
            Call::BindTexture { .. } => "bind_texture",
            Call::VertexConstants(_) => "vertex_constants",
            Call::PixelConstants(_) => "pixel_constants",
            Call::BeginFrame => "begin_frame",
            Call::SetRenderTarget(_) => "set_render_target",
            Call::Clear { .. } => "clear",
            Call::DrawSprites { .. } => "draw_sprites",
            Call::DrawModel { .. } => "draw_model",
            Call::Present { .. } => "present",
            Call::ReadBackBuffer => "read_back_buffer",
        }
    }
}

pub struct RecordingBackend {
    pub adapter: AdapterInfo,
    pub support: HashMap<PixelFormat, FormatSupport>,
    pub tearing: bool,
    pub native_fans: bool,
    pub max_texture_size: u32,
    pub palette_slots: usize,
    pub outputs: Vec<OutputDesc>,

    /// Swap effects whose creation fails.
    pub failing_effects: HashSet<SwapEffect>,
    pub fail_back_buffer_targets: bool,
    /// Returned by the next `present`, then cleared.
    pub present_error: Option<BackendError>,
    /// Number of upcoming `begin_frame` calls that report "skip".
    pub skip_frames: u32,
    /// Byte every read-back pixel is filled with; `None` refuses read-back.
    pub back_buffer_fill: Option<u8>,

    in_frame: bool,
    calls: Vec<Call>,
    swapchain: Option<SwapChainDesc>,
    textures: HashMap<BackendTexture, TextureDesc>,
    buffers: HashMap<BackendBuffer, Vec<u8>>,
    next_id: u64,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        let full = FormatSupport::TEXTURE_2D | FormatSupport::RENDER_TARGET | FormatSupport::DISPLAY;
        let support = PixelFormat::ALL
            .into_iter()
            .map(|f| {
                let s = match f {
                    PixelFormat::Rgb8 | PixelFormat::Paletted => FormatSupport::TEXTURE_2D,
                    _ => full,
                };
                (f, s)
            })
            .collect();

        Self {
            adapter: AdapterInfo {
                name: "recording adapter".into(),
                backend: "recording".into(),
                ..Default::default()
            },
            support,
            tearing: false,
            native_fans: false,
            max_texture_size: 4096,
            palette_slots: 4,
            outputs: Vec::new(),
            failing_effects: HashSet::new(),
            fail_back_buffer_targets: false,
            present_error: None,
            skip_frames: 0,
            back_buffer_fill: Some(0),
            in_frame: false,
            calls: Vec::new(),
            swapchain: None,
            textures: HashMap::new(),
            buffers: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls.iter().map(Call::name).collect()
    }

    pub fn swapchain(&self) -> Option<&SwapChainDesc> {
        self.swapchain.as_ref()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn texture_desc(&self, texture: BackendTexture) -> Option<&TextureDesc> {
        self.textures.get(&texture)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn buffer_contents(&self, buffer: BackendBuffer) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl GpuBackend for RecordingBackend {
    fn adapter_info(&self) -> AdapterInfo {
        self.adapter.clone()
    }

    fn format_support(&self, format: PixelFormat) -> FormatSupport {
        self.support.get(&format).copied().unwrap_or_default()
    }

    fn supports_tearing(&self) -> bool {
        self.tearing
    }

    fn supports_native_fans(&self) -> bool {
        self.native_fans
    }

    fn max_texture_size(&self) -> u32 {
        self.max_texture_size
    }

    fn palette_slots(&self) -> usize {
        self.palette_slots
    }

    fn outputs(&self) -> Vec<OutputDesc> {
        self.outputs.clone()
    }

    fn create_swapchain(&mut self, desc: &SwapChainDesc) -> Result<(), BackendError> {
        self.calls.push(Call::CreateSwapChain(desc.clone()));
        if self.failing_effects.contains(&desc.effect) {
            return Err(BackendError::Unsupported(format!("{:?}", desc.effect)));
        }
        self.swapchain = Some(desc.clone());
        Ok(())
    }

    fn resize_swapchain(&mut self, width: u32, height: u32) -> Result<(), BackendError> {
        self.calls.push(Call::ResizeSwapChain { width, height });
        let sc = self.swapchain.as_mut().ok_or(BackendError::NoSwapChain)?;
        sc.width = width;
        sc.height = height;
        Ok(())
    }

    fn create_back_buffer_targets(&mut self) -> Result<(u32, u32), BackendError> {
        let sc = self.swapchain.as_ref().ok_or(BackendError::NoSwapChain)?;
        let (width, height) = (sc.width, sc.height);
        self.calls.push(Call::CreateBackBufferTargets { width, height });
        if self.fail_back_buffer_targets {
            return Err(BackendError::OutOfMemory);
        }
        Ok((width, height))
    }

    fn release_swapchain(&mut self) {
        self.calls.push(Call::ReleaseSwapChain);
        self.swapchain = None;
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<BackendTexture, BackendError> {
        let id = BackendTexture(self.next_id());
        self.calls.push(Call::CreateTexture(*desc, id));
        self.textures.insert(id, *desc);
        Ok(id)
    }

    fn write_texture(
        &mut self,
        texture: BackendTexture,
        mip_level: u32,
        region: Region,
        data: &[u8],
        bytes_per_row: u32,
    ) -> Result<(), BackendError> {
        if !self.textures.contains_key(&texture) {
            return Err(BackendError::Other(format!("unknown texture {texture:?}")));
        }
        self.calls.push(Call::WriteTexture {
            texture,
            mip_level,
            region,
            bytes_per_row,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn destroy_texture(&mut self, texture: BackendTexture) {
        self.calls.push(Call::DestroyTexture(texture));
        self.textures.remove(&texture);
    }

    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> Result<BackendBuffer, BackendError> {
        let buffer = BackendBuffer(self.next_id());
        self.calls.push(Call::CreateBuffer { kind, size, buffer });
        self.buffers.insert(buffer, vec![0; size as usize]);
        Ok(buffer)
    }

    fn write_buffer(&mut self, buffer: BackendBuffer, offset: u64, data: &[u8]) {
        self.calls.push(Call::WriteBuffer {
            buffer,
            offset,
            data: data.to_vec(),
        });
        if let Some(contents) = self.buffers.get_mut(&buffer) {
            let start = offset as usize;
            contents[start..start + data.len()].copy_from_slice(data);
        }
    }

    fn destroy_buffer(&mut self, buffer: BackendBuffer) {
        self.calls.push(Call::DestroyBuffer(buffer));
        self.buffers.remove(&buffer);
    }

    fn load_palette(&mut self, slot: usize, _palette: &Palette) {
        self.calls.push(Call::LoadPalette { slot });
    }

    fn set_active_palette(&mut self, slot: usize) {
        self.calls.push(Call::SetActivePalette { slot });
    }

    fn apply_raster(&mut self, state: &RasterState) {
        self.calls.push(Call::Raster(*state));
    }

    fn apply_depth_stencil(&mut self, state: &DepthStencilState) {
        self.calls.push(Call::DepthStencil(*state));
    }

    fn apply_blend(&mut self, state: &BlendState) {
        self.calls.push(Call::Blend(*state));
    }

    fn apply_sampler(&mut self, unit: usize, state: &SamplerState) {
        self.calls.push(Call::Sampler {
            unit,
            state: *state,
        });
    }

    fn bind_texture(&mut self, unit: usize, texture: Option<BackendTexture>) {
        self.calls.push(Call::BindTexture { unit, texture });
    }

    fn apply_vertex_constants(&mut self, constants: &VertexConstants) {
        self.calls.push(Call::VertexConstants(Box::new(*constants)));
    }

    fn apply_pixel_constants(&mut self, constants: &PixelConstants) {
        self.calls.push(Call::PixelConstants(*constants));
    }

    fn begin_frame(&mut self) -> Result<bool, BackendError> {
        self.calls.push(Call::BeginFrame);
        if self.swapchain.is_none() {
            return Err(BackendError::NoSwapChain);
        }
        if self.skip_frames > 0 {
            self.skip_frames -= 1;
            return Ok(false);
        }
        self.in_frame = true;
        Ok(true)
    }

    fn set_render_target(&mut self, target: RenderTarget) {
        self.calls.push(Call::SetRenderTarget(target));
    }

    fn clear(&mut self, color: Option<[f32; 4]>, depth: Option<f32>) {
        self.calls.push(Call::Clear { color, depth });
    }

    fn draw_sprites(&mut self, topology: Topology, vertices: &[SpriteVertex], indices: Option<&[u16]>) {
        self.calls.push(Call::DrawSprites {
            topology,
            vertex_count: vertices.len(),
            indices: indices.map(<[u16]>::to_vec),
        });
    }

    fn draw_model(
        &mut self,
        vertices: BackendBuffer,
        indices: BackendBuffer,
        first_index: u32,
        index_count: u32,
    ) {
        self.calls.push(Call::DrawModel {
            vertices,
            indices,
            first_index,
            index_count,
        });
    }

    fn present(&mut self, sync_interval: u32) -> Result<(), BackendError> {
        self.calls.push(Call::Present { sync_interval });
        self.in_frame = false;
        match self.present_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn read_back_buffer(&mut self) -> Result<Option<ReadBack>, BackendError> {
        self.calls.push(Call::ReadBackBuffer);
        let sc = self.swapchain.as_ref().ok_or(BackendError::NoSwapChain)?;
        let Some(fill) = self.back_buffer_fill.filter(|_| self.in_frame) else {
            return Ok(None);
        };
        let len = sc.width as usize * sc.height as usize * sc.format.bytes_per_pixel();
        Ok(Some(ReadBack {
            format: sc.format,
            width: sc.width,
            height: sc.height,
            pixels: vec![fill; len],
        }))
    }
}
