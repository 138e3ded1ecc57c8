//! wgpu implementation of `GpuBackend`.
//!
//! Fixed-function state is emulated by one WGSL shader; render pipelines are built
//! lazily per blend/depth/cull/topology/target combination. Draws are recorded during
//! the frame and encoded into render passes when the frame is presented.

mod convert;
mod frame;
mod gpu;
mod pipeline;
mod surface;

pub use gpu::WgpuBackend;

use crate::device::modes::{DisplayMode, DisplayRect, Rational};
use crate::draw::vertex::SpriteVertex;
use crate::pixel::{FormatSupport, Palette, PixelFormat, Region};
use crate::state::{
    BlendState, DepthStencilState, PixelConstants, RasterState, SamplerState, VertexConstants,
};

use super::{
    AdapterInfo, BackendBuffer, BackendError, BackendTexture, BufferKind, GpuBackend, OutputDesc,
    ReadBack, RenderTarget, SwapChainDesc, SwapEffect, TextureDesc, TextureUsage, Topology,
};
use convert::texture_format;
use gpu::{GpuBuffer, GpuTexture, padded_len, write_padded};
use surface::{
    SurfaceErrorAction, choose_alpha_mode, choose_present_mode, choose_surface_format,
    classify_surface_error,
};

impl GpuBackend for WgpuBackend {
    // ── capabilities ──────────────────────────────────────────────────────

    fn adapter_info(&self) -> AdapterInfo {
        let info = self.adapter.get_info();
        let driver = if info.driver_info.is_empty() {
            info.driver
        } else {
            format!("{} {}", info.driver, info.driver_info)
        };
        AdapterInfo {
            name: info.name,
            vendor: info.vendor,
            device: info.device,
            backend: format!("{:?}", info.backend),
            driver,
        }
    }

    fn format_support(&self, format: PixelFormat) -> FormatSupport {
        let mut support = match texture_format(format) {
            Some(_) => FormatSupport::TEXTURE_2D | FormatSupport::RENDER_TARGET,
            None => FormatSupport::empty(),
        };
        if choose_surface_format(&self.caps, format).is_some() {
            support |= FormatSupport::DISPLAY;
        }
        support
    }

    fn supports_tearing(&self) -> bool {
        self.caps.present_modes.contains(&wgpu::PresentMode::Immediate)
    }

    fn supports_native_fans(&self) -> bool {
        false
    }

    fn max_texture_size(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn palette_slots(&self) -> usize {
        0
    }

    fn outputs(&self) -> Vec<OutputDesc> {
        self.window
            .available_monitors()
            .map(|monitor| {
                let position = monitor.position();
                let size = monitor.size();
                let modes = monitor
                    .video_modes()
                    .map(|m| DisplayMode {
                        width: m.size().width,
                        height: m.size().height,
                        refresh: Rational::from_millihertz(m.refresh_rate_millihertz()),
                    })
                    .collect();
                let current = monitor.refresh_rate_millihertz().map(|mhz| DisplayMode {
                    width: size.width,
                    height: size.height,
                    refresh: Rational::from_millihertz(mhz),
                });
                OutputDesc {
                    name: monitor.name().unwrap_or_default(),
                    desktop: DisplayRect {
                        x: position.x,
                        y: position.y,
                        width: size.width,
                        height: size.height,
                    },
                    modes,
                    current,
                }
            })
            .collect()
    }

    // ── swapchain ─────────────────────────────────────────────────────────

    fn create_swapchain(&mut self, desc: &SwapChainDesc) -> Result<(), BackendError> {
        self.check_lost()?;
        if desc.effect == SwapEffect::FlipDiscard && desc.buffer_count < 2 {
            return Err(BackendError::Unsupported(
                "flip presentation needs at least two buffers".into(),
            ));
        }
        let format = choose_surface_format(&self.caps, desc.format).ok_or_else(|| {
            BackendError::Unsupported(format!("surface cannot present {:?}", desc.format))
        })?;
        let present_mode = choose_present_mode(&self.caps, desc.vsync, desc.allow_tearing);

        self.frame = None;
        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        if self.caps.usages.contains(wgpu::TextureUsages::COPY_SRC) {
            usage |= wgpu::TextureUsages::COPY_SRC;
        }
        let config = wgpu::SurfaceConfiguration {
            usage,
            format,
            width: desc.width.max(1),
            height: desc.height.max(1),
            present_mode,
            alpha_mode: choose_alpha_mode(&self.caps),
            view_formats: vec![],
            desired_maximum_frame_latency: desc.buffer_count,
        };
        log::info!(
            "configuring surface {}x{} {format:?} {present_mode:?} ({:?})",
            config.width,
            config.height,
            desc.effect
        );
        self.config = Some(config);
        self.configure_surface();
        Ok(())
    }

    fn resize_swapchain(&mut self, width: u32, height: u32) -> Result<(), BackendError> {
        self.check_lost()?;
        let config = self.config.as_mut().ok_or(BackendError::NoSwapChain)?;
        if width == 0 || height == 0 {
            return Ok(());
        }
        config.width = width;
        config.height = height;
        self.frame = None;
        self.configure_surface();
        Ok(())
    }

    fn create_back_buffer_targets(&mut self) -> Result<(u32, u32), BackendError> {
        self.check_lost()?;
        let (width, height) = self
            .config
            .as_ref()
            .map(|c| (c.width, c.height))
            .ok_or(BackendError::NoSwapChain)?;
        self.back_depth = Some(self.create_depth(width, height, "rivet back-buffer depth"));
        Ok((width, height))
    }

    fn release_swapchain(&mut self) {
        self.frame = None;
        self.back_depth = None;
        self.config = None;
    }

    // ── resources ─────────────────────────────────────────────────────────

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<BackendTexture, BackendError> {
        self.check_lost()?;
        let max = self.max_texture_size();
        if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
            return Err(BackendError::Unsupported(format!(
                "texture size {}x{} (max {max})",
                desc.width, desc.height
            )));
        }

        let id = BackendTexture(self.next_id());
        if desc.usage == TextureUsage::Depth {
            let depth = self.create_depth(desc.width, desc.height, "rivet target depth");
            self.textures.insert(id, depth);
            return Ok(id);
        }

        let format = texture_format(desc.format).ok_or_else(|| {
            BackendError::Unsupported(format!("texture format {:?}", desc.format))
        })?;
        let (usage, mip_level_count) = match desc.usage {
            TextureUsage::RenderTarget => (
                wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_DST
                    | wgpu::TextureUsages::RENDER_ATTACHMENT,
                1,
            ),
            _ => (
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                desc.mip_levels.max(1),
            ),
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("rivet texture"),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.textures.insert(
            id,
            GpuTexture {
                texture,
                view,
                usage: desc.usage,
            },
        );
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
        self.check_lost()?;
        if region.is_empty() {
            return Ok(());
        }
        let referenced = self.recorder.references_texture(texture);
        self.submit_recorded_if(referenced);
        let t = self
            .textures
            .get(&texture)
            .ok_or_else(|| BackendError::Other(format!("unknown texture {texture:?}")))?;
        if mip_level >= t.texture.mip_level_count() {
            return Err(BackendError::Other(format!(
                "mip level {mip_level} out of range for {texture:?}"
            )));
        }
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &t.texture,
                mip_level,
                origin: wgpu::Origin3d {
                    x: region.x,
                    y: region.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(region.height),
            },
            wgpu::Extent3d {
                width: region.width,
                height: region.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn destroy_texture(&mut self, texture: BackendTexture) {
        let referenced = self.recorder.references_texture(texture);
        self.submit_recorded_if(referenced);
        self.forget_texture(texture);
        self.textures.remove(&texture);
    }

    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> Result<BackendBuffer, BackendError> {
        self.check_lost()?;
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        };
        let size = padded_len(size.max(1));
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(match kind {
                BufferKind::Vertex => "rivet geometry vertices",
                BufferKind::Index => "rivet geometry indices",
            }),
            size,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let id = BackendBuffer(self.next_id());
        self.buffers.insert(id, GpuBuffer { buffer, size });
        Ok(id)
    }

    fn write_buffer(&mut self, buffer: BackendBuffer, offset: u64, data: &[u8]) {
        let referenced = self.recorder.references_buffer(buffer);
        self.submit_recorded_if(referenced);
        let Some(b) = self.buffers.get(&buffer) else {
            log::warn!("write to unknown buffer {buffer:?}");
            return;
        };
        if offset + padded_len(data.len() as u64) > b.size {
            log::warn!(
                "write of {} bytes at {offset} overruns {buffer:?} ({} bytes)",
                data.len(),
                b.size
            );
            return;
        }
        write_padded(&self.queue, &b.buffer, offset, data);
    }

    fn destroy_buffer(&mut self, buffer: BackendBuffer) {
        let referenced = self.recorder.references_buffer(buffer);
        self.submit_recorded_if(referenced);
        self.buffers.remove(&buffer);
    }

    fn load_palette(&mut self, slot: usize, _palette: &Palette) {
        log::trace!("no palette slots; ignoring load into slot {slot}");
    }

    fn set_active_palette(&mut self, _slot: usize) {}

    // ── state ─────────────────────────────────────────────────────────────

    fn apply_raster(&mut self, state: &RasterState) {
        self.recorder.set_raster(*state);
    }

    fn apply_depth_stencil(&mut self, state: &DepthStencilState) {
        self.recorder.set_depth_stencil(*state);
    }

    fn apply_blend(&mut self, state: &BlendState) {
        self.recorder.set_blend(*state);
    }

    fn apply_sampler(&mut self, unit: usize, state: &SamplerState) {
        self.recorder.set_sampler(unit, *state);
    }

    fn bind_texture(&mut self, unit: usize, texture: Option<BackendTexture>) {
        self.recorder.bind_texture(unit, texture);
    }

    fn apply_vertex_constants(&mut self, constants: &VertexConstants) {
        self.recorder.set_vertex_constants(constants);
    }

    fn apply_pixel_constants(&mut self, constants: &PixelConstants) {
        self.recorder.set_pixel_constants(constants);
    }

    // ── frame ─────────────────────────────────────────────────────────────

    fn begin_frame(&mut self) -> Result<bool, BackendError> {
        self.check_lost()?;
        if self.config.is_none() {
            return Err(BackendError::NoSwapChain);
        }
        self.frame = None;
        match self.surface.get_current_texture() {
            Ok(frame) => {
                self.frame = Some(frame);
                self.recorder.begin();
                Ok(true)
            }
            Err(err) => match classify_surface_error(&err) {
                SurfaceErrorAction::Reconfigured => {
                    log::debug!("surface {err}; reconfiguring");
                    self.configure_surface();
                    Ok(false)
                }
                SurfaceErrorAction::SkipFrame => {
                    log::debug!("surface {err}; skipping frame");
                    Ok(false)
                }
                SurfaceErrorAction::Fatal => Err(BackendError::OutOfMemory),
            },
        }
    }

    fn set_render_target(&mut self, target: RenderTarget) {
        self.recorder.set_render_target(target);
    }

    fn clear(&mut self, color: Option<[f32; 4]>, depth: Option<f32>) {
        self.recorder.clear(color, depth);
    }

    fn draw_sprites(&mut self, topology: Topology, vertices: &[SpriteVertex], indices: Option<&[u16]>) {
        self.recorder.draw_sprites(topology, vertices, indices);
    }

    fn draw_model(
        &mut self,
        vertices: BackendBuffer,
        indices: BackendBuffer,
        first_index: u32,
        index_count: u32,
    ) {
        self.recorder
            .draw_model(vertices, indices, first_index, index_count);
    }

    fn present(&mut self, sync_interval: u32) -> Result<(), BackendError> {
        self.check_lost()?;
        let Some(frame) = self.frame.take() else {
            log::trace!("present without an acquired frame");
            return Ok(());
        };
        log::trace!("presenting with sync interval {sync_interval}");

        let suboptimal = frame.suboptimal;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let commands = self.encode_frame(&view);
        self.queue.submit(std::iter::once(commands));
        drop(view);
        frame.present();

        // The device-lost callback may fire during submission.
        self.check_lost()?;
        if suboptimal {
            return Err(BackendError::SurfaceLost);
        }
        Ok(())
    }

    fn read_back_buffer(&mut self) -> Result<Option<ReadBack>, BackendError> {
        self.check_lost()?;
        self.read_back_frame()
    }
}
