use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use winit::window::Window;

use crate::backend::{
    BackendBuffer, BackendError, BackendTexture, ReadBack, RenderTarget, TextureUsage,
};
use crate::device::{DisplayInit, PowerPreference};
use crate::state::{MAX_TEXTURE_UNITS, PixelConstants, VertexConstants};

use super::convert::{DEPTH_FORMAT, pixel_format, sampler_descriptor, sampler_state};
use super::frame::{Bindings, DrawSource, FrameRecorder, Pass, RecordedFrame, VertexKind};
use super::pipeline::{PipelineKey, Pipelines};

pub(super) struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub usage: TextureUsage,
}

pub(super) struct GpuBuffer {
    pub buffer: wgpu::Buffer,
    pub size: u64,
}

/// Grow-only buffer that frame data is uploaded into.
struct Staging {
    label: &'static str,
    usage: wgpu::BufferUsages,
    buffer: Option<wgpu::Buffer>,
}

impl Staging {
    fn new(label: &'static str, usage: wgpu::BufferUsages) -> Self {
        Self {
            label,
            usage,
            buffer: None,
        }
    }

    /// Returns true if the buffer had to be recreated.
    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return false;
        }
        let len = padded_len(bytes.len() as u64);
        let grew = match &self.buffer {
            Some(b) if b.size() >= len => false,
            _ => {
                let size = len.next_power_of_two().max(4096);
                log::trace!("growing {} to {size} bytes", self.label);
                self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(self.label),
                    size,
                    usage: self.usage | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }));
                true
            }
        };
        if let Some(buffer) = &self.buffer {
            write_padded(queue, buffer, 0, bytes);
        }
        grew
    }
}

/// Buffer copies move whole 4-byte words.
pub(super) fn padded_len(len: u64) -> u64 {
    len.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT)
}

pub(super) fn write_padded(queue: &wgpu::Queue, buffer: &wgpu::Buffer, offset: u64, bytes: &[u8]) {
    if bytes.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT == 0 {
        queue.write_buffer(buffer, offset, bytes);
    } else {
        let mut padded = bytes.to_vec();
        padded.resize(padded_len(bytes.len() as u64) as usize, 0);
        queue.write_buffer(buffer, offset, &padded);
    }
}

/// Drops the row padding a texture-to-buffer copy needs.
pub(super) fn unpad_rows(data: &[u8], row_bytes: usize, padded_row_bytes: usize, rows: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(row_bytes * rows);
    for row in data.chunks(padded_row_bytes).take(rows) {
        out.extend_from_slice(&row[..row_bytes.min(row.len())]);
    }
    out
}

/// `GpuBackend` implementation over wgpu.
///
/// Owns the device, the window surface and every GPU resource the display core has
/// created. Draw calls are recorded during the frame and encoded at `present`.
pub struct WgpuBackend {
    pub(super) window: Arc<Window>,
    pub(super) surface: wgpu::Surface<'static>,
    pub(super) adapter: wgpu::Adapter,
    pub(super) device: wgpu::Device,
    pub(super) queue: wgpu::Queue,
    pub(super) caps: wgpu::SurfaceCapabilities,

    /// `None` until a swapchain is created, and again after it is released.
    pub(super) config: Option<wgpu::SurfaceConfiguration>,
    pub(super) back_depth: Option<GpuTexture>,
    pub(super) frame: Option<wgpu::SurfaceTexture>,

    /// Set from the device-lost callback.
    pub(super) lost: Arc<Mutex<Option<String>>>,

    pub(super) textures: HashMap<BackendTexture, GpuTexture>,
    pub(super) buffers: HashMap<BackendBuffer, GpuBuffer>,
    next_id: u64,

    pipelines: Pipelines,
    samplers: Vec<wgpu::Sampler>,
    white: GpuTexture,
    texture_groups: HashMap<Bindings, wgpu::BindGroup>,
    constants_group: Option<wgpu::BindGroup>,

    vertex_staging: Staging,
    index_staging: Staging,
    uniform_staging: Staging,

    pub(super) recorder: FrameRecorder,
}

impl WgpuBackend {
    /// Creates a device bound to `window`.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu; this blocks on it.
    pub fn new(window: Arc<Window>, init: &DisplayInit) -> Result<Self> {
        let flags = if init.debug_validation {
            wgpu::InstanceFlags::debugging()
        } else {
            wgpu::InstanceFlags::empty()
        };
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("failed to create wgpu surface")?;

        let adapter = pollster::block_on(request_adapter(&instance, &surface, init.power_preference))?;
        let info = adapter.get_info();
        log::info!("using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("rivet device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .context("failed to create wgpu device/queue")?;

        let lost = Arc::new(Mutex::new(None));
        let flag = lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            if reason == wgpu::DeviceLostReason::Destroyed {
                return;
            }
            log::error!("device lost ({reason:?}): {message}");
            if let Ok(mut slot) = flag.lock() {
                *slot = Some(message);
            }
        });

        let caps = surface.get_capabilities(&adapter);
        let pipelines = Pipelines::new(&device);
        let samplers = (0..4)
            .map(|i| device.create_sampler(&sampler_descriptor(sampler_state(i))))
            .collect();
        let white = white_texture(&device, &queue);
        let recorder = FrameRecorder::new(device.limits().min_uniform_buffer_offset_alignment);

        Ok(Self {
            window,
            surface,
            adapter,
            device,
            queue,
            caps,
            config: None,
            back_depth: None,
            frame: None,
            lost,
            textures: HashMap::new(),
            buffers: HashMap::new(),
            next_id: 1,
            pipelines,
            samplers,
            white,
            texture_groups: HashMap::new(),
            constants_group: None,
            vertex_staging: Staging::new("rivet sprite vertices", wgpu::BufferUsages::VERTEX),
            index_staging: Staging::new("rivet sprite indices", wgpu::BufferUsages::INDEX),
            uniform_staging: Staging::new("rivet constants", wgpu::BufferUsages::UNIFORM),
            recorder,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Active surface format, if a swapchain exists.
    pub fn surface_format(&self) -> Option<wgpu::TextureFormat> {
        self.config.as_ref().map(|c| c.format)
    }

    pub(super) fn check_lost(&self) -> Result<(), BackendError> {
        match self.lost.lock() {
            Ok(slot) => match slot.as_ref() {
                Some(reason) => Err(BackendError::DeviceLost(reason.clone())),
                None => Ok(()),
            },
            Err(_) => Err(BackendError::DeviceLost("device-lost flag poisoned".into())),
        }
    }

    pub(super) fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(super) fn configure_surface(&self) {
        if let Some(config) = &self.config {
            self.surface.configure(&self.device, config);
        }
    }

    pub(super) fn create_depth(&self, width: u32, height: u32, label: &str) -> GpuTexture {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuTexture {
            texture,
            view,
            usage: TextureUsage::Depth,
        }
    }

    /// Drops cached bind groups that may reference `texture`.
    pub(super) fn forget_texture(&mut self, texture: BackendTexture) {
        self.texture_groups
            .retain(|b, _| !b.textures.contains(&Some(texture)));
        self.recorder.forget_texture(texture);
    }

    fn texture_group(&mut self, bindings: Bindings) -> wgpu::BindGroup {
        if let Some(group) = self.texture_groups.get(&bindings) {
            return group.clone();
        }
        let views: Vec<&wgpu::TextureView> = bindings
            .textures
            .iter()
            .map(|t| {
                t.and_then(|id| self.textures.get(&id))
                    .filter(|t| t.usage != TextureUsage::Depth)
                    .map_or(&self.white.view, |t| &t.view)
            })
            .collect();

        let mut entries = Vec::with_capacity(MAX_TEXTURE_UNITS * 2);
        for (unit, view) in views.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: unit as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        for (unit, &sampler) in bindings.samplers.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: (MAX_TEXTURE_UNITS + unit) as u32,
                resource: wgpu::BindingResource::Sampler(&self.samplers[sampler & 3]),
            });
        }

        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("rivet textures bg"),
            layout: &self.pipelines.textures_layout,
            entries: &entries,
        });
        self.texture_groups.insert(bindings, group.clone());
        group
    }

    fn constants_group(&mut self) -> Option<wgpu::BindGroup> {
        if let Some(group) = &self.constants_group {
            return Some(group.clone());
        }
        let buffer = self.uniform_staging.buffer.as_ref()?;
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("rivet constants bg"),
            layout: &self.pipelines.constants_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(std::mem::size_of::<VertexConstants>() as u64),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(std::mem::size_of::<PixelConstants>() as u64),
                    }),
                },
            ],
        });
        self.constants_group = Some(group.clone());
        Some(group)
    }

    /// Encodes and submits the draws recorded so far when `referenced` holds, so they
    /// run before a queue write or delete that follows them. Recording continues on
    /// the same target with its contents loaded.
    pub(super) fn submit_recorded_if(&mut self, referenced: bool) {
        if !referenced {
            return;
        }
        let view = match &self.frame {
            Some(frame) => frame
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
            None => return,
        };
        log::trace!("submitting recorded draws ahead of a resource update");
        let commands = self.encode_frame(&view);
        self.queue.submit(std::iter::once(commands));
    }

    /// Submits the frame drawn so far and copies the acquired surface texture back.
    pub(super) fn read_back_frame(&mut self) -> Result<Option<ReadBack>, BackendError> {
        let Some(config) = &self.config else {
            return Ok(None);
        };
        let (surface_format, width, height) = (config.format, config.width, config.height);
        let Some(format) = pixel_format(surface_format) else {
            log::warn!("cannot read back a {surface_format:?} back buffer");
            return Ok(None);
        };
        if !config.usage.contains(wgpu::TextureUsages::COPY_SRC) {
            log::warn!("surface does not allow copies; no read-back");
            return Ok(None);
        }
        if self.frame.is_none() {
            return Ok(None);
        }
        self.submit_recorded_if(true);
        let Some(frame) = &self.frame else {
            return Ok(None);
        };

        let row_bytes = width * format.bytes_per_pixel() as u32;
        let padded_row_bytes = row_bytes.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("rivet read-back"),
            size: padded_row_bytes as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("rivet read-back encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &frame.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_bytes),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        if let Err(e) = self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        }) {
            log::warn!("device poll during read-back failed: {e}");
        }
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(BackendError::Other(format!("read-back map failed: {e}"))),
            Err(_) => return Err(BackendError::Other("read-back map never completed".into())),
        }

        let pixels = {
            let data = slice.get_mapped_range();
            unpad_rows(&data, row_bytes as usize, padded_row_bytes as usize, height as usize)
        };
        buffer.unmap();
        self.check_lost()?;
        Ok(Some(ReadBack {
            format,
            width,
            height,
            pixels,
        }))
    }

    /// Uploads and encodes everything recorded this frame.
    pub(super) fn encode_frame(&mut self, back_buffer: &wgpu::TextureView) -> wgpu::CommandBuffer {
        let frame = self.recorder.take();

        self.vertex_staging
            .upload(&self.device, &self.queue, bytemuck::cast_slice(&frame.vertices));
        self.index_staging
            .upload(&self.device, &self.queue, bytemuck::cast_slice(&frame.indices));
        if self
            .uniform_staging
            .upload(&self.device, &self.queue, &frame.uniforms)
        {
            self.constants_group = None;
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("rivet frame encoder"),
            });
        let RecordedFrame { passes, .. } = frame;
        for pass in passes.iter().filter(|p| !p.is_noop()) {
            self.encode_pass(&mut encoder, back_buffer, pass);
        }
        encoder.finish()
    }

    fn encode_pass(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        back_buffer: &wgpu::TextureView,
        pass: &Pass,
    ) {
        let Some(target) = self.resolve_target(back_buffer, pass.target) else {
            log::warn!("render target {:?} no longer exists; pass dropped", pass.target);
            return;
        };
        let (width, height) = target.size;

        let mut draws = Vec::with_capacity(pass.draws.len());
        for draw in &pass.draws {
            let key = PipelineKey {
                draw: draw.key,
                color_format: target.format,
                has_depth: target.depth.is_some(),
            };
            let pipeline = self.pipelines.get(&self.device, key);
            let textures = self.texture_group(draw.bindings);
            draws.push((draw, pipeline, textures));
        }
        let constants = if draws.is_empty() {
            None
        } else {
            self.constants_group()
        };

        let color_load = match pass.clear_color {
            Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: a as f64,
            }),
            None => wgpu::LoadOp::Load,
        };
        let depth_attachment = target.depth.as_ref().map(|view| wgpu::RenderPassDepthStencilAttachment {
            view,
            depth_ops: Some(wgpu::Operations {
                load: match pass.clear_depth {
                    Some(d) => wgpu::LoadOp::Clear(d),
                    None => wgpu::LoadOp::Load,
                },
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        });

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("rivet pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: depth_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let Some(constants) = constants else { return };
        for (draw, pipeline, textures) in &draws {
            rpass.set_pipeline(pipeline);
            rpass.set_viewport(
                0.0,
                0.0,
                width as f32,
                height as f32,
                draw.depth_range[0],
                draw.depth_range[1],
            );
            rpass.set_bind_group(0, &constants, &draw.uniform_offsets);
            rpass.set_bind_group(1, textures, &[]);

            match &draw.source {
                DrawSource::Sprites {
                    base_vertex,
                    vertex_count,
                    indices,
                } => {
                    let Some(vertices) = &self.vertex_staging.buffer else { continue };
                    rpass.set_vertex_buffer(0, vertices.slice(..));
                    match indices {
                        Some(range) => {
                            let Some(index_buffer) = &self.index_staging.buffer else { continue };
                            rpass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                            rpass.draw_indexed(range.clone(), *base_vertex as i32, 0..1);
                        }
                        None => rpass.draw(*base_vertex..base_vertex + vertex_count, 0..1),
                    }
                }
                DrawSource::Model {
                    vertices,
                    indices,
                    first_index,
                    index_count,
                } => {
                    debug_assert_eq!(draw.key.vertex, VertexKind::Model);
                    let (Some(vb), Some(ib)) = (self.buffers.get(vertices), self.buffers.get(indices))
                    else {
                        log::warn!("compiled geometry buffers missing; draw dropped");
                        continue;
                    };
                    rpass.set_vertex_buffer(0, vb.buffer.slice(..));
                    rpass.set_index_buffer(ib.buffer.slice(..), wgpu::IndexFormat::Uint16);
                    rpass.draw_indexed(*first_index..first_index + index_count, 0, 0..1);
                }
            }
        }
    }

    /// Colour view, depth view, colour format and extent for `target`.
    fn resolve_target(
        &self,
        back_buffer: &wgpu::TextureView,
        target: RenderTarget,
    ) -> Option<ResolvedTarget> {
        match target {
            RenderTarget::BackBuffer => {
                let config = self.config.as_ref()?;
                Some(ResolvedTarget {
                    color: back_buffer.clone(),
                    depth: self.back_depth.as_ref().map(|d| d.view.clone()),
                    format: config.format,
                    size: (config.width, config.height),
                })
            }
            RenderTarget::Texture { color, depth } => {
                let c = self.textures.get(&color)?;
                let depth = match depth {
                    Some(id) => Some(self.textures.get(&id)?.view.clone()),
                    None => None,
                };
                Some(ResolvedTarget {
                    color: c.view.clone(),
                    depth,
                    format: c.texture.format(),
                    size: (c.texture.width(), c.texture.height()),
                })
            }
        }
    }
}

struct ResolvedTarget {
    color: wgpu::TextureView,
    depth: Option<wgpu::TextureView>,
    format: wgpu::TextureFormat,
    size: (u32, u32),
}

async fn request_adapter(
    instance: &wgpu::Instance,
    surface: &wgpu::Surface<'_>,
    preference: PowerPreference,
) -> Result<wgpu::Adapter> {
    let power_preference = match preference {
        PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
        PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
    };
    let preferred = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: Some(surface),
            force_fallback_adapter: false,
        })
        .await;
    match preferred {
        Ok(adapter) => Ok(adapter),
        Err(e) => {
            log::warn!("no {preference:?} adapter ({e}); trying any adapter");
            instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::None,
                    compatible_surface: Some(surface),
                    force_fallback_adapter: false,
                })
                .await
                .context("failed to find a suitable GPU adapter")
        }
    }
}

/// 1x1 opaque white, bound to units without a texture.
fn white_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> GpuTexture {
    let size = wgpu::Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("rivet white texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[255; 4],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        texture,
        view,
        usage: TextureUsage::Sampled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_lengths_round_up_to_words() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(6), 8);
        assert_eq!(padded_len(36), 36);
    }

    #[test]
    fn read_back_rows_drop_padding() {
        let mut data = vec![0u8; 256 * 2];
        data[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data[256..264].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);
        let out = unpad_rows(&data, 8, 256, 2);
        assert_eq!(out, (1..=16).collect::<Vec<u8>>());
    }
}
