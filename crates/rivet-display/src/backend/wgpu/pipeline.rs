use std::collections::HashMap;

use crate::draw::vertex::{ModelVertex, SpriteVertex};
use crate::state::{MAX_TEXTURE_UNITS, PixelConstants, VertexConstants};

use super::convert::{blend_state, cull_mode, depth_stencil};
use super::frame::{DrawKey, VertexKind};

const SPRITE_ATTRS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
    2 => Unorm8x4,
    3 => Float32x2
];

const MODEL_ATTRS: [wgpu::VertexAttribute; 3] = [
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x3,
        offset: 0,
        shader_location: 0,
    },
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x3,
        offset: 12,
        shader_location: 1,
    },
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x2,
        offset: 24,
        shader_location: 3,
    },
];

fn sprite_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<SpriteVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &SPRITE_ATTRS,
    }
}

/// Skips the per-vertex texture-matrix scale; it is applied on the CPU.
fn model_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<ModelVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &MODEL_ATTRS,
    }
}

/// Full pipeline identity: recorded draw state plus the target it renders into.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) struct PipelineKey {
    pub draw: DrawKey,
    pub color_format: wgpu::TextureFormat,
    pub has_depth: bool,
}

/// Shader, layouts and every render pipeline built so far.
pub(super) struct Pipelines {
    shader: wgpu::ShaderModule,
    layout: wgpu::PipelineLayout,
    pub constants_layout: wgpu::BindGroupLayout,
    pub textures_layout: wgpu::BindGroupLayout,
    cache: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl Pipelines {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("rivet shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let constants_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("rivet constants bgl"),
            entries: &[
                uniform_entry(
                    0,
                    wgpu::ShaderStages::VERTEX,
                    std::mem::size_of::<VertexConstants>() as u64,
                ),
                uniform_entry(
                    1,
                    wgpu::ShaderStages::FRAGMENT,
                    std::mem::size_of::<PixelConstants>() as u64,
                ),
            ],
        });

        let mut texture_entries = Vec::with_capacity(MAX_TEXTURE_UNITS * 2);
        for unit in 0..MAX_TEXTURE_UNITS as u32 {
            texture_entries.push(wgpu::BindGroupLayoutEntry {
                binding: unit,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }
        for unit in 0..MAX_TEXTURE_UNITS as u32 {
            texture_entries.push(wgpu::BindGroupLayoutEntry {
                binding: MAX_TEXTURE_UNITS as u32 + unit,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }
        let textures_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("rivet textures bgl"),
            entries: &texture_entries,
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("rivet pipeline layout"),
            bind_group_layouts: &[&constants_layout, &textures_layout],
            immediate_size: 0,
        });

        Self {
            shader,
            layout,
            constants_layout,
            textures_layout,
            cache: HashMap::new(),
        }
    }

    /// Returns the pipeline for `key`, building it on first use.
    pub fn get(&mut self, device: &wgpu::Device, key: PipelineKey) -> wgpu::RenderPipeline {
        if let Some(p) = self.cache.get(&key) {
            return p.clone();
        }
        log::debug!("building pipeline {key:?}");
        let pipeline = self.build(device, key);
        self.cache.insert(key, pipeline.clone());
        pipeline
    }

    fn build(&self, device: &wgpu::Device, key: PipelineKey) -> wgpu::RenderPipeline {
        let (entry, buffers) = match key.draw.vertex {
            VertexKind::Sprite => ("vs_sprite", [sprite_layout()]),
            VertexKind::Model => ("vs_model", [model_layout()]),
        };
        let (topology, strip_index_format) = if key.draw.strip {
            (
                wgpu::PrimitiveTopology::TriangleStrip,
                Some(wgpu::IndexFormat::Uint16),
            )
        } else {
            (wgpu::PrimitiveTopology::TriangleList, None)
        };

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("rivet pipeline"),
            layout: Some(&self.layout),

            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                buffers: &buffers,
            },

            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.color_format,
                    blend: Some(blend_state(key.draw.blend)),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format,
                front_face: wgpu::FrontFace::Cw,
                cull_mode: cull_mode(key.draw.cull),
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },

            depth_stencil: key.has_depth.then(|| depth_stencil(key.draw.depth)),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages, size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: true,
            min_binding_size: wgpu::BufferSize::new(size),
        },
        count: None,
    }
}
