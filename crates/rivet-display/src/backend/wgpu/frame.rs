//! Per-frame command recording.
//!
//! Draw calls arrive one at a time with state applied in between, but a wgpu render
//! pass cannot be interleaved with buffer uploads. The recorder captures everything as
//! plain data and `WgpuBackend::present` encodes it in one go. Uploads or deletes that
//! touch a resource a recorded draw still uses submit the recorded part first.

use std::ops::Range;

use crate::backend::{BackendBuffer, BackendTexture, RenderTarget, Topology};
use crate::draw::emulate::IndexPatterns;
use crate::draw::vertex::SpriteVertex;
use crate::state::{
    BlendMode, BlendState, CullMode, DepthStencilState, MAX_TEXTURE_UNITS, PixelConstants,
    RasterState, SamplerState, VertexConstants,
};

use super::convert::sampler_index;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) enum VertexKind {
    Sprite,
    Model,
}

/// Pipeline-relevant state captured with each draw.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) struct DrawKey {
    pub blend: BlendMode,
    pub depth: DepthStencilState,
    pub cull: CullMode,
    pub strip: bool,
    pub vertex: VertexKind,
}

/// Texture and sampler selection for the four units.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) struct Bindings {
    pub textures: [Option<BackendTexture>; MAX_TEXTURE_UNITS],
    pub samplers: [usize; MAX_TEXTURE_UNITS],
}

impl Default for Bindings {
    fn default() -> Self {
        Self {
            textures: [None; MAX_TEXTURE_UNITS],
            samplers: [sampler_index(SamplerState::default()); MAX_TEXTURE_UNITS],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum DrawSource {
    /// Vertices and indices live in the frame's staging arrays.
    Sprites {
        base_vertex: u32,
        vertex_count: u32,
        indices: Option<Range<u32>>,
    },
    Model {
        vertices: BackendBuffer,
        indices: BackendBuffer,
        first_index: u32,
        index_count: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct RecordedDraw {
    pub key: DrawKey,
    pub bindings: Bindings,
    pub depth_range: [f32; 2],
    /// Dynamic offsets of the vertex and pixel constant blocks.
    pub uniform_offsets: [u32; 2],
    pub source: DrawSource,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Pass {
    pub target: RenderTarget,
    /// `None` loads the existing contents.
    pub clear_color: Option<[f32; 4]>,
    pub clear_depth: Option<f32>,
    pub draws: Vec<RecordedDraw>,
}

impl Pass {
    fn new(target: RenderTarget) -> Self {
        Self {
            target,
            clear_color: None,
            clear_depth: None,
            draws: Vec::new(),
        }
    }

    /// Nothing to encode.
    pub fn is_noop(&self) -> bool {
        self.draws.is_empty() && self.clear_color.is_none() && self.clear_depth.is_none()
    }
}

/// Everything one frame needs uploaded and encoded.
#[derive(Debug, Default)]
pub(super) struct RecordedFrame {
    pub passes: Vec<Pass>,
    pub vertices: Vec<SpriteVertex>,
    pub indices: Vec<u16>,
    pub uniforms: Vec<u8>,
}

pub(super) struct FrameRecorder {
    uniform_alignment: usize,
    frame: RecordedFrame,
    target: RenderTarget,

    raster: RasterState,
    depth: DepthStencilState,
    blend: BlendState,
    bindings: Bindings,
    vertex_constants: VertexConstants,
    pixel_constants: PixelConstants,
    /// Offset of the current constants in `frame.uniforms`, if already staged.
    vertex_offset: Option<u32>,
    pixel_offset: Option<u32>,

    fans: IndexPatterns,
}

impl FrameRecorder {
    pub fn new(uniform_alignment: u32) -> Self {
        Self {
            uniform_alignment: uniform_alignment.max(1) as usize,
            frame: RecordedFrame::default(),
            target: RenderTarget::BackBuffer,
            raster: RasterState::default(),
            depth: DepthStencilState::default(),
            blend: BlendState::default(),
            bindings: Bindings::default(),
            vertex_constants: VertexConstants::default(),
            pixel_constants: PixelConstants::default(),
            vertex_offset: None,
            pixel_offset: None,
            fans: IndexPatterns::new(),
        }
    }

    /// Drops anything recorded so far. Pipeline state carries over between frames.
    pub fn begin(&mut self) {
        self.frame = RecordedFrame::default();
        self.target = RenderTarget::BackBuffer;
        self.vertex_offset = None;
        self.pixel_offset = None;
    }

    pub fn take(&mut self) -> RecordedFrame {
        self.vertex_offset = None;
        self.pixel_offset = None;
        std::mem::take(&mut self.frame)
    }

    pub fn passes(&self) -> &[Pass] {
        &self.frame.passes
    }

    /// Whether a recorded draw samples `texture` or a recorded pass renders into it.
    pub fn references_texture(&self, texture: BackendTexture) -> bool {
        self.frame.passes.iter().any(|pass| {
            let target_hit = match pass.target {
                RenderTarget::Texture { color, depth } => {
                    color == texture || depth == Some(texture)
                }
                RenderTarget::BackBuffer => false,
            };
            (target_hit && !pass.is_noop())
                || pass
                    .draws
                    .iter()
                    .any(|d| d.bindings.textures.contains(&Some(texture)))
        })
    }

    /// Whether a recorded model draw reads `buffer`.
    pub fn references_buffer(&self, buffer: BackendBuffer) -> bool {
        self.frame
            .passes
            .iter()
            .flat_map(|pass| &pass.draws)
            .any(|d| match d.source {
                DrawSource::Model {
                    vertices, indices, ..
                } => vertices == buffer || indices == buffer,
                DrawSource::Sprites { .. } => false,
            })
    }

    // ── state ─────────────────────────────────────────────────────────────

    pub fn set_raster(&mut self, state: RasterState) {
        self.raster = state;
    }

    pub fn set_depth_stencil(&mut self, state: DepthStencilState) {
        self.depth = state;
    }

    pub fn set_blend(&mut self, state: BlendState) {
        self.blend = state;
    }

    pub fn set_sampler(&mut self, unit: usize, state: SamplerState) {
        if let Some(slot) = self.bindings.samplers.get_mut(unit) {
            *slot = sampler_index(state);
        }
    }

    pub fn bind_texture(&mut self, unit: usize, texture: Option<BackendTexture>) {
        if let Some(slot) = self.bindings.textures.get_mut(unit) {
            *slot = texture;
        }
    }

    /// Forgets `texture` wherever it is bound.
    pub fn forget_texture(&mut self, texture: BackendTexture) {
        for slot in &mut self.bindings.textures {
            if *slot == Some(texture) {
                *slot = None;
            }
        }
    }

    pub fn set_vertex_constants(&mut self, constants: &VertexConstants) {
        if self.vertex_constants != *constants {
            self.vertex_constants = *constants;
            self.vertex_offset = None;
        }
    }

    pub fn set_pixel_constants(&mut self, constants: &PixelConstants) {
        if self.pixel_constants != *constants {
            self.pixel_constants = *constants;
            self.pixel_offset = None;
        }
    }

    // ── passes ────────────────────────────────────────────────────────────

    pub fn set_render_target(&mut self, target: RenderTarget) {
        self.target = target;
        self.frame.passes.push(Pass::new(target));
    }

    /// Folds into the current pass's load ops when nothing has been drawn yet.
    pub fn clear(&mut self, color: Option<[f32; 4]>, depth: Option<f32>) {
        if color.is_none() && depth.is_none() {
            return;
        }
        let reuse = matches!(self.frame.passes.last(), Some(p) if p.draws.is_empty());
        if !reuse {
            self.frame.passes.push(Pass::new(self.target));
        }
        if let Some(pass) = self.frame.passes.last_mut() {
            if color.is_some() {
                pass.clear_color = color;
            }
            if depth.is_some() {
                pass.clear_depth = depth;
            }
        }
    }

    // ── draws ─────────────────────────────────────────────────────────────

    pub fn draw_sprites(
        &mut self,
        topology: Topology,
        vertices: &[SpriteVertex],
        indices: Option<&[u16]>,
    ) {
        if vertices.is_empty() {
            return;
        }
        let (strip, indices) = match topology {
            Topology::TriangleList => (false, indices),
            Topology::TriangleStrip => (true, indices),
            // Fans are never native here; rebuild them as lists.
            Topology::TriangleFan => (false, Some(self.fans.fan(vertices.len()))),
        };

        let base_vertex = self.frame.vertices.len() as u32;
        self.frame.vertices.extend_from_slice(vertices);
        let indices = indices.map(|idx| {
            let first = self.frame.indices.len() as u32;
            self.frame.indices.extend_from_slice(idx);
            first..first + idx.len() as u32
        });
        if matches!(&indices, Some(r) if r.is_empty()) {
            return;
        }

        let source = DrawSource::Sprites {
            base_vertex,
            vertex_count: vertices.len() as u32,
            indices,
        };
        self.push_draw(VertexKind::Sprite, strip, source);
    }

    pub fn draw_model(
        &mut self,
        vertices: BackendBuffer,
        indices: BackendBuffer,
        first_index: u32,
        index_count: u32,
    ) {
        if index_count == 0 {
            return;
        }
        let source = DrawSource::Model {
            vertices,
            indices,
            first_index,
            index_count,
        };
        self.push_draw(VertexKind::Model, false, source);
    }

    fn push_draw(&mut self, vertex: VertexKind, strip: bool, source: DrawSource) {
        if self.frame.passes.is_empty() {
            self.frame.passes.push(Pass::new(self.target));
        }
        let uniform_offsets = self.stage_constants();
        let draw = RecordedDraw {
            key: DrawKey {
                blend: self.blend.mode,
                depth: self.depth,
                cull: self.raster.cull,
                strip,
                vertex,
            },
            bindings: self.bindings,
            depth_range: self.raster.depth_range,
            uniform_offsets,
            source,
        };
        if let Some(pass) = self.frame.passes.last_mut() {
            pass.draws.push(draw);
        }
    }

    fn stage_constants(&mut self) -> [u32; 2] {
        let vertex = match self.vertex_offset {
            Some(o) => o,
            None => {
                let constants = self.vertex_constants;
                let o = self.push_uniform(bytemuck::bytes_of(&constants));
                self.vertex_offset = Some(o);
                o
            }
        };
        let pixel = match self.pixel_offset {
            Some(o) => o,
            None => {
                let constants = self.pixel_constants;
                let o = self.push_uniform(bytemuck::bytes_of(&constants));
                self.pixel_offset = Some(o);
                o
            }
        };
        [vertex, pixel]
    }

    fn push_uniform(&mut self, bytes: &[u8]) -> u32 {
        let uniforms = &mut self.frame.uniforms;
        let offset = uniforms.len().next_multiple_of(self.uniform_alignment);
        uniforms.resize(offset, 0);
        uniforms.extend_from_slice(bytes);
        offset as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> [SpriteVertex; 4] {
        [SpriteVertex::new([0.0; 3], [255; 4], [0.0; 2]); 4]
    }

    fn recorder() -> FrameRecorder {
        let mut r = FrameRecorder::new(256);
        r.begin();
        r.set_render_target(RenderTarget::BackBuffer);
        r
    }

    // ── passes ────────────────────────────────────────────────────────────

    #[test]
    fn clear_before_draws_becomes_load_op() {
        let mut r = recorder();
        r.clear(Some([0.0, 0.0, 0.0, 1.0]), Some(1.0));
        r.draw_sprites(Topology::TriangleStrip, &quad(), None);

        let passes = r.passes();
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].clear_color, Some([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(passes[0].clear_depth, Some(1.0));
        assert_eq!(passes[0].draws.len(), 1);
    }

    #[test]
    fn clear_after_draws_opens_new_pass_on_same_target() {
        let mut r = recorder();
        r.draw_sprites(Topology::TriangleStrip, &quad(), None);
        r.clear(None, Some(1.0));

        let passes = r.passes();
        assert_eq!(passes.len(), 2);
        assert_eq!(passes[1].target, RenderTarget::BackBuffer);
        assert_eq!(passes[1].clear_color, None);
        assert_eq!(passes[1].clear_depth, Some(1.0));
    }

    #[test]
    fn render_target_switch_opens_pass() {
        let mut r = recorder();
        let target = RenderTarget::Texture {
            color: BackendTexture(7),
            depth: None,
        };
        r.set_render_target(target);
        r.draw_sprites(Topology::TriangleList, &quad()[..3], None);

        let passes = r.passes();
        assert_eq!(passes.len(), 2);
        assert!(passes[0].is_noop());
        assert_eq!(passes[1].target, target);
    }

    // ── draws ─────────────────────────────────────────────────────────────

    #[test]
    fn sprite_draws_share_staging_with_base_offsets() {
        let mut r = recorder();
        r.draw_sprites(Topology::TriangleList, &quad(), Some(&[0, 1, 2, 2, 3, 0]));
        r.draw_sprites(Topology::TriangleList, &quad(), Some(&[0, 1, 2]));

        let frame = r.take();
        assert_eq!(frame.vertices.len(), 8);
        assert_eq!(frame.indices.len(), 9);
        assert_eq!(
            frame.passes[0].draws[1].source,
            DrawSource::Sprites {
                base_vertex: 4,
                vertex_count: 4,
                indices: Some(6..9),
            }
        );
    }

    #[test]
    fn fans_are_rebuilt_as_lists() {
        let mut r = recorder();
        r.draw_sprites(Topology::TriangleFan, &quad(), None);

        let frame = r.take();
        assert_eq!(frame.indices, vec![0, 1, 2, 0, 2, 3]);
        assert!(!frame.passes[0].draws[0].key.strip);
    }

    #[test]
    fn empty_draws_are_dropped() {
        let mut r = recorder();
        r.draw_sprites(Topology::TriangleList, &[], None);
        r.draw_model(BackendBuffer(1), BackendBuffer(2), 0, 0);
        assert!(r.passes()[0].draws.is_empty());
    }

    #[test]
    fn draw_captures_bound_state() {
        let mut r = recorder();
        r.set_blend(BlendState {
            mode: BlendMode::Add,
        });
        r.bind_texture(1, Some(BackendTexture(3)));
        r.set_sampler(1, SamplerState { linear: false, wrap: true });
        r.draw_model(BackendBuffer(1), BackendBuffer(2), 3, 6);

        let draw = &r.passes()[0].draws[0];
        assert_eq!(draw.key.blend, BlendMode::Add);
        assert_eq!(draw.key.vertex, VertexKind::Model);
        assert_eq!(draw.bindings.textures[1], Some(BackendTexture(3)));
        assert_eq!(draw.bindings.samplers[1], 2);
    }

    #[test]
    fn forgotten_texture_is_unbound() {
        let mut r = recorder();
        r.bind_texture(0, Some(BackendTexture(5)));
        r.forget_texture(BackendTexture(5));
        r.draw_sprites(Topology::TriangleStrip, &quad(), None);
        assert_eq!(r.passes()[0].draws[0].bindings.textures[0], None);
    }

    // ── references ────────────────────────────────────────────────────────

    #[test]
    fn sampled_and_target_textures_are_referenced() {
        let mut r = recorder();
        r.bind_texture(2, Some(BackendTexture(4)));
        r.draw_sprites(Topology::TriangleStrip, &quad(), None);
        assert!(r.references_texture(BackendTexture(4)));
        assert!(!r.references_texture(BackendTexture(5)));

        r.set_render_target(RenderTarget::Texture {
            color: BackendTexture(5),
            depth: Some(BackendTexture(6)),
        });
        assert!(!r.references_texture(BackendTexture(6)));
        r.clear(None, Some(1.0));
        assert!(r.references_texture(BackendTexture(5)));
        assert!(r.references_texture(BackendTexture(6)));
    }

    #[test]
    fn model_buffers_are_referenced() {
        let mut r = recorder();
        r.draw_model(BackendBuffer(1), BackendBuffer(2), 0, 3);
        assert!(r.references_buffer(BackendBuffer(1)));
        assert!(r.references_buffer(BackendBuffer(2)));
        assert!(!r.references_buffer(BackendBuffer(3)));
    }

    #[test]
    fn take_mid_frame_continues_on_target_with_load() {
        let mut r = recorder();
        let target = RenderTarget::Texture {
            color: BackendTexture(9),
            depth: None,
        };
        r.set_render_target(target);
        r.clear(Some([0.0; 4]), None);
        r.bind_texture(0, Some(BackendTexture(3)));
        r.draw_sprites(Topology::TriangleStrip, &quad(), None);

        let first = r.take();
        assert_eq!(first.passes.len(), 2);
        assert!(!r.references_texture(BackendTexture(3)));

        r.draw_sprites(Topology::TriangleStrip, &quad(), None);
        let rest = r.take();
        assert_eq!(rest.passes.len(), 1);
        assert_eq!(rest.passes[0].target, target);
        assert_eq!(rest.passes[0].clear_color, None);
        assert_eq!(rest.passes[0].draws[0].bindings.textures[0], Some(BackendTexture(3)));
        assert_eq!(rest.passes[0].draws[0].uniform_offsets, [0, 768]);
    }

    // ── uniforms ──────────────────────────────────────────────────────────

    #[test]
    fn unchanged_constants_are_staged_once() {
        let mut r = recorder();
        r.draw_sprites(Topology::TriangleStrip, &quad(), None);
        r.draw_sprites(Topology::TriangleStrip, &quad(), None);

        let draws = &r.passes()[0].draws;
        assert_eq!(draws[0].uniform_offsets, draws[1].uniform_offsets);
        assert_eq!(draws[0].uniform_offsets, [0, 768]);
    }

    #[test]
    fn changed_constants_get_aligned_offsets() {
        let mut r = recorder();
        r.draw_sprites(Topology::TriangleStrip, &quad(), None);
        let pc = PixelConstants {
            alpha_test: 1,
            ..Default::default()
        };
        r.set_pixel_constants(&pc);
        r.draw_sprites(Topology::TriangleStrip, &quad(), None);

        let draws = &r.passes()[0].draws;
        assert_eq!(draws[1].uniform_offsets[0], draws[0].uniform_offsets[0]);
        assert_eq!(draws[1].uniform_offsets[1] % 256, 0);
        assert!(draws[1].uniform_offsets[1] > draws[0].uniform_offsets[1]);
    }

    #[test]
    fn begin_resets_frame_but_keeps_state() {
        let mut r = recorder();
        r.set_depth_stencil(DepthStencilState {
            write: true,
            ..Default::default()
        });
        r.draw_sprites(Topology::TriangleStrip, &quad(), None);
        r.begin();
        assert!(r.passes().is_empty());

        r.draw_sprites(Topology::TriangleStrip, &quad(), None);
        let frame = r.take();
        assert_eq!(frame.vertices.len(), 4);
        assert!(frame.passes[0].draws[0].key.depth.write);
        assert_eq!(frame.passes[0].draws[0].uniform_offsets, [0, 768]);
    }
}
