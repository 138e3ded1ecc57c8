use super::Display;
use crate::backend::{GpuBackend, Topology};
use crate::draw::{MAX_INDEXED_VERTICES, SpriteVertex};
use crate::error::DisplayError;
use crate::handle::GeometryHandle;
use crate::math::without_texture_translation;
use crate::window::WindowHost;

#[derive(Copy, Clone)]
enum Pattern {
    Quads,
    QuadStrip,
    SymmetricQuadStrip,
    Fan,
}

impl<B: GpuBackend, W: WindowHost> Display<B, W> {
    /// Flushes pending state. Returns false if the draw should be dropped.
    fn prepare_draw(&mut self, vertex_count: usize) -> Result<bool, DisplayError> {
        if !self.ready || !self.in_frame {
            log::trace!("draw dropped outside an active frame");
            return Ok(false);
        }
        if vertex_count > MAX_INDEXED_VERTICES {
            log::error!("draw of {vertex_count} vertices exceeds {MAX_INDEXED_VERTICES}");
            return Err(DisplayError::TooManyVertices { count: vertex_count });
        }
        self.state.flush(&mut self.backend);
        Ok(true)
    }

    fn draw_indexed(&mut self, pattern: Pattern, vertices: &[SpriteVertex]) -> Result<(), DisplayError> {
        if !self.prepare_draw(vertices.len())? {
            return Ok(());
        }
        let indices = match pattern {
            Pattern::Quads => self.patterns.quads(vertices.len()),
            Pattern::QuadStrip => self.patterns.quad_strip(vertices.len()),
            Pattern::SymmetricQuadStrip => self.patterns.symmetric_quad_strip(vertices.len()),
            Pattern::Fan => self.patterns.fan(vertices.len()),
        };
        if indices.is_empty() {
            return Ok(());
        }
        self.backend
            .draw_sprites(Topology::TriangleList, vertices, Some(indices));
        self.stats.record(vertices.len());
        Ok(())
    }

    fn draw_direct(&mut self, topology: Topology, vertices: &[SpriteVertex]) -> Result<(), DisplayError> {
        if !self.prepare_draw(vertices.len())? {
            return Ok(());
        }
        self.backend.draw_sprites(topology, vertices, None);
        self.stats.record(vertices.len());
        Ok(())
    }

    /// Every 4 vertices form one quad.
    pub fn draw_quads(&mut self, vertices: &[SpriteVertex]) -> Result<(), DisplayError> {
        self.draw_indexed(Pattern::Quads, vertices)
    }

    /// Each pair of vertices after the first pair extends the strip by one quad.
    pub fn draw_quad_strip(&mut self, vertices: &[SpriteVertex]) -> Result<(), DisplayError> {
        self.draw_indexed(Pattern::QuadStrip, vertices)
    }

    /// Strip of 3-vertex pieces mirrored around a centre line.
    pub fn draw_symmetric_quad_strip(&mut self, vertices: &[SpriteVertex]) -> Result<(), DisplayError> {
        self.draw_indexed(Pattern::SymmetricQuadStrip, vertices)
    }

    pub fn draw_fan(&mut self, vertices: &[SpriteVertex]) -> Result<(), DisplayError> {
        if vertices.len() < 3 {
            return Ok(());
        }
        if self.backend.supports_native_fans() {
            self.draw_direct(Topology::TriangleFan, vertices)
        } else {
            self.draw_indexed(Pattern::Fan, vertices)
        }
    }

    pub fn draw_strip(&mut self, vertices: &[SpriteVertex]) -> Result<(), DisplayError> {
        if vertices.len() < 3 {
            return Ok(());
        }
        self.draw_direct(Topology::TriangleStrip, vertices)
    }

    pub fn draw_triangles(&mut self, vertices: &[SpriteVertex]) -> Result<(), DisplayError> {
        let whole = vertices.len() / 3 * 3;
        if whole == 0 {
            return Ok(());
        }
        self.draw_direct(Topology::TriangleList, &vertices[..whole])
    }

    /// Draws one mesh of a compiled geometry set.
    ///
    /// Without lighting the material colour replaces vertex colour for this draw.
    /// Meshes flagged for texture-matrix scaling draw without texture translation.
    pub fn draw_compiled_geometry(&mut self, handle: GeometryHandle, mesh_index: usize) -> Result<(), DisplayError> {
        let geometry = self
            .geometry
            .get(handle)
            .ok_or(DisplayError::InvalidHandle { kind: "geometry" })?;
        let info = *geometry.mesh(mesh_index)?;
        let (vertex_buffer, index_buffer) = geometry.buffers();

        if info.triangle_count == 0 {
            return Ok(());
        }

        let lighting = self.state.lighting();
        let saved_factor = self.state.pixel_constants().use_texture_factor != 0;
        let saved_texture = self.state.vertex_constants().texture;

        if !lighting {
            self.state.set_use_texture_factor(true);
        }
        if info.needs_texture_matrix_scale {
            self.state
                .set_texture_matrix(&without_texture_translation(&saved_texture));
        }

        let result = self.prepare_draw(info.vertex_count as usize);
        if let Ok(true) = result {
            self.backend.draw_model(
                vertex_buffer,
                index_buffer,
                info.triangle_start * 3,
                info.triangle_count * 3,
            );
            self.stats.record(info.vertex_count as usize);
        }

        if !lighting {
            self.state.set_use_texture_factor(saved_factor);
        }
        if info.needs_texture_matrix_scale {
            self.state.set_texture_matrix(&saved_texture);
        }
        result.map(|_| ())
    }
}
