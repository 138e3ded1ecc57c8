//! Index synthesis for topologies the GPU cannot draw directly.
//!
//! Each pattern keeps its own scratch buffer. Buffers only grow, and only the indices
//! past the previous length are generated, so steady-state draws allocate nothing.

/// Largest vertex count addressable by a 16-bit index.
pub const MAX_INDEXED_VERTICES: usize = u16::MAX as usize + 1;

const SYMMETRIC_PIECE: [u16; 12] = [1, 3, 0, 1, 4, 3, 1, 5, 4, 1, 2, 5];

#[derive(Debug, Default)]
pub struct IndexPatterns {
    quads: Vec<u16>,
    quad_strip: Vec<u16>,
    symmetric_quad_strip: Vec<u16>,
    fan: Vec<u16>,
}

impl IndexPatterns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two triangles per quad: `(0, 1, 2)` and `(2, 3, 0)`.
    pub fn quads(&mut self, vertex_count: usize) -> &[u16] {
        let quads = vertex_count / 4;
        grow(&mut self.quads, quads, 6, |i, out| {
            let b = (i * 4) as u16;
            out.extend_from_slice(&[b, b + 1, b + 2, b + 2, b + 3, b]);
        });
        &self.quads[..quads * 6]
    }

    /// Two triangles per quad sharing the edge with the next quad.
    pub fn quad_strip(&mut self, vertex_count: usize) -> &[u16] {
        let quads = vertex_count.saturating_sub(2) / 2;
        grow(&mut self.quad_strip, quads, 6, |i, out| {
            let b = (i * 2) as u16;
            out.extend_from_slice(&[b, b + 1, b + 2, b + 1, b + 2, b + 3]);
        });
        &self.quad_strip[..quads * 6]
    }

    /// Four triangles per three-vertex piece, fanned around the piece's centre vertex.
    pub fn symmetric_quad_strip(&mut self, vertex_count: usize) -> &[u16] {
        let pieces = vertex_count.saturating_sub(3) / 3;
        grow(&mut self.symmetric_quad_strip, pieces, 12, |i, out| {
            let b = (i * 3) as u16;
            out.extend(SYMMETRIC_PIECE.iter().map(|&k| b + k));
        });
        &self.symmetric_quad_strip[..pieces * 12]
    }

    /// Triangle `i` is `(0, i + 1, i + 2)`.
    pub fn fan(&mut self, vertex_count: usize) -> &[u16] {
        let triangles = vertex_count.saturating_sub(2);
        grow(&mut self.fan, triangles, 3, |i, out| {
            let b = i as u16;
            out.extend_from_slice(&[0, b + 1, b + 2]);
        });
        &self.fan[..triangles * 3]
    }

    /// Total indices held across every scratch buffer.
    pub fn capacity(&self) -> usize {
        self.quads.len() + self.quad_strip.len() + self.symmetric_quad_strip.len() + self.fan.len()
    }
}

fn grow(buf: &mut Vec<u16>, units: usize, per_unit: usize, mut emit: impl FnMut(usize, &mut Vec<u16>)) {
    let have = buf.len() / per_unit;
    for i in have..units {
        emit(i, buf);
    }
}
