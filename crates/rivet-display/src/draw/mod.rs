//! Vertex formats and primitive emulation.

pub mod emulate;
pub mod vertex;

pub use emulate::{IndexPatterns, MAX_INDEXED_VERTICES};
pub use vertex::{ModelVertex, SpriteVertex};

/// Per-frame submission counters.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct DrawStats {
    pub draw_calls: u32,
    pub vertices: u64,
}

impl DrawStats {
    pub(crate) fn record(&mut self, vertices: usize) {
        self.draw_calls += 1;
        self.vertices += vertices as u64;
    }
}
