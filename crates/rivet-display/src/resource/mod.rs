//! GPU resources addressed by opaque handles: textures, render targets, palettes and
//! compiled geometry.

mod geometry;
mod palette;
mod texture;

pub use geometry::{CompiledGeometry, Mesh, MeshInfo};
pub use palette::PaletteCache;
pub use texture::{MappedRegion, RenderTargetParams, TextureEntry, TextureManager};
