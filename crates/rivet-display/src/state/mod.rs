//! Requested render state and the dirty-flag diffing that feeds it to the backend.

mod blocks;
mod cache;
mod constants;

pub use blocks::{
    BlendEquation, BlendFactor, BlendMode, BlendOp, BlendState, CompareFunc, CullMode,
    DepthStencilState, RasterState, SamplerState, TextureMode, ZTestMode, z_bias_range,
};
pub use cache::{MAX_TEXTURE_UNITS, StateCache, TextureBinding, Tracked};
pub use constants::{Light, MAX_LIGHTS, Material, PixelConstants, VertexConstants};
