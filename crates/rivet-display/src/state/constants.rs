use bytemuck::{Pod, Zeroable};

use crate::math::{IDENTITY, Mat4};

pub const MAX_LIGHTS: usize = 4;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Light {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    /// xyz direction; w is 1.0 when the light is on.
    pub direction: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Material {
    pub emissive: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    /// x = shininess.
    pub power: [f32; 4],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            emissive: [0.0, 0.0, 0.0, 0.0],
            ambient: [0.2, 0.2, 0.2, 1.0],
            diffuse: [0.8, 0.8, 0.8, 1.0],
            specular: [0.0, 0.0, 0.0, 0.0],
            power: [0.0; 4],
        }
    }
}

/// Vertex-stage uniform block.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct VertexConstants {
    pub projection: Mat4,
    pub view: Mat4,
    pub world: Mat4,
    pub texture: Mat4,
    pub lights: [Light; MAX_LIGHTS],
    pub material: Material,
    pub lighting: u32,
    /// Bit per texture unit.
    pub sphere_map: u32,
    pub _pad: [u32; 2],
}

impl Default for VertexConstants {
    fn default() -> Self {
        Self {
            projection: IDENTITY,
            view: IDENTITY,
            world: IDENTITY,
            texture: IDENTITY,
            lights: [Light::zeroed(); MAX_LIGHTS],
            material: Material::default(),
            lighting: 0,
            sphere_map: 0,
            _pad: [0; 2],
        }
    }
}

/// Fragment-stage uniform block.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PixelConstants {
    pub texture_modes: [u32; 4],
    /// Constant colour used instead of vertex colour when `use_texture_factor` is set.
    pub texture_factor: [f32; 4],
    pub alpha_test: u32,
    pub use_texture_factor: u32,
    /// Bit per texture unit with a texture bound.
    pub bound_units: u32,
    pub _pad: u32,
}

impl Default for PixelConstants {
    fn default() -> Self {
        Self {
            texture_modes: [0; 4],
            texture_factor: [1.0; 4],
            alpha_test: 0,
            use_texture_factor: 0,
            bound_units: 0,
            _pad: 0,
        }
    }
}
