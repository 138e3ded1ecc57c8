use bytemuck::{Pod, Zeroable};

/// Vertex for immediate-mode sprite and primitive draws.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    /// RGBA, 0-255.
    pub color: [u8; 4],
    pub texcoord: [f32; 2],
}

impl SpriteVertex {
    pub const fn new(position: [f32; 3], color: [u8; 4], texcoord: [f32; 2]) -> Self {
        Self {
            position,
            normal: [0.0, 0.0, 1.0],
            color,
            texcoord,
        }
    }
}

/// Vertex stored in compiled geometry buffers. Models carry no per-vertex colour.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub texcoord: [f32; 2],
    /// Scale for the texture translation; anything but `(1, 1)` flags the mesh.
    pub texture_matrix_scale: [f32; 2],
}

impl ModelVertex {
    pub const fn new(position: [f32; 3], normal: [f32; 3], texcoord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            texcoord,
            texture_matrix_scale: [1.0, 1.0],
        }
    }

    pub fn needs_texture_matrix_scale(&self) -> bool {
        self.texture_matrix_scale != [1.0, 1.0]
    }
}
