use super::Display;
use crate::backend::GpuBackend;
use crate::error::DisplayError;
use crate::handle::TextureHandle;
use crate::math::Mat4;
use crate::state::{
    BlendMode, CullMode, Light, MAX_TEXTURE_UNITS, Material, TextureBinding, TextureMode, ZTestMode,
};
use crate::window::WindowHost;

/// Setters only record the requested state; the backend sees it at the next draw.
impl<B: GpuBackend, W: WindowHost> Display<B, W> {
    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.state.set_blend_mode(mode);
    }

    pub fn set_cull_mode(&mut self, mode: CullMode) {
        self.state.set_cull_mode(mode);
    }

    pub fn set_z_write(&mut self, enabled: bool) {
        self.state.set_z_write(enabled);
    }

    pub fn is_z_write_enabled(&self) -> bool {
        self.state.depth_stencil().write
    }

    pub fn set_z_test_mode(&mut self, mode: ZTestMode) {
        self.state.set_z_test_mode(mode);
    }

    pub fn is_z_test_enabled(&self) -> bool {
        self.state.depth_stencil().test != ZTestMode::Off
    }

    /// `bias` in `[0, 1]` pulls geometry towards the viewer.
    pub fn set_z_bias(&mut self, bias: f32) {
        self.state.set_z_bias(bias);
    }

    /// Clears depth on the current target immediately.
    pub fn clear_z_buffer(&mut self) {
        if self.ready && self.in_frame {
            self.backend.clear(None, Some(1.0));
        }
    }

    // ── textures ──────────────────────────────────────────────────────────

    /// Binds `texture` to `unit`; `NONE` unbinds. Units past the hardware limit are
    /// ignored.
    pub fn set_texture(&mut self, unit: usize, texture: TextureHandle) -> Result<(), DisplayError> {
        if texture.is_none() {
            self.state.set_texture(unit, None);
            return Ok(());
        }
        let Some(entry) = self.textures.get(texture) else {
            log::error!("set_texture: stale handle {texture:?}");
            return Err(DisplayError::InvalidHandle { kind: "texture" });
        };
        let binding = TextureBinding {
            handle: texture,
            texture: entry.texture,
        };
        self.state.set_texture(unit, Some(binding));
        if unit < MAX_TEXTURE_UNITS {
            self.textures.ensure_palette(&mut self.backend, texture);
        }
        Ok(())
    }

    pub fn clear_all_textures(&mut self) {
        for unit in 0..MAX_TEXTURE_UNITS {
            self.state.set_texture(unit, None);
        }
    }

    pub fn set_texture_mode(&mut self, unit: usize, mode: TextureMode) {
        self.state.set_texture_mode(unit, mode);
    }

    pub fn set_texture_filtering(&mut self, unit: usize, linear: bool) {
        self.state.set_texture_filtering(unit, linear);
    }

    pub fn set_texture_wrapping(&mut self, unit: usize, wrap: bool) {
        self.state.set_texture_wrapping(unit, wrap);
    }

    pub fn set_sphere_environment_mapping(&mut self, unit: usize, enabled: bool) {
        self.state.set_sphere_environment_mapping(unit, enabled);
    }

    // ── lighting ──────────────────────────────────────────────────────────

    pub fn set_alpha_test(&mut self, enabled: bool) {
        self.state.set_alpha_test(enabled);
    }

    pub fn set_lighting(&mut self, enabled: bool) {
        self.state.set_lighting(enabled);
    }

    pub fn set_material(&mut self, material: &Material) {
        self.state.set_material(material);
    }

    pub fn set_light_off(&mut self, index: usize) {
        self.state.set_light_off(index);
    }

    /// Directional light pointing along `direction`. Z is flipped into the
    /// left-handed view space the shader lights in.
    pub fn set_light_directional(
        &mut self,
        index: usize,
        ambient: [f32; 4],
        diffuse: [f32; 4],
        specular: [f32; 4],
        direction: [f32; 3],
    ) {
        self.state.set_light(
            index,
            Light {
                ambient,
                diffuse,
                specular,
                direction: [direction[0], direction[1], -direction[2], 1.0],
            },
        );
    }

    // ── transforms ────────────────────────────────────────────────────────

    pub fn set_transforms(&mut self, projection: &Mat4, view: &Mat4, world: &Mat4) {
        self.state.set_transforms(projection, view, world);
    }

    pub fn set_texture_matrix(&mut self, texture: &Mat4) {
        self.state.set_texture_matrix(texture);
    }
}
