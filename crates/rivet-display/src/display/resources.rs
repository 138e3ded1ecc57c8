use super::Display;
use crate::backend::GpuBackend;
use crate::error::DisplayError;
use crate::handle::{GeometryHandle, TextureHandle};
use crate::pixel::{PixelFormat, Region, Surface};
use crate::resource::{CompiledGeometry, Mesh, RenderTargetParams, TextureEntry};
use crate::window::WindowHost;

impl<B: GpuBackend, W: WindowHost> Display<B, W> {
    // ── textures ──────────────────────────────────────────────────────────

    pub fn create_texture(
        &mut self,
        format: PixelFormat,
        surface: &Surface,
        generate_mips: bool,
    ) -> Result<TextureHandle, DisplayError> {
        self.textures
            .create_texture(&mut self.backend, format, surface, generate_mips)
    }

    pub fn update_texture(
        &mut self,
        texture: TextureHandle,
        surface: &Surface,
        region: Region,
    ) -> Result<(), DisplayError> {
        debug_assert!(!texture.is_none(), "update_texture on the NONE handle");
        self.textures
            .update_texture(&mut self.backend, texture, surface, region)
    }

    /// Unbinds the texture everywhere it is in use, then frees it. `NONE` is a no-op.
    pub fn delete_texture(&mut self, texture: TextureHandle) -> Result<(), DisplayError> {
        if texture.is_none() {
            return Ok(());
        }
        self.state.unbind_texture(texture);
        if self.render_target == texture {
            self.render_target = TextureHandle::NONE;
            if self.in_frame {
                self.backend.set_render_target(crate::backend::RenderTarget::BackBuffer);
            }
        }
        self.textures.delete_texture(&mut self.backend, texture)
    }

    pub fn texture(&self, texture: TextureHandle) -> Option<&TextureEntry> {
        self.textures.get(texture)
    }

    // ── render targets ────────────────────────────────────────────────────

    /// Returns the handle and the realized size, which is clamped to the device limit.
    pub fn create_render_target(
        &mut self,
        params: RenderTargetParams,
    ) -> Result<(TextureHandle, u32, u32), DisplayError> {
        self.textures.create_render_target(&mut self.backend, params)
    }

    /// Redirects draws to `target`; `NONE` restores the back buffer. Unless
    /// `preserve` is set a texture target is cleared to transparent black.
    pub fn set_render_target(&mut self, target: TextureHandle, preserve: bool) -> Result<(), DisplayError> {
        let resolved = self.textures.render_target(target)?;
        self.render_target = target;
        if !(self.ready && self.in_frame) {
            return Ok(());
        }
        self.backend.set_render_target(resolved);
        if !target.is_none() && !preserve {
            let depth = self.textures.get(target).and_then(|e| e.depth).map(|_| 1.0);
            self.backend.clear(Some([0.0; 4]), depth);
        }
        Ok(())
    }

    pub fn render_target(&self) -> TextureHandle {
        self.render_target
    }

    // ── compiled geometry ─────────────────────────────────────────────────

    /// Allocates buffers for `meshes` and uploads them.
    pub fn create_compiled_geometry(&mut self, meshes: &[Mesh]) -> Result<GeometryHandle, DisplayError> {
        let mut geometry = CompiledGeometry::allocate(&mut self.backend, meshes)?;
        if let Err(e) = geometry.change(&mut self.backend, meshes) {
            geometry.release(&mut self.backend);
            return Err(e);
        }
        Ok(self.geometry.insert(geometry))
    }

    /// Re-uploads meshes whose shape is unchanged.
    pub fn change_compiled_geometry(&mut self, handle: GeometryHandle, meshes: &[Mesh]) -> Result<(), DisplayError> {
        let geometry = self
            .geometry
            .get_mut(handle)
            .ok_or(DisplayError::InvalidHandle { kind: "geometry" })?;
        geometry.change(&mut self.backend, meshes)
    }

    /// Uploads meshes, reallocating only if their shape changed.
    pub fn set_compiled_geometry(&mut self, handle: GeometryHandle, meshes: &[Mesh]) -> Result<(), DisplayError> {
        let geometry = self
            .geometry
            .get_mut(handle)
            .ok_or(DisplayError::InvalidHandle { kind: "geometry" })?;
        geometry.set(&mut self.backend, meshes)
    }

    pub fn delete_compiled_geometry(&mut self, handle: GeometryHandle) -> Result<(), DisplayError> {
        if handle.is_none() {
            return Ok(());
        }
        let geometry = self
            .geometry
            .remove(handle)
            .ok_or(DisplayError::InvalidHandle { kind: "geometry" })?;
        geometry.release(&mut self.backend);
        Ok(())
    }

    pub fn compiled_geometry(&self, handle: GeometryHandle) -> Option<&CompiledGeometry> {
        self.geometry.get(handle)
    }
}
