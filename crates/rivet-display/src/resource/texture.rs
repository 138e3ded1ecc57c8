use crate::backend::{
    BackendError, BackendTexture, GpuBackend, RenderTarget, TextureDesc, TextureUsage,
};
use crate::error::DisplayError;
use crate::handle::{Registry, TextureHandle, TextureKind};
use crate::pixel::{FormatSupport, PixelFormat, Region, Surface, blit, mips};

use super::palette::PaletteCache;

/// One live texture or render target.
#[derive(Debug)]
pub struct TextureEntry {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub texture: BackendTexture,
    /// Depth buffer paired with a render target.
    pub depth: Option<BackendTexture>,
    pub render_target: bool,
    /// Level 0 kept on the CPU so partial updates can rebuild the mip chain.
    shadow: Option<Vec<u8>>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RenderTargetParams {
    pub width: u32,
    pub height: u32,
    pub with_alpha: bool,
    pub with_depth: bool,
}

impl Default for RenderTargetParams {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            with_alpha: true,
            with_depth: false,
        }
    }
}

/// Writable staging memory for one texture region.
///
/// Nothing reaches the texture until `unmap`. Holding the region borrows the backend
/// mutably, so no draw can read the texture and no second mapping can open meanwhile.
pub struct MappedRegion<'a, B: GpuBackend + ?Sized> {
    backend: &'a mut B,
    texture: BackendTexture,
    region: Region,
    pitch: usize,
    data: Vec<u8>,
}

impl<'a, B: GpuBackend + ?Sized> MappedRegion<'a, B> {
    fn new(backend: &'a mut B, texture: BackendTexture, format: PixelFormat, region: Region) -> Self {
        let pitch = region.width as usize * format.bytes_per_pixel();
        Self {
            backend,
            texture,
            region,
            pitch,
            data: vec![0; pitch * region.height as usize],
        }
    }

    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Commits the written pixels to mip level 0.
    pub fn unmap(self) -> Result<(), BackendError> {
        self.backend
            .write_texture(self.texture, 0, self.region, &self.data, self.pitch as u32)
    }
}

/// Owns every texture and render target, plus the palette slot cache.
pub struct TextureManager {
    textures: Registry<TextureKind, TextureEntry>,
    palettes: PaletteCache,
}

impl TextureManager {
    pub fn new(palette_slots: usize) -> Self {
        Self {
            textures: Registry::new(),
            palettes: PaletteCache::new(palette_slots),
        }
    }

    pub fn get(&self, handle: TextureHandle) -> Option<&TextureEntry> {
        self.textures.get(handle)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn palettes(&self) -> &PaletteCache {
        &self.palettes
    }

    pub fn supports_format<B: GpuBackend + ?Sized>(&self, backend: &B, format: PixelFormat) -> bool {
        if format.is_paletted() && self.palettes.slot_count() == 0 {
            return false;
        }
        backend.format_support(format).contains(FormatSupport::TEXTURE_2D)
    }

    /// Allocates a power-of-two texture large enough for `surface` and uploads it.
    pub fn create_texture<B: GpuBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        format: PixelFormat,
        surface: &Surface,
        generate_mips: bool,
    ) -> Result<TextureHandle, DisplayError> {
        if !self.supports_format(backend, format) {
            log::warn!("create_texture: {format:?} is not supported");
            return Err(DisplayError::UnsupportedTextureFormat(format));
        }

        let width = surface.width.max(1).next_power_of_two();
        let height = surface.height.max(1).next_power_of_two();
        let mip_levels = if generate_mips && mips::can_generate(format) {
            mips::mip_level_count(width, height)
        } else {
            1
        };

        let texture = backend.create_texture(&TextureDesc {
            width,
            height,
            format,
            mip_levels,
            usage: TextureUsage::Sampled,
        })?;

        let shadow = (mip_levels > 1)
            .then(|| vec![0u8; (width * height) as usize * format.bytes_per_pixel()]);
        let handle = self.textures.insert(TextureEntry {
            format,
            width,
            height,
            mip_levels,
            texture,
            depth: None,
            render_target: false,
            shadow,
        });

        if format.is_paletted() {
            let palette = surface
                .palette
                .clone()
                .unwrap_or_else(|| Box::new([[0; 4]; 256]));
            self.palettes.insert_palette(handle, palette);
        }

        log::debug!(
            "created texture {handle:?}: {width}x{height} {format:?}, {mip_levels} mip level(s)"
        );

        let full = Region::full(surface.width, surface.height);
        if let Err(e) = self.update_texture(backend, handle, surface, full) {
            self.delete_texture(backend, handle)?;
            return Err(e);
        }
        Ok(handle)
    }

    /// Uploads the top-left `region.width` x `region.height` pixels of `surface` to
    /// `region` of the texture.
    pub fn update_texture<B: GpuBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        handle: TextureHandle,
        surface: &Surface,
        region: Region,
    ) -> Result<(), DisplayError> {
        let entry = self
            .textures
            .get_mut(handle)
            .ok_or(DisplayError::InvalidHandle { kind: "texture" })?;

        if !region.fits_within(entry.width, entry.height) {
            log::error!(
                "update_texture: region {region:?} outside {}x{} texture",
                entry.width,
                entry.height
            );
            return Err(DisplayError::RegionOutOfBounds {
                region,
                width: entry.width,
                height: entry.height,
            });
        }
        if region.width > surface.width || region.height > surface.height {
            log::error!(
                "update_texture: region {region:?} larger than {}x{} source",
                surface.width,
                surface.height
            );
            return Err(DisplayError::RegionOutOfBounds {
                region,
                width: surface.width,
                height: surface.height,
            });
        }
        if region.is_empty() {
            return Ok(());
        }

        let mut map = MappedRegion::new(backend, entry.texture, entry.format, region);
        let pitch = map.pitch();
        blit::blit(surface, entry.format, map.data_mut(), pitch, region.width, region.height)?;

        if let Some(shadow) = entry.shadow.as_mut() {
            let bpp = entry.format.bytes_per_pixel();
            let shadow_pitch = entry.width as usize * bpp;
            for (y, row) in map.data().chunks_exact(pitch).enumerate() {
                let start = (region.y as usize + y) * shadow_pitch + region.x as usize * bpp;
                shadow[start..start + pitch].copy_from_slice(row);
            }
        }
        map.unmap()?;

        if let Some(shadow) = entry.shadow.as_ref() {
            upload_mip_chain(backend, entry.texture, shadow, entry.width, entry.height, entry.mip_levels)?;
        }
        Ok(())
    }

    /// Releases the texture, its depth buffer and its palette. `NONE` is a no-op.
    pub fn delete_texture<B: GpuBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        handle: TextureHandle,
    ) -> Result<(), DisplayError> {
        if handle.is_none() {
            return Ok(());
        }
        let Some(entry) = self.textures.remove(handle) else {
            log::warn!("delete_texture: stale handle {handle:?}");
            return Err(DisplayError::InvalidHandle { kind: "texture" });
        };
        backend.destroy_texture(entry.texture);
        if let Some(depth) = entry.depth {
            backend.destroy_texture(depth);
        }
        self.palettes.release(handle);
        Ok(())
    }

    /// Allocates a sampleable colour target, clamped to the device's size limit.
    /// Returns the handle and the realized extent.
    pub fn create_render_target<B: GpuBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        params: RenderTargetParams,
    ) -> Result<(TextureHandle, u32, u32), DisplayError> {
        let max = backend.max_texture_size();
        let width = params.width.clamp(1, max);
        let height = params.height.clamp(1, max);
        if (width, height) != (params.width, params.height) {
            log::debug!(
                "render target {}x{} clamped to {width}x{height}",
                params.width,
                params.height
            );
        }

        let wanted = FormatSupport::TEXTURE_2D | FormatSupport::RENDER_TARGET;
        let format = if !params.with_alpha && backend.format_support(PixelFormat::Bgrx8).contains(wanted) {
            PixelFormat::Bgrx8
        } else {
            PixelFormat::Rgba8
        };

        let texture = backend.create_texture(&TextureDesc {
            width,
            height,
            format,
            mip_levels: 1,
            usage: TextureUsage::RenderTarget,
        })?;

        let depth = if params.with_depth {
            match backend.create_texture(&TextureDesc {
                width,
                height,
                format,
                mip_levels: 1,
                usage: TextureUsage::Depth,
            }) {
                Ok(d) => Some(d),
                Err(e) => {
                    backend.destroy_texture(texture);
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        let handle = self.textures.insert(TextureEntry {
            format,
            width,
            height,
            mip_levels: 1,
            texture,
            depth,
            render_target: true,
            shadow: None,
        });
        log::debug!("created render target {handle:?}: {width}x{height} {format:?}");
        Ok((handle, width, height))
    }

    /// Resolves a handle to a draw target. `NONE` selects the back buffer.
    pub fn render_target(&self, handle: TextureHandle) -> Result<RenderTarget, DisplayError> {
        if handle.is_none() {
            return Ok(RenderTarget::BackBuffer);
        }
        match self.textures.get(handle) {
            Some(e) if e.render_target => Ok(RenderTarget::Texture {
                color: e.texture,
                depth: e.depth,
            }),
            Some(_) => {
                log::error!("set_render_target: {handle:?} is not a render target");
                Err(DisplayError::InvalidHandle {
                    kind: "render target",
                })
            }
            None => Err(DisplayError::InvalidHandle {
                kind: "render target",
            }),
        }
    }

    /// Activates the palette of `handle` if it has one.
    pub fn ensure_palette<B: GpuBackend + ?Sized>(&mut self, backend: &mut B, handle: TextureHandle) {
        self.palettes.ensure_loaded(handle, backend);
    }

    /// Destroys every texture. Used at teardown.
    pub fn release_all<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) {
        let handles: Vec<_> = self.textures.iter().map(|(h, _)| h).collect();
        for h in handles {
            if let Err(e) = self.delete_texture(backend, h) {
                log::warn!("release_all: {e}");
            }
        }
    }
}

fn upload_mip_chain<B: GpuBackend + ?Sized>(
    backend: &mut B,
    texture: BackendTexture,
    level0: &[u8],
    width: u32,
    height: u32,
    levels: u32,
) -> Result<(), BackendError> {
    let (mut data, mut w, mut h) = mips::downsample(level0, width, height);
    for level in 1..levels {
        backend.write_texture(texture, level, Region::full(w, h), &data, w * 4)?;
        if level + 1 < levels {
            (data, w, h) = mips::downsample(&data, w, h);
        }
    }
    Ok(())
}
