use crate::backend::{BackendTexture, GpuBackend};
use crate::handle::TextureHandle;
use crate::math::Mat4;

use super::blocks::{
    BlendMode, BlendState, CullMode, DepthStencilState, RasterState, SamplerState, TextureMode,
    ZTestMode, z_bias_range,
};
use super::constants::{Light, MAX_LIGHTS, Material, PixelConstants, VertexConstants};

pub const MAX_TEXTURE_UNITS: usize = 4;

/// A requested state value and whether the backend has seen it yet.
#[derive(Debug, Clone)]
pub struct Tracked<T> {
    value: T,
    dirty: bool,
}

impl<T: PartialEq + Clone> Tracked<T> {
    /// New blocks start dirty so the first draw applies the defaults.
    pub fn new(value: T) -> Self {
        Self { value, dirty: true }
    }

    #[inline]
    pub fn get(&self) -> &T {
        &self.value
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Stores `value`; marks dirty only if it differs from the recorded one.
    pub fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        self.dirty = true;
        true
    }

    pub fn modify(&mut self, f: impl FnOnce(&mut T)) -> bool {
        let mut next = self.value.clone();
        f(&mut next);
        self.set(next)
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Runs `apply` if dirty, clearing the flag only once it has returned.
    fn flush_with(&mut self, apply: impl FnOnce(&T)) -> bool {
        if !self.dirty {
            return false;
        }
        apply(&self.value);
        self.dirty = false;
        true
    }
}

/// A texture bound to a unit, remembered by handle so deletion can unbind it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureBinding {
    pub handle: TextureHandle,
    pub texture: BackendTexture,
}

/// Requested render state, diffed against what the backend last received.
#[derive(Debug, Clone)]
pub struct StateCache {
    raster: Tracked<RasterState>,
    depth_stencil: Tracked<DepthStencilState>,
    blend: Tracked<BlendState>,
    samplers: [Tracked<SamplerState>; MAX_TEXTURE_UNITS],
    textures: [Tracked<Option<TextureBinding>>; MAX_TEXTURE_UNITS],
    vertex: Tracked<VertexConstants>,
    pixel: Tracked<PixelConstants>,
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCache {
    pub fn new() -> Self {
        Self {
            raster: Tracked::new(RasterState::default()),
            depth_stencil: Tracked::new(DepthStencilState::default()),
            blend: Tracked::new(BlendState::default()),
            samplers: std::array::from_fn(|_| Tracked::new(SamplerState::default())),
            textures: std::array::from_fn(|_| Tracked::new(None)),
            vertex: Tracked::new(VertexConstants::default()),
            pixel: Tracked::new(PixelConstants::default()),
        }
    }

    /// Applies dirty blocks in raster, depth/stencil, blend, sampler, texture,
    /// constant order. Returns how many backend calls were made.
    pub fn flush<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) -> usize {
        let mut calls = 0;
        calls += self.raster.flush_with(|s| backend.apply_raster(s)) as usize;
        calls += self.depth_stencil.flush_with(|s| backend.apply_depth_stencil(s)) as usize;
        calls += self.blend.flush_with(|s| backend.apply_blend(s)) as usize;
        for (unit, sampler) in self.samplers.iter_mut().enumerate() {
            calls += sampler.flush_with(|s| backend.apply_sampler(unit, s)) as usize;
        }
        for (unit, texture) in self.textures.iter_mut().enumerate() {
            calls += texture.flush_with(|t| backend.bind_texture(unit, t.map(|b| b.texture))) as usize;
        }
        calls += self.vertex.flush_with(|c| backend.apply_vertex_constants(c)) as usize;
        calls += self.pixel.flush_with(|c| backend.apply_pixel_constants(c)) as usize;
        calls
    }

    /// Marks every block dirty, e.g. after the device or swapchain was rebuilt.
    pub fn invalidate(&mut self) {
        self.raster.mark_dirty();
        self.depth_stencil.mark_dirty();
        self.blend.mark_dirty();
        self.samplers.iter_mut().for_each(Tracked::mark_dirty);
        self.textures.iter_mut().for_each(Tracked::mark_dirty);
        self.vertex.mark_dirty();
        self.pixel.mark_dirty();
    }

    pub fn is_dirty(&self) -> bool {
        self.raster.is_dirty()
            || self.depth_stencil.is_dirty()
            || self.blend.is_dirty()
            || self.samplers.iter().any(Tracked::is_dirty)
            || self.textures.iter().any(Tracked::is_dirty)
            || self.vertex.is_dirty()
            || self.pixel.is_dirty()
    }

    // ── raster / depth / blend ────────────────────────────────────────────

    pub fn set_cull_mode(&mut self, cull: CullMode) {
        self.raster.modify(|r| r.cull = cull);
    }

    pub fn set_z_bias(&mut self, bias: f32) {
        let range = z_bias_range(bias.clamp(0.0, 1.0));
        self.raster.modify(|r| r.depth_range = range);
    }

    pub fn raster(&self) -> &RasterState {
        self.raster.get()
    }

    pub fn set_z_write(&mut self, write: bool) {
        self.depth_stencil.modify(|d| d.write = write);
    }

    pub fn set_z_test_mode(&mut self, mode: ZTestMode) {
        self.depth_stencil.modify(|d| d.test = mode);
    }

    pub fn depth_stencil(&self) -> &DepthStencilState {
        self.depth_stencil.get()
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend.set(BlendState { mode });
    }

    pub fn blend(&self) -> &BlendState {
        self.blend.get()
    }

    // ── texture units ─────────────────────────────────────────────────────

    fn unit_supported(unit: usize) -> bool {
        if unit >= MAX_TEXTURE_UNITS {
            log::trace!("texture unit {unit} ignored; {MAX_TEXTURE_UNITS} units available");
            return false;
        }
        true
    }

    pub fn set_texture_filtering(&mut self, unit: usize, linear: bool) {
        if Self::unit_supported(unit) {
            self.samplers[unit].modify(|s| s.linear = linear);
        }
    }

    pub fn set_texture_wrapping(&mut self, unit: usize, wrap: bool) {
        if Self::unit_supported(unit) {
            self.samplers[unit].modify(|s| s.wrap = wrap);
        }
    }

    pub fn sampler(&self, unit: usize) -> Option<&SamplerState> {
        self.samplers.get(unit).map(Tracked::get)
    }

    pub fn set_texture(&mut self, unit: usize, binding: Option<TextureBinding>) {
        if !Self::unit_supported(unit) {
            return;
        }
        self.textures[unit].set(binding);
        let bit = 1u32 << unit;
        self.pixel.modify(|p| {
            if binding.is_some() {
                p.bound_units |= bit;
            } else {
                p.bound_units &= !bit;
            }
        });
    }

    pub fn texture(&self, unit: usize) -> Option<TextureBinding> {
        self.textures.get(unit).and_then(|t| *t.get())
    }

    /// Unbinds `handle` from every unit it occupies.
    pub fn unbind_texture(&mut self, handle: TextureHandle) {
        for unit in 0..MAX_TEXTURE_UNITS {
            if self.texture(unit).is_some_and(|b| b.handle == handle) {
                self.set_texture(unit, None);
            }
        }
    }

    pub fn set_texture_mode(&mut self, unit: usize, mode: TextureMode) {
        if Self::unit_supported(unit) {
            self.pixel
                .modify(|p| p.texture_modes[unit] = mode.shader_code());
        }
    }

    pub fn set_sphere_environment_mapping(&mut self, unit: usize, enabled: bool) {
        if !Self::unit_supported(unit) {
            return;
        }
        let bit = 1u32 << unit;
        self.vertex.modify(|v| {
            if enabled {
                v.sphere_map |= bit;
            } else {
                v.sphere_map &= !bit;
            }
        });
    }

    // ── constants ─────────────────────────────────────────────────────────

    pub fn set_alpha_test(&mut self, enabled: bool) {
        self.pixel.modify(|p| p.alpha_test = enabled as u32);
    }

    pub fn set_lighting(&mut self, enabled: bool) {
        self.vertex.modify(|v| v.lighting = enabled as u32);
    }

    pub fn lighting(&self) -> bool {
        self.vertex.get().lighting != 0
    }

    /// With lighting on the material feeds the lighting equation; with lighting off
    /// its summed colour becomes the constant texture factor.
    pub fn set_material(&mut self, material: &Material) {
        if self.lighting() {
            self.vertex.modify(|v| v.material = *material);
        } else {
            let mut c = material.diffuse;
            for i in 0..3 {
                c[i] += material.emissive[i] + material.ambient[i];
            }
            self.pixel.modify(|p| p.texture_factor = c);
        }
    }

    pub fn set_use_texture_factor(&mut self, enabled: bool) {
        self.pixel.modify(|p| p.use_texture_factor = enabled as u32);
    }

    pub fn set_light(&mut self, index: usize, light: Light) {
        if index >= MAX_LIGHTS {
            log::trace!("light {index} ignored; {MAX_LIGHTS} lights available");
            return;
        }
        self.vertex.modify(|v| v.lights[index] = light);
    }

    pub fn set_light_off(&mut self, index: usize) {
        if index >= MAX_LIGHTS {
            return;
        }
        self.vertex.modify(|v| v.lights[index].direction[3] = 0.0);
    }

    pub fn set_transforms(&mut self, projection: &Mat4, view: &Mat4, world: &Mat4) {
        self.vertex.modify(|v| {
            v.projection = *projection;
            v.view = *view;
            v.world = *world;
        });
    }

    pub fn set_texture_matrix(&mut self, texture: &Mat4) {
        self.vertex.modify(|v| v.texture = *texture);
    }

    pub fn vertex_constants(&self) -> &VertexConstants {
        self.vertex.get()
    }

    pub fn pixel_constants(&self) -> &PixelConstants {
        self.pixel.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Call, RecordingBackend};
    use crate::math::translation;

    fn flushed() -> (StateCache, RecordingBackend) {
        let mut cache = StateCache::new();
        let mut backend = RecordingBackend::new();
        cache.flush(&mut backend);
        backend.take_calls();
        (cache, backend)
    }

    // ── initial state ─────────────────────────────────────────────────────

    #[test]
    fn first_flush_applies_every_block_in_order() {
        let mut cache = StateCache::new();
        let mut backend = RecordingBackend::new();
        let calls = cache.flush(&mut backend);
        assert_eq!(calls, 3 + 2 * MAX_TEXTURE_UNITS + 2);

        let names: Vec<&str> = backend.calls().iter().map(Call::name).collect();
        let mut expected = vec!["raster", "depth_stencil", "blend"];
        expected.extend(std::iter::repeat_n("sampler", MAX_TEXTURE_UNITS));
        expected.extend(std::iter::repeat_n("bind_texture", MAX_TEXTURE_UNITS));
        expected.extend(["vertex_constants", "pixel_constants"]);
        assert_eq!(names, expected);
    }

    #[test]
    fn clean_cache_flushes_nothing() {
        let (mut cache, mut backend) = flushed();
        assert_eq!(cache.flush(&mut backend), 0);
        assert!(backend.calls().is_empty());
    }

    // ── diffing ───────────────────────────────────────────────────────────

    #[test]
    fn redundant_setter_does_not_dirty() {
        let (mut cache, mut backend) = flushed();
        cache.set_blend_mode(BlendMode::Normal);
        cache.set_z_write(false);
        cache.set_texture_filtering(0, true);
        assert!(!cache.is_dirty());
        assert_eq!(cache.flush(&mut backend), 0);
    }

    #[test]
    fn changed_block_fires_exactly_once() {
        let (mut cache, mut backend) = flushed();
        cache.set_blend_mode(BlendMode::Add);
        cache.set_blend_mode(BlendMode::Modulate);
        cache.set_cull_mode(CullMode::Back);

        assert_eq!(cache.flush(&mut backend), 2);
        assert_eq!(
            backend.calls(),
            &[
                Call::Raster(RasterState {
                    cull: CullMode::Back,
                    depth_range: [0.0, 1.0],
                }),
                Call::Blend(BlendState {
                    mode: BlendMode::Modulate
                }),
            ]
        );
        backend.take_calls();
        assert_eq!(cache.flush(&mut backend), 0);
    }

    #[test]
    fn setting_back_the_original_value_still_flushes_once() {
        let (mut cache, mut backend) = flushed();
        cache.set_z_write(true);
        cache.set_z_write(false);
        assert_eq!(cache.flush(&mut backend), 1);
    }

    #[test]
    fn invalidate_redirties_everything() {
        let (mut cache, mut backend) = flushed();
        cache.invalidate();
        assert_eq!(cache.flush(&mut backend), 3 + 2 * MAX_TEXTURE_UNITS + 2);
    }

    // ── textures ──────────────────────────────────────────────────────────

    #[test]
    fn units_past_the_limit_are_ignored() {
        let (mut cache, mut backend) = flushed();
        cache.set_texture_wrapping(MAX_TEXTURE_UNITS, true);
        cache.set_texture_mode(MAX_TEXTURE_UNITS + 3, TextureMode::Add);
        assert_eq!(cache.flush(&mut backend), 0);
    }

    #[test]
    fn unbind_clears_only_matching_units() {
        let mut cache = StateCache::new();
        let a = TextureBinding {
            handle: TextureHandle::from_raw(1),
            texture: BackendTexture(10),
        };
        let b = TextureBinding {
            handle: TextureHandle::from_raw(2),
            texture: BackendTexture(20),
        };
        cache.set_texture(0, Some(a));
        cache.set_texture(1, Some(b));
        cache.set_texture(2, Some(a));
        assert_eq!(cache.pixel_constants().bound_units, 0b111);

        cache.unbind_texture(a.handle);
        assert_eq!(cache.texture(0), None);
        assert_eq!(cache.texture(1), Some(b));
        assert_eq!(cache.texture(2), None);
        assert_eq!(cache.pixel_constants().bound_units, 0b010);
    }

    // ── material / lighting ───────────────────────────────────────────────

    #[test]
    fn material_without_lighting_becomes_texture_factor() {
        let mut cache = StateCache::new();
        let m = Material {
            emissive: [0.1, 0.0, 0.0, 0.0],
            ambient: [0.0, 0.2, 0.0, 0.0],
            diffuse: [0.5, 0.5, 0.5, 0.75],
            specular: [0.0; 4],
            power: [0.0; 4],
        };
        let before = cache.vertex_constants().material;
        cache.set_material(&m);

        assert_eq!(cache.vertex_constants().material, before);
        let f = cache.pixel_constants().texture_factor;
        assert!((f[0] - 0.6).abs() < 1e-6);
        assert!((f[1] - 0.7).abs() < 1e-6);
        assert!((f[2] - 0.5).abs() < 1e-6);
        assert_eq!(f[3], 0.75);
    }

    #[test]
    fn material_with_lighting_is_stored_for_lighting() {
        let mut cache = StateCache::new();
        cache.set_lighting(true);
        let m = Material::default();
        cache.set_material(&m);
        assert_eq!(cache.vertex_constants().material, m);
        assert_eq!(cache.pixel_constants().texture_factor, [1.0; 4]);
    }

    #[test]
    fn transforms_dirty_vertex_constants_only() {
        let (mut cache, mut backend) = flushed();
        let t = translation(1.0, 2.0, 3.0);
        cache.set_transforms(&t, &t, &t);
        assert_eq!(cache.flush(&mut backend), 1);
        assert_eq!(backend.calls()[0].name(), "vertex_constants");
    }
}
