use std::collections::{HashMap, VecDeque};

use crate::backend::GpuBackend;
use crate::handle::TextureHandle;
use crate::pixel::Palette;

/// Maps paletted textures onto a fixed number of hardware palette slots.
///
/// `lru` always holds every slot exactly once; the front is the least recently used.
#[derive(Debug)]
pub struct PaletteCache {
    lru: VecDeque<usize>,
    owners: Vec<Option<TextureHandle>>,
    resident: HashMap<TextureHandle, usize>,
    palettes: HashMap<TextureHandle, Box<Palette>>,
}

impl PaletteCache {
    pub fn new(slots: usize) -> Self {
        Self {
            lru: (0..slots).collect(),
            owners: vec![None; slots],
            resident: HashMap::new(),
            palettes: HashMap::new(),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.owners.len()
    }

    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    pub fn slot_of(&self, texture: TextureHandle) -> Option<usize> {
        self.resident.get(&texture).copied()
    }

    pub fn is_paletted(&self, texture: TextureHandle) -> bool {
        self.palettes.contains_key(&texture)
    }

    /// Remembers the palette of a newly created paletted texture.
    pub fn insert_palette(&mut self, texture: TextureHandle, palette: Box<Palette>) {
        debug_assert!(!self.palettes.contains_key(&texture));
        self.palettes.insert(texture, palette);
    }

    /// Makes `texture`'s palette resident and active. Non-paletted textures are
    /// ignored. Returns the slot used.
    pub fn ensure_loaded<B: GpuBackend + ?Sized>(
        &mut self,
        texture: TextureHandle,
        backend: &mut B,
    ) -> Option<usize> {
        if !self.palettes.contains_key(&texture) {
            return None;
        }

        if let Some(&slot) = self.resident.get(&texture) {
            self.touch(slot);
            backend.set_active_palette(slot);
            return Some(slot);
        }

        let Some(slot) = self.lru.pop_front() else {
            log::warn!("paletted texture bound but the device has no palette slots");
            return None;
        };
        if let Some(evicted) = self.owners[slot].take() {
            log::trace!("palette slot {slot}: evicting {evicted:?}");
            self.resident.remove(&evicted);
        }

        backend.load_palette(slot, &self.palettes[&texture]);
        self.owners[slot] = Some(texture);
        self.resident.insert(texture, slot);
        self.lru.push_back(slot);
        backend.set_active_palette(slot);
        Some(slot)
    }

    /// Drops the mapping and palette data of a destroyed texture. Its slot becomes the
    /// next one reused.
    pub fn release(&mut self, texture: TextureHandle) {
        self.palettes.remove(&texture);
        if let Some(slot) = self.resident.remove(&texture) {
            self.owners[slot] = None;
            self.lru.retain(|&s| s != slot);
            self.lru.push_front(slot);
        }
    }

    fn touch(&mut self, slot: usize) {
        if self.lru.back() == Some(&slot) {
            return;
        }
        self.lru.retain(|&s| s != slot);
        self.lru.push_back(slot);
    }

    #[cfg(test)]
    fn most_recent(&self) -> Option<usize> {
        self.lru.back().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Call, RecordingBackend};
    use crate::handle::Registry;
    use crate::handle::TextureKind;

    fn setup(slots: usize, textures: usize) -> (PaletteCache, Vec<TextureHandle>) {
        let mut reg: Registry<TextureKind, ()> = Registry::new();
        let mut cache = PaletteCache::new(slots);
        let handles: Vec<_> = (0..textures).map(|_| reg.insert(())).collect();
        for &h in &handles {
            cache.insert_palette(h, Box::new([[0; 4]; 256]));
        }
        (cache, handles)
    }

    #[test]
    fn non_paletted_texture_is_a_noop() {
        let (mut cache, _) = setup(2, 0);
        let mut backend = RecordingBackend::new();
        assert_eq!(cache.ensure_loaded(TextureHandle::from_raw(5), &mut backend), None);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn never_exceeds_slot_count() {
        let (mut cache, h) = setup(2, 5);
        let mut backend = RecordingBackend::new();
        for &t in &h {
            cache.ensure_loaded(t, &mut backend);
            assert!(cache.resident_count() <= cache.slot_count());
        }
        assert_eq!(cache.resident_count(), 2);
    }

    #[test]
    fn repeated_request_keeps_slot_and_promotes() {
        let (mut cache, h) = setup(3, 2);
        let mut backend = RecordingBackend::new();
        let slot = cache.ensure_loaded(h[0], &mut backend);
        cache.ensure_loaded(h[1], &mut backend);

        for _ in 0..3 {
            assert_eq!(cache.ensure_loaded(h[0], &mut backend), slot);
            assert_eq!(cache.most_recent(), slot);
        }
        let loads = backend
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::LoadPalette { .. }))
            .count();
        assert_eq!(loads, 2);
    }

    #[test]
    fn evicts_least_recently_used() {
        let (mut cache, h) = setup(2, 3);
        let mut backend = RecordingBackend::new();
        let a = cache.ensure_loaded(h[0], &mut backend);
        cache.ensure_loaded(h[1], &mut backend);
        cache.ensure_loaded(h[0], &mut backend);

        let c = cache.ensure_loaded(h[2], &mut backend);
        assert_ne!(c, a);
        assert_eq!(cache.slot_of(h[0]), a);
        assert_eq!(cache.slot_of(h[1]), None);
    }

    #[test]
    fn release_frees_slot_for_next_load() {
        let (mut cache, h) = setup(2, 3);
        let mut backend = RecordingBackend::new();
        cache.ensure_loaded(h[0], &mut backend);
        let b = cache.ensure_loaded(h[1], &mut backend);

        cache.release(h[1]);
        assert!(!cache.is_paletted(h[1]));
        assert_eq!(cache.slot_of(h[1]), None);
        assert_eq!(cache.ensure_loaded(h[2], &mut backend), b);
        assert!(cache.slot_of(h[0]).is_some());
    }

    #[test]
    fn zero_slots_disables_palettes() {
        let (mut cache, h) = setup(0, 1);
        let mut backend = RecordingBackend::new();
        assert_eq!(cache.ensure_loaded(h[0], &mut backend), None);
    }
}
