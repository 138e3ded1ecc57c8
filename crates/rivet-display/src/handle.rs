//! Opaque, generation-checked resource handles.
//!
//! A handle packs a slot index and the slot's generation into one `u64`. Raw value `0`
//! is reserved for "none": issued handles store `index + 1` in the low half, so no live
//! resource can ever be addressed by it. Deleting a resource bumps its slot's
//! generation, which makes every outstanding copy of the old handle stale.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Typed handle into a `Registry<T>`.
pub struct Handle<K> {
    raw: u64,
    _kind: PhantomData<fn() -> K>,
}

/// Marker for texture and render-target handles.
pub enum TextureKind {}
/// Marker for compiled-geometry handles.
pub enum GeometryKind {}

pub type TextureHandle = Handle<TextureKind>;
pub type GeometryHandle = Handle<GeometryKind>;

impl<K> Handle<K> {
    /// The reserved "unbound" value.
    pub const NONE: Self = Self::from_raw(0);

    pub const fn from_raw(raw: u64) -> Self {
        Self {
            raw,
            _kind: PhantomData,
        }
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.raw
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.raw == 0
    }

    fn new(index: u32, generation: u32) -> Self {
        Self::from_raw(((generation as u64) << 32) | (index as u64 + 1))
    }

    /// Slot index and generation, or `None` for the reserved value.
    fn parts(self) -> Option<(usize, u32)> {
        let low = (self.raw & 0xFFFF_FFFF) as u32;
        if low == 0 {
            return None;
        }
        Some(((low - 1) as usize, (self.raw >> 32) as u32))
    }
}

impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Handle<K> {}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<K> Eq for Handle<K> {}

impl<K> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<K> Default for Handle<K> {
    fn default() -> Self {
        Self::NONE
    }
}

impl<K> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parts() {
            None => f.write_str("Handle(none)"),
            Some((index, generation)) => write!(f, "Handle({index}v{generation})"),
        }
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Arena of resources addressed by `Handle<K>`. Freed slots are recycled with a bumped
/// generation.
pub struct Registry<K, T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    _kind: PhantomData<fn() -> K>,
}

impl<K, T> Registry<K, T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            _kind: PhantomData,
        }
    }

    pub fn insert(&mut self, value: T) -> Handle<K> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            Handle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            Handle::new(index, 0)
        }
    }

    pub fn get(&self, handle: Handle<K>) -> Option<&T> {
        let (index, generation) = handle.parts()?;
        self.slots
            .get(index)
            .filter(|s| s.generation == generation)
            .and_then(|s| s.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: Handle<K>) -> Option<&mut T> {
        let (index, generation) = handle.parts()?;
        self.slots
            .get_mut(index)
            .filter(|s| s.generation == generation)
            .and_then(|s| s.value.as_mut())
    }

    pub fn contains(&self, handle: Handle<K>) -> bool {
        self.get(handle).is_some()
    }

    /// Removes the value and invalidates every copy of `handle`.
    pub fn remove(&mut self, handle: Handle<K>) -> Option<T> {
        let (index, generation) = handle.parts()?;
        let slot = self.slots.get_mut(index)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index as u32);
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every value, returning them for teardown.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(v) = slot.value.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                out.push(v);
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<K>, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.value
                .as_ref()
                .map(|v| (Handle::new(i as u32, s.generation), v))
        })
    }
}

impl<K, T> Default for Registry<K, T> {
    fn default() -> Self {
        Self::new()
    }
}
