use stonereach_protocol::AssetId;

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Deterministic, generational arena for assets.
///
/// - Stable iteration order: ascending slot index.
/// - Safe handles: `AssetId { index, generation }`. A stale handle fails its
///   lookup instead of aliasing a reused slot; that failure is the
///   "target lost" path commands recover from.
#[derive(Clone, Debug)]
pub struct AssetStore<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Default for AssetStore<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> AssetStore<T> {
    pub fn insert(&mut self, value: T) -> AssetId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.value.is_none());
            slot.value = Some(value);
            AssetId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            AssetId::new(index, 0)
        }
    }

    pub fn get(&self, id: AssetId) -> Option<&T> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation == id.generation {
            slot.value.as_ref()
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: AssetId) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation == id.generation {
            slot.value.as_mut()
        } else {
            None
        }
    }

    pub fn contains(&self, id: AssetId) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: AssetId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(value)
    }

    pub fn iter_ordered(&self) -> impl Iterator<Item = (AssetId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let value = slot.value.as_ref()?;
            Some((AssetId::new(index as u32, slot.generation), value))
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handle_fails_lookup_after_slot_reuse() {
        let mut store = AssetStore::default();
        let first = store.insert("peasant");
        assert_eq!(store.remove(first), Some("peasant"));

        let second = store.insert("footman");
        assert_eq!(second.index, first.index);
        assert_ne!(second.generation, first.generation);
        assert!(store.get(first).is_none());
        assert_eq!(store.get(second), Some(&"footman"));
    }

    #[test]
    fn iteration_order_is_ascending_by_slot() {
        let mut store = AssetStore::default();
        let a = store.insert(10);
        let b = store.insert(20);
        let c = store.insert(30);
        store.remove(b);
        let ids: Vec<_> = store.iter_ordered().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a, c]);
    }
}
