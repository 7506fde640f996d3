use std::hash::Hash;
use std::marker::PhantomData;

/// Generation-checked index into a [`Pool`].
///
/// `T` is a marker naming the kind of object the handle refers to. A handle
/// outlives the object it names; once the object is released the pool bumps
/// the slot's generation and every copy of the old handle stops resolving.
#[derive(Debug)]
pub struct Handle<T> {
    pub slot: u16,
    pub generation: u16,
    phantom: PhantomData<T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(slot: u16, generation: u16) -> Self {
        Self {
            slot,
            generation,
            phantom: PhantomData,
        }
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.slot.hash(state);
        self.generation.hash(state);
    }
}

/// Slot arena keyed by `Handle<K>` storing values of type `T`.
pub struct Pool<K, T> {
    items: Vec<Option<T>>,
    empty: Vec<usize>,
    generation: Vec<u16>,
    phantom: PhantomData<K>,
}

impl<K, T> Default for Pool<K, T> {
    fn default() -> Self {
        Self::new(64)
    }
}

impl<K, T> Pool<K, T> {
    const MAX_SLOTS: usize = u16::MAX as usize + 1;

    pub fn new(initial_size: usize) -> Self {
        let initial_size = initial_size.min(Self::MAX_SLOTS);
        let mut p = Pool {
            items: Vec::with_capacity(initial_size),
            empty: Vec::with_capacity(initial_size),
            generation: vec![0; initial_size],
            phantom: PhantomData,
        };

        // Reversed so the lowest slot is handed out first.
        p.empty = (0..initial_size).rev().collect();
        p.items.resize_with(initial_size, || None);
        p
    }

    /// Store `item` and return its handle, or `None` once every slot is taken.
    pub fn insert(&mut self, item: T) -> Option<Handle<K>> {
        let slot = match self.empty.pop() {
            Some(slot) => slot,
            None => {
                if self.items.len() >= Self::MAX_SLOTS {
                    return None;
                }
                self.items.push(None);
                self.generation.push(0);
                self.items.len() - 1
            }
        };

        self.items[slot] = Some(item);
        Some(Handle::new(slot as u16, self.generation[slot]))
    }

    /// Take the item out of the pool. Returns `None` for stale handles, so a
    /// second release of the same handle is detectable.
    pub fn release(&mut self, handle: Handle<K>) -> Option<T> {
        let slot = handle.slot as usize;
        if !self.is_live(handle) {
            return None;
        }

        let item = self.items[slot].take();
        self.generation[slot] = self.generation[slot].wrapping_add(1);
        self.empty.push(slot);
        item
    }

    pub fn get_ref(&self, handle: Handle<K>) -> Option<&T> {
        if self.is_live(handle) {
            self.items[handle.slot as usize].as_ref()
        } else {
            None
        }
    }

    pub fn get_mut_ref(&mut self, handle: Handle<K>) -> Option<&mut T> {
        if self.is_live(handle) {
            self.items[handle.slot as usize].as_mut()
        } else {
            None
        }
    }

    pub fn contains(&self, handle: Handle<K>) -> bool {
        self.is_live(handle)
    }

    pub fn len(&self) -> usize {
        self.items.iter().filter(|i| i.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn for_each_occupied<F>(&self, mut func: F)
    where
        F: FnMut(&T),
    {
        for item in self.items.iter().flatten() {
            func(item);
        }
    }

    /// Release every live item, in slot order.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::new();
        for slot in 0..self.items.len() {
            if let Some(item) = self.items[slot].take() {
                self.generation[slot] = self.generation[slot].wrapping_add(1);
                self.empty.push(slot);
                out.push(item);
            }
        }
        out
    }

    fn is_live(&self, handle: Handle<K>) -> bool {
        let slot = handle.slot as usize;
        slot < self.items.len()
            && self.generation[slot] == handle.generation
            && self.items[slot].is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    enum Thing {}

    #[test]
    fn insert_and_lookup() {
        let mut pool: Pool<Thing, u32> = Pool::new(2);
        let a = pool.insert(10).unwrap();
        let b = pool.insert(20).unwrap();
        assert_eq!(pool.get_ref(a), Some(&10));
        assert_eq!(pool.get_ref(b), Some(&20));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn released_handle_goes_stale() {
        let mut pool: Pool<Thing, u32> = Pool::new(1);
        let a = pool.insert(1).unwrap();
        assert_eq!(pool.release(a), Some(1));
        assert!(pool.get_ref(a).is_none());
        assert!(pool.release(a).is_none());

        let b = pool.insert(2).unwrap();
        assert_eq!(a.slot, b.slot);
        assert_ne!(a.generation, b.generation);
        assert!(pool.get_ref(a).is_none());
        assert_eq!(pool.get_ref(b), Some(&2));
    }

    #[test]
    fn grows_past_initial_size() {
        let mut pool: Pool<Thing, usize> = Pool::new(1);
        let handles: Vec<_> = (0..8).map(|i| pool.insert(i).unwrap()).collect();
        for (i, h) in handles.iter().enumerate() {
            assert_eq!(pool.get_ref(*h), Some(&i));
        }
    }

    #[test]
    fn drain_invalidates_everything() {
        let mut pool: Pool<Thing, u8> = Pool::default();
        let a = pool.insert(1).unwrap();
        let b = pool.insert(2).unwrap();
        assert_eq!(pool.drain(), vec![1, 2]);
        assert!(pool.is_empty());
        assert!(!pool.contains(a));
        assert!(!pool.contains(b));
    }
}
