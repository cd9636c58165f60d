//! Growable reusable-slot arena for short-lived entities
//!
//! Active items always occupy the contiguous prefix `[0, active_count)`.
//! Release swaps the item with the last active slot, so iteration over
//! live entities never has to skip holes.

/// Verdict returned by a [`Pool::sweep`] visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAction {
    Keep,
    Release,
}

/// Slot arena with swap-with-last release
#[derive(Debug, Clone)]
pub struct Pool<T> {
    items: Vec<T>,
    active: Vec<bool>,
    active_count: usize,
}

impl<T: Default> Pool<T> {
    /// Create a pool with `capacity` pre-built slots
    pub fn with_capacity(capacity: usize) -> Self {
        let mut items = Vec::with_capacity(capacity);
        items.resize_with(capacity, T::default);
        Self {
            items,
            active: vec![false; capacity],
            active_count: 0,
        }
    }

    /// Take a slot, reset to `T::default()`, growing the store by ~50% when full
    pub fn acquire(&mut self) -> &mut T {
        if self.active_count == self.items.len() {
            self.grow();
        }
        let index = self.active_count;
        self.active_count += 1;
        self.active[index] = true;
        let slot = &mut self.items[index];
        *slot = T::default();
        slot
    }

    fn grow(&mut self) {
        let current = self.items.len();
        let new_capacity = current + (current / 2).max(1);
        self.items.resize_with(new_capacity, T::default);
        self.active.resize(new_capacity, false);
        tracing::debug!("Pool grew from {} to {} slots", current, new_capacity);
    }
}

impl<T> Pool<T> {
    /// Release the active item at `index`
    ///
    /// Returns false (and does nothing) when `index` is not an active slot.
    pub fn release(&mut self, index: usize) -> bool {
        if index >= self.active_count || !self.active[index] {
            return false;
        }
        let last = self.active_count - 1;
        self.items.swap(index, last);
        self.active[last] = false;
        self.active_count = last;
        true
    }

    /// Release a batch of indices collected during a read pass
    ///
    /// Indices are released highest first so earlier ones stay valid.
    /// Duplicates and inactive indices are ignored.
    pub fn release_many(&mut self, indices: &mut Vec<usize>) -> usize {
        indices.sort_unstable_by(|a, b| b.cmp(a));
        indices.dedup();
        let mut released = 0;
        for &index in indices.iter() {
            if self.release(index) {
                released += 1;
            }
        }
        indices.clear();
        released
    }

    /// Visit every active item; items answered with `Release` are freed.
    ///
    /// Runs back to front so a swap only pulls in an item already visited.
    pub fn sweep<F>(&mut self, mut visit: F) -> usize
    where
        F: FnMut(&mut T) -> SlotAction,
    {
        let mut released = 0;
        let mut index = self.active_count;
        while index > 0 {
            index -= 1;
            if visit(&mut self.items[index]) == SlotAction::Release {
                self.release(index);
                released += 1;
            }
        }
        released
    }

    /// Deactivate everything, keeping the allocation
    pub fn clear(&mut self) {
        for flag in &mut self.active[..self.active_count] {
            *flag = false;
        }
        self.active_count = 0;
    }

    #[inline]
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active_count == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.active_slice().get(index)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        let count = self.active_count;
        self.items[..count].get_mut(index)
    }

    /// Active items as a slice
    #[inline]
    pub fn active_slice(&self) -> &[T] {
        &self.items[..self.active_count]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.active_slice().iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        let count = self.active_count;
        self.items[..count].iter_mut()
    }

    /// Check the prefix invariant (used by tests and debug assertions)
    pub fn is_consistent(&self) -> bool {
        self.active_count <= self.items.len()
            && self.items.len() == self.active.len()
            && self.active[..self.active_count].iter().all(|&a| a)
            && self.active[self.active_count..].iter().all(|&a| !a)
    }
}

impl<T: Default> Default for Pool<T> {
    fn default() -> Self {
        Self::with_capacity(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Dot {
        id: u32,
        life: u32,
    }

    #[test]
    fn test_acquire_resets_slot() {
        let mut pool: Pool<Dot> = Pool::with_capacity(2);
        pool.acquire().id = 7;
        pool.release(0);
        let slot = pool.acquire();
        assert_eq!(*slot, Dot::default());
    }

    #[test]
    fn test_grows_instead_of_failing() {
        let mut pool: Pool<Dot> = Pool::with_capacity(4);
        for i in 0..10 {
            pool.acquire().id = i;
        }
        assert_eq!(pool.active_count(), 10);
        assert!(pool.capacity() >= 10);
        assert!(pool.is_consistent());

        let mut empty: Pool<Dot> = Pool::with_capacity(0);
        empty.acquire();
        assert_eq!(empty.capacity(), 1);
    }

    #[test]
    fn test_release_swaps_with_last() {
        let mut pool: Pool<Dot> = Pool::with_capacity(4);
        for i in 0..4 {
            pool.acquire().id = i;
        }
        assert!(pool.release(1));
        let ids: Vec<u32> = pool.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![0, 3, 2]);
    }

    #[test]
    fn test_release_is_idempotent_on_inactive() {
        let mut pool: Pool<Dot> = Pool::with_capacity(4);
        pool.acquire();
        assert!(pool.release(0));
        assert!(!pool.release(0));
        assert!(!pool.release(3));
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_release_many_handles_duplicates() {
        let mut pool: Pool<Dot> = Pool::with_capacity(8);
        for i in 0..6 {
            pool.acquire().id = i;
        }
        let mut doomed = vec![1, 4, 1, 5, 9];
        assert_eq!(pool.release_many(&mut doomed), 3);
        let mut ids: Vec<u32> = pool.iter().map(|d| d.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 2, 3]);
        assert!(doomed.is_empty());
    }

    #[test]
    fn test_sweep_visits_each_once() {
        let mut pool: Pool<Dot> = Pool::with_capacity(8);
        for i in 0..8 {
            let d = pool.acquire();
            d.id = i;
            d.life = i % 3;
        }
        let mut visits = 0;
        let released = pool.sweep(|d| {
            visits += 1;
            if d.life == 0 {
                SlotAction::Release
            } else {
                d.life -= 1;
                SlotAction::Keep
            }
        });
        assert_eq!(visits, 8);
        assert_eq!(released, 3);
        assert!(pool.iter().all(|d| d.id % 3 != 0));
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut pool: Pool<Dot> = Pool::with_capacity(4);
        for _ in 0..4 {
            pool.acquire();
        }
        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(pool.capacity(), 4);
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_prefix_invariant_random_ops() {
        let mut rng = StdRng::seed_from_u64(0xB00B);
        for _ in 0..50 {
            let mut pool: Pool<Dot> = Pool::with_capacity(rng.gen_range(0..6));
            for _ in 0..400 {
                match rng.gen_range(0..4) {
                    0 | 1 => {
                        pool.acquire();
                    }
                    2 => {
                        let index = rng.gen_range(0..pool.capacity().max(1) + 2);
                        pool.release(index);
                    }
                    _ => {
                        pool.sweep(|_| {
                            if rng.gen_bool(0.3) {
                                SlotAction::Release
                            } else {
                                SlotAction::Keep
                            }
                        });
                    }
                }
                assert!(pool.is_consistent());
            }
        }
    }
}
