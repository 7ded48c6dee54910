use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// An index type backed by a `usize` position.
pub(crate) trait ArenaId {
    fn from_usize(x: usize) -> Self;
    fn to_usize(self) -> usize;
}

/// Append-only storage addressed by typed ids. Ids stay valid until the arena is cleared.
pub(crate) struct Arena<TId, TValue> {
    items: Vec<TValue>,
    id: PhantomData<fn() -> TId>,
}

impl<TId: ArenaId, TValue> Default for Arena<TId, TValue> {
    fn default() -> Self {
        Self::new()
    }
}

impl<TId: ArenaId, TValue> Arena<TId, TValue> {
    pub(crate) fn new() -> Self {
        Self {
            items: Vec::new(),
            id: PhantomData,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn alloc(&mut self, value: TValue) -> TId {
        self.items.push(value);
        TId::from_usize(self.items.len() - 1)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (TId, &TValue)> {
        (0..).map(TId::from_usize).zip(self.items.iter())
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (TId, &mut TValue)> {
        (0..).map(TId::from_usize).zip(self.items.iter_mut())
    }

    /// Borrows two distinct entries mutably. Panics if `a == b`.
    pub(crate) fn get_two_mut(&mut self, a: TId, b: TId) -> (&mut TValue, &mut TValue) {
        let (a, b) = (a.to_usize(), b.to_usize());
        assert_ne!(a, b, "get_two_mut needs two distinct ids");
        let (low, high) = self.items.split_at_mut(a.max(b));
        let (low, high) = (&mut low[a.min(b)], &mut high[0]);
        if a < b {
            (low, high)
        } else {
            (high, low)
        }
    }
}

impl<TId: ArenaId, TValue> Index<TId> for Arena<TId, TValue> {
    type Output = TValue;

    fn index(&self, id: TId) -> &TValue {
        &self.items[id.to_usize()]
    }
}

impl<TId: ArenaId, TValue> IndexMut<TId> for Arena<TId, TValue> {
    fn index_mut(&mut self, id: TId) -> &mut TValue {
        &mut self.items[id.to_usize()]
    }
}
