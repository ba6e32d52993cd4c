use std::{fmt, marker::PhantomData, ops::Index};

/// Index of a value in an [`Arena<T>`].
///
/// The type parameter keeps ids of one arena from indexing another.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArenaId<T> {
    id: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Copy for ArenaId<T> {}

impl<T> Clone for ArenaId<T> {
    #[inline(always)]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> ArenaId<T> {
    pub const fn new(id: u32) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    #[inline(always)]
    pub const fn index(self) -> usize {
        self.id as usize
    }
}

impl<T> fmt::Display for ArenaId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Append-only storage; an id handed out stays valid as long as the arena lives.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Arena<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn alloc(&mut self, value: T) -> ArenaId<T> {
        let id = ArenaId::new(self.items.len() as u32);
        self.items.push(value);
        id
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ArenaId<T>) -> Option<&T> {
        self.items.get(id.index())
    }

    /// Values in allocation order, paired with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (ArenaId<T>, &T)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| (ArenaId::new(i as u32), item))
    }
}

impl<T> Index<ArenaId<T>> for Arena<T> {
    type Output = T;

    fn index(&self, id: ArenaId<T>) -> &T {
        &self.items[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::first(0, Some("nil"))]
    #[case::last(2, Some("%name"))]
    #[case::out_of_range(3, None)]
    fn test_get(#[case] index: u32, #[case] expected: Option<&str>) {
        let mut arena = Arena::with_capacity(3);
        for v in ["nil", "true", "%name"] {
            arena.alloc(v);
        }
        assert_eq!(arena.get(ArenaId::new(index)).copied(), expected);
    }

    #[test]
    fn test_ids_follow_allocation_order() {
        let mut arena = Arena::default();
        let ids = ["ul", "li"].map(|v| arena.alloc(v));
        assert_eq!(ids.map(ArenaId::index), [0, 1]);
        assert_eq!(arena[ids[1]], "li");
        assert_eq!(arena.iter().map(|(id, v)| (id.to_string(), *v)).collect::<Vec<_>>(), [
            ("0".to_string(), "ul"),
            ("1".to_string(), "li")
        ]);
    }
}
