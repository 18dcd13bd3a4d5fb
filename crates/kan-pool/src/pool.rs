use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

/// Reset hook run on an item when it is checked back into the pool, so
/// the next checkout never observes stale logical contents while still
/// reusing the backing allocation.
pub trait Recyclable {
    fn pool_reset(&mut self);
}

impl<T> Recyclable for Vec<T> {
    fn pool_reset(&mut self) {
        self.clear();
    }
}

impl Recyclable for String {
    fn pool_reset(&mut self) {
        self.clear();
    }
}

impl<K, V> Recyclable for std::collections::HashMap<K, V> {
    fn pool_reset(&mut self) {
        self.clear();
    }
}

struct Inner<T> {
    free_list: RefCell<Vec<T>>,
}

/// A single-threaded pool of default-constructible, reusable `T`s.
///
/// Checked-out items come back to the free list automatically when the
/// returned [`PoolObject`] drops, reset via [`Recyclable::pool_reset`] so
/// the next checkout never observes stale state — mirrors the teacher's
/// `pool::pool::Pool`.
#[derive(Clone)]
pub struct Pool<T: Default + Recyclable> {
    inner: Rc<Inner<T>>,
}

impl<T: Default + Recyclable> Pool<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut free_list = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            free_list.push(T::default());
        }
        Self {
            inner: Rc::new(Inner {
                free_list: RefCell::new(free_list),
            }),
        }
    }

    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Number of items currently sitting idle in the pool.
    pub fn idle_len(&self) -> usize {
        self.inner.free_list.borrow().len()
    }

    /// Push an item directly back into the free list, bypassing
    /// [`PoolObject`] (used by [`crate::arc::PoolArc`], whose recycle
    /// point is `Arc::try_unwrap` rather than a guard drop).
    pub fn recycle(&self, item: T) {
        self.inner.free_list.borrow_mut().push(item);
    }

    pub fn new_item(&self) -> PoolObject<T> {
        let item = self.inner.free_list.borrow_mut().pop().unwrap_or_default();
        PoolObject {
            pool: self.inner.clone(),
            item: Some(item),
        }
    }
}

impl<T: Default + Recyclable> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PoolObject<T: Default + Recyclable> {
    pool: Rc<Inner<T>>,
    item: Option<T>,
}

impl<T: Default + Recyclable> Deref for PoolObject<T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.item.as_ref().unwrap()
    }
}

impl<T: Default + Recyclable> DerefMut for PoolObject<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().unwrap()
    }
}

impl<T: Default + Recyclable> Drop for PoolObject<T> {
    fn drop(&mut self) {
        if let Some(mut item) = self.item.take() {
            item.pool_reset();
            self.pool.free_list.borrow_mut().push(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_checked_in_items() {
        let pool: Pool<Vec<u8>> = Pool::new();
        {
            let mut item = pool.new_item();
            item.extend_from_slice(&[1, 2, 3]);
        }
        assert_eq!(pool.idle_len(), 1);
        let item = pool.new_item();
        assert!(item.is_empty(), "checked-in item must come back cleared");
    }
}
