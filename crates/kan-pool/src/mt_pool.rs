use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use crate::pool::Recyclable;

struct Inner<T> {
    free_list: Mutex<Vec<T>>,
}

/// Thread-safe counterpart of [`crate::pool::Pool`] — mirrors the
/// teacher's `pool::mt_pool::Pool`, used where checkouts cross the
/// rayon-parallel glyph-rasterization or material-instance-batching
/// boundaries.
#[derive(Clone)]
pub struct Pool<T: Default + Recyclable> {
    inner: Arc<Inner<T>>,
}

impl<T: Default + Recyclable> Pool<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                free_list: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn new_item(&self) -> PoolObject<T> {
        let item = self
            .inner
            .free_list
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_default();
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
    pool: Arc<Inner<T>>,
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
            self.pool.free_list.lock().unwrap().push(item);
        }
    }
}
