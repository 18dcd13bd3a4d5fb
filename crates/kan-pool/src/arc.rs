use std::ops::Deref;
use std::sync::Arc;

use crate::pool::Recyclable;
use crate::Pool;

/// An `Arc<T>` whose backing `T` is returned to its originating
/// [`Pool`] once the last strong reference drops, instead of being
/// deallocated — mirrors the teacher's `pool::arc::PoolArc`.
pub struct PoolArc<T: Default + Recyclable> {
    pool: Pool<T>,
    arc: Option<Arc<T>>,
}

impl<T: Default + Recyclable> PoolArc<T> {
    pub fn new(pool: &Pool<T>, value: T) -> Self {
        Self {
            pool: pool.clone(),
            arc: Some(Arc::new(value)),
        }
    }

    pub fn strong_count(&self) -> usize {
        self.arc.as_ref().map(Arc::strong_count).unwrap_or(0)
    }
}

impl<T: Default + Recyclable> Clone for PoolArc<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            arc: self.arc.clone(),
        }
    }
}

impl<T: Default + Recyclable> Deref for PoolArc<T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.arc.as_ref().unwrap()
    }
}

impl<T: Default + Recyclable> Drop for PoolArc<T> {
    fn drop(&mut self) {
        if let Some(arc) = self.arc.take() {
            match Arc::try_unwrap(arc) {
                Ok(mut value) => {
                    value.pool_reset();
                    self.pool.recycle(value);
                }
                Err(_still_shared) => {
                    // another clone keeps the value alive; nothing to recycle yet.
                }
            }
        }
    }
}
