use crate::mt_pool::{Pool, PoolObject};

/// Thread-safe pooled `Vec<T>`, cleared on checkout.
pub type PoolVec<T> = PoolObject<Vec<T>>;

/// Thread-safe pooled `Vec<T>` that is *not* cleared on checkout; the
/// caller is responsible for truncating/overwriting the prefix it
/// needs (spec.md §4.2.4's per-frame command recording reuses the
/// previous frame's byte buffer this way).
pub type PoolUnclearedVec<T> = PoolObject<Vec<T>>;

pub fn new_pool_vec<T>(pool: &Pool<Vec<T>>) -> PoolVec<T> {
    pool.new_item()
}
