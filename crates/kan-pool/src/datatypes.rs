use crate::pool::{Pool, PoolObject};

/// A `Vec<T>` checked out of a [`Pool`], cleared automatically on
/// release. Used for short-lived per-frame/per-inspection scratch lists
/// (e.g. descriptor-set binding updates, staging bytes).
pub type PoolVec<T> = PoolObject<Vec<T>>;

pub fn new_pool_vec<T>(pool: &Pool<Vec<T>>) -> PoolVec<T> {
    pool.new_item()
}
