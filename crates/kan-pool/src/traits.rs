/// Implemented by pooled collections that do *not* clear their contents
/// when checked back in. Most pooled `Vec`s are cleared on release
/// (`datatypes::PoolVec`) so callers always see an empty buffer; a few
/// call sites (stream memory staging, see `kan-graphics-backend`) want
/// to reuse the last frame's bytes as-is and overwrite only the prefix
/// they need, so they opt into `UnclearedVec` semantics instead.
pub trait UnclearedVec<T> {
    fn as_uncleared_slice(&self) -> &[T];
    fn as_uncleared_slice_mut(&mut self) -> &mut [T];
}

impl<T> UnclearedVec<T> for Vec<T> {
    fn as_uncleared_slice(&self) -> &[T] {
        self
    }

    fn as_uncleared_slice_mut(&mut self) -> &mut [T] {
        self
    }
}
