use std::fmt;
use std::marker::PhantomData;
use std::num::NonZeroU32;

/// Marker for an ID's domain, so e.g. a texture-usage id and a
/// material-usage id are not interchangeable even though both are
/// backed by the same representation (spec.md §3.1).
pub trait IdDomain {
    /// Human readable domain tag, used only in `Debug`/log output.
    const NAME: &'static str;
}

/// A monotonically increasing, domain-tagged 32-bit id. Zero is the
/// distinguished invalid value.
pub struct Id<D: IdDomain> {
    value: Option<NonZeroU32>,
    _domain: PhantomData<D>,
}

impl<D: IdDomain> Id<D> {
    pub const INVALID: Self = Self {
        value: None,
        _domain: PhantomData,
    };

    pub fn is_valid(&self) -> bool {
        self.value.is_some()
    }

    pub fn raw(&self) -> u32 {
        self.value.map(NonZeroU32::get).unwrap_or(0)
    }

    fn from_raw(raw: u32) -> Self {
        Self {
            value: NonZeroU32::new(raw),
            _domain: PhantomData,
        }
    }
}

impl<D: IdDomain> Default for Id<D> {
    fn default() -> Self {
        Self::INVALID
    }
}

impl<D: IdDomain> Clone for Id<D> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<D: IdDomain> Copy for Id<D> {}

impl<D: IdDomain> PartialEq for Id<D> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}
impl<D: IdDomain> Eq for Id<D> {}

impl<D: IdDomain> std::hash::Hash for Id<D> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<D: IdDomain> fmt::Debug for Id<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", D::NAME, self.raw())
    }
}

/// Issues new, never-repeating ids for a single domain within one
/// process run.
pub struct IdAllocator<D: IdDomain> {
    next: u32,
    _domain: PhantomData<D>,
}

impl<D: IdDomain> IdAllocator<D> {
    pub fn new() -> Self {
        Self {
            next: 1,
            _domain: PhantomData,
        }
    }

    pub fn allocate(&mut self) -> Id<D> {
        let id = Id::from_raw(self.next);
        self.next = self
            .next
            .checked_add(1)
            .expect("id domain exhausted u32 space");
        id
    }
}

impl<D: IdDomain> Default for IdAllocator<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestDomain;
    impl IdDomain for TestDomain {
        const NAME: &'static str = "test";
    }

    #[test]
    fn zero_is_invalid() {
        let id: Id<TestDomain> = Id::INVALID;
        assert!(!id.is_valid());
        assert_eq!(id.raw(), 0);
    }

    #[test]
    fn allocator_is_monotonic_and_never_zero() {
        let mut alloc: IdAllocator<TestDomain> = IdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert!(a.is_valid());
        assert!(b.is_valid());
        assert!(b.raw() > a.raw());
        assert_ne!(a, b);
    }
}
