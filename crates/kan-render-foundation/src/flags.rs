//! Material-pass-variant flag state as a sum type (spec.md §9 REDESIGN
//! FLAGS: "material-pass-variant flags are re-expressed as a sum type
//! `{new_only, loaded_only, both, orphan}` to eliminate the bit-matrix
//! logic"), replacing the source's `{passed_to_loaded_data,
//! found_in_new_data}` bit pair.

/// `New` = found in new data only (not yet passed to loaded data).
/// `Loaded` = passed to loaded data only (no longer present upstream).
/// `Both` = present in both; keep as-is.
/// `Orphan` = present in neither; detach and delete (spec.md §4.5.4
/// step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialPassVariantFlagState {
    New,
    Loaded,
    Both,
    Orphan,
}

impl MaterialPassVariantFlagState {
    pub fn from_bits(found_in_new_data: bool, passed_to_loaded_data: bool) -> Self {
        match (found_in_new_data, passed_to_loaded_data) {
            (true, false) => Self::New,
            (false, true) => Self::Loaded,
            (true, true) => Self::Both,
            (false, false) => Self::Orphan,
        }
    }

    /// spec.md §4.5.4 step 5 post-pass reconciliation.
    pub fn reconcile(self) -> Reconciliation {
        match self {
            Self::New => Reconciliation::Keep,
            Self::Loaded => Reconciliation::DetachPipeline,
            Self::Both => Reconciliation::Keep,
            Self::Orphan => Reconciliation::DetachBothAndDelete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Keep,
    DetachPipeline,
    DetachBothAndDelete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn found_only_keeps() {
        assert_eq!(
            MaterialPassVariantFlagState::from_bits(true, false).reconcile(),
            Reconciliation::Keep
        );
    }

    #[test]
    fn passed_only_detaches_pipeline() {
        assert_eq!(
            MaterialPassVariantFlagState::from_bits(false, true).reconcile(),
            Reconciliation::DetachPipeline
        );
    }

    #[test]
    fn both_keeps() {
        assert_eq!(
            MaterialPassVariantFlagState::from_bits(true, true).reconcile(),
            Reconciliation::Keep
        );
    }

    #[test]
    fn neither_detaches_and_deletes() {
        assert_eq!(
            MaterialPassVariantFlagState::from_bits(false, false).reconcile(),
            Reconciliation::DetachBothAndDelete
        );
    }
}
