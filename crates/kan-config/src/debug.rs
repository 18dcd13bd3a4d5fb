use std::sync::atomic::{AtomicU8, Ordering};

const VERBOSE: u8 = 1 << 0;
const VALIDATION_LAYERS: u8 = 1 << 1;
const GPU_FORCE_INDEX: u8 = 1 << 2;

/// Debug mode flags the render backend checks on hot paths (device
/// selection, swap-chain recreation), mirroring the teacher's
/// `config::config::AtomicGfxDebugModes`. Backed by a single `AtomicU8`
/// so hot-path reads never take a lock.
#[derive(Debug, Default)]
pub struct AtomicGfxDebugModes {
    bits: AtomicU8,
}

impl AtomicGfxDebugModes {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, mask: u8, enabled: bool) {
        if enabled {
            self.bits.fetch_or(mask, Ordering::Relaxed);
        } else {
            self.bits.fetch_and(!mask, Ordering::Relaxed);
        }
    }

    pub fn verbose(&self) -> bool {
        self.bits.load(Ordering::Relaxed) & VERBOSE != 0
    }

    pub fn set_verbose(&self, enabled: bool) {
        self.set(VERBOSE, enabled);
    }

    pub fn validation_layers(&self) -> bool {
        self.bits.load(Ordering::Relaxed) & VALIDATION_LAYERS != 0
    }

    pub fn set_validation_layers(&self, enabled: bool) {
        self.set(VALIDATION_LAYERS, enabled);
    }

    pub fn gpu_force_index(&self) -> bool {
        self.bits.load(Ordering::Relaxed) & GPU_FORCE_INDEX != 0
    }

    pub fn set_gpu_force_index(&self, enabled: bool) {
        self.set(GPU_FORCE_INDEX, enabled);
    }
}

/// Matches the teacher's free-function guard (`is_verbose(dbg)`) used to
/// gate debug log lines without a method-call indirection at call sites.
pub fn is_verbose(modes: &AtomicGfxDebugModes) -> bool {
    modes.verbose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_independent_and_default_off() {
        let modes = AtomicGfxDebugModes::new();
        assert!(!modes.verbose());
        assert!(!modes.validation_layers());
        assert!(!modes.gpu_force_index());

        modes.set_verbose(true);
        assert!(modes.verbose());
        assert!(!modes.validation_layers());

        modes.set_validation_layers(true);
        assert!(modes.verbose());
        assert!(modes.validation_layers());

        modes.set_verbose(false);
        assert!(!modes.verbose());
        assert!(modes.validation_layers());
    }

    #[test]
    fn is_verbose_helper_matches_method() {
        let modes = AtomicGfxDebugModes::new();
        assert_eq!(is_verbose(&modes), modes.verbose());
        modes.set_verbose(true);
        assert_eq!(is_verbose(&modes), modes.verbose());
    }
}
