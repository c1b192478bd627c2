// Interrupt masking behind the scheduler lock
//
// The lock's outermost acquisition must silence the preemption source;
// IntMask is the collaborator the kernel drives to do it. The default
// implementation routes to the target's `critical-section` backend,
// which a port registers the usual way (its HAL normally does). Hosted
// test builds get the backend from the crate's `std` feature.

use critical_section::RestoreState;

/// Preemption-source mask driven by the scheduler lock.
///
/// `disable` runs on the lock's 0 -> 1 depth transition and `restore`
/// on 1 -> 0; the kernel guarantees the calls pair and never nest.
pub trait IntMask {
    fn disable(&mut self);
    fn restore(&mut self);
}

/// [`IntMask`] over the `critical-section` backend.
pub struct CriticalSectionMask {
    prior: Option<RestoreState>,
}

impl CriticalSectionMask {
    pub const fn new() -> Self {
        Self { prior: None }
    }
}

impl IntMask for CriticalSectionMask {
    fn disable(&mut self) {
        // SAFETY: the kernel calls disable only on the outermost lock
        // acquisition, so acquisitions never interleave and the token
        // is handed back by the matching restore.
        let token = unsafe { critical_section::acquire() };
        self.prior = Some(token);
    }

    fn restore(&mut self) {
        if let Some(token) = self.prior.take() {
            // SAFETY: token came from the acquire in disable; the
            // kernel's depth counter makes this the matching release.
            unsafe { critical_section::release(token) };
        }
    }
}

impl Default for CriticalSectionMask {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disable_restore_pairs() {
        let mut mask = CriticalSectionMask::new();
        mask.disable();
        mask.restore();
        // token consumed; a second restore is a no-op
        mask.restore();
    }
}
