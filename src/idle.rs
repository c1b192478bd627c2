// Idle task and its background work table
//
// The idle task is the dispatch fallback: it exists from init onward,
// belongs to no class, and never blocks. Embeddings feed it chores
// through a bounded work table; the idle loop polls one entry per pass
// so no single chore can starve the rest.

use core::fmt;
use core::ptr;

use crate::config::IDLE_WORK_MAX;

/// A chore the idle task runs with its registered context argument.
pub type IdleFn = fn(usize);

#[derive(Clone, Copy)]
struct WorkItem {
    func: IdleFn,
    ctx: usize,
}

/// Work table outcome when the table is full or a removal misses.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WorkError {
    NoSpace,
    NotFound,
}

impl fmt::Display for WorkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkError::NoSpace => write!(f, "idle work table full"),
            WorkError::NotFound => write!(f, "no matching idle work entry"),
        }
    }
}

/// Fixed table of idle chores with a round-robin poll cursor.
pub(crate) struct WorkTable {
    slots: [Option<WorkItem>; IDLE_WORK_MAX],
    cursor: usize,
}

impl WorkTable {
    pub(crate) const fn new() -> Self {
        Self { slots: [None; IDLE_WORK_MAX], cursor: 0 }
    }

    pub(crate) fn add(&mut self, func: IdleFn, ctx: usize) -> Result<(), WorkError> {
        let Some(free) = self.slots.iter().position(|slot| slot.is_none()) else {
            return Err(WorkError::NoSpace);
        };
        self.slots[free] = Some(WorkItem { func, ctx });
        Ok(())
    }

    /// Remove the entry matching `func` and `ctx` exactly.
    pub(crate) fn remove(&mut self, func: IdleFn, ctx: usize) -> Result<(), WorkError> {
        for slot in self.slots.iter_mut() {
            if let Some(item) = slot {
                if ptr::fn_addr_eq(item.func, func) && item.ctx == ctx {
                    *slot = None;
                    return Ok(());
                }
            }
        }
        Err(WorkError::NotFound)
    }

    /// Next occupied entry at or after the cursor, wrapping. The entry
    /// stays registered; one call hands out one chore.
    pub(crate) fn poll(&mut self) -> Option<(IdleFn, usize)> {
        for step in 0..IDLE_WORK_MAX {
            let at = (self.cursor + step) % IDLE_WORK_MAX;
            if let Some(item) = self.slots[at] {
                self.cursor = (at + 1) % IDLE_WORK_MAX;
                return Some((item.func, item.ctx));
            }
        }
        None
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Default idle body installed by a plain `init`: it has no kernel in
/// reach, so it only spins. A port that registers idle work installs
/// its own draining loop via `init_with_idle`.
pub(crate) fn idle_entry(_ctx: usize) {
    loop {
        core::hint::spin_loop();
    }
}
