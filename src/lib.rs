// scheduling core for a small-footprint RTOS
//
// Class-priority dispatch over index-linked ready lists, a tick-ordered
// sleep queue, a nesting interrupt-masking lock, and an idle task with
// a bounded work table. Context switching, interrupt vectors, and board
// bring-up belong to the embedding; the core hands it Switch orders and
// stays architecture-free.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod config;
pub mod idle;
pub mod list;
pub mod mask;
pub mod sched;
#[cfg(feature = "stats")]
pub mod stats;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use idle::{IdleFn, WorkError};
pub use mask::{CriticalSectionMask, IntMask};
pub use sched::{ClassSel, Kernel, SpawnError, Switch, YieldOrigin};
#[cfg(feature = "stats")]
pub use stats::TaskReport;
pub use task::{
    ClassId, SavedContext, TaskControl, TaskEntry, TaskId, TaskState, TaskTable, Tick, tick_le,
    tick_lt,
};
