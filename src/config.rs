// Build-time configuration
//
// The whole configuration surface of the scheduling core lives here as
// compile-time constants. There is no runtime configuration; a port
// that needs different sizes edits this file (or patches it in its
// build) and rebuilds.

/// Capacity of the task table, idle task included.
pub const MAX_TASKS: usize = 16;

/// Capacity of the bounded idle work table. 0 leaves idle work
/// permanently rejected with `NoSpace`.
pub const IDLE_WORK_MAX: usize = 4;

// Class priorities order the dispatch walk; lower values are consulted
// first. Periodic outranks a due sleeper, which outranks the aperiodic
// ready queue.
pub const PERIODIC_CLASS_PRIORITY: u8 = 0;
pub const SLEEP_CLASS_PRIORITY: u8 = 254;
pub const APERIODIC_CLASS_PRIORITY: u8 = 255;

/// Byte painted over a fresh task stack so the watermark scan can tell
/// untouched bytes from used ones.
pub const STACK_FILL: u8 = 0xa5;

/// Deepest legal nesting of the scheduler lock.
pub const MAX_LOCK_DEPTH: u8 = u8::MAX;

/// Task name capacity in bytes; longer names are truncated.
pub const TASK_NAME_LEN: usize = 8;

// TaskId is a u8 index.
const _: () = assert!(MAX_TASKS > 0 && MAX_TASKS <= 256);
