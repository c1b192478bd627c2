// Scheduler core
//
// One Kernel value owns the task table, the scheduling classes, the
// tick clock, and the lock state. Dispatch walks the classes in
// configured priority order and takes the first candidate; the idle
// task catches the walk when every class comes up empty. The kernel
// never touches hardware: interrupt masking goes through the IntMask
// collaborator and context switching is the embedding's job, ordered
// by the Switch values these methods return.

mod aperiodic;
mod periodic;
mod sleep;

use core::fmt;

use log::{debug, info, trace, warn};

use crate::config::{
    APERIODIC_CLASS_PRIORITY, MAX_LOCK_DEPTH, MAX_TASKS, PERIODIC_CLASS_PRIORITY,
    SLEEP_CLASS_PRIORITY,
};
use crate::idle::{self, IdleFn, WorkError, WorkTable};
use crate::mask::IntMask;
use crate::task::{
    ClassId, SavedContext, TaskControl, TaskEntry, TaskId, TaskState, TaskTable, Tick,
};

use aperiodic::Aperiodic;
use periodic::Periodic;
use sleep::SleepQueue;

/// Registration target for [`Kernel::task_add`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ClassSel {
    /// Priority-ordered, event-driven.
    Aperiodic,
    /// Deadline-ordered; the first deadline is caller-assigned and the
    /// task reprograms it each cycle.
    Periodic { deadline: Tick },
}

/// Where a yield came from; selects the requeue policy.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum YieldOrigin {
    /// Still runnable, requeue per the class policy.
    System,
    /// Hold off dispatch for `ticks` tick periods.
    Sleep { ticks: Tick },
    /// Park off every queue until [`Kernel::task_resume`].
    Suspend,
}

/// Context-switch order for the embedding: save `from`, run `to`.
/// `from` is None only for the very first dispatch.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Switch {
    pub from: Option<TaskId>,
    pub to: TaskId,
}

/// Task-table exhaustion from [`Kernel::task_create`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SpawnError {
    TableFull,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::TableFull => write!(f, "task table full"),
        }
    }
}

// Dispatch-walk entries. Sleep sits in the walk like a class so a due
// sleeper can win a dispatch that happens between ticks.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum ClassRef {
    Periodic,
    Sleep,
    Aperiodic,
}

// Walk order, ascending by configured class priority.
fn class_registry() -> [ClassRef; 3] {
    let mut entries = [
        (PERIODIC_CLASS_PRIORITY, ClassRef::Periodic),
        (SLEEP_CLASS_PRIORITY, ClassRef::Sleep),
        (APERIODIC_CLASS_PRIORITY, ClassRef::Aperiodic),
    ];
    let mut i = 1;
    while i < entries.len() {
        let mut j = i;
        while j > 0 && entries[j - 1].0 > entries[j].0 {
            entries.swap(j - 1, j);
            j -= 1;
        }
        i += 1;
    }
    [entries[0].1, entries[1].1, entries[2].1]
}

/// The scheduling core.
///
/// Mutating entry points take the scheduler lock for their duration;
/// the lock nests, so a caller that already holds it pays only a depth
/// bump. Contract violations (stale ids, wrong-state transitions)
/// panic; resource exhaustion comes back as a Result.
pub struct Kernel<M: IntMask> {
    tasks: TaskTable,
    aperiodic: Aperiodic,
    periodic: Periodic,
    sleep: SleepQueue,
    registry: [ClassRef; 3],
    current: Option<TaskId>,
    tick_count: Tick,
    lock_depth: u8,
    mask: M,
    idle: Option<TaskId>,
    work: WorkTable,
    initialized: bool,
}

impl<M: IntMask> Kernel<M> {
    pub const fn new(mask: M) -> Self {
        Self {
            tasks: TaskTable::new(),
            aperiodic: Aperiodic::new(),
            periodic: Periodic::new(),
            sleep: SleepQueue::new(),
            registry: [ClassRef::Periodic, ClassRef::Sleep, ClassRef::Aperiodic],
            current: None,
            tick_count: 0,
            lock_depth: 0,
            mask,
            idle: None,
            work: WorkTable::new(),
            initialized: false,
        }
    }

    /// One-time bring-up: order the class walk and create the idle
    /// task on the given stack. The idle body is the built-in spin
    /// loop; ports that run chores install their own through
    /// [`Kernel::init_with_idle`]. Panics if called twice.
    pub fn init(&mut self, idle_stack: &'static mut [u8]) {
        self.init_with_idle(idle_stack, idle::idle_entry, 0);
    }

    /// Bring-up with a port-supplied idle body. The entry lands in the
    /// idle TCB like any other task's, so an embedding that builds
    /// frames from `entry()`/`ctx()` gets a body that can drain
    /// [`Kernel::poll_idle_work`] between wait-for-interrupt hints.
    pub fn init_with_idle(&mut self, idle_stack: &'static mut [u8], entry: TaskEntry, ctx: usize) {
        if self.initialized {
            panic!("scheduler already initialized");
        }
        self.registry = class_registry();
        self.initialized = true;
        let id = match self.task_create("idle", entry, ctx, idle_stack) {
            Ok(id) => id,
            Err(_) => panic!("task table full at init"),
        };
        self.idle = Some(id);
        info!(
            "scheduler up: {} task slots, idle task {id} with {}B stack",
            MAX_TASKS,
            self.tasks.task(id).stack_size()
        );
    }

    /// Take the scheduler lock. The outermost acquisition masks the
    /// preemption source; nested calls only deepen the count.
    pub fn lock(&mut self) {
        if self.lock_depth == MAX_LOCK_DEPTH {
            panic!("scheduler lock depth limit");
        }
        if self.lock_depth == 0 {
            self.mask.disable();
        }
        self.lock_depth += 1;
    }

    /// Release one level of the lock; the last release unmasks.
    pub fn unlock(&mut self) {
        if self.lock_depth == 0 {
            panic!("scheduler unlock without a matching lock");
        }
        self.lock_depth -= 1;
        if self.lock_depth == 0 {
            self.mask.restore();
        }
    }

    fn locked<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.lock();
        let out = f(self);
        self.unlock();
        out
    }

    fn require_init(&self, op: &str) {
        if !self.initialized {
            panic!("{op} before scheduler init");
        }
    }

    /// Allocate a control block. The task starts in `Initial` and is
    /// not scheduled until [`Kernel::task_add`] hands it to a class.
    pub fn task_create(
        &mut self,
        name: &str,
        entry: TaskEntry,
        ctx: usize,
        stack: &'static mut [u8],
    ) -> Result<TaskId, SpawnError> {
        self.require_init("task_create");
        self.locked(|k| {
            let task = TaskControl::new(name, entry, ctx, stack);
            let Some(id) = k.tasks.allocate(task) else {
                warn!("task table full, '{name}' not created");
                return Err(SpawnError::TableFull);
            };
            debug!("created task {id} '{}'", k.tasks.task(id).name());
            Ok(id)
        })
    }

    /// Register an `Initial` task with a scheduling class at the given
    /// priority (0 runs first). Panics on a second registration.
    pub fn task_add(&mut self, id: TaskId, class: ClassSel, priority: u8) {
        self.require_init("task_add");
        self.locked(|k| {
            if Some(id) == k.idle {
                panic!("the idle task cannot join a class");
            }
            {
                let t = k.tasks.task_mut(id);
                if t.state != TaskState::Initial {
                    panic!("task_add: task '{}' is {:?}, expected Initial", t.name(), t.state);
                }
                t.priority = priority;
                t.state = TaskState::Ready;
                match class {
                    ClassSel::Aperiodic => t.class = Some(ClassId::Aperiodic),
                    ClassSel::Periodic { deadline } => {
                        t.class = Some(ClassId::Periodic);
                        t.deadline = deadline;
                    }
                }
            }
            match class {
                ClassSel::Aperiodic => k.aperiodic.add(&mut k.tasks, id),
                ClassSel::Periodic { .. } => k.periodic.add(&mut k.tasks, id),
            }
            debug!("task {id} joined {class:?} at priority {priority}");
        });
    }

    /// Unlink a task from wherever it waits and free its slot. The
    /// running task cannot remove itself; exit or yield first.
    pub fn task_remove(&mut self, id: TaskId) {
        self.require_init("task_remove");
        self.locked(|k| {
            if Some(id) == k.idle {
                panic!("the idle task cannot be removed");
            }
            let (state, class) = {
                let t = k.tasks.task(id);
                (t.state, t.class)
            };
            match state {
                TaskState::Ready => {
                    let found = match class {
                        Some(ClassId::Aperiodic) => k.aperiodic.remove(&mut k.tasks, id),
                        Some(ClassId::Periodic) => k.periodic.remove(&mut k.tasks, id),
                        None => false,
                    };
                    debug_assert!(found, "ready task {id} missing from its class list");
                }
                TaskState::Sleeping => {
                    let found = k.sleep.remove(&mut k.tasks, id);
                    debug_assert!(found, "sleeping task {id} missing from the sleep queue");
                }
                TaskState::Initial | TaskState::Suspended | TaskState::Finished => {}
                TaskState::Running => {
                    panic!("task_remove: task {id} is running");
                }
            }
            k.tasks.release(id);
            debug!("removed task {id}");
        });
    }

    /// Put a sleeping or suspended task back in its class's queue
    /// without waiting out its delay.
    pub fn task_resume(&mut self, id: TaskId) {
        self.require_init("task_resume");
        self.locked(|k| {
            let state = k.tasks.task(id).state;
            match state {
                TaskState::Sleeping => {
                    let found = k.sleep.remove(&mut k.tasks, id);
                    debug_assert!(found, "sleeping task {id} missing from the sleep queue");
                    k.requeue(id);
                }
                TaskState::Suspended => k.requeue(id),
                _ => panic!("task_resume: task {id} is {state:?}"),
            }
            debug!("resumed task {id}");
        });
    }

    /// The running task gives up the processor. Parks it per `origin`,
    /// picks the successor, and returns the switch order.
    pub fn task_yield(&mut self, id: TaskId, origin: YieldOrigin) -> Switch {
        self.require_init("task_yield");
        self.locked(|k| {
            if k.current != Some(id) {
                panic!("task_yield: {id} is not the running task");
            }
            k.park(id, origin);
            let to = k.pick_next();
            trace!("task {id} yields, {to} next");
            Switch { from: Some(id), to }
        })
    }

    /// The running task is done for good. Marks it `Finished`, leaves
    /// the slot allocated for inspection until `task_remove`, and
    /// dispatches the successor.
    pub fn task_exit(&mut self, id: TaskId) -> Switch {
        self.require_init("task_exit");
        self.locked(|k| {
            if k.current != Some(id) {
                panic!("task_exit: {id} is not the running task");
            }
            if Some(id) == k.idle {
                panic!("the idle task cannot exit");
            }
            k.tasks.task_mut(id).state = TaskState::Finished;
            k.current = None;
            debug!("task {id} finished");
            let to = k.pick_next();
            Switch { from: Some(id), to }
        })
    }

    /// Pick and dispatch the best ready task. Used by the embedding
    /// for the first dispatch; later switches come out of
    /// [`Kernel::task_yield`] and [`Kernel::tick`].
    pub fn next_task(&mut self) -> TaskId {
        self.require_init("next_task");
        self.locked(|k| k.pick_next())
    }

    /// Timer-interrupt edge: advance the clock, move every due sleeper
    /// back to its class, then try to preempt. Returns the switch the
    /// embedding must perform, or None to stay put.
    pub fn tick(&mut self) -> Option<Switch> {
        self.require_init("tick");
        self.locked(|k| {
            k.tick_count = k.tick_count.wrapping_add(1);
            k.wake_sleepers();
            let Some(cur) = k.current else {
                // nothing ran yet; this is the boot dispatch
                let to = k.pick_next();
                return Some(Switch { from: None, to });
            };
            if !k.tasks.task(cur).preempt {
                return None;
            }
            k.requeue(cur);
            k.current = None;
            let to = k.pick_next();
            if to == cur {
                return None;
            }
            trace!("tick preempts {cur}, {to} next");
            Some(Switch { from: Some(cur), to })
        })
    }

    /// Move a deadline. Meant for a periodic task reprogramming its
    /// own next cycle before it yields; changing a queued task's
    /// deadline does not reorder it.
    pub fn task_set_deadline(&mut self, id: TaskId, deadline: Tick) {
        self.locked(|k| {
            let t = k.tasks.task_mut(id);
            debug_assert!(
                t.state != TaskState::Ready,
                "deadline change for queued task {id} will not reorder it"
            );
            t.deadline = deadline;
        });
    }

    /// Clearing `preempt` lets a task hold the processor across ticks;
    /// it still loses it by yielding.
    pub fn task_set_preempt(&mut self, id: TaskId, preempt: bool) {
        self.locked(|k| {
            k.tasks.task_mut(id).preempt = preempt;
        });
    }

    /// Saved context handoff for the embedding's switch path. Read and
    /// write these under the lock the switch already holds.
    pub fn saved_context(&self, id: TaskId) -> SavedContext {
        self.tasks.task(id).saved
    }

    pub fn set_saved_context(&mut self, id: TaskId, saved: SavedContext) {
        self.tasks.task_mut(id).saved = saved;
    }

    pub fn current(&self) -> Option<TaskId> {
        self.current
    }

    pub fn now(&self) -> Tick {
        self.tick_count
    }

    pub fn idle_task(&self) -> TaskId {
        match self.idle {
            Some(id) => id,
            None => panic!("scheduler not initialized"),
        }
    }

    /// Control-block view; panics on a stale id.
    pub fn task(&self, id: TaskId) -> &TaskControl {
        self.tasks.task(id)
    }

    pub fn tasks(&self) -> &TaskTable {
        &self.tasks
    }

    pub fn add_idle_work(&mut self, func: IdleFn, ctx: usize) -> Result<(), WorkError> {
        self.locked(|k| k.work.add(func, ctx))
    }

    pub fn remove_idle_work(&mut self, func: IdleFn, ctx: usize) -> Result<(), WorkError> {
        self.locked(|k| k.work.remove(func, ctx))
    }

    /// One registered idle chore, round-robin. The idle loop calls
    /// this between chores so registration changes take effect.
    pub fn poll_idle_work(&mut self) -> Option<(IdleFn, usize)> {
        self.locked(|k| k.work.poll())
    }

    fn park(&mut self, id: TaskId, origin: YieldOrigin) {
        match origin {
            YieldOrigin::System => self.requeue(id),
            YieldOrigin::Sleep { ticks } => {
                if Some(id) == self.idle {
                    panic!("the idle task cannot sleep");
                }
                debug_assert!(
                    ticks < Tick::MAX / 2,
                    "sleep delay {ticks} exceeds half the tick range"
                );
                let wake_at = self.tick_count.wrapping_add(ticks);
                self.tasks.task_mut(id).state = TaskState::Sleeping;
                self.sleep.add(&mut self.tasks, id, wake_at);
            }
            YieldOrigin::Suspend => {
                if Some(id) == self.idle {
                    panic!("the idle task cannot suspend");
                }
                self.tasks.task_mut(id).state = TaskState::Suspended;
            }
        }
        if self.current == Some(id) {
            self.current = None;
        }
    }

    // Back to the owning class's queue. The idle task has no class and
    // no queue; Ready is enough for the dispatch fallback to find it.
    fn requeue(&mut self, id: TaskId) {
        self.tasks.task_mut(id).state = TaskState::Ready;
        if Some(id) == self.idle {
            return;
        }
        match self.tasks.task(id).class {
            Some(ClassId::Aperiodic) => self.aperiodic.add(&mut self.tasks, id),
            Some(ClassId::Periodic) => self.periodic.add(&mut self.tasks, id),
            None => panic!("task {id} has no scheduling class"),
        }
    }

    fn wake_sleepers(&mut self) {
        let now = self.tick_count;
        while let Some(id) = self.sleep.take_due(&mut self.tasks, now) {
            trace!("wake {id}");
            self.requeue(id);
        }
    }

    // First class with a candidate wins; idle catches an empty walk.
    fn pick_next(&mut self) -> TaskId {
        debug_assert!(
            self.current.is_none_or(|c| self.tasks.task(c).state != TaskState::Running),
            "dispatch with the current task still running"
        );
        let now = self.tick_count;
        let mut winner = None;
        for class in self.registry {
            winner = match class {
                ClassRef::Periodic => self.periodic.take_next(&mut self.tasks),
                ClassRef::Sleep => self.sleep.take_due(&mut self.tasks, now),
                ClassRef::Aperiodic => self.aperiodic.take_next(&mut self.tasks),
            };
            if winner.is_some() {
                break;
            }
        }
        let id = match winner {
            Some(id) => id,
            None => match self.idle {
                Some(idle) => idle,
                None => panic!("dispatch before scheduler init"),
            },
        };
        {
            let t = self.tasks.task_mut(id);
            t.state = TaskState::Running;
            #[cfg(feature = "stats")]
            {
                t.scheduled = t.scheduled.wrapping_add(1);
            }
        }
        self.current = Some(id);
        trace!("dispatch {id}");
        id
    }
}
