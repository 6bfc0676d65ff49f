//! # Kernel
//!
//! Top-level kernel state and the public task API.
//!
//! The kernel owns the global scheduler instance and the thread-id
//! generator, and exposes the task lifecycle: creation, voluntary yield,
//! and teardown.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset handler (riscv-rt)
//!   └─► main()
//!         ├─► console::init()     ← optional: install a logger
//!         ├─► kernel::init()      ← reset scheduler + id generator
//!         ├─► kernel::create_task() ← register the initial task set (×N)
//!         └─► kernel::start()     ← run the scheduler; idles when the
//!                                   run queue drains
//! ```
//!
//! Tasks then drive everything through [`yield_now`] and [`exit`] (or by
//! simply returning, which the trampoline converts into [`exit`]).

use log::debug;

use crate::arch::riscv64;
use crate::scheduler::Scheduler;
use crate::sync;
use crate::task::{Task, TaskEntry, TaskId, TaskState, TaskStack, ThreadIdAllocator};

// ---------------------------------------------------------------------------
// Global kernel instance
// ---------------------------------------------------------------------------

struct Kernel {
    sched: Scheduler,
    thread_ids: ThreadIdAllocator,
}

impl Kernel {
    const fn new() -> Self {
        Self {
            sched: Scheduler::new(),
            thread_ids: ThreadIdAllocator::new(),
        }
    }
}

/// The single kernel instance.
///
/// Safety: single core; all mutation happens either before the scheduler
/// starts or on the switch path, which is the only way CPU ownership
/// changes. A preemptive extension must mask interrupts around it.
static mut KERNEL: Kernel = Kernel::new();

fn kernel() -> &'static mut Kernel {
    // Safety: see KERNEL.
    unsafe { &mut *core::ptr::addr_of_mut!(KERNEL) }
}

// ---------------------------------------------------------------------------
// Kernel API
// ---------------------------------------------------------------------------

/// Reset kernel state. Call once, before registering tasks.
pub fn init() {
    let k = kernel();
    k.sched.init();
    k.thread_ids.reset();
}

/// Create a task and hand it to the scheduler.
///
/// Allocates a fresh process-unique thread id, embeds the task header at
/// the base of `stack`, builds the initial resume layout and enqueues
/// the task `Ready`. Never fails for valid inputs; the priority value is
/// opaque here — its ordering meaning lives in the scheduler.
pub fn create_task(entry: TaskEntry, stack: &'static mut TaskStack, priority: u8) -> TaskId {
    sync::critical_section(|| {
        let k = kernel();
        let thread_id = k.thread_ids.next();
        // Safety: the stack is 'static and ownership is handed over
        // exclusively for the lifetime of the task.
        let task = unsafe { Task::place(stack, entry, priority, thread_id) };
        let id = unsafe { task.as_ref().id };
        k.sched.add_task(task);
        debug!("created task {} (priority {})", thread_id, priority);
        id
    })
}

/// Run the scheduler. **Returns only to idle.**
///
/// Performs the first selection, parking the caller's CPU state in the
/// scheduler's boot context. Control comes back here once the run queue
/// has drained (every task terminated); the kernel then waits in a
/// low-power loop — the idle policy for an empty queue.
pub fn start() -> ! {
    debug!("scheduler starting");
    loop {
        kernel().sched.run();
        riscv64::wait_for_interrupt();
    }
}

/// Voluntarily give up the CPU without becoming ineligible.
///
/// The caller goes back to the tail of its priority class and runs again
/// once its turn comes around. This is purely "ask the scheduler to pick
/// a task now".
pub fn yield_now() {
    kernel().sched.run();
}

/// Tear down the current task. **Never returns.**
///
/// Called explicitly by a task, or by the trampoline when a task's body
/// returns. Removes the task from the run queue (a no-op in the common
/// case — the running task is not queued), marks it `Terminated`, and
/// hands the CPU to the scheduler for good.
pub fn exit() -> ! {
    let k = kernel();
    let Some(current) = k.sched.current() else {
        panic!("exit() called outside of a task");
    };
    // Safety: the current task occupies a live stack; we are running on it.
    let id = unsafe { current.as_ref().id };
    k.sched.remove_task(id);
    unsafe { (*current.as_ptr()).state = TaskState::Terminated };
    debug!("task {} terminated", id.thread_id);
    k.sched.run();
    // A terminated task is never selected again, so the switch above
    // cannot come back. Reaching this line means the context layout or
    // the selection policy is broken.
    unreachable!("terminated task was resumed");
}

/// Identity of the task presently running, or `None` if the scheduler
/// has never selected one (or the last task has terminated).
pub fn current_task() -> Option<TaskId> {
    kernel().sched.current_id()
}
