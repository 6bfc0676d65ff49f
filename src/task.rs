//! # Task Model
//!
//! Defines the unit of execution: identity, priority, state, and the
//! owned stack with the saved register context.
//!
//! ## State machine
//!
//! ```text
//!   ┌─────────┐      selected       ┌─────────┐
//!   │  Ready  │ ──────────────────► │ Running │
//!   └─────────┘                     └─────────┘
//!        ▲         voluntary yield       │
//!        └───────────────────────────────┤
//!                                        │ body returns / exit()
//!                                        ▼
//!                                 ┌────────────┐
//!                                 │ Terminated │  (terminal)
//!                                 └────────────┘
//! ```
//!
//! `Blocked` exists in the state machine and is treated as ineligible by
//! the scheduler, but nothing produces it yet — the kernel ships no
//! inter-task synchronization primitives.
//!
//! ## Memory layout
//!
//! There is no heap. The caller hands `create_task` a fixed-size
//! [`TaskStack`] region and the [`Task`] header is embedded at the *base*
//! (lowest address) of that region, so header and stack share one
//! allocation and the header is never separately freed:
//!
//! ```text
//!   high ┌──────────────────┐ ← stack top (grows down)
//!        │   task frames    │
//!        │        ⋮         │
//!        ├──────────────────┤
//!   low  │   Task header    │ ← region base
//!        └──────────────────┘
//! ```
//!
//! A deep enough call chain will run the stack into the header. That is
//! an unchecked precondition violation, the same class of error as any
//! other stack overflow on this system.

use core::ptr::NonNull;

use crate::arch::riscv64::{init_task_stack, TaskContext};
use crate::config::STACK_SIZE;

/// Entry function of a task. May return; the trampoline then tears the
/// task down.
pub type TaskEntry = extern "C" fn();

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Execution state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Eligible to run, waiting in the run queue.
    Ready,
    /// Currently owns the CPU. Exactly one task is `Running` at any
    /// observable instant.
    Running,
    /// Ineligible until some event makes it `Ready` again.
    Blocked,
    /// Finished. Terminal — never scheduled again.
    Terminated,
}

// ---------------------------------------------------------------------------
// Task identity
// ---------------------------------------------------------------------------

/// The execution space every task belongs to today. Reserved for future
/// multi-space support.
pub const DEFAULT_SPACE: u64 = 0;

/// Composite task identity: an execution-space id plus a thread id that
/// is unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskId {
    /// Execution-space id. Always [`DEFAULT_SPACE`] for now.
    pub space_id: u64,
    /// Strictly increasing, never reused while the system runs.
    pub thread_id: u64,
}

impl TaskId {
    pub const fn new(thread_id: u64) -> Self {
        Self {
            space_id: DEFAULT_SPACE,
            thread_id,
        }
    }
}

/// Process-wide thread-id generator.
///
/// An explicitly owned counter rather than an implicit global so tests
/// can construct and reset their own. The kernel owns the single live
/// instance. Ids start at 1 and never wrap in practice; wraparound of
/// the 64-bit counter is an accepted open risk, not defended against.
pub struct ThreadIdAllocator {
    last: u64,
}

impl ThreadIdAllocator {
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Hand out the next thread id.
    pub fn next(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    /// Restart the sequence. Only meaningful before any task exists.
    pub fn reset(&mut self) {
        self.last = 0;
    }
}

// ---------------------------------------------------------------------------
// Stack region
// ---------------------------------------------------------------------------

/// A caller-owned task stack region.
///
/// Aligned to the psABI stack boundary so both the embedded header and
/// the computed stack top start out aligned. Typically lives in static
/// storage and is never freed at runtime.
#[repr(align(16))]
pub struct TaskStack(pub [u8; STACK_SIZE]);

impl TaskStack {
    pub const fn new() -> Self {
        Self([0; STACK_SIZE])
    }
}

// ---------------------------------------------------------------------------
// Task header
// ---------------------------------------------------------------------------

/// The task control structure, embedded at the base of its own stack.
///
/// `repr(C)` because the structure is placed into raw caller-owned
/// memory and must have a stable layout.
#[repr(C)]
pub struct Task {
    /// Composite identity; `thread_id` is process-unique.
    pub id: TaskId,
    /// Scheduling class. Lower numeric value is more urgent; the
    /// ordering policy itself lives in the scheduler.
    pub priority: u8,
    /// Current position in the state machine.
    pub state: TaskState,
    /// Saved callee-saved register bank. Valid only while the task is
    /// not `Running`; touched only by the context-switch path.
    pub context: TaskContext,
    /// Base address of the owned stack region (== address of `self`).
    pub stack_base: *mut u8,
    /// Size of the owned stack region in bytes.
    pub stack_size: usize,
}

// The header must leave a usable stack above itself.
const _: () = assert!(STACK_SIZE >= core::mem::size_of::<Task>() + 64);

impl Task {
    /// Place a `Ready` task header at the base of `stack` and build the
    /// initial resume layout so the first switch into it lands in the
    /// trampoline with the entry function in the argument register.
    ///
    /// # Safety
    /// `stack` must point to a live [`TaskStack`] that outlives the task
    /// and is used for nothing else. Re-placing a header over a stack
    /// whose task is still known to the scheduler is a programmer error.
    pub unsafe fn place(
        stack: *mut TaskStack,
        entry: TaskEntry,
        priority: u8,
        thread_id: u64,
    ) -> NonNull<Task> {
        let base = stack as *mut u8;
        let task = stack as *mut Task;

        task.write(Task {
            id: TaskId::new(thread_id),
            priority,
            state: TaskState::Ready,
            context: TaskContext::zeroed(),
            stack_base: base,
            stack_size: STACK_SIZE,
        });

        init_task_stack(
            &mut (*task).context,
            base,
            STACK_SIZE,
            entry as usize,
            task_rt as usize,
        );

        NonNull::new_unchecked(task)
    }
}

// ---------------------------------------------------------------------------
// Trampoline
// ---------------------------------------------------------------------------

/// Task runtime trampoline.
///
/// The only code address ever "returned into" by a freshly initialized
/// stack. Runs the task body in a controlled environment and tears the
/// task down if the body ever returns. `exit` never returns, so neither
/// does this function — reaching past the call would mean the stack
/// layout is broken.
pub(crate) extern "C" fn task_rt(entry: TaskEntry) -> ! {
    entry();
    crate::kernel::exit()
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::riscv64::STACK_ALIGNMENT;

    #[test]
    fn test_thread_ids_start_at_one_and_increase() {
        let mut ids = ThreadIdAllocator::new();
        assert_eq!(ids.next(), 1);
        assert_eq!(ids.next(), 2);
        assert_eq!(ids.next(), 3);
    }

    #[test]
    fn test_thread_ids_are_pairwise_distinct() {
        let mut ids = ThreadIdAllocator::new();
        let mut seen = [0u64; 32];
        for slot in seen.iter_mut() {
            *slot = ids.next();
        }
        for i in 0..seen.len() {
            for j in i + 1..seen.len() {
                assert_ne!(seen[i], seen[j]);
            }
            if i > 0 {
                assert!(seen[i] > seen[i - 1]);
            }
        }
    }

    #[test]
    fn test_allocator_reset_restarts_the_sequence() {
        let mut ids = ThreadIdAllocator::new();
        ids.next();
        ids.next();
        ids.reset();
        assert_eq!(ids.next(), 1);
    }

    extern "C" fn nop_entry() {}

    #[test]
    fn test_header_is_embedded_at_the_stack_base() {
        let mut stack = TaskStack::new();
        let base = &mut stack as *mut TaskStack as usize;
        let task = unsafe { Task::place(&mut stack, nop_entry, 3, 7) };
        assert_eq!(task.as_ptr() as usize, base);

        let task = unsafe { task.as_ref() };
        assert_eq!(task.id, TaskId::new(7));
        assert_eq!(task.id.space_id, DEFAULT_SPACE);
        assert_eq!(task.priority, 3);
        assert_eq!(task.state, TaskState::Ready);
        assert_eq!(task.stack_base as usize, base);
        assert_eq!(task.stack_size, STACK_SIZE);
    }

    #[test]
    fn test_placed_context_targets_the_trampoline() {
        let mut stack = TaskStack::new();
        let base = &mut stack as *mut TaskStack as usize;
        let task = unsafe { Task::place(&mut stack, nop_entry, 0, 1) };
        let ctx = unsafe { &task.as_ref().context };

        assert_eq!(ctx.sp % STACK_ALIGNMENT, 0);
        assert_eq!(ctx.a0, nop_entry as usize);
        // The saved stack pointer stays inside the region, above the header.
        assert!(ctx.sp > base + core::mem::size_of::<Task>());
        assert!(ctx.sp < base + STACK_SIZE);
        // The planted return address is the trampoline.
        let ra = unsafe { *((ctx.sp + 8) as *const usize) };
        assert_eq!(ra, task_rt as usize);
    }
}
