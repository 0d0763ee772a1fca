//! Round-robin scheduler.
//!
//! The kernel itself never preempts: every process, while it's the one
//! running, owns the CPU until it traps back in (syscall or fault) or a
//! PIT tick asks for a rotation. A rotation works by frame exchange, not
//! a generic stack swap. Every process keeps one saved [`TrapFrame`] at
//! a fixed offset in its own kernel-stack slab — wherever it was sitting
//! the last time it got interrupted (or, for a process that's never run
//! yet, a frame `execute` built by hand pointing at the entry point).
//! `schedule` copies the live frame into the outgoing process's slot,
//! then jumps straight to the incoming process's slot and replays the
//! normal interrupt epilogue (`popa; iret`) from there — the
//! `resume_in_frame` intrinsic below, a small assembly trampoline that
//! never returns to its caller.

use core::arch::global_asm;
use core::mem::size_of;

use spin::Mutex;

use crate::arch::x86::gdt;
use crate::arch::x86::interrupts::TrapFrame;
use crate::mm::paging;
use crate::process::{self, pcb::Pcb};

static CURRENT: Mutex<Option<u8>> = Mutex::new(None);

fn saved_frame_ptr(pid: u8) -> *mut TrapFrame {
    (Pcb::kernel_stack_top_for(pid) as usize - size_of::<TrapFrame>()) as *mut TrapFrame
}

/// Builds the initial, never-yet-run frame for a freshly `execute`d
/// process, landing it at `entry` with a fresh user stack at the top of
/// its program window.
pub fn prime_initial_frame(pid: u8, entry: u32, user_esp: u32) {
    let frame = saved_frame_ptr(pid);
    // SAFETY: this offset within the slab is reserved for the saved
    // frame and not yet in use by anything else for a fresh process.
    unsafe {
        core::ptr::write_bytes(frame, 0, 1);
        let frame = &mut *frame;
        frame.eip = entry;
        frame.cs = gdt::USER_CODE_SELECTOR as u32;
        frame.eflags = 0x202; // IF set, reserved bit 1 set
        frame.user_esp = user_esp;
        frame.user_ss = gdt::USER_DATA_SELECTOR as u32;
        frame.vector = 0;
        frame.error_code = 0;
    }
}

/// Marks `pid` as the one to resume next time `schedule` rotates, without
/// itself performing a switch. Used right after `execute` creates a
/// process: that process becomes current immediately via its own `iret`,
/// not through `schedule`.
pub fn set_current(pid: u8) {
    *CURRENT.lock() = Some(pid);
}

fn next_pid(after: u8) -> Option<u8> {
    let pids = process::active_pids();
    let active: alloc::vec::Vec<u8> = pids.iter().copied().filter(|&p| p != 0).collect();
    if active.is_empty() {
        return None;
    }
    let pos = active.iter().position(|&p| p == after);
    let start = match pos {
        Some(i) => (i + 1) % active.len(),
        None => 0,
    };
    Some(active[start])
}

// `alloc` is registered once in `lib.rs`; reachable crate-wide by path.

/// Called from the PIT tick handler. Copies `frame` (the interrupted
/// process's live register state) into its PCB slot, rotates to the next
/// runnable process, and either returns (nothing to switch to, or the
/// next process is the same one) or diverges into [`resume_in_frame`].
pub fn on_timer_tick(frame: &mut TrapFrame) {
    let current = match *CURRENT.lock() {
        Some(pid) => pid,
        None => return,
    };

    // SAFETY: frame points at the live kernel stack, within current's slab.
    unsafe {
        core::ptr::copy_nonoverlapping(frame as *const TrapFrame, saved_frame_ptr(current), 1);
    }

    let next = match next_pid(current) {
        Some(pid) => pid,
        None => return,
    };
    if next == current {
        return;
    }

    *CURRENT.lock() = Some(next);
    let next_pcb = process::get(next);
    gdt::set_kernel_stack(next_pcb.kernel_stack_top);
    paging::switch_task(next_pcb.program_phys_base);

    // SAFETY: next's saved frame was either primed by `prime_initial_frame`
    // or last written by a previous call to this function; either way it
    // is a complete, valid interrupt frame.
    unsafe { resume_in_frame(saved_frame_ptr(next)) }
}

fn switch_into(pid: u8) -> ! {
    *CURRENT.lock() = Some(pid);
    let pcb = process::get(pid);
    gdt::set_kernel_stack(pcb.kernel_stack_top);
    paging::switch_task(pcb.program_phys_base);
    // SAFETY: pid's saved frame was either primed by `prime_initial_frame`
    // or last written by a previous save; either way it's a complete,
    // valid interrupt frame.
    unsafe { resume_in_frame(saved_frame_ptr(pid)) }
}

/// Transfers control from `parent` directly into a freshly created
/// child, the way `execute` does: the parent's live register state is
/// saved (to resume later, once the child halts), and the child's
/// primed frame is entered immediately rather than waiting for the next
/// PIT rotation.
///
/// # Safety
/// `frame` must be the live trap frame of the syscall that created
/// `child`; this function never returns to its caller.
pub unsafe fn transfer_to_child(frame: &TrapFrame, parent: u8, child: u8) -> ! {
    // SAFETY: frame is the parent's own live interrupt frame.
    unsafe {
        core::ptr::copy_nonoverlapping(frame as *const TrapFrame, saved_frame_ptr(parent), 1);
    }
    switch_into(child)
}

/// Terminates `pid` (a fault victim, or a process servicing its own
/// `halt` syscall) and resumes its parent with `status` as that parent's
/// `execute` return value. If `pid` was a terminal's root shell, a fresh
/// shell is spawned on that terminal instead. Never returns.
pub fn halt_and_resume(pid: u8, status: u32) -> ! {
    let pcb = process::get(pid);
    let parent = pcb.parent_pid;
    let terminal = pcb.terminal;
    process::destroy(pid);

    if parent == 0 {
        let fresh = crate::syscall::spawn_shell(terminal)
            .expect("failed to respawn terminal shell after halt");
        switch_into(fresh)
    } else {
        // SAFETY: parent is still a valid, suspended process; its saved
        // frame was written the last time it lost the CPU (by
        // `transfer_to_child` or a prior rotation).
        unsafe {
            (*saved_frame_ptr(parent)).eax = status;
        }
        switch_into(parent)
    }
}

global_asm!(
    r#"
.intel_syntax noprefix
.global resume_in_frame
resume_in_frame:
mov eax, [esp + 4]
mov esp, eax
popa
add esp, 8
iretd
"#
);

extern "C" {
    /// # Safety
    /// `frame` must point at a complete, valid [`TrapFrame`] sitting at
    /// the top of a kernel stack this function is allowed to adopt as
    /// its own `esp`; this function does not return.
    fn resume_in_frame(frame: *mut TrapFrame) -> !;
}

#[cfg(test)]
mod tests {
    #[test_case]
    fn saved_frame_ptr_is_within_slab() {
        use super::*;
        let ptr = saved_frame_ptr(1) as usize;
        let top = Pcb::kernel_stack_top_for(1) as usize;
        assert!(ptr < top);
        assert!(top - ptr == size_of::<TrapFrame>());
    }
}
