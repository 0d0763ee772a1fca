//! Process model: the PCB table, per-process file descriptors, and the
//! bookkeeping `execute`/`halt` lean on.

pub mod fd;
pub mod pcb;

use spin::Mutex;

use crate::config::MAX_PROCESSES;
use crate::error::{KernelError, KernelResult};
use pcb::{Pcb, ProcessTable};

static TABLE: Mutex<ProcessTable> = Mutex::new(ProcessTable::new());

/// Per-terminal foreground process, indexed by terminal id.
static TERMINAL_OWNER: Mutex<[Option<u8>; crate::config::NUM_TERMINALS]> =
    Mutex::new([None; crate::config::NUM_TERMINALS]);

/// Allocates a PID and initializes its PCB slab. `parent` is `None` for
/// a terminal's initial shell.
pub fn create(parent: Option<u8>, terminal: u8) -> KernelResult<u8> {
    let pid = TABLE
        .lock()
        .allocate()
        .ok_or(KernelError::ResourceExhausted)?;

    let pcb = unsafe { &mut *Pcb::address_for(pid) };
    pcb.pid = pid;
    pcb.parent_pid = parent.unwrap_or(0);
    pcb.terminal = terminal;
    pcb.active = true;
    pcb.fds = fd::FdTable::new();
    pcb.fds.init_std_streams();
    pcb.args_len = 0;
    pcb.saved_esp = 0;
    pcb.saved_ebp = 0;
    pcb.kernel_stack_top = Pcb::kernel_stack_top_for(pid);
    pcb.program_phys_base = 0x0080_0000 + (pid as u32 + 2) * (4 * 1024 * 1024);

    Ok(pid)
}

pub fn destroy(pid: u8) {
    TABLE.lock().free(pid);
}

pub fn is_active(pid: u8) -> bool {
    TABLE.lock().is_active(pid)
}

pub fn active_pids() -> [u8; MAX_PROCESSES] {
    let table = TABLE.lock();
    let mut out = [0u8; MAX_PROCESSES];
    for (slot, pid) in out.iter_mut().zip(table.active_pids()) {
        *slot = pid;
    }
    out
}

pub fn get(pid: u8) -> &'static mut Pcb {
    // SAFETY: every live pid has a PCB at this address, written by `create`.
    unsafe { &mut *Pcb::address_for(pid) }
}

pub fn foreground_pid(terminal: u8) -> Option<u8> {
    TERMINAL_OWNER.lock()[terminal as usize]
}

pub fn set_foreground(terminal: u8, pid: Option<u8>) {
    TERMINAL_OWNER.lock()[terminal as usize] = pid;
}

/// The PID currently executing, recovered from the live kernel stack
/// pointer. `None` before the first process has been scheduled.
pub fn current_pid() -> Option<u8> {
    let sp: usize;
    // SAFETY: reading esp has no side effects.
    unsafe { core::arch::asm!("mov {0}, esp", out(reg) sp, options(nomem, nostack, preserves_flags)) };
    let region_base =
        crate::config::PROCESS_SLAB_BASE - crate::config::MAX_PROCESSES * crate::config::PCB_SLAB_SIZE;
    if sp < region_base {
        return None;
    }
    // SAFETY: bounds checked above against the slab region.
    let pcb = unsafe { Pcb::from_kernel_sp(sp) };
    if pcb.active {
        Some(pcb.pid)
    } else {
        None
    }
}
