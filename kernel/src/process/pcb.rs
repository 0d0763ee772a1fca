//! Process Control Block.
//!
//! The kernel stack for a process *is* its PCB slab: an 8 KiB region
//! whose low end holds the `Pcb` struct and whose high end is used as
//! the kernel-mode stack. Because the slab is 8 KiB-aligned, any kernel
//! stack pointer can be turned back into `&Pcb` with `sp & !0x1FFF` —
//! no per-CPU "current process" pointer is needed.

use crate::config::{MAX_PROCESSES, PCB_SLAB_SIZE, PROCESS_SLAB_BASE};
use crate::process::fd::FdTable;

pub const ARGS_MAX: usize = 128;

#[repr(C)]
pub struct Pcb {
    pub pid: u8,
    pub parent_pid: u8,
    pub terminal: u8,
    pub active: bool,
    pub fds: FdTable,
    pub args: [u8; ARGS_MAX],
    pub args_len: usize,
    /// Kernel esp/ebp saved by the scheduler on the last switch away
    /// from this process; restored to resume it.
    pub saved_esp: u32,
    pub saved_ebp: u32,
    /// esp0 this process's kernel stack should restore to on the next
    /// ring-3 -> ring-0 transition.
    pub kernel_stack_top: u32,
    /// Physical base of this process's 4 MiB program slab.
    pub program_phys_base: u32,
}

impl Pcb {
    fn slab_base(pid: u8) -> usize {
        PROCESS_SLAB_BASE - (pid as usize - 1) * PCB_SLAB_SIZE
    }

    /// Physical address of the PCB for `pid`. Valid for pid in
    /// 1..=MAX_PROCESSES.
    pub fn address_for(pid: u8) -> *mut Pcb {
        Self::slab_base(pid) as *mut Pcb
    }

    /// Recovers the currently-running process's PCB from any kernel
    /// stack pointer taken while running on its slab.
    ///
    /// # Safety
    /// `sp` must be a live kernel stack pointer into a process's slab.
    pub unsafe fn from_kernel_sp(sp: usize) -> &'static mut Pcb {
        let base = sp & !(PCB_SLAB_SIZE - 1);
        // SAFETY: caller guarantees `sp` points within a valid slab.
        unsafe { &mut *(base as *mut Pcb) }
    }

    pub fn kernel_stack_top_for(pid: u8) -> u32 {
        (Self::slab_base(pid) + PCB_SLAB_SIZE) as u32
    }
}

/// Process table: slot `pid - 1` tracks whether PID `pid` is in use.
/// PID 0 is reserved and never assigned.
pub struct ProcessTable {
    in_use: [bool; MAX_PROCESSES],
}

impl ProcessTable {
    pub const fn new() -> Self {
        Self {
            in_use: [false; MAX_PROCESSES],
        }
    }

    pub fn allocate(&mut self) -> Option<u8> {
        let slot = self.in_use.iter().position(|&used| !used)?;
        self.in_use[slot] = true;
        Some((slot + 1) as u8)
    }

    pub fn free(&mut self, pid: u8) {
        if (1..=MAX_PROCESSES as u8).contains(&pid) {
            self.in_use[pid as usize - 1] = false;
        }
    }

    pub fn is_active(&self, pid: u8) -> bool {
        (1..=MAX_PROCESSES as u8).contains(&pid) && self.in_use[pid as usize - 1]
    }

    pub fn active_pids(&self) -> impl Iterator<Item = u8> + '_ {
        self.in_use
            .iter()
            .enumerate()
            .filter(|&(_, &used)| used)
            .map(|(i, _)| (i + 1) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn allocate_reuses_freed_slots() {
        let mut table = ProcessTable::new();
        let a = table.allocate().unwrap();
        let b = table.allocate().unwrap();
        assert_ne!(a, b);
        table.free(a);
        let c = table.allocate().unwrap();
        assert_eq!(a, c);
    }

    #[test_case]
    fn exhausts_after_max_processes() {
        let mut table = ProcessTable::new();
        for _ in 0..MAX_PROCESSES {
            assert!(table.allocate().is_some());
        }
        assert!(table.allocate().is_none());
    }

    #[test_case]
    fn slab_addresses_are_distinct_and_aligned() {
        let a = Pcb::slab_base(1);
        let b = Pcb::slab_base(2);
        assert_ne!(a, b);
        assert_eq!(a % PCB_SLAB_SIZE, 0);
        assert_eq!(b % PCB_SLAB_SIZE, 0);
    }
}
