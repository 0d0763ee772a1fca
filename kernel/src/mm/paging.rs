//! Page directory / page table setup and per-process address-space
//! switching.
//!
//! Four kinds of mapping, mirroring `original_source/paging.c`:
//!   - PDE 0: a 4 KiB page table identity-mapping the first 4 MiB page
//!     by page (page 0 left not-present to catch null derefs), which
//!     covers both the kernel image loaded at 1 MiB and the VGA text
//!     buffer at `0xB8000`.
//!   - PDE 1: one 4 MiB extended page, identity-mapped, backing the
//!     kernel image (4 MiB-8 MiB).
//!   - PDE 2: one 4 MiB extended page, identity-mapped and
//!     user-readable, backing the kernel heap (8 MiB-12 MiB).
//!   - PDE 32 (the 128 MiB "ELF window"): one 4 MiB extended page
//!     remapped to a process's physical slab on every context switch.
//!   - PDE 33 (the 132 MiB "video window"): a page table with a single
//!     4 KiB entry remapped on every `vidmap`/terminal switch, either to
//!     the live VGA buffer or to a background terminal's backing buffer.

use core::arch::asm;

use bitflags::bitflags;
use spin::Mutex;

use crate::config::PROGRAM_VIRT_ADDR;

const ENTRIES: usize = 1024;
const PAGE_4K: u32 = 4 * 1024;
const PAGE_4M: u32 = 4 * 1024 * 1024;

const ELF_DIR: usize = PROGRAM_VIRT_ADDR / (4 * 1024 * 1024);
const VID_DIR: usize = crate::config::VIDEO_VIRT_ADDR / (4 * 1024 * 1024);

pub const VGA_BUFFER_PHYS: u32 = 0xB8000;

bitflags! {
    /// Low 12 bits shared by page directory and page table entries; the
    /// upper bits of an entry are always the 4 KiB- or 4 MiB-aligned
    /// physical address being mapped.
    #[derive(Clone, Copy)]
    struct EntryFlags: u32 {
        const PRESENT = 1 << 0;
        const RW      = 1 << 1;
        const USER    = 1 << 2;
        /// Page size: set on a PDE to make it a 4 MiB extended page
        /// instead of pointing at a 4 KiB page table.
        const PS      = 1 << 7;
    }
}

fn entry(phys: u32, flags: EntryFlags) -> u32 {
    phys | flags.bits()
}

#[repr(align(4096))]
struct PageDirectory([u32; ENTRIES]);

#[repr(align(4096))]
struct PageTable([u32; ENTRIES]);

struct Tables {
    directory: PageDirectory,
    low_table: PageTable,
    video_table: PageTable,
}

static TABLES: Mutex<Tables> = Mutex::new(Tables {
    directory: PageDirectory([0; ENTRIES]),
    low_table: PageTable([0; ENTRIES]),
    video_table: PageTable([0; ENTRIES]),
});

/// Builds the directory and loads `cr3`/`cr4`/`cr0`. Call once at boot,
/// before any user process is executed.
///
/// # Safety
/// Must run exactly once and before the heap or any process uses memory
/// above 4 MiB.
pub unsafe fn init() {
    let mut tables = TABLES.lock();

    // Identity-map the first 4 MiB page by page: the kernel image itself
    // (loaded at 1 MiB by the multiboot trampoline) and the VGA buffer
    // both live in this range and must stay mapped across the CR0.PG
    // flip below. Page 0 is left not-present so a null dereference
    // faults instead of silently reading/writing low memory.
    let rw = EntryFlags::PRESENT | EntryFlags::RW;
    for page in 1..ENTRIES {
        let phys = (page as u32) * PAGE_4K;
        tables.low_table.0[page] = entry(phys, rw);
    }
    tables.low_table.0[(VGA_BUFFER_PHYS / PAGE_4K) as usize] = entry(VGA_BUFFER_PHYS, rw);

    let low_table_addr = &tables.low_table as *const PageTable as u32;
    tables.directory.0[0] = entry(low_table_addr, rw);

    tables.directory.0[1] = entry(PAGE_4M, rw | EntryFlags::PS);
    tables.directory.0[2] = entry(2 * PAGE_4M, rw | EntryFlags::USER | EntryFlags::PS);

    let video_table_addr = &tables.video_table as *const PageTable as u32;
    tables.directory.0[VID_DIR] = entry(video_table_addr, rw | EntryFlags::USER);

    let dir_addr = &tables.directory as *const PageDirectory as u32;
    drop(tables);

    // SAFETY: dir_addr points at a 4 KiB-aligned, fully populated
    // directory; enabling PSE/paging is standard per the Intel SDM
    // sequence (CR3 first, then CR4.PSE, then CR0.PG).
    unsafe {
        asm!("mov cr3, {0}", in(reg) dir_addr, options(nostack, preserves_flags));
        let mut cr4: u32;
        asm!("mov {0}, cr4", out(reg) cr4, options(nostack, preserves_flags));
        cr4 |= 1 << 4; // PSE
        asm!("mov cr4, {0}", in(reg) cr4, options(nostack, preserves_flags));
        let mut cr0: u32;
        asm!("mov {0}, cr0", out(reg) cr0, options(nostack, preserves_flags));
        cr0 |= 1 << 31; // PG
        asm!("mov cr0, {0}", in(reg) cr0, options(nostack, preserves_flags));
    }
}

/// Remaps the 128 MiB ELF window to `phys_base`, a 4 MiB-aligned process
/// slab, and flushes the TLB. Called by `execute`/`halt` on every
/// process switch.
pub fn switch_task(phys_base: u32) {
    debug_assert_eq!(phys_base % PAGE_4M, 0);
    let mut tables = TABLES.lock();
    let flags = EntryFlags::PRESENT | EntryFlags::RW | EntryFlags::USER | EntryFlags::PS;
    tables.directory.0[ELF_DIR] = entry(phys_base, flags);
    drop(tables);
    flush_tlb();
}

/// Remaps the single 4 KiB page backing the 132 MiB video window to
/// `phys_page` (either the live VGA buffer, for the foreground terminal,
/// or a background terminal's off-screen buffer) and flushes the TLB.
pub fn map_video(phys_page: u32) {
    debug_assert_eq!(phys_page % PAGE_4K, 0);
    let mut tables = TABLES.lock();
    let flags = EntryFlags::PRESENT | EntryFlags::RW | EntryFlags::USER;
    tables.video_table.0[0] = entry(phys_page, flags);
    drop(tables);
    flush_tlb();
}

fn flush_tlb() {
    // SAFETY: reloading cr3 with its own value is always valid and is the
    // standard way to flush the TLB without an `invlpg` per entry.
    unsafe {
        let mut cr3: u32;
        asm!("mov {0}, cr3", out(reg) cr3, options(nostack, preserves_flags));
        asm!("mov cr3, {0}", in(reg) cr3, options(nostack, preserves_flags));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn dir_indices_are_in_range() {
        assert!(ELF_DIR < ENTRIES);
        assert!(VID_DIR < ENTRIES);
        assert_ne!(ELF_DIR, VID_DIR);
    }
}
