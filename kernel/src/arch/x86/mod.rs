//! i686 protected-mode architecture layer: GDT/TSS, IDT, PIC, port I/O.

pub mod boot;
pub mod gdt;
pub mod idt;
pub mod interrupts;
pub mod pic;
pub mod port;

pub use interrupts::TrapFrame;

/// Brings up the CPU-facing side of the kernel: descriptor tables, the
/// PIC remap, and finally `sti`. Must run before `mm::init`, since paging
/// setup wants exceptions (page fault) wired first.
///
/// # Safety
/// Must be called exactly once, very early in boot.
pub unsafe fn init() {
    // SAFETY: single-threaded boot sequence, standard GDT/IDT/PIC order.
    unsafe {
        gdt::init();
        idt::init();
        pic::init();
        pic::unmask_used_lines();
        enable_interrupts();
    }
}

/// # Safety
/// IDT and PIC must already be initialized.
pub unsafe fn enable_interrupts() {
    // SAFETY: caller guarantees the IDT/PIC are ready.
    unsafe { core::arch::asm!("sti", options(nomem, nostack)) };
}

pub fn disable_interrupts() {
    // SAFETY: `cli` has no preconditions.
    unsafe { core::arch::asm!("cli", options(nomem, nostack)) };
}

/// Halts the CPU until the next interrupt. Used by the idle process.
pub fn halt() {
    // SAFETY: `hlt` has no preconditions beyond interrupts being enabled
    // for it to ever return.
    unsafe { core::arch::asm!("hlt", options(nomem, nostack)) };
}
