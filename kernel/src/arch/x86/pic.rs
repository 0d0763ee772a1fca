//! 8259 PIC driver.
//!
//! Remaps the master/slave cascade so IRQ 0-15 land on vectors 32-47,
//! leaving 0-31 free for CPU exceptions. Built on the `pic8259` crate
//! rather than hand-rolled ICW sequencing, since the crate is pure
//! port-I/O and unaffected by 32-bit vs. 64-bit mode.

use pic8259::ChainedPics;
use spin::Mutex;

pub const PIC1_OFFSET: u8 = 32;
pub const PIC2_OFFSET: u8 = 40;

pub static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC1_OFFSET, PIC2_OFFSET) });

/// # Safety
/// Must run once, after the IDT's IRQ gates are installed and before
/// `sti`.
pub unsafe fn init() {
    // SAFETY: offsets don't collide with exception vectors 0-19.
    unsafe { PICS.lock().initialize() };
}

/// Masks every line, then unmasks only the ones the kernel actually
/// services: timer (IRQ0), keyboard (IRQ1), and the master's cascade
/// input (IRQ2, required whenever any slave line is used) on the
/// master PIC; RTC (IRQ8, the slave's line 0) on the slave.
pub fn unmask_used_lines() {
    const MASTER_MASK: u8 = !0b0000_0111;
    const SLAVE_MASK: u8 = !0b0000_0001;
    // SAFETY: PICS is initialized before this runs.
    unsafe {
        PICS.lock().write_masks(MASTER_MASK, SLAVE_MASK);
    }
}

/// # Safety
/// `irq` must be the line whose handler just ran; called once per
/// dispatched interrupt from `irq_dispatch`.
pub unsafe fn send_eoi(irq: u8) {
    // SAFETY: caller guarantees `irq` is the line currently being serviced.
    unsafe { PICS.lock().notify_end_of_interrupt(PIC1_OFFSET + irq) };
}
