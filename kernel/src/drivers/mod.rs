//! Device drivers: keyboard, terminal, PIT, RTC.

pub mod keyboard;
pub mod pit;
pub mod rtc;
pub mod terminal;

/// # Safety
/// Must run after `arch::init` (the PIC/IDT must be ready for IRQ0/1/8).
pub unsafe fn init() {
    // SAFETY: called once at boot, after the PIC and IDT are live.
    unsafe {
        pit::init();
        rtc::init();
    }
    terminal::switch_to(0);
    crate::logging::mark_terminal_ready();
}
