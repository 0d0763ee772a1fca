//! Programmable Interval Timer: channel 0, mode 3 (square wave), driving
//! the scheduler's round-robin rotation at roughly 60 Hz.

use crate::arch::x86::interrupts::TrapFrame;
use crate::arch::x86::port::PortByte;
use crate::config::{PIT_INPUT_FREQUENCY, SCHEDULER_HZ};
use crate::sched;

const CHANNEL0: PortByte = PortByte::new(0x40);
const COMMAND: PortByte = PortByte::new(0x43);

const MODE_CHANNEL0_LOBYTE_HIBYTE_SQUAREWAVE: u8 = 0b00_11_011_0;

/// # Safety
/// Must run once, after the PIC/IDT are set up (IRQ0 is on the master).
pub unsafe fn init() {
    let divisor = (PIT_INPUT_FREQUENCY / SCHEDULER_HZ) as u16;
    // SAFETY: standard PIT programming sequence: command byte, then the
    // reload value's low then high byte on the channel's data port.
    unsafe {
        COMMAND.write(MODE_CHANNEL0_LOBYTE_HIBYTE_SQUAREWAVE);
        CHANNEL0.write((divisor & 0xFF) as u8);
        CHANNEL0.write((divisor >> 8) as u8);
    }
}

/// Called from the IRQ0 dispatch path once per tick.
pub fn on_tick(frame: &mut TrapFrame) {
    sched::on_timer_tick(frame);
}
