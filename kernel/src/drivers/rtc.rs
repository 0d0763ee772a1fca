//! Real-Time Clock driver.
//!
//! The hardware oscillator always runs at a fixed 1024 Hz (register A,
//! rate select 6); every process's requested "virtual" RTC rate is
//! derived in software by counting hardware ticks, exactly as
//! `original_source/rtc.c` does, rather than reprogramming the divider
//! per process. A second, independent software counter divides the same
//! 1024 Hz stream down to a fixed 64 Hz display-refresh tick that has
//! nothing to do with any process's requested rate.

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use spin::Mutex;

use crate::arch::x86::port::PortByte;
use crate::config::{MAX_PROCESSES, RTC_BASE_HZ, RTC_DISPLAY_HZ, RTC_MAX_VIRTUAL_HZ};
use crate::error::{KernelError, KernelResult};

const CMOS_ADDRESS: PortByte = PortByte::new(0x70);
const CMOS_DATA: PortByte = PortByte::new(0x71);

const REG_A: u8 = 0x8A;
const REG_B: u8 = 0x8B;
const REG_C: u8 = 0x8C;

/// rate select 6 => 32768 >> (6-1) = 1024 Hz.
const RATE_SELECT_1024HZ: u8 = 0x06;

static DISPLAY_COUNTDOWN: AtomicU32 = AtomicU32::new(RTC_BASE_HZ / RTC_DISPLAY_HZ);
static DISPLAY_TICK_PENDING: AtomicU8 = AtomicU8::new(0);

struct VirtualClock {
    /// Requested rate in Hz, 0 if this slot isn't in use by a process.
    rate_hz: u32,
    countdown: u32,
    ready: bool,
}

impl VirtualClock {
    const fn closed() -> Self {
        Self {
            rate_hz: 0,
            countdown: 0,
            ready: false,
        }
    }
}

static VIRTUAL_CLOCKS: Mutex<[VirtualClock; MAX_PROCESSES]> =
    Mutex::new([const { VirtualClock::closed() }; MAX_PROCESSES]);

fn cmos_read(reg: u8) -> u8 {
    // SAFETY: standard two-port CMOS index/data protocol.
    unsafe {
        CMOS_ADDRESS.write(reg);
        CMOS_DATA.read()
    }
}

fn cmos_write(reg: u8, value: u8) {
    // SAFETY: standard two-port CMOS index/data protocol.
    unsafe {
        CMOS_ADDRESS.write(reg);
        CMOS_DATA.write(value);
    }
}

/// # Safety
/// Must run once, after the PIC/IDT are set up (IRQ8 is on the slave).
pub unsafe fn init() {
    let prev = cmos_read(REG_B);
    cmos_write(REG_B, prev | 0x40); // enable periodic interrupt
    let prev_a = cmos_read(REG_A);
    cmos_write(REG_A, (prev_a & 0xF0) | RATE_SELECT_1024HZ);
    cmos_read(REG_C); // clear any pending interrupt flag
}

/// Called by a process opening the `rtc` device: resets its virtual rate
/// to the slowest setting (2 Hz), matching the original's `rtc_open`.
pub fn open() {
    if let Some(pid) = crate::process::current_pid() {
        let mut clocks = VIRTUAL_CLOCKS.lock();
        let clock = &mut clocks[pid as usize - 1];
        clock.rate_hz = 2;
        clock.countdown = RTC_BASE_HZ / 2;
        clock.ready = false;
    }
}

/// Sets the calling process's virtual RTC rate. Must be a power of two
/// between 2 and [`RTC_MAX_VIRTUAL_HZ`].
pub fn set_rate(hz: u32) -> KernelResult<()> {
    if hz < 2 || hz > RTC_MAX_VIRTUAL_HZ || !hz.is_power_of_two() {
        return Err(KernelError::InvalidArgument);
    }
    let pid = crate::process::current_pid().ok_or(KernelError::InvalidArgument)?;
    let mut clocks = VIRTUAL_CLOCKS.lock();
    let clock = &mut clocks[pid as usize - 1];
    clock.rate_hz = hz;
    clock.countdown = RTC_BASE_HZ / hz;
    Ok(())
}

/// Blocks (by busy-polling the ready flag, matching the original's
/// interrupt-driven spin in `rtc_read`) until the calling process's next
/// virtual tick.
pub fn wait_for_tick() {
    let pid = match crate::process::current_pid() {
        Some(pid) => pid,
        None => return,
    };
    loop {
        let mut clocks = VIRTUAL_CLOCKS.lock();
        let clock = &mut clocks[pid as usize - 1];
        if clock.ready {
            clock.ready = false;
            return;
        }
        drop(clocks);
        crate::arch::x86::halt();
    }
}

/// Called from the IRQ8 dispatch path: acks the hardware, advances every
/// process's virtual countdown, and advances the fixed 64 Hz display tick.
pub fn on_tick() {
    cmos_read(REG_C); // must read C to re-arm the next interrupt

    let mut clocks = VIRTUAL_CLOCKS.lock();
    for clock in clocks.iter_mut() {
        if clock.rate_hz == 0 {
            continue;
        }
        clock.countdown = clock.countdown.saturating_sub(1);
        if clock.countdown == 0 {
            clock.ready = true;
            clock.countdown = RTC_BASE_HZ / clock.rate_hz;
        }
    }
    drop(clocks);

    let remaining = DISPLAY_COUNTDOWN.fetch_sub(1, Ordering::Relaxed);
    if remaining <= 1 {
        DISPLAY_COUNTDOWN.store(RTC_BASE_HZ / RTC_DISPLAY_HZ, Ordering::Relaxed);
        DISPLAY_TICK_PENDING.store(1, Ordering::Relaxed);
    }
}

/// Consumes the pending 64 Hz display-refresh flag, if one is pending.
pub fn take_display_tick() -> bool {
    DISPLAY_TICK_PENDING.swap(0, Ordering::Relaxed) != 0
}
