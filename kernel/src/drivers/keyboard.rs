//! PS/2 keyboard driver: scan code set 1 decoding via four literal
//! translation tables, selected by shift/capslock state, plus the
//! modifier and line-editing state machine.
//!
//! The four tables are copied byte-for-byte from
//! `original_source/keyboard.c`'s `scancode_arr` rows (including Tab
//! producing no character, index 0x0F) rather than pulled from a
//! general scancode-layout crate, since the spec calls for exactly this
//! fixed US-layout behavior, index-selected by `(shift, caps)`.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::arch::x86::port::PortByte;
use crate::drivers::terminal;

const DATA_PORT: PortByte = PortByte::new(0x60);

const BACKSPACE: u8 = 0x0E;
const ENTER: u8 = 0x1C;
const LSHIFT: u8 = 0x2A;
const RSHIFT: u8 = 0x36;
const LSHIFT_BREAK: u8 = LSHIFT | 0x80;
const RSHIFT_BREAK: u8 = RSHIFT | 0x80;
const CTRL: u8 = 0x1D;
const CTRL_BREAK: u8 = CTRL | 0x80;
const ALT: u8 = 0x38;
const ALT_BREAK: u8 = ALT | 0x80;
const CAPSLOCK: u8 = 0x3A;
const F1: u8 = 0x3B;
const F2: u8 = 0x3C;
const F3: u8 = 0x3D;
const EXTENDED_PREFIX: u8 = 0xE0;
const ARROW_LEFT: u8 = 0x4B;
const ARROW_RIGHT: u8 = 0x4D;
const DELETE: u8 = 0x53;

static SHIFT: AtomicBool = AtomicBool::new(false);
static CTRL_HELD: AtomicBool = AtomicBool::new(false);
static ALT_HELD: AtomicBool = AtomicBool::new(false);
static CAPSLOCK_ON: AtomicBool = AtomicBool::new(false);
static EXTENDED: AtomicBool = AtomicBool::new(false);

/// Normal (no modifiers).
#[rustfmt::skip]
const TABLE_NORMAL: [u8; 0x3A] = [
    0,   0,   b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', b'-', b'=', 0,   0,
    b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'[', b']', b'\n', 0, b'a', b's',
    b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';', b'\'', b'`', 0,  b'\\', b'z', b'x', b'c', b'v',
    b'b', b'n', b'm', b',', b'.', b'/', 0,   b'*', 0,    b' ',
];

/// Shift held.
#[rustfmt::skip]
const TABLE_SHIFT: [u8; 0x3A] = [
    0,   0,   b'!', b'@', b'#', b'$', b'%', b'^', b'&', b'*', b'(', b')', b'_', b'+', 0,   0,
    b'Q', b'W', b'E', b'R', b'T', b'Y', b'U', b'I', b'O', b'P', b'{', b'}', b'\n', 0, b'A', b'S',
    b'D', b'F', b'G', b'H', b'J', b'K', b'L', b':', b'"', b'~', 0,  b'|', b'Z', b'X', b'C', b'V',
    b'B', b'N', b'M', b'<', b'>', b'?', 0,   b'*', 0,    b' ',
];

/// Caps lock on, no shift: letters upper, punctuation unshifted.
#[rustfmt::skip]
const TABLE_CAPSLOCK: [u8; 0x3A] = [
    0,   0,   b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', b'-', b'=', 0,   0,
    b'Q', b'W', b'E', b'R', b'T', b'Y', b'U', b'I', b'O', b'P', b'[', b']', b'\n', 0, b'A', b'S',
    b'D', b'F', b'G', b'H', b'J', b'K', b'L', b';', b'\'', b'`', 0,  b'\\', b'Z', b'X', b'C', b'V',
    b'B', b'N', b'M', b',', b'.', b'/', 0,   b'*', 0,    b' ',
];

/// Caps lock on and shift held: letters lower, punctuation shifted.
#[rustfmt::skip]
const TABLE_SHIFT_CAPSLOCK: [u8; 0x3A] = [
    0,   0,   b'!', b'@', b'#', b'$', b'%', b'^', b'&', b'*', b'(', b')', b'_', b'+', 0,   0,
    b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'{', b'}', b'\n', 0, b'a', b's',
    b'd', b'f', b'g', b'h', b'j', b'k', b'l', b':', b'"', b'~', 0,  b'|', b'z', b'x', b'c', b'v',
    b'b', b'n', b'm', b'<', b'>', b'?', 0,   b'*', 0,    b' ',
];

fn translate(scancode: u8) -> u8 {
    let shift = SHIFT.load(Ordering::Relaxed);
    let caps = CAPSLOCK_ON.load(Ordering::Relaxed);
    let table: &[u8; 0x3A] = match (shift, caps) {
        (false, false) => &TABLE_NORMAL,
        (true, false) => &TABLE_SHIFT,
        (false, true) => &TABLE_CAPSLOCK,
        (true, true) => &TABLE_SHIFT_CAPSLOCK,
    };
    table.get(scancode as usize).copied().unwrap_or(0)
}

/// Switches to `terminal`, spawning its shell the first time it's ever
/// visited.
fn switch_terminal(terminal: usize) {
    terminal::switch_to(terminal);
    if !terminal::has_spawned_shell(terminal) {
        let _ = crate::syscall::spawn_shell(terminal as u8);
    }
}

/// Called from the IRQ1 dispatch path once per scancode byte.
pub fn on_scancode() {
    let scancode = {
        // SAFETY: IRQ1 fired, so the controller has a byte ready.
        unsafe { DATA_PORT.read() }
    };

    if scancode == EXTENDED_PREFIX {
        EXTENDED.store(true, Ordering::Relaxed);
        return;
    }
    let extended = EXTENDED.swap(false, Ordering::Relaxed);

    match scancode {
        LSHIFT | RSHIFT => SHIFT.store(true, Ordering::Relaxed),
        LSHIFT_BREAK | RSHIFT_BREAK => SHIFT.store(false, Ordering::Relaxed),
        CTRL => CTRL_HELD.store(true, Ordering::Relaxed),
        CTRL_BREAK => CTRL_HELD.store(false, Ordering::Relaxed),
        ALT => ALT_HELD.store(true, Ordering::Relaxed),
        ALT_BREAK => ALT_HELD.store(false, Ordering::Relaxed),
        CAPSLOCK => {
            let _ = CAPSLOCK_ON.fetch_xor(true, Ordering::Relaxed);
        }
        F1 if ALT_HELD.load(Ordering::Relaxed) => switch_terminal(0),
        F2 if ALT_HELD.load(Ordering::Relaxed) => switch_terminal(1),
        F3 if ALT_HELD.load(Ordering::Relaxed) => switch_terminal(2),
        _ if scancode & 0x80 != 0 => {} // other key releases: ignored
        BACKSPACE => terminal::line_backspace(terminal::active_terminal()),
        ENTER => terminal::line_finish(terminal::active_terminal()),
        DELETE if extended => terminal::line_delete(terminal::active_terminal()),
        ARROW_LEFT if extended => terminal::line_move_cursor(terminal::active_terminal(), -1),
        ARROW_RIGHT if extended => terminal::line_move_cursor(terminal::active_terminal(), 1),
        _ if CTRL_HELD.load(Ordering::Relaxed) => {
            let ch = translate(scancode);
            if ch == b'l' || ch == b'L' {
                terminal::clear_active();
            }
        }
        _ => {
            let ch = translate(scancode);
            if ch != 0 {
                terminal::line_insert(terminal::active_terminal(), ch);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn shift_and_capslock_select_distinct_tables() {
        // 'a' is scancode 0x1E.
        assert_eq!(TABLE_NORMAL[0x1E], b'a');
        assert_eq!(TABLE_SHIFT[0x1E], b'A');
        assert_eq!(TABLE_CAPSLOCK[0x1E], b'A');
        assert_eq!(TABLE_SHIFT_CAPSLOCK[0x1E], b'a');
    }
}
