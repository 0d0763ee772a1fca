//! Virtual terminal service: three independent text-mode screens with
//! scrollback, and the line buffer the keyboard driver edits into.
//!
//! Only one terminal is ever mapped onto the real VGA buffer at a time
//! (the "foreground" terminal, selected by Alt+F1/F2/F3); the other two
//! keep their contents in an off-screen buffer that becomes visible the
//! moment they're switched to, via `paging::map_video`.

use spin::Mutex;

use crate::config::{NUM_TERMINALS, SCREEN_COLS, SCREEN_ROWS, SCROLLBACK_MAX};
use crate::mm::paging::{self, VGA_BUFFER_PHYS};

const CELL_BLANK: u16 = 0x0720; // light grey on black, space
const CELLS_PER_SCREEN: usize = SCREEN_COLS * SCREEN_ROWS;

/// Off-screen backing buffer for a terminal that isn't currently
/// mapped onto the real VGA memory.
#[repr(align(4096))]
struct Backing([u16; CELLS_PER_SCREEN]);

static BACKING: [Mutex<Backing>; NUM_TERMINALS] = [
    Mutex::new(Backing([CELL_BLANK; CELLS_PER_SCREEN])),
    Mutex::new(Backing([CELL_BLANK; CELLS_PER_SCREEN])),
    Mutex::new(Backing([CELL_BLANK; CELLS_PER_SCREEN])),
];

struct TerminalState {
    cursor_row: usize,
    cursor_col: usize,
    /// Rows scrolled back from the bottom, clamped to
    /// `[0, SCROLLBACK_MAX]`.
    scroll_offset: usize,
    line_buf: [u8; SCREEN_COLS],
    line_len: usize,
    line_cursor: usize,
    line_ready: bool,
    spawned_shell: bool,
}

impl TerminalState {
    const fn new() -> Self {
        Self {
            cursor_row: 0,
            cursor_col: 0,
            scroll_offset: 0,
            line_buf: [0; SCREEN_COLS],
            line_len: 0,
            line_cursor: 0,
            line_ready: false,
            spawned_shell: false,
        }
    }
}

static TERMINALS: Mutex<[TerminalState; NUM_TERMINALS]> = Mutex::new([
    TerminalState::new(),
    TerminalState::new(),
    TerminalState::new(),
]);

static ACTIVE: Mutex<usize> = Mutex::new(0);

fn vga() -> *mut u16 {
    VGA_BUFFER_PHYS as *mut u16
}

fn cell_ptr(terminal: usize, index: usize) -> *mut u16 {
    if terminal == *ACTIVE.lock() {
        // SAFETY: index bounded by CELLS_PER_SCREEN by every caller.
        unsafe { vga().add(index) }
    } else {
        BACKING[terminal].lock().0.as_mut_ptr().wrapping_add(index)
    }
}

fn write_cell(terminal: usize, index: usize, cell: u16) {
    let ptr = cell_ptr(terminal, index);
    // SAFETY: ptr is either live VGA memory or a backing buffer, both
    // CELLS_PER_SCREEN cells long, and index has been bounds-checked.
    unsafe { ptr.write_volatile(cell) };
}

fn scroll_up_contents(terminal: usize) {
    for row in 1..SCREEN_ROWS {
        for col in 0..SCREEN_COLS {
            let src = row * SCREEN_COLS + col;
            let dst = (row - 1) * SCREEN_COLS + col;
            let cell = cell_ptr(terminal, src);
            // SAFETY: both src and dst are valid in-bounds cell indices.
            let value = unsafe { cell.read_volatile() };
            write_cell(terminal, dst, value);
        }
    }
    for col in 0..SCREEN_COLS {
        write_cell(terminal, (SCREEN_ROWS - 1) * SCREEN_COLS + col, CELL_BLANK);
    }
}

/// Writes one character to `terminal`'s current cursor position,
/// handling newline, backspace, and bottom-of-screen scroll.
pub fn putc(terminal: usize, c: u8) {
    let mut terms = TERMINALS.lock();
    let state = &mut terms[terminal];
    match c {
        b'\n' => {
            state.cursor_col = 0;
            state.cursor_row += 1;
        }
        0x08 => {
            if state.cursor_col > 0 {
                state.cursor_col -= 1;
            } else if state.cursor_row > 0 {
                state.cursor_row -= 1;
                state.cursor_col = SCREEN_COLS - 1;
            }
            let index = state.cursor_row * SCREEN_COLS + state.cursor_col;
            write_cell(terminal, index, CELL_BLANK);
        }
        _ => {
            let index = state.cursor_row * SCREEN_COLS + state.cursor_col;
            write_cell(terminal, index, 0x0700 | c as u16);
            state.cursor_col += 1;
            if state.cursor_col == SCREEN_COLS {
                state.cursor_col = 0;
                state.cursor_row += 1;
            }
        }
    }
    if state.cursor_row == SCREEN_ROWS {
        state.cursor_row = SCREEN_ROWS - 1;
        drop(terms);
        scroll_up_contents(terminal);
    }
}

/// Writes `buf` to `terminal`, not necessarily the one currently mapped
/// onto the screen: a background process's output still lands in its
/// own terminal's backing buffer, it just isn't visible until that
/// terminal becomes foreground.
pub fn write_bytes(terminal: usize, buf: &[u8]) {
    for &b in buf {
        putc(terminal, b);
    }
}

/// Clears the active terminal's screen, matching Ctrl-L.
pub fn clear_active() {
    let terminal = *ACTIVE.lock();
    for i in 0..CELLS_PER_SCREEN {
        write_cell(terminal, i, CELL_BLANK);
    }
    let mut terms = TERMINALS.lock();
    terms[terminal].cursor_row = 0;
    terms[terminal].cursor_col = 0;
}

/// Adjusts scrollback offset by `delta` rows, clamped to
/// `[0, SCROLLBACK_MAX]`, matching the original's `scroll_up`/`scroll_down`.
pub fn scroll(terminal: usize, delta: i32) {
    let mut terms = TERMINALS.lock();
    let state = &mut terms[terminal];
    let new_offset = state.scroll_offset as i32 + delta;
    state.scroll_offset = new_offset.clamp(0, SCROLLBACK_MAX as i32) as usize;
}

/// Switches which terminal is mapped onto the live VGA buffer, copying
/// the outgoing terminal's visible contents into its backing buffer and
/// the incoming terminal's backing contents onto the screen.
pub fn switch_to(terminal: usize) {
    let mut active = ACTIVE.lock();
    let previous = *active;
    if previous == terminal {
        return;
    }

    for i in 0..CELLS_PER_SCREEN {
        // SAFETY: previous is the live VGA terminal; reading it back out
        // before the switch preserves its contents.
        let cell = unsafe { vga().add(i).read_volatile() };
        BACKING[previous].lock().0[i] = cell;
    }

    *active = terminal;
    drop(active);

    let incoming = BACKING[terminal].lock();
    for i in 0..CELLS_PER_SCREEN {
        // SAFETY: VGA is now logically owned by `terminal`.
        unsafe { vga().add(i).write_volatile(incoming.0[i]) };
    }
    drop(incoming);

    paging::map_video(VGA_BUFFER_PHYS);
}

pub fn active_terminal() -> usize {
    *ACTIVE.lock()
}

pub fn has_spawned_shell(terminal: usize) -> bool {
    TERMINALS.lock()[terminal].spawned_shell
}

pub fn mark_spawned_shell(terminal: usize) {
    TERMINALS.lock()[terminal].spawned_shell = true;
}

// --- line editor, driven by the keyboard driver ---

pub fn line_insert(terminal: usize, c: u8) {
    let mut terms = TERMINALS.lock();
    let state = &mut terms[terminal];
    if state.line_len >= SCREEN_COLS - 1 {
        return;
    }
    for i in (state.line_cursor..state.line_len).rev() {
        state.line_buf[i + 1] = state.line_buf[i];
    }
    state.line_buf[state.line_cursor] = c;
    state.line_len += 1;
    state.line_cursor += 1;
    drop(terms);
    redraw_line(terminal);
}

pub fn line_backspace(terminal: usize) {
    let mut terms = TERMINALS.lock();
    let state = &mut terms[terminal];
    if state.line_cursor == 0 {
        return;
    }
    for i in state.line_cursor..state.line_len {
        state.line_buf[i - 1] = state.line_buf[i];
    }
    state.line_cursor -= 1;
    state.line_len -= 1;
    drop(terms);
    redraw_line(terminal);
}

pub fn line_delete(terminal: usize) {
    let mut terms = TERMINALS.lock();
    let state = &mut terms[terminal];
    if state.line_cursor >= state.line_len {
        return;
    }
    for i in state.line_cursor..state.line_len - 1 {
        state.line_buf[i] = state.line_buf[i + 1];
    }
    state.line_len -= 1;
    drop(terms);
    redraw_line(terminal);
}

pub fn line_move_cursor(terminal: usize, delta: i32) {
    let mut terms = TERMINALS.lock();
    let state = &mut terms[terminal];
    let new_cursor = state.line_cursor as i32 + delta;
    state.line_cursor = new_cursor.clamp(0, state.line_len as i32) as usize;
}

pub fn line_finish(terminal: usize) {
    let mut terms = TERMINALS.lock();
    let state = &mut terms[terminal];
    state.line_buf[state.line_len] = b'\n';
    state.line_len += 1;
    state.line_ready = true;
    state.line_cursor = 0;
    drop(terms);
    putc(terminal, b'\n');
}

/// Redraws the in-progress command line in place: return to column 0 of
/// the current row, rewrite the buffer, then move the cursor back to its
/// logical position. Mirrors `original_source/lib.c`'s `putcmd`/
/// `putcmdend` pair.
fn redraw_line(terminal: usize) {
    let (row, len, cursor) = {
        let terms = TERMINALS.lock();
        (
            terms[terminal].cursor_row,
            terms[terminal].line_len,
            terms[terminal].line_cursor,
        )
    };
    for i in 0..SCREEN_COLS - 1 {
        let byte = {
            let terms = TERMINALS.lock();
            terms[terminal].line_buf.get(i).copied().unwrap_or(b' ')
        };
        let cell = if i < len { 0x0700 | byte as u16 } else { CELL_BLANK };
        write_cell(terminal, row * SCREEN_COLS + i, cell);
    }
    let mut terms = TERMINALS.lock();
    terms[terminal].cursor_col = cursor;
}

/// Blocking-style read of the next completed line from `terminal`
/// (the calling process's own terminal, not necessarily the foreground
/// one), called from stdin's `FdTable::read`. Polls until the keyboard
/// driver finishes a line there.
pub fn read_line(terminal: usize, buf: &mut [u8]) -> usize {
    loop {
        let mut terms = TERMINALS.lock();
        let state = &mut terms[terminal];
        if state.line_ready {
            let n = state.line_len.min(buf.len());
            buf[..n].copy_from_slice(&state.line_buf[..n]);
            state.line_len = 0;
            state.line_ready = false;
            return n;
        }
        drop(terms);
        crate::arch::x86::halt();
    }
}
