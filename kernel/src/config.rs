//! Kernel-wide tunable constants.
//!
//! Values that the rest of the kernel would otherwise thread through
//! function signatures live here instead, following the same
//! "constants module" shape as the rest of the tree.

/// Number of virtual terminals.
pub const NUM_TERMINALS: usize = 3;

/// Highest valid process slot. PID 0 is reserved; PIDs 1..=MAX_PROCESSES
/// are assignable.
pub const MAX_PROCESSES: usize = 7;

/// File descriptors per process (0 and 1 are stdin/stdout).
pub const FDS_PER_PROCESS: usize = 8;

/// Size in bytes of a process's kernel-stack-and-PCB slab.
pub const PCB_SLAB_SIZE: usize = 8 * 1024;

/// Base physical address of the first process slab (8 MiB - 8 KiB).
pub const PROCESS_SLAB_BASE: usize = 0x0080_0000 - PCB_SLAB_SIZE;

/// PIT input clock frequency in Hz.
pub const PIT_INPUT_FREQUENCY: u32 = 1_193_182;

/// Target scheduler tick rate in Hz (~60 Hz, matches PIT mode 3 default).
pub const SCHEDULER_HZ: u32 = 60;

/// RTC's fixed hardware oscillator rate.
pub const RTC_BASE_HZ: u32 = 32_768;

/// Maximum per-process virtual RTC rate a process may request.
pub const RTC_MAX_VIRTUAL_HZ: u32 = 1024;

/// Fixed global display-refresh tick rate, independent of any process's
/// requested virtual rate.
pub const RTC_DISPLAY_HZ: u32 = 64;

/// Video memory window each process is mapped into via `vidmap`.
pub const VIDEO_VIRT_ADDR: usize = 132 * 1024 * 1024;

/// ELF image window every user process is mapped into.
pub const PROGRAM_VIRT_ADDR: usize = 128 * 1024 * 1024;

/// Offset within the program window where the loader places the image.
pub const PROGRAM_IMAGE_OFFSET: usize = 0x0004_8000;

/// Kernel heap bounds (physical, identity-mapped).
pub const HEAP_START: usize = 0x0080_0000;
pub const HEAP_SIZE: usize = 4 * 1024 * 1024;

/// Text-mode screen geometry.
pub const SCREEN_COLS: usize = 80;
pub const SCREEN_ROWS: usize = 25;

/// Scrollback depth per terminal, in screens (matches the original's
/// six-screen history).
pub const SCROLLBACK_SCREENS: usize = 6;
pub const SCROLLBACK_MAX: usize = SCROLLBACK_SCREENS * SCREEN_ROWS - 1;
