//! Syscall ABI: ten calls reached through interrupt vector 0x80, with
//! `eax` the call number and `ebx`/`ecx`/`edx` the first three arguments
//! (cdecl-like, matching `original_source/syscall.c`'s register
//! convention rather than a stack-passed argument list).

use crate::arch::x86::interrupts::TrapFrame;
use crate::config::{PROGRAM_IMAGE_OFFSET, PROGRAM_VIRT_ADDR};
use crate::error::KernelError;
use crate::{fs, process, sched};

const SYS_HALT: u32 = 1;
const SYS_EXECUTE: u32 = 2;
const SYS_READ: u32 = 3;
const SYS_WRITE: u32 = 4;
const SYS_OPEN: u32 = 5;
const SYS_CLOSE: u32 = 6;
const SYS_GETARGS: u32 = 7;
const SYS_VIDMAP: u32 = 8;
const SYS_SET_HANDLER: u32 = 9;
const SYS_SIGRETURN: u32 = 10;

/// Entry point called from `arch::x86::interrupts::syscall_dispatch`.
/// Reads the call number and arguments out of `frame`, and for `halt`/
/// `execute`, may transfer control to a different process entirely
/// instead of returning.
pub fn dispatch(frame: &mut TrapFrame) -> i32 {
    let number = frame.eax;
    let arg1 = frame.ebx;
    let arg2 = frame.ecx;
    let arg3 = frame.edx;

    match number {
        SYS_HALT => sys_halt(frame, arg1 as u8),
        SYS_EXECUTE => sys_execute(frame, arg1),
        SYS_READ => sys_read(arg1 as u8, arg2, arg3),
        SYS_WRITE => sys_write(arg1 as u8, arg2, arg3),
        SYS_OPEN => sys_open(arg1),
        SYS_CLOSE => sys_close(arg1 as u8),
        SYS_GETARGS => sys_getargs(arg1, arg2),
        SYS_VIDMAP => sys_vidmap(arg1),
        SYS_SET_HANDLER => KernelError::InvalidArgument.as_syscall_return(),
        SYS_SIGRETURN => KernelError::InvalidArgument.as_syscall_return(),
        _ => KernelError::InvalidArgument.as_syscall_return(),
    }
}

/// Reads a NUL-or-newline-terminated string the user passed by virtual
/// address, bounded to `max_len`. The address is trusted to lie within
/// the caller's mapped program/stack window; a hostile pointer is out of
/// scope for this teaching kernel's user-memory validation (see
/// `SPEC_FULL.md`'s non-goals).
unsafe fn read_user_str(ptr: u32, max_len: usize) -> &'static str {
    // SAFETY: caller contract above.
    let slice = unsafe { core::slice::from_raw_parts(ptr as *const u8, max_len) };
    let len = slice.iter().position(|&b| b == 0 || b == b'\n').unwrap_or(max_len);
    core::str::from_utf8(&slice[..len]).unwrap_or("")
}

unsafe fn user_buf_mut(ptr: u32, len: usize) -> &'static mut [u8] {
    // SAFETY: caller contract, see `read_user_str`.
    unsafe { core::slice::from_raw_parts_mut(ptr as *mut u8, len) }
}

unsafe fn user_buf(ptr: u32, len: usize) -> &'static [u8] {
    // SAFETY: caller contract, see `read_user_str`.
    unsafe { core::slice::from_raw_parts(ptr as *const u8, len) }
}

fn sys_halt(frame: &mut TrapFrame, status: u8) -> i32 {
    let pid = match process::current_pid() {
        Some(pid) => pid,
        None => return KernelError::InvalidArgument.as_syscall_return(),
    };
    let _ = frame;
    sched::halt_and_resume(pid, status as u32)
}

fn sys_execute(frame: &mut TrapFrame, command_ptr: u32) -> i32 {
    // SAFETY: command_ptr is a user-supplied string pointer; see
    // `read_user_str`'s contract.
    let command = unsafe { read_user_str(command_ptr, 128) };
    let mut parts = command.splitn(2, ' ');
    let filename = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return KernelError::InvalidArgument.as_syscall_return(),
    };
    let args = parts.next().unwrap_or("");

    let inode = match fs::inode_for_executable(filename) {
        Ok(inode) => inode,
        Err(e) => return e.as_syscall_return(),
    };

    let mut entry_bytes = [0u8; 4];
    if fs::read_data(inode, 24, &mut entry_bytes).unwrap_or(0) != 4 {
        return KernelError::NotExecutable.as_syscall_return();
    }
    let entry = u32::from_le_bytes(entry_bytes);

    let parent = process::current_pid();
    let terminal = parent
        .map(|p| process::get(p).terminal)
        .unwrap_or(crate::drivers::terminal::active_terminal() as u8);

    let child = match process::create(parent, terminal) {
        Ok(pid) => pid,
        Err(e) => return e.as_syscall_return(),
    };

    let child_pcb = process::get(child);
    child_pcb.args_len = args.len().min(crate::process::pcb::ARGS_MAX);
    child_pcb.args[..child_pcb.args_len].copy_from_slice(&args.as_bytes()[..child_pcb.args_len]);

    let image_phys = child_pcb.program_phys_base + PROGRAM_IMAGE_OFFSET as u32;
    // Temporarily borrow the 128 MiB ELF window to copy the image in,
    // since the child isn't running yet and has no mapping of its own.
    crate::mm::paging::switch_task(child_pcb.program_phys_base);
    let image_virt = (PROGRAM_VIRT_ADDR + PROGRAM_IMAGE_OFFSET) as *mut u8;
    let mut offset = 0u32;
    loop {
        let mut chunk = [0u8; 512];
        let n = fs::read_data(inode, offset, &mut chunk).unwrap_or(0);
        if n == 0 {
            break;
        }
        // SAFETY: image_virt is the 128 MiB window, just mapped above to
        // the child's own physical slab.
        unsafe {
            core::ptr::copy_nonoverlapping(chunk.as_ptr(), image_virt.add(offset as usize), n);
        }
        offset += n as u32;
    }
    let _ = image_phys;

    let user_esp = (PROGRAM_VIRT_ADDR + 4 * 1024 * 1024 - 4) as u32;
    sched::prime_initial_frame(child, entry, user_esp);

    if let Some(parent_pid) = parent {
        // SAFETY: frame is the live trap frame for this syscall.
        unsafe { sched::transfer_to_child(frame, parent_pid, child) }
    } else {
        sched::set_current(child);
        // SAFETY: child was just primed above.
        unsafe { sched::transfer_to_child(frame, child, child) }
    }
}

fn sys_read(fd: u8, buf_ptr: u32, len: u32) -> i32 {
    let pid = match process::current_pid() {
        Some(pid) => pid,
        None => return KernelError::InvalidArgument.as_syscall_return(),
    };
    // SAFETY: buf_ptr/len describe a user buffer; see module contract.
    let buf = unsafe { user_buf_mut(buf_ptr, len as usize) };
    let pcb = process::get(pid);
    let terminal = pcb.terminal;
    match pcb.fds.read(terminal, fd, buf) {
        Ok(n) => n as i32,
        Err(e) => e.as_syscall_return(),
    }
}

fn sys_write(fd: u8, buf_ptr: u32, len: u32) -> i32 {
    let pid = match process::current_pid() {
        Some(pid) => pid,
        None => return KernelError::InvalidArgument.as_syscall_return(),
    };
    // SAFETY: buf_ptr/len describe a user buffer; see module contract.
    let buf = unsafe { user_buf(buf_ptr, len as usize) };
    let pcb = process::get(pid);
    let terminal = pcb.terminal;
    match pcb.fds.write(terminal, fd, buf) {
        Ok(n) => n as i32,
        Err(e) => e.as_syscall_return(),
    }
}

fn sys_open(name_ptr: u32) -> i32 {
    let pid = match process::current_pid() {
        Some(pid) => pid,
        None => return KernelError::InvalidArgument.as_syscall_return(),
    };
    // SAFETY: name_ptr is a user-supplied string pointer.
    let name = unsafe { read_user_str(name_ptr, 32) };
    match process::get(pid).fds.open(name) {
        Ok(fd) => fd as i32,
        Err(e) => e.as_syscall_return(),
    }
}

fn sys_close(fd: u8) -> i32 {
    let pid = match process::current_pid() {
        Some(pid) => pid,
        None => return KernelError::InvalidArgument.as_syscall_return(),
    };
    match process::get(pid).fds.close(fd) {
        Ok(()) => 0,
        Err(e) => e.as_syscall_return(),
    }
}

fn sys_getargs(buf_ptr: u32, len: u32) -> i32 {
    let pid = match process::current_pid() {
        Some(pid) => pid,
        None => return KernelError::InvalidArgument.as_syscall_return(),
    };
    let pcb = process::get(pid);
    if pcb.args_len == 0 || pcb.args_len + 1 > len as usize {
        return KernelError::InvalidArgument.as_syscall_return();
    }
    // SAFETY: buf_ptr/len describe a user buffer.
    let buf = unsafe { user_buf_mut(buf_ptr, len as usize) };
    buf[..pcb.args_len].copy_from_slice(&pcb.args[..pcb.args_len]);
    buf[pcb.args_len] = 0;
    0
}

fn sys_vidmap(screen_start_ptr: u32) -> i32 {
    let pid = match process::current_pid() {
        Some(pid) => pid,
        None => return KernelError::InvalidArgument.as_syscall_return(),
    };
    let terminal = process::get(pid).terminal;
    let is_foreground = terminal as usize == crate::drivers::terminal::active_terminal();
    let phys = if is_foreground {
        crate::mm::paging::VGA_BUFFER_PHYS
    } else {
        // A background terminal's backing buffer isn't a single physical
        // page the vidmap window can point at directly in this design;
        // only the foreground terminal may vidmap, matching the original's
        // restriction.
        return KernelError::InvalidArgument.as_syscall_return();
    };
    crate::mm::paging::map_video(phys);
    // SAFETY: screen_start_ptr is a user-supplied out-pointer for a
    // single u32.
    let out = unsafe { &mut *(screen_start_ptr as *mut u32) };
    *out = crate::config::VIDEO_VIRT_ADDR as u32;
    0
}

/// Creates and immediately dispatches a shell process onto `terminal`,
/// without transferring from any particular parent. Used at boot for
/// each terminal's first shell and by [`sched::halt_and_resume`] when a
/// root shell exits.
pub fn spawn_shell(terminal: u8) -> Result<u8, KernelError> {
    let inode = fs::inode_for_executable("shell")?;
    let mut entry_bytes = [0u8; 4];
    fs::read_data(inode, 24, &mut entry_bytes)?;
    let entry = u32::from_le_bytes(entry_bytes);

    let pid = process::create(None, terminal)?;
    let pcb = process::get(pid);
    crate::mm::paging::switch_task(pcb.program_phys_base);
    let image_virt = (PROGRAM_VIRT_ADDR + PROGRAM_IMAGE_OFFSET) as *mut u8;
    let mut offset = 0u32;
    loop {
        let mut chunk = [0u8; 512];
        let n = fs::read_data(inode, offset, &mut chunk)?;
        if n == 0 {
            break;
        }
        // SAFETY: image_virt was just mapped to pcb's own physical slab.
        unsafe {
            core::ptr::copy_nonoverlapping(chunk.as_ptr(), image_virt.add(offset as usize), n);
        }
        offset += n as u32;
    }
    let user_esp = (PROGRAM_VIRT_ADDR + 4 * 1024 * 1024 - 4) as u32;
    sched::prime_initial_frame(pid, entry, user_esp);
    crate::drivers::terminal::mark_spawned_shell(terminal as usize);
    Ok(pid)
}
