//! File descriptor table.
//!
//! Each slot carries a tagged-union "vtable" rather than a trait object:
//! the four concrete operation sets (RTC, directory, regular file,
//! stdin/stdout) are fixed at compile time, so a small enum dispatch is
//! both simpler and allocation-free compared to `dyn Trait` in a
//! `no_std` context without a heap-backed vtable pointer per slot.

use crate::drivers::rtc;
use crate::error::{KernelError, KernelResult};
use crate::fs;

/// Which operation set a descriptor dispatches through.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FileKind {
    Rtc,
    Directory,
    Regular,
    Stdin,
    Stdout,
}

#[derive(Clone, Copy)]
pub struct FileDescriptor {
    pub kind: FileKind,
    pub inode_num: u32,
    pub file_position: u32,
    pub in_use: bool,
}

impl FileDescriptor {
    const fn closed() -> Self {
        Self {
            kind: FileKind::Regular,
            inode_num: 0,
            file_position: 0,
            in_use: false,
        }
    }
}

pub const NUM_FDS: usize = crate::config::FDS_PER_PROCESS;

/// Per-process descriptor table. Slot 0 is stdin, slot 1 stdout; both
/// are opened implicitly when a process is created and can't be closed.
pub struct FdTable {
    slots: [FileDescriptor; NUM_FDS],
}

impl FdTable {
    pub const fn new() -> Self {
        Self {
            slots: [FileDescriptor::closed(); NUM_FDS],
        }
    }

    pub fn init_std_streams(&mut self) {
        self.slots[0] = FileDescriptor {
            kind: FileKind::Stdin,
            inode_num: 0,
            file_position: 0,
            in_use: true,
        };
        self.slots[1] = FileDescriptor {
            kind: FileKind::Stdout,
            inode_num: 0,
            file_position: 0,
            in_use: true,
        };
    }

    /// Opens `name` into the first free slot (2..NUM_FDS), resolving its
    /// type from the directory entry.
    pub fn open(&mut self, name: &str) -> KernelResult<u8> {
        let slot = (2..NUM_FDS)
            .find(|&i| !self.slots[i].in_use)
            .ok_or(KernelError::ResourceExhausted)?;

        let dentry = fs::dentry_by_name(name)?;
        let kind = match dentry.filetype {
            fs::FileType::Rtc => FileKind::Rtc,
            fs::FileType::Directory => FileKind::Directory,
            fs::FileType::Regular => FileKind::Regular,
        };
        if kind == FileKind::Rtc {
            rtc::open();
        }
        self.slots[slot] = FileDescriptor {
            kind,
            inode_num: dentry.inode_num,
            file_position: 0,
            in_use: true,
        };
        Ok(slot as u8)
    }

    pub fn close(&mut self, fd: u8) -> KernelResult<()> {
        let fd = fd as usize;
        if !(2..NUM_FDS).contains(&fd) || !self.slots[fd].in_use {
            return Err(KernelError::InvalidArgument);
        }
        self.slots[fd] = FileDescriptor::closed();
        Ok(())
    }

    pub fn get(&self, fd: u8) -> KernelResult<&FileDescriptor> {
        let fd = fd as usize;
        if fd >= NUM_FDS || !self.slots[fd].in_use {
            return Err(KernelError::InvalidArgument);
        }
        Ok(&self.slots[fd])
    }

    /// `terminal` is the owning process's own terminal (`Pcb::terminal`),
    /// not necessarily the one currently on-screen: stdin blocks on
    /// input arriving on that specific terminal.
    pub fn read(&mut self, terminal: u8, fd: u8, buf: &mut [u8]) -> KernelResult<usize> {
        let idx = fd as usize;
        if idx >= NUM_FDS || !self.slots[idx].in_use {
            return Err(KernelError::InvalidArgument);
        }
        match self.slots[idx].kind {
            FileKind::Stdout => Err(KernelError::InvalidArgument),
            FileKind::Stdin => Ok(crate::drivers::terminal::read_line(terminal as usize, buf)),
            FileKind::Rtc => {
                rtc::wait_for_tick();
                Ok(0)
            }
            FileKind::Directory => {
                let index = self.slots[idx].file_position;
                self.slots[idx].file_position += 1;
                match fs::dentry_by_index(index) {
                    Ok(dentry) => {
                        let name = dentry.name().as_bytes();
                        let n = name.len().min(buf.len());
                        buf[..n].copy_from_slice(&name[..n]);
                        Ok(n)
                    }
                    Err(_) => Ok(0),
                }
            }
            FileKind::Regular => {
                let pos = self.slots[idx].file_position;
                let n = fs::read_data(self.slots[idx].inode_num, pos, buf)?;
                self.slots[idx].file_position += n as u32;
                Ok(n)
            }
        }
    }

    /// `terminal` is the owning process's own terminal (`Pcb::terminal`),
    /// not necessarily the one currently on-screen.
    pub fn write(&mut self, terminal: u8, fd: u8, buf: &[u8]) -> KernelResult<usize> {
        let idx = fd as usize;
        if idx >= NUM_FDS || !self.slots[idx].in_use {
            return Err(KernelError::InvalidArgument);
        }
        match self.slots[idx].kind {
            FileKind::Stdout => {
                crate::drivers::terminal::write_bytes(terminal as usize, buf);
                Ok(buf.len())
            }
            FileKind::Rtc => {
                if buf.len() != 4 {
                    return Err(KernelError::InvalidArgument);
                }
                let hz = u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]);
                rtc::set_rate(hz)?;
                Ok(4)
            }
            _ => Err(KernelError::InvalidArgument),
        }
    }
}
