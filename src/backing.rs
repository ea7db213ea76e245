//! OS-level backing storage for the arena.
//!
//! The simulated heap must not route through the host allocator, so the
//! arena's bytes are reserved from the kernel exactly once per heap and
//! returned when the heap is dropped. The [`PlatformMemory`] trait hides
//! the concrete syscall/API offered by each kernel.

use std::{ptr::NonNull, slice};

/// Abstraction over low level memory requests. The allocator, as the top
/// level view of this, has nothing to do with the concrete APIs offered
/// by each kernel.
trait PlatformMemory {
    /// Request a memory region of size `len`. Returns a pointer to the
    /// region or `None` if the underlying syscall fails.
    unsafe fn request_memory(len: usize) -> Option<NonNull<u8>>;

    /// Returns the memory of size `len` starting from `addr` back to the
    /// kernel.
    unsafe fn return_memory(addr: *mut u8, len: usize);
}

/// Selector for the current platform's [`PlatformMemory`] impl.
struct Platform;

#[cfg(unix)]
mod unix {
    use super::{Platform, PlatformMemory};

    use libc::{mmap, munmap, off_t, size_t};

    use std::{
        os::raw::{c_int, c_void},
        ptr::NonNull,
    };

    impl PlatformMemory for Platform {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            // mmap parameters.
            const ADDR: *mut c_void = std::ptr::null_mut::<c_void>();
            // Read-Write only memory.
            const PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;
            const FLAGS: c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
            const FD: c_int = -1;
            const OFFSET: off_t = 0;

            unsafe {
                let addr = mmap(ADDR, len as size_t, PROT, FLAGS, FD, OFFSET);

                match addr {
                    libc::MAP_FAILED => None,
                    addr => Some(NonNull::new_unchecked(addr).cast::<u8>()),
                }
            }
        }

        unsafe fn return_memory(addr: *mut u8, len: usize) {
            unsafe {
                munmap(addr as *mut c_void, len as size_t);
            }
        }
    }
}

#[cfg(windows)]
mod windows {
    use super::{Platform, PlatformMemory};

    use std::{os::raw::c_void, ptr::NonNull};

    use windows::Win32::System::Memory;

    impl PlatformMemory for Platform {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            // Read-Write only.
            let protection = Memory::PAGE_READWRITE;

            let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;

            unsafe {
                let addr = Memory::VirtualAlloc(None, len, flags, protection);

                NonNull::new(addr.cast())
            }
        }

        unsafe fn return_memory(addr: *mut u8, _len: usize) {
            unsafe {
                let _ = Memory::VirtualFree(addr as *mut c_void, 0, Memory::MEM_RELEASE);
            }
        }
    }
}

/// One fixed reservation holding the whole arena.
///
/// Anonymous mappings come back zero-filled on both supported platforms,
/// so a fresh arena reads as all zeroes.
pub(crate) struct Backing {
    addr: NonNull<u8>,
    len: usize,
}

impl Backing {
    /// Reserves `len` bytes from the OS. Returns `None` if the platform
    /// refuses the reservation.
    pub fn reserve(len: usize) -> Option<Self> {
        debug_assert!(len > 0);

        let addr = unsafe { Platform::request_memory(len)? };

        Some(Self { addr, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// The reserved bytes as a slice. All block and header arithmetic in
    /// the crate happens as offset math over this slice, never as pointer
    /// casts into it.
    pub fn bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.addr.as_ptr(), self.len) }
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.addr.as_ptr(), self.len) }
    }
}

impl Drop for Backing {
    fn drop(&mut self) {
        unsafe {
            Platform::return_memory(self.addr.as_ptr(), self.len);
        }
    }
}
