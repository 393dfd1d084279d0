// This module is the executable memory manager. ExecutableRegion owns one anonymous private
// mapping and walks it through a fixed lifecycle: Unallocated -> Writable (mmap read/write,
// length rounded up to whole pages) -> code copied in -> Executable (mprotect read/exec,
// write access revoked) -> Released (munmap). Failures to map or re-protect are reported
// with the OS error and are not retried. The region is unmapped unconditionally when its
// owner drops it, whether or not the code ever ran. EntryPoint is the only way to call the
// mapped code; it borrows the region so the mapping outlives every call made through it.

//! Page-granular executable memory for generated code.

use std::marker::PhantomData;

use crate::core::error::{JitError, JitResult};

/// Lifecycle of an [`ExecutableRegion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionState {
    Unallocated,
    Writable,
    Executable,
    Released,
}

/// Owned mapping holding generated code.
#[derive(Debug)]
pub struct ExecutableRegion {
    ptr: *mut u8,
    map_len: usize,
    code_len: usize,
    state: RegionState,
}

impl Default for ExecutableRegion {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutableRegion {
    pub fn new() -> Self {
        Self {
            ptr: std::ptr::null_mut(),
            map_len: 0,
            code_len: 0,
            state: RegionState::Unallocated,
        }
    }

    /// Allocate, copy and protect `code` in one go.
    pub fn load(code: &[u8]) -> JitResult<Self> {
        let mut region = Self::new();
        region.allocate(code.len())?;
        region.write(code)?;
        region.make_executable()?;
        Ok(region)
    }

    pub fn state(&self) -> RegionState {
        self.state
    }

    /// Bytes mapped (a whole number of pages).
    pub fn mapping_len(&self) -> usize {
        self.map_len
    }

    /// Bytes of code copied into the mapping.
    pub fn code_len(&self) -> usize {
        self.code_len
    }

    fn expect_state(&self, expected: RegionState) -> JitResult<()> {
        if self.state != expected {
            return Err(JitError::InvalidRegionState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Map at least `size` bytes read/write.
    pub fn allocate(&mut self, size: usize) -> JitResult<()> {
        self.expect_state(RegionState::Unallocated)?;
        let map_len = round_to_pages(size.max(1), sys::page_size());
        self.ptr = sys::map_writable(map_len)?;
        self.map_len = map_len;
        self.state = RegionState::Writable;
        log::debug!("mapped {map_len} bytes at {:p}", self.ptr);
        Ok(())
    }

    /// Copy `code` to the start of the mapping.
    pub fn write(&mut self, code: &[u8]) -> JitResult<()> {
        self.expect_state(RegionState::Writable)?;
        assert!(
            code.len() <= self.map_len,
            "code of {} bytes does not fit mapping of {}",
            code.len(),
            self.map_len
        );
        // SAFETY: the mapping is writable and at least `code.len()` bytes long, and a fresh
        // anonymous mapping cannot overlap `code`.
        unsafe { std::ptr::copy_nonoverlapping(code.as_ptr(), self.ptr, code.len()) };
        self.code_len = code.len();
        Ok(())
    }

    /// Flip the mapping to read/execute.
    pub fn make_executable(&mut self) -> JitResult<()> {
        self.expect_state(RegionState::Writable)?;
        sys::protect_exec(self.ptr, self.map_len)?;
        self.state = RegionState::Executable;
        log::debug!("{} bytes of code executable at {:p}", self.code_len, self.ptr);
        Ok(())
    }

    /// Handle for calling the code at the start of the mapping.
    pub fn entry_point(&self) -> JitResult<EntryPoint<'_>> {
        self.expect_state(RegionState::Executable)?;
        Ok(EntryPoint {
            addr: self.ptr as *const u8,
            _region: PhantomData,
        })
    }

    /// Unmap the region. Idempotent; the state is `Released` afterwards even on error.
    pub fn release(&mut self) -> JitResult<()> {
        let previous = std::mem::replace(&mut self.state, RegionState::Released);
        match previous {
            RegionState::Writable | RegionState::Executable => {
                let ptr = std::mem::replace(&mut self.ptr, std::ptr::null_mut());
                let result = sys::unmap(ptr, self.map_len);
                log::debug!("unmapped {} bytes at {ptr:p}", self.map_len);
                result
            }
            RegionState::Unallocated | RegionState::Released => Ok(()),
        }
    }
}

impl Drop for ExecutableRegion {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::error!("{e}");
        }
    }
}

/// Entry point of code living in an executable region.
pub struct EntryPoint<'r> {
    addr: *const u8,
    _region: PhantomData<&'r ExecutableRegion>,
}

impl EntryPoint<'_> {
    pub fn addr(&self) -> *const u8 {
        self.addr
    }

    /// Call the generated function.
    ///
    /// # Safety
    ///
    /// The region must hold a complete `extern "C" fn()` for this host that preserves
    /// callee-saved registers and returns, and every address it touches must be valid for
    /// the duration of the call.
    pub unsafe fn invoke(&self) {
        let func: extern "C" fn() = std::mem::transmute(self.addr);
        func();
    }
}

fn round_to_pages(size: usize, page: usize) -> usize {
    size.div_ceil(page) * page
}

#[cfg(unix)]
mod sys {
    use crate::core::error::{JitError, JitResult};
    use std::io;

    pub fn page_size() -> usize {
        // SAFETY: sysconf has no preconditions.
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size <= 0 {
            4096
        } else {
            size as usize
        }
    }

    pub fn map_writable(len: usize) -> JitResult<*mut u8> {
        // SAFETY: anonymous private mapping with no address hint.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANON,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(JitError::MapFailed(io::Error::last_os_error()));
        }
        Ok(ptr as *mut u8)
    }

    pub fn protect_exec(ptr: *mut u8, len: usize) -> JitResult<()> {
        // SAFETY: `ptr`/`len` describe a mapping owned by the caller.
        let rc = unsafe { libc::mprotect(ptr as *mut _, len, libc::PROT_READ | libc::PROT_EXEC) };
        if rc != 0 {
            return Err(JitError::ProtectFailed(io::Error::last_os_error()));
        }
        Ok(())
    }

    pub fn unmap(ptr: *mut u8, len: usize) -> JitResult<()> {
        // SAFETY: `ptr`/`len` describe a mapping owned by the caller, never used again.
        let rc = unsafe { libc::munmap(ptr as *mut _, len) };
        if rc != 0 {
            return Err(JitError::UnmapFailed(io::Error::last_os_error()));
        }
        Ok(())
    }
}

#[cfg(not(unix))]
mod sys {
    use crate::core::error::{JitError, JitResult};

    pub fn page_size() -> usize {
        4096
    }

    pub fn map_writable(_len: usize) -> JitResult<*mut u8> {
        Err(JitError::UnsupportedHost)
    }

    pub fn protect_exec(_ptr: *mut u8, _len: usize) -> JitResult<()> {
        Err(JitError::UnsupportedHost)
    }

    pub fn unmap(_ptr: *mut u8, _len: usize) -> JitResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_pages() {
        assert_eq!(round_to_pages(1, 4096), 4096);
        assert_eq!(round_to_pages(4096, 4096), 4096);
        assert_eq!(round_to_pages(4097, 4096), 8192);
    }

    #[cfg(unix)]
    #[test]
    fn test_lifecycle_states() {
        let mut region = ExecutableRegion::new();
        assert_eq!(region.state(), RegionState::Unallocated);
        assert!(region.entry_point().is_err());

        region.allocate(3).unwrap();
        assert_eq!(region.state(), RegionState::Writable);
        assert_eq!(region.mapping_len() % sys::page_size(), 0);
        assert!(region.entry_point().is_err());

        region.write(&[0x41, 0x55, 0xC3]).unwrap();
        region.make_executable().unwrap();
        assert_eq!(region.state(), RegionState::Executable);
        assert_eq!(region.code_len(), 3);
        assert!(region.entry_point().is_ok());

        // Written bytes are readable after the permission change.
        let entry = region.entry_point().unwrap();
        let copied = unsafe { std::slice::from_raw_parts(entry.addr(), 3) };
        assert_eq!(copied, &[0x41, 0x55, 0xC3]);

        region.release().unwrap();
        assert_eq!(region.state(), RegionState::Released);
        region.release().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_out_of_order_transitions_rejected() {
        let mut region = ExecutableRegion::new();
        assert!(matches!(
            region.make_executable(),
            Err(JitError::InvalidRegionState {
                expected: RegionState::Writable,
                actual: RegionState::Unallocated,
            })
        ));

        let mut region = ExecutableRegion::load(&[0xC3]).unwrap();
        assert!(region.write(&[0x90]).is_err());
        assert!(region.allocate(1).is_err());
        region.release().unwrap();
        assert!(region.make_executable().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_release_before_executable() {
        let mut region = ExecutableRegion::new();
        region.allocate(2).unwrap();
        region.write(&[0x90, 0xC3]).unwrap();
        assert_eq!(region.state(), RegionState::Writable);

        region.release().unwrap();
        assert_eq!(region.state(), RegionState::Released);
        assert!(region.entry_point().is_err());
        assert!(region.make_executable().is_err());

        // Dropping a region that never became executable unmaps it too.
        let mut dropped = ExecutableRegion::new();
        dropped.allocate(1).unwrap();
        dropped.write(&[0xC3]).unwrap();
        drop(dropped);
    }

    #[cfg(all(unix, target_arch = "x86_64"))]
    #[test]
    fn test_invoke_ret() {
        let region = ExecutableRegion::load(&[0xC3]).unwrap();
        let entry = region.entry_point().unwrap();
        // SAFETY: a lone `ret` is a valid no-op function.
        unsafe { entry.invoke() };
        assert_eq!(region.state(), RegionState::Executable);
    }
}
