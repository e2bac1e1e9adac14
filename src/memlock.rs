//! Optional pinning of the slot array in physical memory.
//!
//! Real-time callers must not page-fault while probing, so the table asks
//! the OS to keep its slots resident. Failure is not fatal. On platforms
//! without `mlock` this is a no-op.

/// Scoped `mlock` of a memory range; unlocked on drop.
#[derive(Debug)]
pub(crate) struct MemLock {
    #[cfg(unix)]
    addr: usize,
    #[cfg(unix)]
    len: usize,
}

impl MemLock {
    /// Lock `len` bytes starting at `addr`. Returns `None` if the range was
    /// not locked.
    #[cfg(unix)]
    pub(crate) fn acquire(addr: *const u8, len: usize) -> Option<Self> {
        if len == 0 {
            return None;
        }
        // SAFETY: mlock only inspects the address range; the caller owns it.
        let rc = unsafe { libc::mlock(addr.cast(), len) };
        if rc != 0 {
            tracing::warn!(
                len,
                error = %std::io::Error::last_os_error(),
                "failed to lock urid table in memory"
            );
            return None;
        }
        Some(Self {
            addr: addr as usize,
            len,
        })
    }

    #[cfg(not(unix))]
    pub(crate) fn acquire(_addr: *const u8, _len: usize) -> Option<Self> {
        None
    }
}

#[cfg(unix)]
impl Drop for MemLock {
    fn drop(&mut self) {
        // SAFETY: same range that was locked in `acquire`, still allocated.
        unsafe { libc::munlock(self.addr as *const libc::c_void, self.len) };
    }
}
