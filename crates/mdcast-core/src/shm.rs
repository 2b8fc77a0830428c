//! Named POSIX shared-memory segments.
//!
//! [`ShmSegment`] owns the OS lifecycle of one named, file-mapped memory
//! region — the backing store for the quote ring shared by the publisher and
//! the in-host consumer. A creator handle makes (or reuses) the named object,
//! sizes it, and maps it read/write; an attacher opens the existing object.
//! When a creator handle drops, the name is unlinked so later attaches fail.
//!
//! Handles are move-only (no `Clone`); cleanup happens exactly once, in
//! `Drop`. Two handles over the same name share the underlying bytes and
//! observe each other's writes.

use std::ffi::CString;

use crate::error::MdcastError;

fn shm_err(what: &str, name: &str) -> MdcastError {
    MdcastError::Shm(format!("{what} '{name}': {}", std::io::Error::last_os_error()))
}

/// How a segment handle opens the named object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShmMode {
    /// Create (or reuse) the object, size it if new, map read/write.
    Create,
    /// Open the existing object and map read/write.
    ///
    /// A ring consumer publishes its read index through the mapping, so the
    /// standard attach is writable. Attaching to an absent name fails.
    Attach,
    /// Open the existing object and map read-only, for passive inspection.
    AttachReadOnly,
}

/// RAII handle over one named shared-memory region.
pub struct ShmSegment {
    addr: *mut u8,
    size: usize,
    /// OS-level name, with the leading `/`.
    name: String,
    created: bool,
}

// SAFETY: the handle owns its mapping; the raw pointer is not aliased by the
// handle itself. Concurrent access to the mapped bytes is the business of
// whatever lives inside them (the ring coordinates itself with atomics).
unsafe impl Send for ShmSegment {}

impl ShmSegment {
    /// Create (or reuse) a named segment of `size` bytes, mapped read/write.
    ///
    /// A brand-new object is sized with `ftruncate` and therefore zero-filled
    /// by the OS. An object that already has a non-zero size is used as-is,
    /// which lets a second "creator" rendezvous on the first one's segment.
    pub fn create(name: &str, size: usize) -> Result<Self, MdcastError> {
        Self::open(name, size, ShmMode::Create)
    }

    /// Attach to an existing named segment, mapped read/write.
    pub fn attach(name: &str, size: usize) -> Result<Self, MdcastError> {
        Self::open(name, size, ShmMode::Attach)
    }

    /// Attach to an existing named segment, mapped read-only.
    pub fn attach_read_only(name: &str, size: usize) -> Result<Self, MdcastError> {
        Self::open(name, size, ShmMode::AttachReadOnly)
    }

    fn open(name: &str, size: usize, mode: ShmMode) -> Result<Self, MdcastError> {
        if name.is_empty() {
            return Err(MdcastError::Shm("segment name cannot be empty".into()));
        }
        if size == 0 {
            return Err(MdcastError::Shm("segment size cannot be zero".into()));
        }

        // POSIX wants the name to start with exactly one slash.
        let os_name = format!("/{}", name.trim_start_matches('/'));
        let c_name = CString::new(os_name.clone())
            .map_err(|_| MdcastError::Shm(format!("segment name '{name}' contains NUL")))?;

        let create = mode == ShmMode::Create;
        let (oflag, prot) = match mode {
            ShmMode::Create => (libc::O_CREAT | libc::O_RDWR, libc::PROT_READ | libc::PROT_WRITE),
            ShmMode::Attach => (libc::O_RDWR, libc::PROT_READ | libc::PROT_WRITE),
            ShmMode::AttachReadOnly => (libc::O_RDONLY, libc::PROT_READ),
        };

        // SAFETY: shm_open + fstat + ftruncate + mmap — the standard POSIX
        // IPC sequence. Every early return below releases what was acquired
        // before it (fd, and the name if this call created it).
        let addr = unsafe {
            let fd = libc::shm_open(c_name.as_ptr(), oflag, 0o666);
            if fd == -1 {
                return Err(shm_err("shm_open failed for", &os_name));
            }

            if create {
                let mut st: libc::stat = std::mem::zeroed();
                if libc::fstat(fd, &mut st) == -1 {
                    let err = shm_err("fstat failed for", &os_name);
                    libc::close(fd);
                    libc::shm_unlink(c_name.as_ptr());
                    return Err(err);
                }
                // Only size a brand-new object; an already-sized segment is
                // usable as-is.
                if st.st_size == 0 && libc::ftruncate(fd, size as libc::off_t) == -1 {
                    let err = shm_err("ftruncate failed for", &os_name);
                    libc::close(fd);
                    libc::shm_unlink(c_name.as_ptr());
                    return Err(err);
                }
            }

            let addr = libc::mmap(std::ptr::null_mut(), size, prot, libc::MAP_SHARED, fd, 0);
            if addr == libc::MAP_FAILED {
                let err = shm_err("mmap failed for", &os_name);
                libc::close(fd);
                if create {
                    libc::shm_unlink(c_name.as_ptr());
                }
                return Err(err);
            }
            // The mapping stays valid after the descriptor closes.
            libc::close(fd);
            addr as *mut u8
        };

        Ok(Self { addr, size, name: os_name, created: create })
    }

    /// Base address of the mapping.
    #[inline]
    pub fn addr(&self) -> *mut u8 {
        self.addr
    }

    /// Mapped size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// OS-level object name, including the leading `/`.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this handle created the object (and will unlink it on drop).
    #[inline]
    pub fn is_creator(&self) -> bool {
        self.created
    }

    /// Whether the handle holds a live mapping.
    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.addr.is_null()
    }
}

impl Drop for ShmSegment {
    fn drop(&mut self) {
        // SAFETY: addr/size describe the mapping made in open(); the name was
        // produced by CString::new there, so re-encoding cannot fail.
        unsafe {
            if !self.addr.is_null() {
                libc::munmap(self.addr as *mut libc::c_void, self.size);
                self.addr = std::ptr::null_mut();
            }
            if self.created
                && let Ok(c_name) = CString::new(self.name.clone())
            {
                libc::shm_unlink(c_name.as_ptr());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_name(tag: &str) -> String {
        format!("mdcast_test_{tag}_{}", std::process::id())
    }

    #[test]
    fn rejects_invalid_arguments() {
        assert!(ShmSegment::create("", 4096).is_err());
        assert!(ShmSegment::create("x", 0).is_err());
    }

    #[test]
    fn attach_to_absent_name_fails_cleanly() {
        let name = unique_name("absent");
        assert!(ShmSegment::attach(&name, 4096).is_err());
        // The failed attach must not have created the object.
        assert!(ShmSegment::attach(&name, 4096).is_err());
    }

    #[test]
    fn attacher_observes_creator_writes() {
        let name = unique_name("observe");
        let creator = ShmSegment::create(&name, 4096).unwrap();
        assert!(creator.is_creator());
        assert!(creator.is_valid());
        assert_eq!(creator.name(), format!("/{name}"));

        let attacher = ShmSegment::attach(&name, 4096).unwrap();
        assert!(!attacher.is_creator());

        unsafe {
            std::ptr::write_volatile(creator.addr().add(100), 0xAB);
            assert_eq!(std::ptr::read_volatile(attacher.addr().add(100)), 0xAB);
        }
    }

    #[test]
    fn new_segment_is_zero_filled() {
        let name = unique_name("zeroed");
        let seg = ShmSegment::create(&name, 4096).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(seg.addr(), seg.size()) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn creator_drop_unlinks_the_name() {
        let name = unique_name("unlink");
        {
            let creator = ShmSegment::create(&name, 4096).unwrap();
            // While the creator lives, attaching succeeds.
            let attacher = ShmSegment::attach(&name, 4096).unwrap();
            drop(attacher);
            drop(creator);
        }
        assert!(ShmSegment::attach(&name, 4096).is_err());
    }

    #[test]
    fn attacher_drop_does_not_unlink() {
        let name = unique_name("keep");
        let creator = ShmSegment::create(&name, 4096).unwrap();
        drop(ShmSegment::attach(&name, 4096).unwrap());
        // The name must still be attachable while the creator lives.
        assert!(ShmSegment::attach(&name, 4096).is_ok());
        drop(creator);
    }

    #[test]
    fn read_only_attach_maps() {
        let name = unique_name("ro");
        let creator = ShmSegment::create(&name, 4096).unwrap();
        unsafe { std::ptr::write_volatile(creator.addr(), 7) };
        let ro = ShmSegment::attach_read_only(&name, 4096).unwrap();
        assert_eq!(unsafe { std::ptr::read_volatile(ro.addr()) }, 7);
    }
}
