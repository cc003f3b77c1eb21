// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::io;
use std::os::fd::RawFd;
use std::ptr;

use super::RingBuffer;

/// Whether [`VmRing::new`] should silently round the requested size up to a page multiple, or
/// fail if it isn't one already.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAlignment {
    Auto,
    Strict,
}

/// Double-mapped virtual-memory SPSC ring buffer.
///
/// The backing storage is a single anonymous, shared memory region of `total_size` bytes
/// (obtained via `memfd_create` + `ftruncate`), mapped twice into adjacent virtual addresses:
/// `[base, base+total_size)` and `[base+total_size, base+2*total_size)` both refer to the same
/// physical pages. This means any contiguous read or write of up to `total_size` bytes can be
/// issued with a single `memcpy`, even if it straddles what would otherwise be the wrap point,
/// which is the entire reason this variant exists.
pub struct VmRing {
    base: *mut u8,
    total_size: usize,
    fd: RawFd,
    head: usize,
    tail: usize,
}

// SAFETY: `VmRing` exclusively owns the memory region pointed to by `base` (there are no other
// live references to it) and the fd, so moving/using it across threads is sound as long as
// access is externally synchronized the way every other RingBuffer user already must (the
// contract documented on the RingBuffer trait: a single producer and a single consumer).
unsafe impl Send for VmRing {}

impl VmRing {
    /// Creates a new ring of (at least) `requested_size` bytes.
    ///
    /// With [`PageAlignment::Auto`], `requested_size` is rounded up to the next multiple of the
    /// system page size. With [`PageAlignment::Strict`], a `requested_size` that isn't already a
    /// page multiple is an error.
    pub fn new(requested_size: usize, alignment: PageAlignment) -> io::Result<Self> {
        assert!(requested_size > 0, "ring size must be non-zero");

        // SAFETY: sysconf with _SC_PAGESIZE never fails and has no preconditions.
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;

        let total_size = match alignment {
            PageAlignment::Auto => requested_size.div_ceil(page_size) * page_size,
            PageAlignment::Strict => {
                if requested_size % page_size != 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!(
                            "VmRing size {requested_size} is not a multiple of the page size {page_size}"
                        ),
                    ));
                }
                requested_size
            }
        };

        // SAFETY: memfd_create has no preconditions beyond a valid name pointer, which
        // `c"nexus-vm-ring"` is (nul-terminated, 'static).
        let fd = unsafe { libc::memfd_create(c"nexus-vm-ring".as_ptr(), libc::MFD_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        // SAFETY: fd was just created above and is still open.
        if unsafe { libc::ftruncate(fd, total_size as libc::off_t) } != 0 {
            let err = io::Error::last_os_error();
            // SAFETY: fd is a valid, open descriptor we own.
            unsafe { libc::close(fd) };
            return Err(err);
        }

        // Reserve 2*total_size of address space up front so the two real mappings land
        // adjacently; PROT_NONE means nothing can touch it until the MAP_FIXED calls below
        // replace it.
        // SAFETY: arguments are all valid for an anonymous reservation mapping.
        let reserve = unsafe {
            libc::mmap(
                ptr::null_mut(),
                2 * total_size,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if reserve == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            // SAFETY: fd is a valid, open descriptor we own.
            unsafe { libc::close(fd) };
            return Err(err);
        }

        // SAFETY: `reserve` is a `2*total_size`-byte region we just reserved and exclusively
        // own; mapping `fd` over its first half with MAP_FIXED replaces that reservation.
        let low = unsafe {
            libc::mmap(
                reserve,
                total_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_FIXED,
                fd,
                0,
            )
        };

        // SAFETY: same as above, but for the second half of the reservation.
        let high = unsafe {
            libc::mmap(
                reserve.byte_add(total_size),
                total_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_FIXED,
                fd,
                0,
            )
        };

        if low == libc::MAP_FAILED || high == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            // SAFETY: `reserve` is the 2*total_size region reserved above; tearing it down on
            // the error path is the only reference to it.
            unsafe { libc::munmap(reserve, 2 * total_size) };
            // SAFETY: fd is a valid, open descriptor we own.
            unsafe { libc::close(fd) };
            return Err(err);
        }

        Ok(Self {
            base: reserve as *mut u8,
            total_size,
            fd,
            head: 0,
            tail: 0,
        })
    }

    fn normalize(&mut self) {
        if self.head >= self.total_size && self.tail >= self.total_size {
            self.head -= self.total_size;
            self.tail -= self.total_size;
        }
    }
}

impl Drop for VmRing {
    fn drop(&mut self) {
        // SAFETY: unmap the high mapping first, then the low one, mirroring construction order
        // in reverse; both regions were mapped by `new` and nothing else references them.
        unsafe {
            libc::munmap(self.base.byte_add(self.total_size) as *mut libc::c_void, self.total_size);
            libc::munmap(self.base as *mut libc::c_void, self.total_size);
            libc::close(self.fd);
        }
    }
}

impl RingBuffer for VmRing {
    fn put(&mut self, src: &[u8]) -> bool {
        if self.empty_space() < src.len() {
            return false;
        }
        // SAFETY: `self.tail < 2*total_size` (invariant) and `tail + src.len() <= 2*total_size`
        // because `empty_space() >= src.len()` was just checked; the double mapping guarantees
        // every byte in `[base+tail, base+tail+src.len())` is backed memory.
        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), self.base.add(self.tail), src.len());
        }
        self.mark_as_write(src.len());
        true
    }

    fn peek(&self, dst: &mut [u8]) -> bool {
        if self.consumed_space() < dst.len() {
            return false;
        }
        // SAFETY: symmetric with `put`: `head + dst.len() <= tail <= 2*total_size`.
        unsafe {
            ptr::copy_nonoverlapping(self.base.add(self.head), dst.as_mut_ptr(), dst.len());
        }
        true
    }

    fn mark_as_read(&mut self, amount: usize) {
        debug_assert!(amount <= self.consumed_space());
        self.head += amount;
        self.normalize();
    }

    fn mark_as_write(&mut self, amount: usize) {
        debug_assert!(amount <= self.empty_space());
        self.tail += amount;
        self.normalize();
    }

    fn consumed_space(&self) -> usize {
        self.tail - self.head
    }

    fn empty_space(&self) -> usize {
        self.total_size - self.consumed_space()
    }

    fn total_size(&self) -> usize {
        self.total_size
    }

    fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    fn available_span(&self) -> &[u8] {
        // SAFETY: `[head, head + consumed_space())` is always within the 2*total_size mapped
        // region, and is contiguous by construction.
        unsafe { std::slice::from_raw_parts(self.base.add(self.head), self.consumed_space()) }
    }
}

#[cfg(test)]
mod tests {
    use super::super::conformance;
    use super::*;

    fn page_sized_ring() -> VmRing {
        VmRing::new(4096, PageAlignment::Auto).expect("mmap should succeed in tests")
    }

    #[test]
    fn round_trip() {
        conformance::round_trip(page_sized_ring(), 4096);
    }

    #[test]
    fn accounting_is_conserved() {
        conformance::accounting_is_conserved(page_sized_ring(), 4096);
    }

    #[test]
    fn auto_alignment_rounds_up_to_a_page_multiple() {
        let ring = VmRing::new(1, PageAlignment::Auto).unwrap();
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
        assert_eq!(ring.total_size() % page_size, 0);
        assert!(ring.total_size() >= 1);
    }

    #[test]
    fn strict_alignment_rejects_misaligned_sizes() {
        assert!(VmRing::new(100, PageAlignment::Strict).is_err());
    }

    #[test]
    fn available_span_is_contiguous_across_the_wrap_point() {
        let mut ring = page_sized_ring();
        let half = ring.total_size() / 2;
        ring.put(&vec![1u8; half]);
        ring.mark_as_read(half);
        // Now head == tail == half; the next put crosses what would be the physical wrap point
        // in a non-VM ring, but must still show up as one contiguous span here.
        let payload = vec![2u8; half + 10];
        assert!(ring.put(&payload));
        assert_eq!(ring.available_span().len(), half + 10);
        assert!(ring.available_span().iter().all(|&b| b == 2));
    }
}
