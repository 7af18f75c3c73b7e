//! Cache line aligned storage for the slot array.

use crate::error;
use crate::error::Result;
use memmap2::{MmapMut, MmapOptions};

/// Conventional cache line size in bytes.
pub const CACHE_LINE_SIZE: usize = 64;

/// Anonymous private mapping backing the slot array. The pointer handed out is
/// aligned up inside the mapping; the whole mapping is released on drop.
#[derive(Debug)]
pub(crate) struct AlignedStorage {
    ptr: *mut u8,
    #[allow(dead_code)]
    mmap: MmapMut,
}

// The mapping is plain zero-filled memory, all synchronisation happens on the
// slot version words built on top of it.
unsafe impl Send for AlignedStorage {}
unsafe impl Sync for AlignedStorage {}

impl AlignedStorage {
    /// Map `size` bytes of zeroed anonymous memory and align the base up to
    /// `alignment`. On Linux `huge_pages` requests a `MAP_HUGETLB` mapping;
    /// elsewhere the flag is ignored. An unsatisfiable request (including a
    /// huge page mapping the kernel cannot back) fails here.
    pub(crate) fn new(size: usize, alignment: usize, huge_pages: bool) -> Result<Self> {
        assert!(alignment.is_power_of_two(), "alignment must be a power of two");

        // over-allocate so the base can be aligned up inside the mapping;
        // a saturated length is unmappable and fails cleanly below
        let total = size.saturating_add(alignment);

        let mut options = MmapOptions::new();
        options.len(total);
        #[cfg(target_os = "linux")]
        if huge_pages {
            options.huge(None);
        }
        #[cfg(not(target_os = "linux"))]
        let _ = huge_pages;

        let mut mmap = options.map_anon().map_err(|source| error::allocation(total, source))?;
        let offset = mmap.as_ptr().align_offset(alignment);
        debug_assert!(offset < alignment);
        let ptr = unsafe { mmap.as_mut_ptr().add(offset) };
        Ok(Self { ptr, mmap })
    }

    /// Base pointer of the aligned region.
    #[inline]
    pub(crate) const fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }
}
