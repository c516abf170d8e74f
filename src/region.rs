use std::io;
use std::ptr::{self, NonNull};

use libc::{_SC_PAGESIZE, MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, c_void};
use log::debug;

use crate::align_to;
use crate::block::{BlockHeader, HEADER_SIZE};

/// Failure modes of region acquisition.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
  #[error("requested region size must be positive")]
  SizeNotPositive,
  #[error("mmap failed: {0}")]
  Map(#[source] io::Error),
}

/// One contiguous byte range mapped from the operating system, owned
/// exclusively for the lifetime of the value.
///
/// Blocks are identified by byte offset from the region base; all header
/// access goes through [`read_header`](Self::read_header) and
/// [`write_header`](Self::write_header) at a given offset.
pub(crate) struct Region {
  base: NonNull<u8>,
  len: usize,
}

impl Region {
  /// Maps `size` bytes, rounded up to the host page size, as a private
  /// zero-filled read/write mapping.
  pub fn map(size: usize) -> Result<Self, InitError> {
    if size == 0 {
      return Err(InitError::SizeNotPositive);
    }

    let page_size = unsafe { libc::sysconf(_SC_PAGESIZE) } as usize;
    let len = align_to!(size, page_size);

    let addr = unsafe {
      libc::mmap(
        ptr::null_mut(),
        len,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if addr == MAP_FAILED {
      return Err(InitError::Map(io::Error::last_os_error()));
    }

    debug!("mapped {len} byte region at {addr:p}");

    Ok(Self {
      base: unsafe { NonNull::new_unchecked(addr as *mut u8) },
      len,
    })
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn base_addr(&self) -> usize {
    self.base.as_ptr() as usize
  }

  /// Pointer to the payload byte at `offset`.
  pub fn payload_ptr(&self, offset: usize) -> NonNull<u8> {
    debug_assert!(offset <= self.len);
    unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) }
  }

  /// Region offset of `ptr`, or `None` when the pointer lies outside the
  /// mapping.
  pub fn offset_of(&self, ptr: *const u8) -> Option<usize> {
    let offset = (ptr as usize).checked_sub(self.base_addr())?;
    (offset < self.len).then_some(offset)
  }

  /// Reads the header stored at `offset`.
  ///
  /// The 4-byte payload granularity can land a header off the natural
  /// alignment of `usize`, so access goes through the unaligned
  /// primitives.
  pub fn read_header(&self, offset: usize) -> BlockHeader {
    debug_assert!(offset + HEADER_SIZE <= self.len);
    unsafe { ptr::read_unaligned(self.base.as_ptr().add(offset) as *const BlockHeader) }
  }

  pub fn write_header(&mut self, offset: usize, header: BlockHeader) {
    debug_assert!(offset + HEADER_SIZE <= self.len);
    unsafe {
      ptr::write_unaligned(self.base.as_ptr().add(offset) as *mut BlockHeader, header);
    }
  }
}

impl Drop for Region {
  fn drop(&mut self) {
    let rc = unsafe { libc::munmap(self.base.as_ptr() as *mut c_void, self.len) };

    if rc != 0 {
      debug!(
        "munmap of {} byte region failed: {}",
        self.len,
        io::Error::last_os_error()
      );
    } else {
      debug!("unmapped {} byte region", self.len);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::block::NIL;

  fn page_size() -> usize {
    unsafe { libc::sysconf(_SC_PAGESIZE) as usize }
  }

  #[test]
  fn test_map_rounds_to_page_size() {
    let page = page_size();

    let region = Region::map(1).unwrap();
    assert_eq!(page, region.len());

    let region = Region::map(page + 1).unwrap();
    assert_eq!(2 * page, region.len());
  }

  #[test]
  fn test_map_rejects_zero_size() {
    assert!(matches!(Region::map(0), Err(InitError::SizeNotPositive)));
  }

  #[test]
  fn test_header_round_trip() {
    let mut region = Region::map(4096).unwrap();

    let header = BlockHeader::busy(800, NIL);
    region.write_header(0, header);

    assert_eq!(header, region.read_header(0));
  }

  #[test]
  fn test_header_round_trip_at_unaligned_offset() {
    let mut region = Region::map(4096).unwrap();

    // 4-byte granularity means headers can sit at offsets like this one.
    let header = BlockHeader::free(40, NIL);
    region.write_header(HEADER_SIZE + 4, header);

    assert_eq!(header, region.read_header(HEADER_SIZE + 4));
  }

  #[test]
  fn test_offset_of_bounds() {
    let region = Region::map(4096).unwrap();
    let len = region.len();

    assert_eq!(Some(0), region.offset_of(region.payload_ptr(0).as_ptr()));
    assert_eq!(
      Some(len - 1),
      region.offset_of(region.payload_ptr(len - 1).as_ptr())
    );
    assert_eq!(None, region.offset_of(region.payload_ptr(len).as_ptr()));

    let mut local = 0u8;
    assert_eq!(None, region.offset_of(&mut local));
  }

  #[test]
  fn test_mapping_is_zero_filled() {
    let region = Region::map(4096).unwrap();

    for offset in (0..region.len()).step_by(512) {
      assert_eq!(0, unsafe { region.payload_ptr(offset).as_ptr().read() });
    }
  }
}
