use std::fmt;
use std::ptr::NonNull;

use log::{debug, trace};

use crate::align_to;
use crate::block::{BlockHeader, HEADER_SIZE, NIL};
use crate::region::{InitError, Region};

/// Payload sizes are multiples of this granularity; allocation requests
/// are rounded up to it.
pub const GRANULARITY: usize = 4;

/// Failure modes of [`FirstFitAllocator::free`].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum FreeError {
  #[error("null pointer")]
  NullPointer,
  #[error("pointer is not the start of a block in this region")]
  UnknownBlock,
  #[error("block is already free")]
  AlreadyFree,
}

/// First-fit allocator over one fixed-size mapped region.
///
/// The region is covered by a gapless, address-ordered chain of blocks,
/// each a header followed by its payload. Allocation scans the chain for
/// the first free block large enough and splits it; release marks a block
/// free and coalesces it with a free neighbour on either side, so no two
/// adjacent blocks are ever both free.
pub struct FirstFitAllocator {
  region: Region,
  head: usize,
}

impl FirstFitAllocator {
  /// Maps the backing region and installs a single free block spanning it.
  ///
  /// `size` is rounded up to the host page size. Fails when `size` is
  /// zero or when the operating system refuses the mapping; failure
  /// leaves no state behind.
  pub fn init(size: usize) -> Result<Self, InitError> {
    let mut region = Region::map(size)?;

    let payload = region.len() - HEADER_SIZE;
    region.write_header(0, BlockHeader::free(payload, NIL));

    debug!("installed initial free block of {payload} bytes");

    Ok(Self { region, head: 0 })
  }

  /// Allocates `size` payload bytes, rounded up to the next multiple of
  /// [`GRANULARITY`], out of the first free block that can hold the
  /// request plus a remainder header.
  ///
  /// Returns `None` when `size` is zero or no free block fits; the chain
  /// is left untouched in either case. The pointer addresses the first of
  /// `size` usable bytes; reading and writing them is up to the caller.
  pub fn alloc(&mut self, size: usize) -> Option<NonNull<u8>> {
    if size == 0 || size > self.region.len() {
      return None;
    }

    let size = align_to!(size, GRANULARITY);

    let mut offset = self.head;
    while offset != NIL {
      let header = self.region.read_header(offset);

      if !header.is_busy() && header.size() >= size + HEADER_SIZE {
        return Some(self.split(offset, header, size));
      }

      offset = header.next;
    }

    None
  }

  /// Splits the free block at `offset` into a busy block of `size` bytes
  /// followed by a free remainder. A remainder payload of zero bytes is
  /// legitimate; the remainder block joins the chain either way.
  fn split(&mut self, offset: usize, header: BlockHeader, size: usize) -> NonNull<u8> {
    let remainder_offset = offset + HEADER_SIZE + size;
    let remainder = header.size() - size - HEADER_SIZE;

    self
      .region
      .write_header(remainder_offset, BlockHeader::free(remainder, header.next));
    self
      .region
      .write_header(offset, BlockHeader::busy(size, remainder_offset));

    trace!("split block at {offset}: {size} bytes busy, {remainder} byte remainder");

    self.region.payload_ptr(offset + HEADER_SIZE)
  }

  /// Releases the block whose payload starts at `ptr`.
  ///
  /// `ptr` must be a value previously returned by [`alloc`](Self::alloc)
  /// on this allocator and not released since. It is never dereferenced;
  /// validation is a bounds check against the region followed by a chain
  /// scan, so a foreign pointer is rejected rather than trusted.
  pub fn free(&mut self, ptr: *mut u8) -> Result<(), FreeError> {
    if ptr.is_null() {
      return Err(FreeError::NullPointer);
    }

    let payload = self
      .region
      .offset_of(ptr)
      .ok_or(FreeError::UnknownBlock)?;
    let offset = self.find_block(payload)?;

    let mut header = self.region.read_header(offset);
    if !header.is_busy() {
      return Err(FreeError::AlreadyFree);
    }
    header.set_free();

    // Absorb a free successor into this block.
    if header.next != NIL {
      let next = self.region.read_header(header.next);

      if !next.is_busy() {
        trace!("coalescing block at {offset} with successor at {}", header.next);
        header.grow(next.total_size());
        header.next = next.next;
      }
    }
    self.region.write_header(offset, header);

    // Then fold this block into a free predecessor.
    if let Some(prev_offset) = self.predecessor(offset) {
      let mut prev = self.region.read_header(prev_offset);

      if !prev.is_busy() {
        trace!("coalescing block at {offset} into predecessor at {prev_offset}");
        prev.grow(header.total_size());
        prev.next = header.next;
        self.region.write_header(prev_offset, prev);
      }
    }

    Ok(())
  }

  /// Offset of the block whose payload starts at `payload`, scanning from
  /// the chain head.
  fn find_block(&self, payload: usize) -> Result<usize, FreeError> {
    let mut offset = self.head;

    while offset != NIL {
      if offset + HEADER_SIZE == payload {
        return Ok(offset);
      }
      offset = self.region.read_header(offset).next;
    }

    Err(FreeError::UnknownBlock)
  }

  /// Offset of the block immediately before `offset`, `None` for the
  /// chain head.
  fn predecessor(&self, offset: usize) -> Option<usize> {
    if offset == self.head {
      return None;
    }

    let mut current = self.head;
    while current != NIL {
      let next = self.region.read_header(current).next;

      if next == offset {
        return Some(current);
      }
      current = next;
    }

    None
  }

  /// Walks the chain in address order without mutating it.
  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      allocator: self,
      offset: self.head,
      index: 0,
    }
  }

  /// Aggregate busy/free/total byte counts, header bytes included.
  pub fn stats(&self) -> RegionStats {
    let mut stats = RegionStats::default();

    for block in self.blocks() {
      if block.busy {
        stats.busy += block.total_size;
      } else {
        stats.free += block.total_size;
      }
    }
    stats.total = stats.busy + stats.free;

    stats
  }

  /// Renders the chain as the block-list table printed by
  /// [`dump`](Self::dump).
  pub fn report(&self) -> RegionReport<'_> {
    RegionReport { allocator: self }
  }

  /// Prints the chain listing to stdout. Diagnostic only; the chain is
  /// not touched.
  pub fn dump(&self) {
    print!("{}", self.report());
  }
}

/// Snapshot of one chain block, offsets relative to the region base.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
  pub index: usize,
  pub busy: bool,
  pub header_offset: usize,
  pub payload_offset: usize,
  pub size: usize,
  pub total_size: usize,
}

/// Aggregate byte counts over the whole chain, header bytes included.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegionStats {
  pub busy: usize,
  pub free: usize,
  pub total: usize,
}

/// Iterator over the chain, yielded by [`FirstFitAllocator::blocks`].
pub struct Blocks<'a> {
  allocator: &'a FirstFitAllocator,
  offset: usize,
  index: usize,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    if self.offset == NIL {
      return None;
    }

    let header = self.allocator.region.read_header(self.offset);
    self.index += 1;

    let info = BlockInfo {
      index: self.index,
      busy: header.is_busy(),
      header_offset: self.offset,
      payload_offset: self.offset + HEADER_SIZE,
      size: header.size(),
      total_size: header.total_size(),
    };

    self.offset = header.next;
    Some(info)
  }
}

/// Block-list table in the format of the classic allocator dump, one row
/// per block plus aggregate footer.
pub struct RegionReport<'a> {
  allocator: &'a FirstFitAllocator,
}

impl fmt::Display for RegionReport<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let base = self.allocator.region.base_addr();

    writeln!(f, "{:*^81}", "Block list")?;
    writeln!(f, "No.\tStatus\tBegin\t\tEnd\t\tSize\tt_Size\tt_Begin")?;
    writeln!(f, "{:-<81}", "")?;

    for block in self.allocator.blocks() {
      let begin = base + block.payload_offset;

      writeln!(
        f,
        "{}\t{}\t0x{:08x}\t0x{:08x}\t{}\t{}\t0x{:08x}",
        block.index,
        if block.busy { "Busy" } else { "Free" },
        begin,
        begin + block.size,
        block.size,
        block.total_size,
        base + block.header_offset,
      )?;
    }

    writeln!(f, "{:-<81}", "")?;

    let stats = self.allocator.stats();
    writeln!(f, "Total busy size = {}", stats.busy)?;
    writeln!(f, "Total free size = {}", stats.free)?;
    writeln!(f, "Total size = {}", stats.total)
  }
}
