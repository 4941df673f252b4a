//! Expandable, byte-addressed, word-granular frame memory.

use ethereum_types::U256;
use vm::ReturnData;

/// Largest offset+size we're willing to even attempt to grow to; anything
/// past this is treated as out-of-memory rather than an allocation attempt.
const MAX_RETURN_RANGE: u64 = u32::MAX as u64;

/// Returns `true` if `offset + size` fits in memory we're willing to grow to.
pub fn is_valid_range(offset: usize, size: usize) -> bool {
    (offset as u64).saturating_add(size as u64) <= MAX_RETURN_RANGE
}

fn to_usize(value: U256) -> usize {
    if value > U256::from(u32::MAX) {
        usize::MAX
    } else {
        value.low_u64() as usize
    }
}

/// Memory operations, implemented directly on the frame's byte buffer.
pub trait Memory {
    /// Number of active words (32-byte granules) currently allocated.
    fn size(&self) -> usize;
    /// Grow memory so that at least `size` bytes are addressable.
    fn expand(&mut self, size: usize);
    /// Read a single 256-bit word at `offset`.
    fn read(&self, offset: U256) -> U256;
    /// Read `size` bytes at `offset`, which must already have been expanded
    /// into by the caller's gasometer pass.
    fn read_slice(&self, offset: U256, size: U256) -> &[u8];
    /// Return a mutable slice over `[offset, offset+size)`, already expanded.
    fn writeable_slice(&mut self, offset: U256, size: U256) -> &mut [u8];
    /// Write a full 256-bit word, big-endian, at `offset` (`MSTORE`).
    fn write(&mut self, offset: U256, value: U256);
    /// Write a byte at `offset`.
    fn write_byte(&mut self, offset: U256, value: U256);
    /// Write arbitrary bytes starting at `offset`.
    fn write_slice(&mut self, offset: U256, slice: &[u8]);
    /// Crop `[offset, offset+size)` into an owned, independent `ReturnData`.
    fn into_return_data(self, offset: U256, size: U256) -> ReturnData;
    /// Copy `size` bytes from `source_offset` to `dest_offset` within the
    /// same buffer, correct under overlap (`MCOPY`, EIP-5656).
    fn copy_within(&mut self, dest_offset: U256, source_offset: U256, size: U256);
}

/// Rounds `size` up to the next active-word boundary (32 bytes).
pub fn next_word_multiple(size: usize) -> usize {
    (size + 31) / 32 * 32
}

impl Memory for Vec<u8> {
    fn size(&self) -> usize {
        self.len()
    }

    fn expand(&mut self, size: usize) {
        if size > self.len() {
            let new_size = next_word_multiple(size);
            self.resize(new_size, 0);
        }
    }

    fn read(&self, offset: U256) -> U256 {
        let off = to_usize(offset);
        U256::from(&self[off..off + 32])
    }

    fn read_slice(&self, offset: U256, size: U256) -> &[u8] {
        if size.is_zero() {
            return &[];
        }
        let off = to_usize(offset);
        let sz = to_usize(size);
        &self[off..off + sz]
    }

    fn writeable_slice(&mut self, offset: U256, size: U256) -> &mut [u8] {
        if size.is_zero() {
            return &mut [];
        }
        let off = to_usize(offset);
        let sz = to_usize(size);
        &mut self[off..off + sz]
    }

    fn write(&mut self, offset: U256, value: U256) {
        let off = to_usize(offset);
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        self[off..off + 32].copy_from_slice(&bytes);
    }

    fn write_byte(&mut self, offset: U256, value: U256) {
        let off = to_usize(offset);
        self[off] = value.low_u32() as u8;
    }

    fn write_slice(&mut self, offset: U256, slice: &[u8]) {
        if slice.is_empty() {
            return;
        }
        let off = to_usize(offset);
        self[off..off + slice.len()].copy_from_slice(slice);
    }

    fn copy_within(&mut self, dest_offset: U256, source_offset: U256, size: U256) {
        if size.is_zero() {
            return;
        }
        let dest = to_usize(dest_offset);
        let src = to_usize(source_offset);
        let sz = to_usize(size);
        self.copy_within(src..src + sz, dest);
    }

    fn into_return_data(mut self, offset: U256, size: U256) -> ReturnData {
        if size.is_zero() {
            return ReturnData::empty();
        }
        let off = to_usize(offset);
        let sz = to_usize(size);
        self.truncate(off + sz);
        ReturnData::new(self, off, sz)
    }
}
